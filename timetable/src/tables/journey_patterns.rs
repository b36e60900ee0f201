use std::ops::Range;

use crate::error::Result;
use crate::index::{
    CommercialModeIdx, JourneyPatternIdx, JourneyPatternPointIdx, RouteIdx, VehicleJourneyIdx,
};
use crate::table::{column_table, ColumnTable};

use super::run;

/// A trip template: a run of journey pattern points and the run of vehicle
/// journeys that follow it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NewJourneyPattern {
    pub point_offset: JourneyPatternPointIdx,
    pub n_stops: u16,
    pub vehicle_journey_offset: VehicleJourneyIdx,
    pub n_vehicle_journeys: u16,
    pub attributes: u16,
    pub route: RouteIdx,
    pub commercial_mode: CommercialModeIdx,
}

column_table! {
    pub struct JourneyPatterns {
        name: "journey patterns",
        index: JourneyPatternIdx,
        slack: 16,
        columns: {
            point_offsets: JourneyPatternPointIdx,
            n_stops: u16,
            vehicle_journey_offsets: VehicleJourneyIdx,
            n_vehicle_journeys: u16,
            attributes: u16,
            routes: RouteIdx,
            commercial_modes: CommercialModeIdx,
        }
    }
}

impl JourneyPatterns {
    pub fn add(&mut self, rows: &[NewJourneyPattern]) -> Result<JourneyPatternIdx> {
        let start = self.begin_append(rows.len())?;
        for row in rows {
            self.push_row(
                row.point_offset,
                row.n_stops,
                row.vehicle_journey_offset,
                row.n_vehicle_journeys,
                row.attributes,
                row.route,
                row.commercial_mode,
            )?;
        }
        Ok(start)
    }

    /// Rows of the pattern's points, if they lie within `n_points`.
    pub fn points_range(&self, pattern: JourneyPatternIdx, n_points: usize) -> Option<Range<usize>> {
        let pattern = pattern as usize;
        run(
            *self.point_offsets().get(pattern)? as usize,
            *self.n_stops().get(pattern)? as usize,
            n_points,
        )
    }

    /// Rows of the pattern's vehicle journeys, if they lie within `n_vehicle_journeys`.
    pub fn vehicle_journeys_range(
        &self,
        pattern: JourneyPatternIdx,
        n_vehicle_journeys: usize,
    ) -> Option<Range<usize>> {
        let pattern = pattern as usize;
        run(
            *self.vehicle_journey_offsets().get(pattern)? as usize,
            *self.n_vehicle_journeys().get(pattern)? as usize,
            n_vehicle_journeys,
        )
    }

    pub fn stop_count(&self, pattern: JourneyPatternIdx) -> Option<u16> {
        self.n_stops().get(pattern as usize).copied()
    }

    pub fn route(&self, pattern: JourneyPatternIdx) -> Option<RouteIdx> {
        self.routes().get(pattern as usize).copied()
    }
}
