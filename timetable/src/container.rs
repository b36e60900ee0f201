//! The timetable container: the string pool, every entity table, the derived
//! journey-patterns-at-stop index and the scalar metadata.
//!
//! A container is either built in memory through the `add_*` methods or bound
//! to a snapshot file with [`Container::open`]. A mapped container is
//! read-only as a whole.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use memmap2::Mmap;

use crate::error::{Result, TimetableError};
use crate::index::*;
use crate::patterns_at_stop::JourneyPatternsAtStop;
use crate::string_pool::StringPool;
use crate::table::ColumnTable;
use crate::tables::*;

const NAME: &str = "timetable container";

pub enum Backing {
    Owned,
    Mapped { path: PathBuf, map: Arc<Mmap> },
}

impl std::fmt::Debug for Backing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backing::Owned => f.write_str("Owned"),
            Backing::Mapped { path, map } => f
                .debug_struct("Mapped")
                .field("path", path)
                .field("size", &map.len())
                .finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Midnight of the first calendar day, in seconds since the epoch.
    pub calendar_start_time: u64,
    /// Number of days covered by the active-day masks.
    pub n_days: u32,
    /// Pool offset of the IANA timezone name.
    pub timezone: Option<PoolOffset>,
    pub utc_offset: i32,
}

#[derive(Debug)]
pub struct Container {
    pub(crate) backing: Backing,
    pub(crate) metadata: Metadata,
    pub(crate) pool: StringPool,
    pub(crate) stop_areas: StopAreas,
    pub(crate) stop_points: StopPoints,
    pub(crate) transfers: Transfers,
    pub(crate) operators: Operators,
    pub(crate) physical_modes: PhysicalModes,
    pub(crate) commercial_modes: CommercialModes,
    pub(crate) lines: Lines,
    pub(crate) routes: Routes,
    pub(crate) journey_pattern_points: JourneyPatternPoints,
    pub(crate) journey_patterns: JourneyPatterns,
    pub(crate) stop_times: StopTimes,
    pub(crate) vehicle_journeys: VehicleJourneys,
    pub(crate) vehicle_transfers: VehicleTransfers,
    pub(crate) patterns_at_stop: JourneyPatternsAtStop,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    pub fn new() -> Self {
        Container {
            backing: Backing::Owned,
            metadata: Metadata::default(),
            pool: StringPool::new(),
            stop_areas: StopAreas::new(),
            stop_points: StopPoints::new(),
            transfers: Transfers::new(),
            operators: Operators::new(),
            physical_modes: PhysicalModes::new(),
            commercial_modes: CommercialModes::new(),
            lines: Lines::new(),
            routes: Routes::new(),
            journey_pattern_points: JourneyPatternPoints::new(),
            journey_patterns: JourneyPatterns::new(),
            stop_times: StopTimes::new(),
            vehicle_journeys: VehicleJourneys::new(),
            vehicle_transfers: VehicleTransfers::new(),
            patterns_at_stop: JourneyPatternsAtStop::new(),
        }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self.backing, Backing::Mapped { .. })
    }

    pub fn backing(&self) -> &Backing {
        &self.backing
    }

    /// Snapshot file the container is bound to, if any.
    pub fn source_path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::Owned => None,
            Backing::Mapped { path, .. } => Some(path),
        }
    }

    fn ensure_owned(&self) -> Result<()> {
        if self.is_mapped() {
            return Err(TimetableError::Denied { what: NAME });
        }
        Ok(())
    }

    /// Frees every table and returns to the empty owned state.
    ///
    /// Tables are torn down in reverse dependency order, the pool last.
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_owned()?;
        self.patterns_at_stop = JourneyPatternsAtStop::new();
        self.journey_patterns.reset()?;
        self.commercial_modes.reset()?;
        self.routes.reset()?;
        self.lines.reset()?;
        self.physical_modes.reset()?;
        self.operators.reset()?;
        self.vehicle_journeys.reset()?;
        self.vehicle_transfers.reset()?;
        self.stop_times.reset()?;
        self.journey_pattern_points.reset()?;
        self.transfers.reset()?;
        self.stop_areas.reset()?;
        self.stop_points.reset()?;
        self.pool.reset()?;
        self.metadata = Metadata::default();
        log::debug!("Reset {NAME}");
        Ok(())
    }

    /// Releases a snapshot mapping and returns to the empty owned state.
    ///
    /// Returns `false` and leaves the container alone if it is not mapped.
    pub fn unmap(&mut self) -> bool {
        if let Backing::Mapped { path, .. } = &self.backing {
            log::info!("Unmapping timetable {:?}", path);
            // Every mapped column holds a reference to the mapping; dropping
            // them all together with the backing releases it.
            *self = Container::new();
            true
        } else {
            false
        }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn set_calendar(&mut self, calendar_start_time: u64, n_days: u32) -> Result<()> {
        self.ensure_owned()?;
        self.metadata.calendar_start_time = calendar_start_time;
        self.metadata.n_days = n_days;
        Ok(())
    }

    pub fn set_timezone(&mut self, name: &str, utc_offset: i32) -> Result<()> {
        self.ensure_owned()?;
        self.metadata.timezone = Some(self.pool.intern(name)?);
        self.metadata.utc_offset = utc_offset;
        Ok(())
    }

    pub fn calendar_start(&self) -> Option<DateTime<Utc>> {
        let seconds = i64::try_from(self.metadata.calendar_start_time).ok()?;
        DateTime::from_timestamp(seconds, 0)
    }

    pub fn timezone_name(&self) -> Option<&str> {
        self.pool.get_str(self.metadata.timezone?)
    }

    pub fn pool(&self) -> &StringPool {
        &self.pool
    }

    pub fn stop_areas(&self) -> &StopAreas {
        &self.stop_areas
    }

    pub fn stop_points(&self) -> &StopPoints {
        &self.stop_points
    }

    pub fn transfers(&self) -> &Transfers {
        &self.transfers
    }

    pub fn operators(&self) -> &Operators {
        &self.operators
    }

    pub fn physical_modes(&self) -> &PhysicalModes {
        &self.physical_modes
    }

    pub fn commercial_modes(&self) -> &CommercialModes {
        &self.commercial_modes
    }

    pub fn lines(&self) -> &Lines {
        &self.lines
    }

    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    pub fn journey_pattern_points(&self) -> &JourneyPatternPoints {
        &self.journey_pattern_points
    }

    pub fn journey_patterns(&self) -> &JourneyPatterns {
        &self.journey_patterns
    }

    pub fn stop_times(&self) -> &StopTimes {
        &self.stop_times
    }

    pub fn vehicle_journeys(&self) -> &VehicleJourneys {
        &self.vehicle_journeys
    }

    pub fn vehicle_transfers(&self) -> &VehicleTransfers {
        &self.vehicle_transfers
    }

    pub fn patterns_at_stop(&self) -> &JourneyPatternsAtStop {
        &self.patterns_at_stop
    }

    pub fn add_stop_areas(&mut self, rows: &[NewStopArea<'_>]) -> Result<StopIdx> {
        self.stop_areas.add(&mut self.pool, rows)
    }

    pub fn add_stop_points(&mut self, rows: &[NewStopPoint<'_>]) -> Result<StopIdx> {
        self.stop_points.add(&mut self.pool, rows)
    }

    pub fn add_transfers(&mut self, rows: &[NewTransfer]) -> Result<TransferIdx> {
        self.transfers.add(rows)
    }

    pub fn add_operators(&mut self, rows: &[NewOperator<'_>]) -> Result<OperatorIdx> {
        self.operators.add(&mut self.pool, rows)
    }

    pub fn add_physical_modes(&mut self, rows: &[NewPhysicalMode<'_>]) -> Result<PhysicalModeIdx> {
        self.physical_modes.add(&mut self.pool, rows)
    }

    pub fn add_commercial_modes(
        &mut self,
        rows: &[NewCommercialMode<'_>],
    ) -> Result<CommercialModeIdx> {
        self.commercial_modes.add(&mut self.pool, rows)
    }

    pub fn add_lines(&mut self, rows: &[NewLine<'_>]) -> Result<LineIdx> {
        self.lines.add(&mut self.pool, rows)
    }

    pub fn add_routes(&mut self, lines: &[LineIdx]) -> Result<RouteIdx> {
        self.routes.add(lines)
    }

    pub fn add_journey_pattern_points(
        &mut self,
        rows: &[NewJourneyPatternPoint<'_>],
    ) -> Result<JourneyPatternPointIdx> {
        self.journey_pattern_points.add(&mut self.pool, rows)
    }

    pub fn add_journey_patterns(&mut self, rows: &[NewJourneyPattern]) -> Result<JourneyPatternIdx> {
        self.journey_patterns.add(rows)
    }

    pub fn add_stop_times(&mut self, rows: &[NewStopTime]) -> Result<StopTimeIdx> {
        self.stop_times.add(rows)
    }

    pub fn add_vehicle_journeys(
        &mut self,
        rows: &[NewVehicleJourney<'_>],
    ) -> Result<VehicleJourneyIdx> {
        self.vehicle_journeys.add(&mut self.pool, rows)
    }

    pub fn add_vehicle_transfers(&mut self, refs: &[VehicleJourneyRef]) -> Result<VehicleTransferIdx> {
        self.vehicle_transfers.add(refs)
    }

    /// Rebuilds the journey-patterns-at-stop index from the current tables.
    pub fn build_journey_patterns_at_stop(&mut self) -> Result<()> {
        self.ensure_owned()?;
        self.patterns_at_stop = JourneyPatternsAtStop::build(
            self.stop_points.len(),
            &self.journey_patterns,
            &self.journey_pattern_points,
        )?;
        Ok(())
    }

    pub fn journey_patterns_at_stop(&self, stop: StopIdx) -> &[JourneyPatternIdx] {
        self.patterns_at_stop.patterns_for(stop)
    }

    /// Stop points visited by `pattern`, in order.
    pub fn pattern_stop_points(&self, pattern: JourneyPatternIdx) -> Option<&[StopIdx]> {
        let points = self.journey_pattern_points.stop_points();
        let run = self.journey_patterns.points_range(pattern, points.len())?;
        points.get(run)
    }

    pub fn pattern_vehicle_journeys(&self, pattern: JourneyPatternIdx) -> Option<Range<usize>> {
        self.journey_patterns
            .vehicle_journeys_range(pattern, self.vehicle_journeys.len())
    }

    /// Stop times of a vehicle journey belonging to `pattern`.
    pub fn vehicle_journey_stop_times(
        &self,
        pattern: JourneyPatternIdx,
        vj: VehicleJourneyIdx,
    ) -> Option<Range<usize>> {
        let n_stops = self.journey_patterns.stop_count(pattern)? as usize;
        self.vehicle_journeys
            .stop_times_range(vj, n_stops, self.stop_times.len())
    }

    /// Rows of the transfer table leaving `stop`.
    pub fn transfers_from(&self, stop: StopIdx) -> Option<Range<usize>> {
        self.stop_points.transfers_range(stop, self.transfers.len())
    }

    /// Looks up a stop point by its external identifier.
    pub fn find_stop_point(&self, id: &str) -> Option<StopIdx> {
        self.stop_points.find_by_id(&self.pool, id)
    }

    /// Table sizes for logs and the inspect command.
    pub fn table_sizes(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("string pool bytes", self.pool.len()),
            (StopAreas::NAME, self.stop_areas.len()),
            (StopPoints::NAME, self.stop_points.len()),
            (Transfers::NAME, self.transfers.len()),
            (Operators::NAME, self.operators.len()),
            (PhysicalModes::NAME, self.physical_modes.len()),
            (CommercialModes::NAME, self.commercial_modes.len()),
            (Lines::NAME, self.lines.len()),
            (Routes::NAME, self.routes.len()),
            (JourneyPatternPoints::NAME, self.journey_pattern_points.len()),
            (JourneyPatterns::NAME, self.journey_patterns.len()),
            (StopTimes::NAME, self.stop_times.len()),
            (VehicleJourneys::NAME, self.vehicle_journeys.len()),
            (VehicleTransfers::NAME, self.vehicle_transfers.len()),
            ("journey patterns at stop", self.patterns_at_stop.patterns().len()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(id: &str) -> NewStopPoint<'_> {
        NewStopPoint {
            id,
            name: id,
            platform_code: "",
            coord: LatLon::new(52.5, 13.4),
            wait_time: 30,
            attributes: 0,
            stop_area: 0,
            transfers_offset: 0,
        }
    }

    #[test]
    fn test_new_is_empty_and_owned() {
        let container = Container::new();
        assert!(!container.is_mapped());
        assert!(container.source_path().is_none());
        assert!(container.stop_points().is_empty());
        assert!(container.pool().is_empty());
        assert!(container.journey_patterns_at_stop(0).is_empty());
        assert!(container.timezone_name().is_none());
    }

    #[test]
    fn test_metadata() {
        let mut container = Container::new();
        container.set_calendar(1_736_640_000, 32).unwrap();
        container.set_timezone("Europe/Berlin", 3600).unwrap();

        assert_eq!(container.metadata().n_days, 32);
        assert_eq!(container.metadata().utc_offset, 3600);
        assert_eq!(container.timezone_name(), Some("Europe/Berlin"));
        assert_eq!(
            container.calendar_start().map(|start| start.to_rfc3339()),
            Some("2025-01-12T00:00:00+00:00".to_string())
        );
    }

    #[test]
    fn test_tables_share_the_pool() {
        let mut container = Container::new();
        container.add_stop_points(&[stop("sp:1"), stop("sp:2")]).unwrap();
        container
            .add_operators(&[NewOperator {
                id: "op:1",
                url: "https://example.org",
                name: "S-Bahn Berlin",
            }])
            .unwrap();

        let pool = container.pool();
        assert_eq!(container.stop_points().id(pool, 1), Some("sp:2"));
        assert_eq!(container.operators().name(pool, 0), Some("S-Bahn Berlin"));
        assert_eq!(container.find_stop_point("sp:2"), Some(1));
    }

    #[test]
    fn test_build_index_and_navigate() {
        let mut container = Container::new();
        container
            .add_stop_points(&[stop("a"), stop("b"), stop("c")])
            .unwrap();
        let point = |stop_point| NewJourneyPatternPoint {
            stop_point,
            headsign: "c",
            attributes: 0,
        };
        container
            .add_journey_pattern_points(&[point(0), point(2)])
            .unwrap();
        container
            .add_journey_patterns(&[NewJourneyPattern {
                point_offset: 0,
                n_stops: 2,
                vehicle_journey_offset: 0,
                n_vehicle_journeys: 0,
                attributes: 0,
                route: 0,
                commercial_mode: 0,
            }])
            .unwrap();
        container.build_journey_patterns_at_stop().unwrap();

        assert_eq!(container.journey_patterns_at_stop(0), &[0]);
        assert!(container.journey_patterns_at_stop(1).is_empty());
        assert_eq!(container.journey_patterns_at_stop(2), &[0]);
        assert_eq!(container.pattern_stop_points(0), Some(&[0, 2][..]));
        assert_eq!(container.pattern_vehicle_journeys(0), Some(0..0));
        assert_eq!(container.transfers_from(2), Some(0..0));
    }

    #[test]
    fn test_reset() {
        let mut container = Container::new();
        container.add_stop_points(&[stop("a")]).unwrap();
        container.set_timezone("Europe/Berlin", 3600).unwrap();
        container.reset().unwrap();

        assert!(container.stop_points().is_empty());
        assert!(container.pool().is_empty());
        assert_eq!(container.metadata(), &Metadata::default());
        assert!(!container.unmap());
    }
}
