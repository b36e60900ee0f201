use std::ops::Range;

use crate::error::Result;
use crate::index::{Calendar, PoolOffset, RTime, StopTimeIdx, VehicleJourneyIdx, VehicleTransferIdx};
use crate::string_pool::StringPool;
use crate::table::{column_table, ColumnTable};

use super::{pooled_str, run};

#[derive(Clone, Copy, Debug)]
pub struct NewVehicleJourney<'a> {
    pub id: &'a str,
    /// First of this journey's stop times; it owns one row per pattern stop.
    pub stop_times_offset: StopTimeIdx,
    /// Departure from the first stop, relative to midnight.
    pub begin_time: RTime,
    /// See [`vj_attributes`](crate::index::vj_attributes).
    pub attributes: u16,
    /// Days the journey runs on, counted from the calendar start.
    pub active: Calendar,
    /// UTC offset of the journey in 15 minute units.
    pub time_offset: i8,
    pub transfers_forward_offset: VehicleTransferIdx,
    pub n_transfers_forward: u8,
    pub transfers_backward_offset: VehicleTransferIdx,
    pub n_transfers_backward: u8,
}

column_table! {
    pub struct VehicleJourneys {
        name: "vehicle journeys",
        index: VehicleJourneyIdx,
        slack: 256,
        columns: {
            ids: PoolOffset,
            stop_times_offsets: StopTimeIdx,
            begin_times: RTime,
            attributes: u16,
            active: Calendar,
            time_offsets: i8,
            transfers_forward_offsets: VehicleTransferIdx,
            n_transfers_forward: u8,
            transfers_backward_offsets: VehicleTransferIdx,
            n_transfers_backward: u8,
        }
    }
}

impl VehicleJourneys {
    pub fn add(
        &mut self,
        pool: &mut StringPool,
        rows: &[NewVehicleJourney<'_>],
    ) -> Result<VehicleJourneyIdx> {
        let start = self.begin_append(rows.len())?;
        let ids = rows
            .iter()
            .map(|row| pool.intern(row.id))
            .collect::<Result<Vec<_>>>()?;

        for (row, id) in rows.iter().zip(ids) {
            self.push_row(
                id,
                row.stop_times_offset,
                row.begin_time,
                row.attributes,
                row.active,
                row.time_offset,
                row.transfers_forward_offset,
                row.n_transfers_forward,
                row.transfers_backward_offset,
                row.n_transfers_backward,
            )?;
        }
        Ok(start)
    }

    pub fn id<'p>(&self, pool: &'p StringPool, vj: VehicleJourneyIdx) -> Option<&'p str> {
        pooled_str(pool, self.ids(), vj as usize)
    }

    pub fn begin_time(&self, vj: VehicleJourneyIdx) -> Option<RTime> {
        self.begin_times().get(vj as usize).copied()
    }

    pub fn is_active_on(&self, vj: VehicleJourneyIdx, day: u32) -> bool {
        day < Calendar::BITS
            && self
                .active()
                .get(vj as usize)
                .is_some_and(|mask| mask & (1 << day) != 0)
    }

    /// Rows of the journey's stop times. `n_stops` comes from the owning
    /// journey pattern, `n_stop_times` is the stop time table length.
    pub fn stop_times_range(
        &self,
        vj: VehicleJourneyIdx,
        n_stops: usize,
        n_stop_times: usize,
    ) -> Option<Range<usize>> {
        let offset = *self.stop_times_offsets().get(vj as usize)? as usize;
        run(offset, n_stops, n_stop_times)
    }

    pub fn forward_transfers_range(
        &self,
        vj: VehicleJourneyIdx,
        n_vehicle_transfers: usize,
    ) -> Option<Range<usize>> {
        let vj = vj as usize;
        run(
            *self.transfers_forward_offsets().get(vj)? as usize,
            *self.n_transfers_forward().get(vj)? as usize,
            n_vehicle_transfers,
        )
    }

    pub fn backward_transfers_range(
        &self,
        vj: VehicleJourneyIdx,
        n_vehicle_transfers: usize,
    ) -> Option<Range<usize>> {
        let vj = vj as usize;
        run(
            *self.transfers_backward_offsets().get(vj)? as usize,
            *self.n_transfers_backward().get(vj)? as usize,
            n_vehicle_transfers,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::vj_attributes;

    fn journey(id: &str, stop_times_offset: u32) -> NewVehicleJourney<'_> {
        NewVehicleJourney {
            id,
            stop_times_offset,
            begin_time: 1800,
            attributes: vj_attributes::WHEELCHAIR_ACCESSIBLE | vj_attributes::BIKE_ACCEPTED,
            active: 0b101,
            time_offset: 4,
            transfers_forward_offset: 0,
            n_transfers_forward: 2,
            transfers_backward_offset: 2,
            n_transfers_backward: 1,
        }
    }

    #[test]
    fn test_add_and_navigate() {
        let mut pool = StringPool::new();
        let mut vjs = VehicleJourneys::new();
        vjs.add(&mut pool, &[journey("trip:1", 0), journey("trip:2", 3)])
            .unwrap();

        assert_eq!(vjs.id(&pool, 1), Some("trip:2"));
        assert_eq!(vjs.begin_time(0), Some(1800));
        assert_eq!(vjs.stop_times_range(1, 3, 6), Some(3..6));
        assert_eq!(vjs.stop_times_range(1, 4, 6), None);
        assert_eq!(vjs.forward_transfers_range(0, 3), Some(0..2));
        assert_eq!(vjs.backward_transfers_range(0, 3), Some(2..3));
        assert_eq!(vjs.backward_transfers_range(0, 2), None);
    }

    #[test]
    fn test_active_days() {
        let mut pool = StringPool::new();
        let mut vjs = VehicleJourneys::new();
        vjs.add(&mut pool, &[journey("trip:1", 0)]).unwrap();

        assert!(vjs.is_active_on(0, 0));
        assert!(!vjs.is_active_on(0, 1));
        assert!(vjs.is_active_on(0, 2));
        assert!(!vjs.is_active_on(0, 40));
        assert!(!vjs.is_active_on(1, 0));
    }
}
