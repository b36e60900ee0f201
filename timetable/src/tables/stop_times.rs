use crate::error::Result;
use crate::index::{RTime, StopTimeIdx};
use crate::table::{column_table, ColumnTable};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NewStopTime {
    pub arrival: RTime,
    pub departure: RTime,
}

column_table! {
    /// Arrival and departure times relative to a vehicle journey's begin time.
    ///
    /// A vehicle journey owns as many consecutive rows as its journey pattern
    /// has stops.
    pub struct StopTimes {
        name: "stop times",
        index: StopTimeIdx,
        slack: 1024,
        columns: {
            arrivals: RTime,
            departures: RTime,
        }
    }
}

impl StopTimes {
    pub fn add(&mut self, rows: &[NewStopTime]) -> Result<StopTimeIdx> {
        let start = self.begin_append(rows.len())?;
        for row in rows {
            self.push_row(row.arrival, row.departure)?;
        }
        Ok(start)
    }

    pub fn get(&self, stop_time: usize) -> Option<NewStopTime> {
        Some(NewStopTime {
            arrival: *self.arrivals().get(stop_time)?,
            departure: *self.departures().get(stop_time)?,
        })
    }
}
