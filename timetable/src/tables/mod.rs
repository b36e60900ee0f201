//! One structure-of-arrays table per timetable entity family.
//!
//! String-valued columns hold offsets into the container's shared
//! [`StringPool`](crate::string_pool::StringPool); tables that need the pool
//! take it as an argument to `add` and to their string accessors.

pub mod commercial_modes;
pub mod journey_pattern_points;
pub mod journey_patterns;
pub mod lines;
pub mod operators;
pub mod physical_modes;
pub mod routes;
pub mod stop_areas;
pub mod stop_points;
pub mod stop_times;
pub mod transfers;
pub mod vehicle_journeys;
pub mod vehicle_transfers;

pub use commercial_modes::{CommercialModes, NewCommercialMode};
pub use journey_pattern_points::{JourneyPatternPoints, NewJourneyPatternPoint};
pub use journey_patterns::{JourneyPatterns, NewJourneyPattern};
pub use lines::{Lines, NewLine};
pub use operators::{NewOperator, Operators};
pub use physical_modes::{NewPhysicalMode, PhysicalModes};
pub use routes::Routes;
pub use stop_areas::{NewStopArea, StopAreas};
pub use stop_points::{NewStopPoint, StopPoints};
pub use stop_times::{NewStopTime, StopTimes};
pub use transfers::{NewTransfer, Transfers};
pub use vehicle_journeys::{NewVehicleJourney, VehicleJourneys};
pub use vehicle_transfers::VehicleTransfers;

use std::ops::Range;

use crate::index::PoolOffset;
use crate::string_pool::StringPool;

fn pooled_str<'p>(pool: &'p StringPool, column: &[PoolOffset], row: usize) -> Option<&'p str> {
    column.get(row).and_then(|&offset| pool.get_str(offset))
}

/// Resolves an `offset + count` run against a table of `len` rows.
fn run(offset: usize, count: usize, len: usize) -> Option<Range<usize>> {
    let end = offset.checked_add(count)?;
    (end <= len).then_some(offset..end)
}
