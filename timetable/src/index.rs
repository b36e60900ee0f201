//! Row index types and the plain value types stored in table columns.
//!
//! Every table addresses its rows with a fixed-width unsigned integer sized to
//! the expected cardinality of the entity. Appends are checked against the
//! width of that integer, so a table never hands out an index that wraps.

use std::fmt;
use std::hash::Hash;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub trait RowIndex:
    Copy + Eq + Ord + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Largest number of rows a table addressed by this type may hold.
    const MAX_ROWS: usize;

    fn from_usize(value: usize) -> Option<Self>;

    fn index(self) -> usize;
}

macro_rules! impl_row_index {
    ($($ty:ty),+) => {
        $(
            impl RowIndex for $ty {
                const MAX_ROWS: usize = <$ty>::MAX as usize;

                fn from_usize(value: usize) -> Option<Self> {
                    <$ty>::try_from(value).ok()
                }

                fn index(self) -> usize {
                    self as usize
                }
            }
        )+
    };
}

impl_row_index!(u8, u16, u32);

pub type StopIdx = u16;
pub type OperatorIdx = u8;
pub type PhysicalModeIdx = u8;
pub type CommercialModeIdx = u8;
pub type LineIdx = u16;
pub type RouteIdx = u16;
pub type JourneyPatternIdx = u16;
pub type JourneyPatternPointIdx = u32;
pub type StopTimeIdx = u32;
pub type VehicleJourneyIdx = u32;
pub type TransferIdx = u32;
pub type VehicleTransferIdx = u32;

/// Byte offset into the shared string pool.
pub type PoolOffset = u32;

/// Relative time in units of four seconds.
///
/// 2^16 units at four seconds cover a little over 72 hours, enough for
/// yesterday, today and tomorrow in overnight searches.
pub type RTime = u16;

/// Bitmask of the days, counted from the calendar start, a service runs on.
pub type Calendar = u32;

pub const RTIME_RESOLUTION_SECONDS: u32 = 4;

pub fn rtime_from_seconds(seconds: u32) -> RTime {
    (seconds / RTIME_RESOLUTION_SECONDS).min(RTime::MAX as u32) as RTime
}

pub fn rtime_to_seconds(time: RTime) -> u32 {
    time as u32 * RTIME_RESOLUTION_SECONDS
}

#[derive(Clone, Copy, Debug, Default, PartialEq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct LatLon {
    pub lat: f32,
    pub lon: f32,
}

impl LatLon {
    pub fn new(lat: f32, lon: f32) -> Self {
        Self { lat, lon }
    }
}

/// A vehicle journey addressed through its journey pattern, as used by the
/// forward and backward interline transfer lists.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, FromBytes, IntoBytes, KnownLayout, Immutable,
)]
#[repr(C)]
pub struct VehicleJourneyRef {
    pub journey_pattern: JourneyPatternIdx,
    /// Offset of the vehicle journey within the pattern's run.
    pub vehicle_journey_offset: u16,
}

/// Vehicle journey attribute bits.
pub mod vj_attributes {
    pub const NONE: u16 = 0;
    pub const WHEELCHAIR_ACCESSIBLE: u16 = 1;
    pub const BIKE_ACCEPTED: u16 = 2;
    pub const VISUAL_ANNOUNCEMENT: u16 = 4;
    pub const AUDIBLE_ANNOUNCEMENT: u16 = 8;
    pub const APPROPRIATE_ESCORT: u16 = 16;
    pub const APPROPRIATE_SIGNAGE: u16 = 32;
    pub const SCHOOL_VEHICLE: u16 = 64;
    pub const WIFI: u16 = 128;
    pub const TOILET: u16 = 256;
    pub const ON_DEMAND: u16 = 512;
}

/// Journey pattern point attribute bits.
pub mod point_attributes {
    pub const WAITING_POINT: u8 = 1;
    pub const BOARDING: u8 = 2;
    pub const ALIGHTING: u8 = 4;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_index_bounds() {
        assert_eq!(<u8 as RowIndex>::MAX_ROWS, 255);
        assert_eq!(<u16 as RowIndex>::MAX_ROWS, 65_535);
        assert_eq!(u16::from_usize(65_535), Some(65_535));
        assert_eq!(u16::from_usize(65_536), None);
        assert_eq!(u8::from_usize(256), None);
        assert_eq!(7u32.index(), 7);
    }

    #[test]
    fn test_rtime_conversion() {
        assert_eq!(rtime_from_seconds(3600), 900);
        assert_eq!(rtime_to_seconds(900), 3600);
        // Beyond three days saturates instead of wrapping.
        assert_eq!(rtime_from_seconds(u32::MAX), RTime::MAX);
    }
}
