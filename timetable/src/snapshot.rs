//! On-disk layout of a timetable snapshot.
//!
//! A snapshot starts with a fixed [`SnapshotHeader`] followed by the raw
//! bytes of every column, each starting at an 8-byte aligned offset. Values
//! are stored in host byte order so the loader can bind them without copying.

use std::io::{BufWriter, Write};
use std::path::Path;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Result, TimetableError};
use crate::Container;

pub const MAGIC: [u8; 8] = *b"TTABLEV4";

/// Stored in the header's timezone field when the container has none.
pub const NO_TIMEZONE: u32 = u32::MAX;

pub(crate) const COLUMN_ALIGN: usize = 8;

macro_rules! column_ids {
    ($($id:ident),+ $(,)?) => {
        /// Every column stored in a snapshot, in file order.
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        pub enum ColumnId {
            $($id),+
        }

        impl ColumnId {
            pub const ALL: &'static [ColumnId] = &[$(ColumnId::$id),+];
        }
    };
}

column_ids! {
    StringPool,
    StopAreaIds,
    StopAreaCoords,
    StopAreaNames,
    StopAreaTimezones,
    StopPointIds,
    StopPointNames,
    StopPointPlatformCodes,
    StopPointCoords,
    StopPointWaitTimes,
    StopPointAttributes,
    StopPointStopAreas,
    StopPointTransfersOffsets,
    TransferTargetStops,
    TransferDurations,
    OperatorIds,
    OperatorUrls,
    OperatorNames,
    PhysicalModeIds,
    PhysicalModeNames,
    CommercialModeIds,
    CommercialModeNames,
    LineIds,
    LineCodes,
    LineNames,
    LineColors,
    LineTextColors,
    LineOperators,
    LinePhysicalModes,
    RouteLines,
    JourneyPatternPointStopPoints,
    JourneyPatternPointHeadsigns,
    JourneyPatternPointAttributes,
    JourneyPatternPointOffsets,
    JourneyPatternStopCounts,
    JourneyPatternVehicleJourneyOffsets,
    JourneyPatternVehicleJourneyCounts,
    JourneyPatternAttributes,
    JourneyPatternRoutes,
    JourneyPatternCommercialModes,
    StopTimeArrivals,
    StopTimeDepartures,
    VehicleJourneyIds,
    VehicleJourneyStopTimesOffsets,
    VehicleJourneyBeginTimes,
    VehicleJourneyAttributes,
    VehicleJourneyActive,
    VehicleJourneyTimeOffsets,
    VehicleJourneyTransfersForwardOffsets,
    VehicleJourneyTransfersForwardCounts,
    VehicleJourneyTransfersBackwardOffsets,
    VehicleJourneyTransfersBackwardCounts,
    VehicleTransferRefs,
    PatternsAtStopOffsets,
    PatternsAtStopPatterns,
}

pub const N_COLUMNS: usize = ColumnId::ALL.len();

/// Location of one column: byte offset from the start of the file and number
/// of elements (bytes for the string pool).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct ColumnDescriptor {
    pub offset: u64,
    pub count: u64,
}

#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SnapshotHeader {
    pub magic: [u8; 8],
    pub calendar_start_time: u64,
    pub timezone: u32,
    pub utc_offset: i32,
    pub n_days: u32,
    pub reserved: u32,
    pub columns: [ColumnDescriptor; N_COLUMNS],
}

pub const HEADER_SIZE: usize = std::mem::size_of::<SnapshotHeader>();

impl SnapshotHeader {
    pub fn column(&self, id: ColumnId) -> ColumnDescriptor {
        self.columns[id as usize]
    }
}

/// Raw bytes and element count of a column of `container`.
fn column_bytes(container: &Container, id: ColumnId) -> (&[u8], usize) {
    fn raw<T: IntoBytes + Immutable>(values: &[T]) -> (&[u8], usize) {
        (values.as_bytes(), values.len())
    }

    let c = container;
    match id {
        ColumnId::StringPool => raw(c.pool.as_bytes()),
        ColumnId::StopAreaIds => raw(c.stop_areas.ids()),
        ColumnId::StopAreaCoords => raw(c.stop_areas.coords()),
        ColumnId::StopAreaNames => raw(c.stop_areas.names()),
        ColumnId::StopAreaTimezones => raw(c.stop_areas.timezones()),
        ColumnId::StopPointIds => raw(c.stop_points.ids()),
        ColumnId::StopPointNames => raw(c.stop_points.names()),
        ColumnId::StopPointPlatformCodes => raw(c.stop_points.platform_codes()),
        ColumnId::StopPointCoords => raw(c.stop_points.coords()),
        ColumnId::StopPointWaitTimes => raw(c.stop_points.wait_times()),
        ColumnId::StopPointAttributes => raw(c.stop_points.attributes()),
        ColumnId::StopPointStopAreas => raw(c.stop_points.stop_areas()),
        ColumnId::StopPointTransfersOffsets => raw(c.stop_points.transfers_offsets()),
        ColumnId::TransferTargetStops => raw(c.transfers.target_stops()),
        ColumnId::TransferDurations => raw(c.transfers.durations()),
        ColumnId::OperatorIds => raw(c.operators.ids()),
        ColumnId::OperatorUrls => raw(c.operators.urls()),
        ColumnId::OperatorNames => raw(c.operators.names()),
        ColumnId::PhysicalModeIds => raw(c.physical_modes.ids()),
        ColumnId::PhysicalModeNames => raw(c.physical_modes.names()),
        ColumnId::CommercialModeIds => raw(c.commercial_modes.ids()),
        ColumnId::CommercialModeNames => raw(c.commercial_modes.names()),
        ColumnId::LineIds => raw(c.lines.ids()),
        ColumnId::LineCodes => raw(c.lines.codes()),
        ColumnId::LineNames => raw(c.lines.names()),
        ColumnId::LineColors => raw(c.lines.colors()),
        ColumnId::LineTextColors => raw(c.lines.text_colors()),
        ColumnId::LineOperators => raw(c.lines.operators()),
        ColumnId::LinePhysicalModes => raw(c.lines.physical_modes()),
        ColumnId::RouteLines => raw(c.routes.lines()),
        ColumnId::JourneyPatternPointStopPoints => raw(c.journey_pattern_points.stop_points()),
        ColumnId::JourneyPatternPointHeadsigns => raw(c.journey_pattern_points.headsigns()),
        ColumnId::JourneyPatternPointAttributes => raw(c.journey_pattern_points.attributes()),
        ColumnId::JourneyPatternPointOffsets => raw(c.journey_patterns.point_offsets()),
        ColumnId::JourneyPatternStopCounts => raw(c.journey_patterns.n_stops()),
        ColumnId::JourneyPatternVehicleJourneyOffsets => {
            raw(c.journey_patterns.vehicle_journey_offsets())
        }
        ColumnId::JourneyPatternVehicleJourneyCounts => raw(c.journey_patterns.n_vehicle_journeys()),
        ColumnId::JourneyPatternAttributes => raw(c.journey_patterns.attributes()),
        ColumnId::JourneyPatternRoutes => raw(c.journey_patterns.routes()),
        ColumnId::JourneyPatternCommercialModes => raw(c.journey_patterns.commercial_modes()),
        ColumnId::StopTimeArrivals => raw(c.stop_times.arrivals()),
        ColumnId::StopTimeDepartures => raw(c.stop_times.departures()),
        ColumnId::VehicleJourneyIds => raw(c.vehicle_journeys.ids()),
        ColumnId::VehicleJourneyStopTimesOffsets => raw(c.vehicle_journeys.stop_times_offsets()),
        ColumnId::VehicleJourneyBeginTimes => raw(c.vehicle_journeys.begin_times()),
        ColumnId::VehicleJourneyAttributes => raw(c.vehicle_journeys.attributes()),
        ColumnId::VehicleJourneyActive => raw(c.vehicle_journeys.active()),
        ColumnId::VehicleJourneyTimeOffsets => raw(c.vehicle_journeys.time_offsets()),
        ColumnId::VehicleJourneyTransfersForwardOffsets => {
            raw(c.vehicle_journeys.transfers_forward_offsets())
        }
        ColumnId::VehicleJourneyTransfersForwardCounts => {
            raw(c.vehicle_journeys.n_transfers_forward())
        }
        ColumnId::VehicleJourneyTransfersBackwardOffsets => {
            raw(c.vehicle_journeys.transfers_backward_offsets())
        }
        ColumnId::VehicleJourneyTransfersBackwardCounts => {
            raw(c.vehicle_journeys.n_transfers_backward())
        }
        ColumnId::VehicleTransferRefs => raw(c.vehicle_transfers.refs()),
        ColumnId::PatternsAtStopOffsets => raw(c.patterns_at_stop.offsets()),
        ColumnId::PatternsAtStopPatterns => raw(c.patterns_at_stop.patterns()),
    }
}

fn align_up(position: usize) -> usize {
    position.div_ceil(COLUMN_ALIGN) * COLUMN_ALIGN
}

/// Lays out `container` as a snapshot: the header and the padded column
/// bytes in file order.
fn layout(container: &Container) -> (SnapshotHeader, Vec<&[u8]>) {
    let metadata = container.metadata();
    let mut header = SnapshotHeader {
        magic: MAGIC,
        calendar_start_time: metadata.calendar_start_time,
        timezone: metadata.timezone.unwrap_or(NO_TIMEZONE),
        utc_offset: metadata.utc_offset,
        n_days: metadata.n_days,
        reserved: 0,
        columns: [ColumnDescriptor::default(); N_COLUMNS],
    };

    let mut position = HEADER_SIZE;
    let mut bodies = Vec::with_capacity(N_COLUMNS);
    for &id in ColumnId::ALL {
        let (bytes, count) = column_bytes(container, id);
        position = align_up(position);
        header.columns[id as usize] = ColumnDescriptor {
            offset: position as u64,
            count: count as u64,
        };
        position += bytes.len();
        bodies.push(bytes);
    }
    (header, bodies)
}

/// Writes `container` as a snapshot that [`Container::open`] can map.
pub fn write_snapshot(container: &Container, path: &Path) -> Result<()> {
    log::info!("Writing timetable snapshot to {:?}", path);
    let (header, bodies) = layout(container);

    let file = std::fs::File::create(path).map_err(|e| TimetableError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let mut write = |bytes: &[u8]| writer.write_all(bytes);

    let padding = [0u8; COLUMN_ALIGN];
    let mut position = HEADER_SIZE;
    write(header.as_bytes()).map_err(|e| TimetableError::io(path, e))?;
    for bytes in bodies {
        let aligned = align_up(position);
        write(&padding[..aligned - position]).map_err(|e| TimetableError::io(path, e))?;
        write(bytes).map_err(|e| TimetableError::io(path, e))?;
        position = aligned + bytes.len();
    }
    // Pad the tail so that even a trailing empty column starts inside the file.
    let end = align_up(position);
    write(&padding[..end - position]).map_err(|e| TimetableError::io(path, e))?;
    writer.flush().map_err(|e| TimetableError::io(path, e))?;

    log::info!("Wrote {} bytes", end);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::LatLon;
    use crate::tables::NewStopPoint;

    #[test]
    fn test_header_layout() {
        assert_eq!(N_COLUMNS, 55);
        assert_eq!(HEADER_SIZE, 32 + 16 * N_COLUMNS);
        assert_eq!(HEADER_SIZE % COLUMN_ALIGN, 0);
        assert_eq!(ColumnId::ALL[ColumnId::PatternsAtStopPatterns as usize], ColumnId::PatternsAtStopPatterns);
    }

    #[test]
    fn test_columns_are_aligned_and_disjoint() {
        let mut container = Container::new();
        container
            .add_stop_points(&[NewStopPoint {
                id: "odd-length-id",
                name: "x",
                platform_code: "",
                coord: LatLon::new(1.0, 2.0),
                wait_time: 0,
                attributes: 0,
                stop_area: 0,
                transfers_offset: 0,
            }])
            .unwrap();
        container.set_timezone("Europe/Berlin", 3600).unwrap();

        let (header, bodies) = layout(&container);
        assert_eq!(header.magic, MAGIC);
        assert_ne!(header.timezone, NO_TIMEZONE);

        let mut previous_end = HEADER_SIZE as u64;
        for (&id, bytes) in ColumnId::ALL.iter().zip(&bodies) {
            let descriptor = header.column(id);
            assert_eq!(descriptor.offset % COLUMN_ALIGN as u64, 0, "{id:?}");
            assert!(descriptor.offset >= previous_end, "{id:?}");
            previous_end = descriptor.offset + bytes.len() as u64;
        }
        assert_eq!(header.column(ColumnId::StopPointCoords).count, 1);
        assert_eq!(
            header.column(ColumnId::StringPool).count,
            container.pool().len() as u64
        );
    }
}
