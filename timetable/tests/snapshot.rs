use std::path::Path;

use trip_atlas_timetable::index::{point_attributes, LatLon, VehicleJourneyRef};
use trip_atlas_timetable::snapshot::{write_snapshot, ColumnId, HEADER_SIZE};
use trip_atlas_timetable::tables::*;
use trip_atlas_timetable::{ColumnTable, Container, LoadOptions, TimetableError};

fn stop<'a>(id: &'a str, name: &'a str, stop_area: u16, transfers_offset: u32) -> NewStopPoint<'a> {
    NewStopPoint {
        id,
        name,
        platform_code: "1",
        coord: LatLon::new(52.6, 13.2),
        wait_time: 30,
        attributes: 0,
        stop_area,
        transfers_offset,
    }
}

/// Two stops served by one S-Bahn pattern with two vehicle journeys that
/// interline with each other.
fn sample_container() -> Container {
    let mut container = Container::new();
    container.set_calendar(1_736_640_000, 32).unwrap();
    container.set_timezone("Europe/Berlin", 3600).unwrap();
    container
        .add_stop_areas(&[
            NewStopArea {
                id: "sa:hennigsdorf",
                name: "Hennigsdorf",
                coord: LatLon::new(52.638, 13.205),
                timezone: "Europe/Berlin",
            },
            NewStopArea {
                id: "sa:heiligensee",
                name: "Heiligensee",
                coord: LatLon::new(52.625, 13.229),
                timezone: "Europe/Berlin",
            },
        ])
        .unwrap();
    container
        .add_stop_points(&[
            stop("sp:hennigsdorf", "Hennigsdorf", 0, 0),
            stop("sp:heiligensee", "Heiligensee", 1, 1),
        ])
        .unwrap();
    container
        .add_transfers(&[
            NewTransfer { target_stop: 1, duration: 60 },
            NewTransfer { target_stop: 0, duration: 60 },
        ])
        .unwrap();
    container
        .add_operators(&[NewOperator {
            id: "op:sbahn",
            url: "https://sbahn.berlin",
            name: "S-Bahn Berlin",
        }])
        .unwrap();
    container
        .add_physical_modes(&[NewPhysicalMode { id: "2", name: "Rail" }])
        .unwrap();
    container
        .add_commercial_modes(&[NewCommercialMode { id: "2", name: "Rail" }])
        .unwrap();
    container
        .add_lines(&[NewLine {
            id: "line:s25",
            code: "S25",
            name: "Hennigsdorf - Teltow Stadt",
            color: "00854A",
            text_color: "FFFFFF",
            operator: 0,
            physical_mode: 0,
        }])
        .unwrap();
    container.add_routes(&[0]).unwrap();
    container
        .add_journey_pattern_points(&[
            NewJourneyPatternPoint {
                stop_point: 0,
                headsign: "Teltow Stadt",
                attributes: point_attributes::BOARDING,
            },
            NewJourneyPatternPoint {
                stop_point: 1,
                headsign: "Teltow Stadt",
                attributes: point_attributes::ALIGHTING,
            },
        ])
        .unwrap();
    container
        .add_stop_times(&[
            NewStopTime { arrival: 0, departure: 0 },
            NewStopTime { arrival: 90, departure: 90 },
            NewStopTime { arrival: 0, departure: 0 },
            NewStopTime { arrival: 90, departure: 95 },
        ])
        .unwrap();
    let journey = |id, stop_times_offset, begin_time, forward, backward| NewVehicleJourney {
        id,
        stop_times_offset,
        begin_time,
        attributes: 0,
        active: 0xFFFF_FFFF,
        time_offset: 4,
        transfers_forward_offset: forward,
        n_transfers_forward: 1,
        transfers_backward_offset: backward,
        n_transfers_backward: 1,
    };
    container
        .add_vehicle_journeys(&[
            journey("trip:1", 0, 12_870, 0, 1),
            journey("trip:2", 2, 13_320, 1, 0),
        ])
        .unwrap();
    container
        .add_vehicle_transfers(&[
            VehicleJourneyRef { journey_pattern: 0, vehicle_journey_offset: 1 },
            VehicleJourneyRef { journey_pattern: 0, vehicle_journey_offset: 0 },
        ])
        .unwrap();
    container
        .add_journey_patterns(&[NewJourneyPattern {
            point_offset: 0,
            n_stops: 2,
            vehicle_journey_offset: 0,
            n_vehicle_journeys: 2,
            attributes: 0,
            route: 0,
            commercial_mode: 0,
        }])
        .unwrap();
    container.build_journey_patterns_at_stop().unwrap();
    container
}

fn write_sample(dir: &Path) -> (Container, std::path::PathBuf) {
    let container = sample_container();
    let path = dir.join("timetable.dat");
    write_snapshot(&container, &path).unwrap();
    (container, path)
}

#[test]
fn test_snapshot_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (owned, path) = write_sample(dir.path());
    let mapped = Container::open(&path).unwrap();

    assert!(mapped.is_mapped());
    assert_eq!(mapped.source_path(), Some(path.as_path()));
    assert_eq!(mapped.metadata(), owned.metadata());
    assert_eq!(mapped.timezone_name(), Some("Europe/Berlin"));
    assert_eq!(mapped.calendar_start(), owned.calendar_start());
    assert_eq!(mapped.table_sizes(), owned.table_sizes());
    assert_eq!(mapped.pool().as_bytes(), owned.pool().as_bytes());

    let pool = mapped.pool();
    assert_eq!(mapped.stop_points().name(pool, 1), Some("Heiligensee"));
    assert_eq!(mapped.stop_areas().timezone(pool, 0), Some("Europe/Berlin"));
    assert_eq!(mapped.lines().code(pool, 0), Some("S25"));
    assert_eq!(mapped.operators().url(pool, 0), Some("https://sbahn.berlin"));
    assert_eq!(mapped.vehicle_journeys().id(pool, 1), Some("trip:2"));
    assert_eq!(mapped.stop_points().coords(), owned.stop_points().coords());
    assert_eq!(mapped.stop_times().departures(), &[0, 90, 0, 95]);
    assert_eq!(mapped.vehicle_transfers().refs(), owned.vehicle_transfers().refs());
    assert_eq!(mapped.vehicle_journeys().time_offsets(), &[4, 4]);
    assert_eq!(mapped.journey_patterns_at_stop(1), &[0]);
    assert_eq!(mapped.patterns_at_stop().offsets(), owned.patterns_at_stop().offsets());
    assert_eq!(mapped.transfers_from(0), Some(0..1));
    assert_eq!(mapped.vehicle_journey_stop_times(0, 1), Some(2..4));
}

#[test]
fn test_mapped_tables_report_zero_capacity() {
    let dir = tempfile::tempdir().unwrap();
    let (_, path) = write_sample(dir.path());
    let mapped = Container::open(&path).unwrap();

    assert!(mapped.stop_points().is_mapped());
    assert_eq!(mapped.stop_points().capacity(), 0);
    assert!(mapped.pool().is_mapped());
    assert_eq!(mapped.pool().capacity(), 0);
}

#[test]
fn test_mapped_container_denies_writes() {
    let dir = tempfile::tempdir().unwrap();
    let (_, path) = write_sample(dir.path());
    let mut mapped = Container::open(&path).unwrap();

    let err = mapped
        .add_stop_points(&[stop("sp:new", "New", 0, 2)])
        .unwrap_err();
    assert!(err.is_denied());
    assert!(mapped.add_transfers(&[]).unwrap_err().is_denied());
    assert!(mapped.add_routes(&[0]).unwrap_err().is_denied());
    assert!(mapped.set_calendar(0, 1).unwrap_err().is_denied());
    assert!(mapped.set_timezone("UTC", 0).unwrap_err().is_denied());
    assert!(mapped.build_journey_patterns_at_stop().unwrap_err().is_denied());
    assert!(mapped.reset().unwrap_err().is_denied());

    // Nothing changed.
    assert_eq!(mapped.stop_points().len(), 2);
    assert_eq!(mapped.timezone_name(), Some("Europe/Berlin"));

    assert!(mapped.unmap());
    assert!(!mapped.is_mapped());
    assert!(mapped.stop_points().is_empty());
    mapped.add_stop_points(&[stop("sp:new", "New", 0, 0)]).unwrap();
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = Container::open(&dir.path().join("missing.dat")).unwrap_err();
    assert!(matches!(err, TimetableError::NotFound(_)));
}

#[test]
fn test_file_smaller_than_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.dat");
    std::fs::write(&path, b"TTABLEV4").unwrap();
    assert!(HEADER_SIZE > 8);

    let err = Container::open(&path).unwrap_err();
    assert!(matches!(err, TimetableError::Malformed(_)));

    std::fs::write(&path, b"").unwrap();
    let err = Container::open(&path).unwrap_err();
    assert!(matches!(err, TimetableError::Malformed(_)));
}

#[test]
fn test_wrong_magic() {
    let dir = tempfile::tempdir().unwrap();
    let (_, path) = write_sample(dir.path());
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[..8].copy_from_slice(b"TTABLEV3");
    std::fs::write(&path, &bytes).unwrap();

    let err = Container::open(&path).unwrap_err();
    assert!(matches!(err, TimetableError::Malformed(_)));
}

#[test]
fn test_truncated_columns() {
    let dir = tempfile::tempdir().unwrap();
    let (_, path) = write_sample(dir.path());
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..HEADER_SIZE + 8]).unwrap();

    let err = Container::open(&path).unwrap_err();
    assert!(matches!(err, TimetableError::Malformed(_)));
}

#[test]
fn test_failed_bind_leaves_container_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut container = sample_container();
    let err = container
        .bind_file(&dir.path().join("missing.dat"))
        .unwrap_err();
    assert!(matches!(err, TimetableError::NotFound(_)));
    assert!(!container.is_mapped());
    assert_eq!(container.stop_points().len(), 2);

    let (_, path) = write_sample(dir.path());
    container.bind_file(&path).unwrap();
    assert!(container.is_mapped());
    assert_eq!(container.stop_points().len(), 2);
}

#[test]
fn test_validation_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let mut container = sample_container();
    // Refers to a stop area that does not exist.
    container
        .add_stop_points(&[stop("sp:orphan", "Orphan", 7, 2)])
        .unwrap();
    let path = dir.path().join("invalid.dat");
    write_snapshot(&container, &path).unwrap();

    let err = Container::open(&path).unwrap_err();
    assert!(matches!(err, TimetableError::Malformed(_)));

    let unchecked = Container::open_with(
        &path,
        LoadOptions {
            validate: false,
            populate: true,
        },
    )
    .unwrap();
    assert_eq!(unchecked.stop_points().stop_area(2), Some(7));
}

#[test]
fn test_empty_container_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.dat");
    write_snapshot(&Container::new(), &path).unwrap();

    let mapped = Container::open(&path).unwrap();
    assert!(mapped.is_mapped());
    assert!(mapped.stop_points().is_empty());
    // Empty tables in a snapshot are still read-only.
    assert!(mapped.routes().is_mapped());
    assert!(mapped.pool().is_empty());
    assert!(mapped.timezone_name().is_none());
    assert!(mapped.journey_patterns_at_stop(0).is_empty());
}

/// Byte position of a column's descriptor inside the snapshot header.
fn descriptor_position(id: ColumnId) -> usize {
    32 + 16 * id as usize
}

fn read_u64(bytes: &[u8], position: usize) -> u64 {
    u64::from_ne_bytes(bytes[position..position + 8].try_into().unwrap())
}

fn write_u64(bytes: &mut [u8], position: usize, value: u64) {
    bytes[position..position + 8].copy_from_slice(&value.to_ne_bytes());
}

/// Writes the sample snapshot, lets `patch` edit its bytes and returns the
/// error of loading the result.
fn open_patched(patch: impl FnOnce(&mut Vec<u8>)) -> TimetableError {
    let dir = tempfile::tempdir().unwrap();
    let (_, path) = write_sample(dir.path());
    let mut bytes = std::fs::read(&path).unwrap();
    patch(&mut bytes);
    std::fs::write(&path, &bytes).unwrap();
    Container::open(&path).unwrap_err()
}

#[test]
fn test_misaligned_column() {
    let err = open_patched(|bytes| {
        let position = descriptor_position(ColumnId::StopPointTransfersOffsets);
        let offset = read_u64(bytes, position);
        write_u64(bytes, position, offset + 1);
    });
    match err {
        TimetableError::Malformed(message) => assert!(message.contains("misaligned"), "{message}"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_unequal_column_lengths() {
    let err = open_patched(|bytes| {
        write_u64(bytes, descriptor_position(ColumnId::StopPointNames) + 8, 1);
    });
    match err {
        TimetableError::Malformed(message) => assert!(message.contains("unequal"), "{message}"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_column_count_overflow() {
    let err = open_patched(|bytes| {
        write_u64(bytes, descriptor_position(ColumnId::StopTimeArrivals) + 8, u64::MAX);
    });
    assert!(matches!(err, TimetableError::Malformed(_)));
}

#[test]
fn test_inconsistent_patterns_at_stop() {
    let dir = tempfile::tempdir().unwrap();
    let (owned, path) = write_sample(dir.path());
    assert_eq!(owned.patterns_at_stop().offsets(), &[0, 1, 2]);

    let mut bytes = std::fs::read(&path).unwrap();
    let offsets = read_u64(&bytes, descriptor_position(ColumnId::PatternsAtStopOffsets)) as usize;
    // Stop 0 now claims five patterns, more than the index holds.
    bytes[offsets + 4..offsets + 8].copy_from_slice(&5u32.to_ne_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let err = Container::open(&path).unwrap_err();
    assert!(matches!(err, TimetableError::Malformed(_)));

    // Without validation the broken ranges resolve to nothing.
    let unchecked = Container::open_with(
        &path,
        LoadOptions {
            validate: false,
            populate: false,
        },
    )
    .unwrap();
    assert!(unchecked.journey_patterns_at_stop(0).is_empty());
    assert!(unchecked.journey_patterns_at_stop(1).is_empty());
}
