//! Zero-copy loading of timetable snapshots.
//!
//! The snapshot file is mapped read-only and every column is bound directly
//! to its bytes in the mapping. Nothing is copied or deserialized.

use std::path::Path;
use std::sync::Arc;

use memmap2::{Mmap, MmapOptions};
use zerocopy::FromBytes;

use crate::column::Column;
use crate::container::{Backing, Container, Metadata};
use crate::error::{Result, TimetableError};
use crate::patterns_at_stop::JourneyPatternsAtStop;
use crate::snapshot::{ColumnId, SnapshotHeader, HEADER_SIZE, MAGIC, NO_TIMEZONE};
use crate::string_pool::StringPool;
use crate::table::ColumnTable;
use crate::tables::*;
use crate::validation;

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    /// Check every cross-table reference before handing out the container.
    pub validate: bool,
    /// Prefault the whole file instead of paging it in lazily.
    pub populate: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            validate: true,
            populate: false,
        }
    }
}

impl Container {
    pub fn open(path: &Path) -> Result<Container> {
        Self::open_with(path, LoadOptions::default())
    }

    pub fn open_with(path: &Path, options: LoadOptions) -> Result<Container> {
        log::info!("Mapping timetable {:?}", path);
        let map = map_file(path, options.populate)?;
        let container = bind_mapping(path, Arc::new(map))?;

        if options.validate {
            validation::check_references(&container)
                .map_err(|err| TimetableError::Malformed(err.to_string()))?;
        }

        log::info!(
            "Mapped {} stop points, {} journey patterns and {} vehicle journeys",
            container.stop_points.len(),
            container.journey_patterns.len(),
            container.vehicle_journeys.len()
        );
        Ok(container)
    }

    /// Replaces the contents of this container with the snapshot at `path`.
    ///
    /// On failure the container is left as it was.
    pub fn bind_file(&mut self, path: &Path) -> Result<()> {
        *self = Self::open(path)?;
        Ok(())
    }
}

fn map_file(path: &Path, populate: bool) -> Result<Mmap> {
    let file = std::fs::File::open(path).map_err(|e| TimetableError::io(path, e))?;
    let size = file
        .metadata()
        .map_err(|e| TimetableError::io(path, e))?
        .len();
    if size < HEADER_SIZE as u64 {
        return Err(TimetableError::Malformed(format!(
            "{:?} has {} bytes, smaller than the {} byte header",
            path, size, HEADER_SIZE
        )));
    }

    let mut options = MmapOptions::new();
    if populate {
        options.populate();
    }
    // Safety: This is safe for as long as the underlying file is not modified.
    // The mapping stays valid after the file handle is dropped.
    unsafe { options.map(&file) }.map_err(|e| TimetableError::io(path, e))
}

fn bind_mapping(path: &Path, map: Arc<Mmap>) -> Result<Container> {
    let (header, _) = SnapshotHeader::read_from_prefix(&map[..]).map_err(|_| {
        TimetableError::Malformed(format!("{:?} is too small for a snapshot header", path))
    })?;
    if header.magic != MAGIC {
        return Err(TimetableError::Malformed(format!(
            "{:?} does not start with {:?}",
            path,
            String::from_utf8_lossy(&MAGIC)
        )));
    }

    let bind = Binder {
        map: &map,
        header: &header,
    };

    let metadata = Metadata {
        calendar_start_time: header.calendar_start_time,
        n_days: header.n_days,
        timezone: (header.timezone != NO_TIMEZONE).then_some(header.timezone),
        utc_offset: header.utc_offset,
    };

    use ColumnId as C;
    Ok(Container {
        metadata,
        pool: StringPool::from_mapped(bind.column(C::StringPool)?)?,
        stop_areas: StopAreas::from_mapped(
            bind.column(C::StopAreaIds)?,
            bind.column(C::StopAreaCoords)?,
            bind.column(C::StopAreaNames)?,
            bind.column(C::StopAreaTimezones)?,
        )?,
        stop_points: StopPoints::from_mapped(
            bind.column(C::StopPointIds)?,
            bind.column(C::StopPointNames)?,
            bind.column(C::StopPointPlatformCodes)?,
            bind.column(C::StopPointCoords)?,
            bind.column(C::StopPointWaitTimes)?,
            bind.column(C::StopPointAttributes)?,
            bind.column(C::StopPointStopAreas)?,
            bind.column(C::StopPointTransfersOffsets)?,
        )?,
        transfers: Transfers::from_mapped(
            bind.column(C::TransferTargetStops)?,
            bind.column(C::TransferDurations)?,
        )?,
        operators: Operators::from_mapped(
            bind.column(C::OperatorIds)?,
            bind.column(C::OperatorUrls)?,
            bind.column(C::OperatorNames)?,
        )?,
        physical_modes: PhysicalModes::from_mapped(
            bind.column(C::PhysicalModeIds)?,
            bind.column(C::PhysicalModeNames)?,
        )?,
        commercial_modes: CommercialModes::from_mapped(
            bind.column(C::CommercialModeIds)?,
            bind.column(C::CommercialModeNames)?,
        )?,
        lines: Lines::from_mapped(
            bind.column(C::LineIds)?,
            bind.column(C::LineCodes)?,
            bind.column(C::LineNames)?,
            bind.column(C::LineColors)?,
            bind.column(C::LineTextColors)?,
            bind.column(C::LineOperators)?,
            bind.column(C::LinePhysicalModes)?,
        )?,
        routes: Routes::from_mapped(bind.column(C::RouteLines)?)?,
        journey_pattern_points: JourneyPatternPoints::from_mapped(
            bind.column(C::JourneyPatternPointStopPoints)?,
            bind.column(C::JourneyPatternPointHeadsigns)?,
            bind.column(C::JourneyPatternPointAttributes)?,
        )?,
        journey_patterns: JourneyPatterns::from_mapped(
            bind.column(C::JourneyPatternPointOffsets)?,
            bind.column(C::JourneyPatternStopCounts)?,
            bind.column(C::JourneyPatternVehicleJourneyOffsets)?,
            bind.column(C::JourneyPatternVehicleJourneyCounts)?,
            bind.column(C::JourneyPatternAttributes)?,
            bind.column(C::JourneyPatternRoutes)?,
            bind.column(C::JourneyPatternCommercialModes)?,
        )?,
        stop_times: StopTimes::from_mapped(
            bind.column(C::StopTimeArrivals)?,
            bind.column(C::StopTimeDepartures)?,
        )?,
        vehicle_journeys: VehicleJourneys::from_mapped(
            bind.column(C::VehicleJourneyIds)?,
            bind.column(C::VehicleJourneyStopTimesOffsets)?,
            bind.column(C::VehicleJourneyBeginTimes)?,
            bind.column(C::VehicleJourneyAttributes)?,
            bind.column(C::VehicleJourneyActive)?,
            bind.column(C::VehicleJourneyTimeOffsets)?,
            bind.column(C::VehicleJourneyTransfersForwardOffsets)?,
            bind.column(C::VehicleJourneyTransfersForwardCounts)?,
            bind.column(C::VehicleJourneyTransfersBackwardOffsets)?,
            bind.column(C::VehicleJourneyTransfersBackwardCounts)?,
        )?,
        vehicle_transfers: VehicleTransfers::from_mapped(bind.column(C::VehicleTransferRefs)?)?,
        patterns_at_stop: JourneyPatternsAtStop::from_mapped(
            bind.column(C::PatternsAtStopOffsets)?,
            bind.column(C::PatternsAtStopPatterns)?,
        ),
        backing: Backing::Mapped {
            path: path.to_path_buf(),
            map: Arc::clone(&map),
        },
    })
}

struct Binder<'a> {
    map: &'a Arc<Mmap>,
    header: &'a SnapshotHeader,
}

impl Binder<'_> {
    fn column<T>(&self, id: ColumnId) -> Result<Column<T>>
    where
        T: Copy + FromBytes + zerocopy::Immutable + zerocopy::KnownLayout,
    {
        let descriptor = self.header.column(id);
        let name = format!("{id:?}");
        let out_of_range =
            || TimetableError::Malformed(format!("column {name} descriptor is out of range"));
        let offset = usize::try_from(descriptor.offset).map_err(|_| out_of_range())?;
        let count = usize::try_from(descriptor.count).map_err(|_| out_of_range())?;
        Column::mapped(self.map, offset, count, &name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::LatLon;
    use crate::snapshot::write_snapshot;

    fn stop(id: &str) -> NewStopPoint<'_> {
        NewStopPoint {
            id,
            name: id,
            platform_code: "",
            coord: LatLon::new(52.5, 13.4),
            wait_time: 0,
            attributes: 0,
            stop_area: 0,
            transfers_offset: 0,
        }
    }

    fn mapped_container(dir: &Path) -> Container {
        let mut container = Container::new();
        container
            .add_stop_areas(&[NewStopArea {
                id: "area",
                name: "Area",
                coord: LatLon::new(52.5, 13.4),
                timezone: "Europe/Berlin",
            }])
            .unwrap();
        container.add_stop_points(&[stop("a"), stop("b")]).unwrap();
        container.build_journey_patterns_at_stop().unwrap();
        let path = dir.join("timetable.dat");
        write_snapshot(&container, &path).unwrap();
        Container::open(&path).unwrap()
    }

    #[test]
    fn test_mapped_tables_deny_writes() {
        let dir = tempfile::tempdir().unwrap();
        let mut container = mapped_container(dir.path());
        assert_eq!(container.stop_points.len(), 2);

        assert!(container.stop_points.ensure_capacity(100).unwrap_err().is_denied());
        assert!(container.stop_points.reset().unwrap_err().is_denied());
        let err = container
            .stop_points
            .add(&mut container.pool, &[stop("c")])
            .unwrap_err();
        assert!(err.is_denied());
        assert_eq!(container.stop_points.len(), 2);
        assert_eq!(container.stop_points.capacity(), 0);
        assert_eq!(container.find_stop_point("b"), Some(1));
    }

    #[test]
    fn test_empty_mapped_table_denies_writes() {
        let dir = tempfile::tempdir().unwrap();
        let mut container = mapped_container(dir.path());
        assert!(container.routes.is_empty());
        assert!(container.routes.is_mapped());

        assert!(container.routes.ensure_capacity(1).unwrap_err().is_denied());
        assert!(container.routes.reset().unwrap_err().is_denied());
        assert!(container.routes.add(&[0]).unwrap_err().is_denied());
        assert!(container.routes.add(&[]).unwrap_err().is_denied());
        assert!(container.routes.is_empty());
    }

    #[test]
    fn test_mapped_pool_denies_writes() {
        let dir = tempfile::tempdir().unwrap();
        let mut container = mapped_container(dir.path());
        let pool_len = container.pool.len();
        assert!(pool_len > 0);

        assert!(container.pool.add(b"x").unwrap_err().is_denied());
        assert!(container.pool.add(b"").unwrap_err().is_denied());
        assert!(container.pool.intern("x").unwrap_err().is_denied());
        assert!(container.pool.ensure_capacity(pool_len * 2).unwrap_err().is_denied());
        assert!(container.pool.reset().unwrap_err().is_denied());

        assert_eq!(container.pool.len(), pool_len);
        assert_eq!(container.stop_points.name(&container.pool, 0), Some("a"));
    }
}
