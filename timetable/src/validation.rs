//! Consistency checks over a whole container.
//!
//! [`check_references`] guards the load boundary: once it passes, every index
//! and offset stored in the tables resolves to a row of the table it points
//! into. [`check_quality`] looks for data that is well-formed but suspicious.

use std::fmt;

use crate::error::{Result, TimetableError};
use crate::index::{
    point_attributes, JourneyPatternIdx, LatLon, PoolOffset, StopIdx, VehicleJourneyIdx,
};
use crate::table::ColumnTable;
use crate::Container;

fn invalid(message: String) -> TimetableError {
    TimetableError::InvalidReference(message)
}

fn check_indices<I: Copy + Into<usize>>(
    what: &str,
    values: &[I],
    target: &str,
    target_len: usize,
) -> Result<()> {
    let as_index = |value: I| -> usize { value.into() };
    match values.iter().position(|&value| as_index(value) >= target_len) {
        Some(row) => Err(invalid(format!(
            "{what} row {row} refers to {target} {} of {target_len}",
            as_index(values[row])
        ))),
        None => Ok(()),
    }
}

fn check_pool_offsets(what: &str, offsets: &[PoolOffset], pool_len: usize) -> Result<()> {
    match offsets.iter().position(|&offset| offset as usize >= pool_len) {
        Some(row) => Err(invalid(format!(
            "{what} row {row} points at byte {} of a {pool_len} byte string pool",
            offsets[row]
        ))),
        None => Ok(()),
    }
}

/// Verifies that every cross-table reference of `container` is in range.
pub fn check_references(container: &Container) -> Result<()> {
    let c = container;
    let pool_len = c.pool().len();
    if let Some(timezone) = c.metadata().timezone {
        check_pool_offsets("timezone", &[timezone], pool_len)?;
    }

    let stop_areas = c.stop_areas();
    for column in [stop_areas.ids(), stop_areas.names(), stop_areas.timezones()] {
        check_pool_offsets("stop areas", column, pool_len)?;
    }

    let stop_points = c.stop_points();
    let n_stops = stop_points.len();
    for column in [stop_points.ids(), stop_points.names(), stop_points.platform_codes()] {
        check_pool_offsets("stop points", column, pool_len)?;
    }
    check_indices("stop points", stop_points.stop_areas(), "stop area", stop_areas.len())?;

    let n_transfers = c.transfers().len();
    let offsets = stop_points.transfers_offsets();
    for (stop, pair) in offsets.windows(2).enumerate() {
        if pair[0] > pair[1] {
            return Err(invalid(format!(
                "transfers of stop point {} start before those of stop point {stop}",
                stop + 1
            )));
        }
    }
    if let Some(&last) = offsets.last() {
        if last as usize > n_transfers {
            return Err(invalid(format!(
                "transfers of the last stop point start at {last} of {n_transfers}"
            )));
        }
    }
    check_indices("transfers", c.transfers().target_stops(), "stop point", n_stops)?;

    let operators = c.operators();
    for column in [operators.ids(), operators.urls(), operators.names()] {
        check_pool_offsets("operators", column, pool_len)?;
    }
    for column in [c.physical_modes().ids(), c.physical_modes().names()] {
        check_pool_offsets("physical modes", column, pool_len)?;
    }
    for column in [c.commercial_modes().ids(), c.commercial_modes().names()] {
        check_pool_offsets("commercial modes", column, pool_len)?;
    }

    let lines = c.lines();
    for column in [
        lines.ids(),
        lines.codes(),
        lines.names(),
        lines.colors(),
        lines.text_colors(),
    ] {
        check_pool_offsets("lines", column, pool_len)?;
    }
    check_indices("lines", lines.operators(), "operator", operators.len())?;
    check_indices(
        "lines",
        lines.physical_modes(),
        "physical mode",
        c.physical_modes().len(),
    )?;
    check_indices("routes", c.routes().lines(), "line", lines.len())?;

    let points = c.journey_pattern_points();
    check_indices("journey pattern points", points.stop_points(), "stop point", n_stops)?;
    check_pool_offsets("journey pattern points", points.headsigns(), pool_len)?;

    let patterns = c.journey_patterns();
    check_indices("journey patterns", patterns.routes(), "route", c.routes().len())?;
    check_indices(
        "journey patterns",
        patterns.commercial_modes(),
        "commercial mode",
        c.commercial_modes().len(),
    )?;

    let vehicle_journeys = c.vehicle_journeys();
    let n_vehicle_transfers = c.vehicle_transfers().len();
    check_pool_offsets("vehicle journeys", vehicle_journeys.ids(), pool_len)?;
    for pattern in 0..patterns.len() {
        let pattern = pattern as JourneyPatternIdx;
        patterns.points_range(pattern, points.len()).ok_or_else(|| {
            invalid(format!("journey pattern {pattern} points run past the point table"))
        })?;
        let run = c.pattern_vehicle_journeys(pattern).ok_or_else(|| {
            invalid(format!(
                "journey pattern {pattern} vehicle journeys run past the vehicle journey table"
            ))
        })?;
        for vj in run {
            let vj = vj as VehicleJourneyIdx;
            c.vehicle_journey_stop_times(pattern, vj).ok_or_else(|| {
                invalid(format!("vehicle journey {vj} stop times run past the stop time table"))
            })?;
        }
    }

    for vj in 0..vehicle_journeys.len() {
        let vj = vj as VehicleJourneyIdx;
        if vehicle_journeys
            .forward_transfers_range(vj, n_vehicle_transfers)
            .is_none()
            || vehicle_journeys
                .backward_transfers_range(vj, n_vehicle_transfers)
                .is_none()
        {
            return Err(invalid(format!(
                "vehicle journey {vj} transfers run past the vehicle transfer table"
            )));
        }
    }

    for (row, vj_ref) in c.vehicle_transfers().refs().iter().enumerate() {
        let n_vjs = patterns
            .n_vehicle_journeys()
            .get(vj_ref.journey_pattern as usize)
            .copied();
        match n_vjs {
            Some(n_vjs) if vj_ref.vehicle_journey_offset < n_vjs => {}
            _ => {
                return Err(invalid(format!(
                    "vehicle transfer {row} refers to vehicle journey {} of journey pattern {}",
                    vj_ref.vehicle_journey_offset, vj_ref.journey_pattern
                )))
            }
        }
    }

    check_patterns_at_stop(c)
}

fn check_patterns_at_stop(c: &Container) -> Result<()> {
    let index = c.patterns_at_stop();
    let offsets = index.offsets();
    if offsets.is_empty() {
        return Ok(());
    }
    if offsets.len() != c.stop_points().len() + 1 {
        return Err(invalid(format!(
            "journey patterns at stop has {} offsets for {} stop points",
            offsets.len(),
            c.stop_points().len()
        )));
    }
    if offsets.windows(2).any(|pair| pair[0] > pair[1])
        || offsets.last().copied().unwrap_or(0) as usize != index.patterns().len()
    {
        return Err(invalid(
            "journey patterns at stop offsets are not monotonic".to_string(),
        ));
    }
    check_indices(
        "journey patterns at stop",
        index.patterns(),
        "journey pattern",
        c.journey_patterns().len(),
    )
}

/// A suspicious but well-formed piece of timetable data.
#[derive(Debug, Clone, PartialEq)]
pub enum QualityIssue {
    AlightingAtFirstStop { pattern: JourneyPatternIdx },
    BoardingAtLastStop { pattern: JourneyPatternIdx },
    CoordinateOutOfRange { stop: StopIdx, coord: LatLon },
    FirstArrivalNotZero { vehicle_journey: VehicleJourneyIdx },
    DepartureBeforeArrival { vehicle_journey: VehicleJourneyIdx, stop: usize },
    NegativeTravelTime { vehicle_journey: VehicleJourneyIdx, stop: usize },
    MissingReverseTransfer { from: StopIdx, to: StopIdx },
    AsymmetricTransfer { from: StopIdx, to: StopIdx },
}

impl fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityIssue::AlightingAtFirstStop { pattern } => {
                write!(f, "journey pattern {pattern} allows alighting at its first stop")
            }
            QualityIssue::BoardingAtLastStop { pattern } => {
                write!(f, "journey pattern {pattern} allows boarding at its last stop")
            }
            QualityIssue::CoordinateOutOfRange { stop, coord } => write!(
                f,
                "stop point {stop} lies outside the plausible range at lat={}, lon={}",
                coord.lat, coord.lon
            ),
            QualityIssue::FirstArrivalNotZero { vehicle_journey } => write!(
                f,
                "vehicle journey {vehicle_journey} does not start at relative time 0"
            ),
            QualityIssue::DepartureBeforeArrival { vehicle_journey, stop } => write!(
                f,
                "vehicle journey {vehicle_journey} departs before it arrives at stop {stop}"
            ),
            QualityIssue::NegativeTravelTime { vehicle_journey, stop } => write!(
                f,
                "vehicle journey {vehicle_journey} arrives at stop {stop} before leaving the previous one"
            ),
            QualityIssue::MissingReverseTransfer { from, to } => {
                write!(f, "transfer from {from} to {to} has no reverse transfer")
            }
            QualityIssue::AsymmetricTransfer { from, to } => write!(
                f,
                "transfer from {from} to {to} takes a different time than its reverse"
            ),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub issues: Vec<QualityIssue>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Southernmost and northernmost plausible stop latitudes, past Ushuaia and
/// Murmansk.
const LATITUDE_RANGE: std::ops::RangeInclusive<f32> = -55.0..=70.0;
const LONGITUDE_RANGE: std::ops::RangeInclusive<f32> = -180.0..=180.0;

/// Collects non-fatal data quality issues. Assumes [`check_references`]
/// passed; rows with unresolvable references are skipped.
pub fn check_quality(container: &Container) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_boarding_alighting(container, &mut report);
    check_coordinates(container, &mut report);
    check_increasing_times(container, &mut report);
    check_symmetric_transfers(container, &mut report);

    for issue in &report.issues {
        log::warn!("{issue}");
    }
    report
}

fn check_boarding_alighting(c: &Container, report: &mut ValidationReport) {
    let attributes = c.journey_pattern_points().attributes();
    for pattern in 0..c.journey_patterns().len() {
        let pattern = pattern as JourneyPatternIdx;
        let Some(run) = c
            .journey_patterns()
            .points_range(pattern, attributes.len())
        else {
            continue;
        };
        let run = &attributes[run];
        let (Some(first), Some(last)) = (run.first(), run.last()) else {
            continue;
        };
        if first & point_attributes::ALIGHTING != 0 {
            report.issues.push(QualityIssue::AlightingAtFirstStop { pattern });
        }
        if last & point_attributes::BOARDING != 0 {
            report.issues.push(QualityIssue::BoardingAtLastStop { pattern });
        }
    }
}

fn check_coordinates(c: &Container, report: &mut ValidationReport) {
    for (stop, &coord) in c.stop_points().coords().iter().enumerate() {
        if !LATITUDE_RANGE.contains(&coord.lat) || !LONGITUDE_RANGE.contains(&coord.lon) {
            report.issues.push(QualityIssue::CoordinateOutOfRange {
                stop: stop as StopIdx,
                coord,
            });
        }
    }
}

fn check_increasing_times(c: &Container, report: &mut ValidationReport) {
    let arrivals = c.stop_times().arrivals();
    let departures = c.stop_times().departures();
    for pattern in 0..c.journey_patterns().len() {
        let pattern = pattern as JourneyPatternIdx;
        let Some(vjs) = c.pattern_vehicle_journeys(pattern) else {
            continue;
        };
        for vj in vjs {
            let vj = vj as VehicleJourneyIdx;
            let Some(stop_times) = c.vehicle_journey_stop_times(pattern, vj) else {
                continue;
            };
            let start = stop_times.start;
            for row in stop_times {
                let stop = row - start;
                if stop == 0 && arrivals[row] != 0 {
                    report.issues.push(QualityIssue::FirstArrivalNotZero { vehicle_journey: vj });
                }
                if departures[row] < arrivals[row] {
                    report.issues.push(QualityIssue::DepartureBeforeArrival {
                        vehicle_journey: vj,
                        stop,
                    });
                }
                if stop > 0 && arrivals[row] < departures[row - 1] {
                    report.issues.push(QualityIssue::NegativeTravelTime {
                        vehicle_journey: vj,
                        stop,
                    });
                }
            }
        }
    }
}

fn check_symmetric_transfers(c: &Container, report: &mut ValidationReport) {
    let transfers = c.transfers();
    for from in 0..c.stop_points().len() {
        let from = from as StopIdx;
        let Some(outgoing) = c.transfers_from(from) else {
            continue;
        };
        for transfer in outgoing {
            let Some(forward) = transfers.get(transfer) else {
                continue;
            };
            let to = forward.target_stop;
            let reverse = c.transfers_from(to).and_then(|incoming| {
                incoming
                    .filter_map(|row| transfers.get(row))
                    .find(|candidate| candidate.target_stop == from)
            });
            match reverse {
                None => report
                    .issues
                    .push(QualityIssue::MissingReverseTransfer { from, to }),
                Some(reverse) if reverse.duration != forward.duration => report
                    .issues
                    .push(QualityIssue::AsymmetricTransfer { from, to }),
                Some(_) => {}
            }
        }
    }
}
