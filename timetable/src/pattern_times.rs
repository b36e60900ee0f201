//! Per journey pattern summary of when its vehicle journeys run.

use crate::error::{Result, TimetableError};
use crate::index::{Calendar, JourneyPatternIdx, RTime};
use crate::table::ColumnTable;
use crate::Container;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternTimes {
    /// Earliest begin time of any vehicle journey of the pattern.
    pub min: Vec<RTime>,
    /// Latest arrival at the last stop of the pattern.
    pub max: Vec<RTime>,
    /// Union of the days the pattern's vehicle journeys run on.
    pub active: Vec<Calendar>,
    /// Latest arrival over all patterns.
    pub max_time: RTime,
}

impl PatternTimes {
    pub fn build(container: &Container) -> Result<Self> {
        let patterns = container.journey_patterns();
        let vehicle_journeys = container.vehicle_journeys();
        let stop_times = container.stop_times();

        let n_patterns = patterns.len();
        let mut times = PatternTimes {
            min: vec![0; n_patterns],
            max: vec![0; n_patterns],
            active: vec![0; n_patterns],
            max_time: 0,
        };

        for pattern in 0..n_patterns {
            let pattern_idx = pattern as JourneyPatternIdx;
            let invalid = || {
                TimetableError::InvalidReference(format!(
                    "journey pattern {pattern} has vehicle journeys outside the tables"
                ))
            };
            let run = patterns
                .vehicle_journeys_range(pattern_idx, vehicle_journeys.len())
                .ok_or_else(invalid)?;
            let n_stops = patterns.stop_count(pattern_idx).ok_or_else(invalid)? as usize;

            let mut min = RTime::MAX;
            let mut max = 0;
            let mut active = 0;
            for vj in run.clone() {
                let vj = vj as u32;
                let begin = vehicle_journeys.begin_time(vj).ok_or_else(invalid)?;
                let last_departure = match n_stops {
                    0 => 0,
                    _ => {
                        let stops = vehicle_journeys
                            .stop_times_range(vj, n_stops, stop_times.len())
                            .ok_or_else(invalid)?;
                        stop_times.departures()[stops.end - 1]
                    }
                };
                min = min.min(begin);
                max = max.max(begin.saturating_add(last_departure));
                active |= vehicle_journeys.active()[vj as usize];
            }

            if !run.is_empty() {
                times.min[pattern] = min;
                times.max[pattern] = max;
                times.active[pattern] = active;
                times.max_time = times.max_time.max(max);
            }
        }

        Ok(times)
    }

    pub fn runs_on(&self, pattern: JourneyPatternIdx, day: u32) -> bool {
        day < Calendar::BITS
            && self
                .active
                .get(pattern as usize)
                .is_some_and(|mask| mask & (1 << day) != 0)
    }
}
