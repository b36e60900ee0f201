//! Inverted index from stop points to the journey patterns serving them.
//!
//! The index is a CSR-style pair of columns: `offsets` has one entry per stop
//! plus a terminator, and stop `s` is served by
//! `patterns[offsets[s]..offsets[s + 1]]`, sorted ascending without duplicates.

use crate::column::Column;
use crate::error::{Result, TimetableError};
use crate::index::{JourneyPatternIdx, StopIdx};
use crate::tables::{JourneyPatternPoints, JourneyPatterns};
use crate::table::ColumnTable;

#[derive(Debug, Default)]
pub struct JourneyPatternsAtStop {
    offsets: Column<u32>,
    patterns: Column<JourneyPatternIdx>,
}

impl JourneyPatternsAtStop {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_mapped(
        offsets: Column<u32>,
        patterns: Column<JourneyPatternIdx>,
    ) -> Self {
        Self { offsets, patterns }
    }

    /// Builds the index for a table of `n_stops` stop points.
    pub fn build(
        n_stops: usize,
        journey_patterns: &JourneyPatterns,
        points: &JourneyPatternPoints,
    ) -> Result<Self> {
        // One pair per point visit; runs of several patterns may overlap, so
        // this is a lower bound.
        let mut pairs: Vec<(StopIdx, JourneyPatternIdx)> = Vec::new();
        pairs
            .try_reserve_exact(points.len())
            .map_err(|source| TimetableError::OutOfMemory {
                what: "journey patterns at stop",
                source,
            })?;

        let stop_points = points.stop_points();
        for pattern in 0..journey_patterns.len() {
            // The table length never exceeds the index range.
            let pattern = pattern as JourneyPatternIdx;
            let run = journey_patterns
                .points_range(pattern, points.len())
                .ok_or_else(|| {
                    TimetableError::InvalidReference(format!(
                        "journey pattern {pattern} points outside the {} journey pattern points",
                        points.len()
                    ))
                })?;
            for &stop in &stop_points[run] {
                if stop as usize >= n_stops {
                    return Err(TimetableError::InvalidReference(format!(
                        "journey pattern {pattern} visits stop {stop} but there are only {n_stops} stops"
                    )));
                }
                pairs.push((stop, pattern));
            }
        }

        pairs.sort_unstable();
        pairs.dedup();

        let mut offsets: Vec<u32> = Vec::new();
        offsets
            .try_reserve_exact(n_stops + 1)
            .map_err(|source| TimetableError::OutOfMemory {
                what: "journey patterns at stop",
                source,
            })?;
        let mut patterns = Vec::new();
        patterns
            .try_reserve_exact(pairs.len())
            .map_err(|source| TimetableError::OutOfMemory {
                what: "journey patterns at stop",
                source,
            })?;

        // Overlapping point runs may yield more pairs than points, but the
        // entry count stays below 2^16 stops times 2^16 patterns.
        let offset_of = |len: usize| {
            u32::try_from(len).map_err(|_| TimetableError::IndexOverflow {
                table: "journey patterns at stop",
                max: u32::MAX as usize,
                requested: len,
            })
        };

        // Stops without patterns repeat the running offset.
        let mut pairs = pairs.into_iter().peekable();
        for stop in 0..n_stops {
            offsets.push(offset_of(patterns.len())?);
            while let Some((_, pattern)) = pairs.next_if(|&(s, _)| s as usize == stop) {
                patterns.push(pattern);
            }
        }
        offsets.push(offset_of(patterns.len())?);

        log::debug!(
            "Indexed {} journey patterns at {} stops into {} entries",
            journey_patterns.len(),
            n_stops,
            patterns.len()
        );

        Ok(Self {
            offsets: Column::from_vec(offsets),
            patterns: Column::from_vec(patterns),
        })
    }

    pub fn offsets(&self) -> &[u32] {
        self.offsets.as_slice()
    }

    pub fn patterns(&self) -> &[JourneyPatternIdx] {
        self.patterns.as_slice()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn is_mapped(&self) -> bool {
        self.offsets.is_mapped() || self.patterns.is_mapped()
    }

    /// Journey patterns serving `stop`, empty if the stop is unknown.
    pub fn patterns_for(&self, stop: StopIdx) -> &[JourneyPatternIdx] {
        let offsets = self.offsets();
        let stop = stop as usize;
        let (Some(&start), Some(&end)) = (offsets.get(stop), offsets.get(stop + 1)) else {
            return &[];
        };
        self.patterns()
            .get(start as usize..end as usize)
            .unwrap_or_default()
    }
}
