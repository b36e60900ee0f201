use crate::error::Result;
use crate::index::{JourneyPatternPointIdx, PoolOffset, StopIdx};
use crate::string_pool::StringPool;
use crate::table::{column_table, ColumnTable};

use super::pooled_str;

#[derive(Clone, Copy, Debug)]
pub struct NewJourneyPatternPoint<'a> {
    pub stop_point: StopIdx,
    pub headsign: &'a str,
    /// See [`point_attributes`](crate::index::point_attributes).
    pub attributes: u8,
}

column_table! {
    /// The stops of every journey pattern, one contiguous run per pattern.
    pub struct JourneyPatternPoints {
        name: "journey pattern points",
        index: JourneyPatternPointIdx,
        slack: 256,
        columns: {
            stop_points: StopIdx,
            headsigns: PoolOffset,
            attributes: u8,
        }
    }
}

impl JourneyPatternPoints {
    pub fn add(
        &mut self,
        pool: &mut StringPool,
        rows: &[NewJourneyPatternPoint<'_>],
    ) -> Result<JourneyPatternPointIdx> {
        let start = self.begin_append(rows.len())?;
        let headsigns = rows
            .iter()
            .map(|row| pool.intern(row.headsign))
            .collect::<Result<Vec<_>>>()?;

        for (row, headsign) in rows.iter().zip(headsigns) {
            self.push_row(row.stop_point, headsign, row.attributes)?;
        }
        Ok(start)
    }

    pub fn headsign<'p>(&self, pool: &'p StringPool, point: usize) -> Option<&'p str> {
        pooled_str(pool, self.headsigns(), point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::point_attributes;

    #[test]
    fn test_runs_are_appended_in_order() {
        let mut pool = StringPool::new();
        let mut points = JourneyPatternPoints::new();
        let first = points
            .add(
                &mut pool,
                &[
                    NewJourneyPatternPoint {
                        stop_point: 4,
                        headsign: "Teltow Stadt",
                        attributes: point_attributes::BOARDING,
                    },
                    NewJourneyPatternPoint {
                        stop_point: 7,
                        headsign: "Teltow Stadt",
                        attributes: point_attributes::ALIGHTING,
                    },
                ],
            )
            .unwrap();
        let second = points
            .add(
                &mut pool,
                &[NewJourneyPatternPoint {
                    stop_point: 7,
                    headsign: "Hennigsdorf",
                    attributes: point_attributes::BOARDING,
                }],
            )
            .unwrap();

        assert_eq!((first, second), (0, 2));
        assert_eq!(points.stop_points(), &[4, 7, 7]);
        assert_eq!(points.headsign(&pool, 2), Some("Hennigsdorf"));
    }
}
