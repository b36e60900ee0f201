use crate::error::Result;
use crate::index::{LatLon, PoolOffset, StopIdx};
use crate::string_pool::StringPool;
use crate::table::{column_table, ColumnTable};

use super::pooled_str;

#[derive(Clone, Copy, Debug)]
pub struct NewStopArea<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub coord: LatLon,
    pub timezone: &'a str,
}

column_table! {
    /// Groupings of nearby stop points, e.g. all platforms of a station.
    pub struct StopAreas {
        name: "stop areas",
        index: StopIdx,
        slack: 16,
        columns: {
            ids: PoolOffset,
            coords: LatLon,
            names: PoolOffset,
            timezones: PoolOffset,
        }
    }
}

impl StopAreas {
    pub fn add(&mut self, pool: &mut StringPool, rows: &[NewStopArea<'_>]) -> Result<StopIdx> {
        let start = self.begin_append(rows.len())?;
        let interned = rows
            .iter()
            .map(|row| -> Result<[PoolOffset; 3]> {
                Ok([
                    pool.intern(row.id)?,
                    pool.intern(row.name)?,
                    pool.intern(row.timezone)?,
                ])
            })
            .collect::<Result<Vec<_>>>()?;

        for (row, [id, name, timezone]) in rows.iter().zip(interned) {
            self.push_row(id, row.coord, name, timezone)?;
        }
        Ok(start)
    }

    pub fn id<'p>(&self, pool: &'p StringPool, area: StopIdx) -> Option<&'p str> {
        pooled_str(pool, self.ids(), area as usize)
    }

    pub fn name<'p>(&self, pool: &'p StringPool, area: StopIdx) -> Option<&'p str> {
        pooled_str(pool, self.names(), area as usize)
    }

    pub fn timezone<'p>(&self, pool: &'p StringPool, area: StopIdx) -> Option<&'p str> {
        pooled_str(pool, self.timezones(), area as usize)
    }

    pub fn coord(&self, area: StopIdx) -> Option<LatLon> {
        self.coords().get(area as usize).copied()
    }
}
