use crate::error::Result;
use crate::index::{OperatorIdx, PoolOffset};
use crate::string_pool::StringPool;
use crate::table::{column_table, ColumnTable};

use super::pooled_str;

#[derive(Clone, Copy, Debug)]
pub struct NewOperator<'a> {
    pub id: &'a str,
    pub url: &'a str,
    pub name: &'a str,
}

column_table! {
    /// Transit agencies running the lines.
    pub struct Operators {
        name: "operators",
        index: OperatorIdx,
        slack: 4,
        columns: {
            ids: PoolOffset,
            urls: PoolOffset,
            names: PoolOffset,
        }
    }
}

impl Operators {
    pub fn add(&mut self, pool: &mut StringPool, rows: &[NewOperator<'_>]) -> Result<OperatorIdx> {
        let start = self.begin_append(rows.len())?;
        let interned = rows
            .iter()
            .map(|row| -> Result<[PoolOffset; 3]> {
                Ok([
                    pool.intern(row.id)?,
                    pool.intern(row.url)?,
                    pool.intern(row.name)?,
                ])
            })
            .collect::<Result<Vec<_>>>()?;

        for [id, url, name] in interned {
            self.push_row(id, url, name)?;
        }
        Ok(start)
    }

    pub fn id<'p>(&self, pool: &'p StringPool, operator: OperatorIdx) -> Option<&'p str> {
        pooled_str(pool, self.ids(), operator as usize)
    }

    pub fn url<'p>(&self, pool: &'p StringPool, operator: OperatorIdx) -> Option<&'p str> {
        pooled_str(pool, self.urls(), operator as usize)
    }

    pub fn name<'p>(&self, pool: &'p StringPool, operator: OperatorIdx) -> Option<&'p str> {
        pooled_str(pool, self.names(), operator as usize)
    }
}
