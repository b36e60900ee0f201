use crate::error::Result;
use crate::index::{CommercialModeIdx, PoolOffset};
use crate::string_pool::StringPool;
use crate::table::{column_table, ColumnTable};

use super::pooled_str;

#[derive(Clone, Copy, Debug)]
pub struct NewCommercialMode<'a> {
    pub id: &'a str,
    pub name: &'a str,
}

column_table! {
    /// Marketing names of services, e.g. "S-Bahn" or "Regional Express".
    pub struct CommercialModes {
        name: "commercial modes",
        index: CommercialModeIdx,
        slack: 4,
        columns: {
            ids: PoolOffset,
            names: PoolOffset,
        }
    }
}

impl CommercialModes {
    pub fn add(
        &mut self,
        pool: &mut StringPool,
        rows: &[NewCommercialMode<'_>],
    ) -> Result<CommercialModeIdx> {
        let start = self.begin_append(rows.len())?;
        let interned = rows
            .iter()
            .map(|row| -> Result<[PoolOffset; 2]> {
                Ok([pool.intern(row.id)?, pool.intern(row.name)?])
            })
            .collect::<Result<Vec<_>>>()?;

        for [id, name] in interned {
            self.push_row(id, name)?;
        }
        Ok(start)
    }

    pub fn id<'p>(&self, pool: &'p StringPool, mode: CommercialModeIdx) -> Option<&'p str> {
        pooled_str(pool, self.ids(), mode as usize)
    }

    pub fn name<'p>(&self, pool: &'p StringPool, mode: CommercialModeIdx) -> Option<&'p str> {
        pooled_str(pool, self.names(), mode as usize)
    }

    pub fn find_by_id(&self, pool: &StringPool, id: &str) -> Option<CommercialModeIdx> {
        self.ids()
            .iter()
            .position(|&offset| pool.get_str(offset) == Some(id))
            .and_then(|position| CommercialModeIdx::try_from(position).ok())
    }
}
