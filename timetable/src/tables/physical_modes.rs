use crate::error::Result;
use crate::index::{PhysicalModeIdx, PoolOffset};
use crate::string_pool::StringPool;
use crate::table::{column_table, ColumnTable};

use super::pooled_str;

#[derive(Clone, Copy, Debug)]
pub struct NewPhysicalMode<'a> {
    pub id: &'a str,
    pub name: &'a str,
}

column_table! {
    /// Vehicle types such as bus, tram or rail.
    pub struct PhysicalModes {
        name: "physical modes",
        index: PhysicalModeIdx,
        slack: 4,
        columns: {
            ids: PoolOffset,
            names: PoolOffset,
        }
    }
}

impl PhysicalModes {
    pub fn add(
        &mut self,
        pool: &mut StringPool,
        rows: &[NewPhysicalMode<'_>],
    ) -> Result<PhysicalModeIdx> {
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

    pub fn id<'p>(&self, pool: &'p StringPool, mode: PhysicalModeIdx) -> Option<&'p str> {
        pooled_str(pool, self.ids(), mode as usize)
    }

    pub fn name<'p>(&self, pool: &'p StringPool, mode: PhysicalModeIdx) -> Option<&'p str> {
        pooled_str(pool, self.names(), mode as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_read_back() {
        let mut pool = StringPool::new();
        let mut modes = PhysicalModes::new();
        let bus = modes
            .add(&mut pool, &[NewPhysicalMode { id: "3", name: "Bus" }])
            .unwrap();
        let rail = modes
            .add(&mut pool, &[NewPhysicalMode { id: "2", name: "Rail" }])
            .unwrap();

        assert_eq!((bus, rail), (0, 1));
        assert_eq!(modes.name(&pool, rail), Some("Rail"));
        assert_eq!(modes.id(&pool, bus), Some("3"));
    }
}
