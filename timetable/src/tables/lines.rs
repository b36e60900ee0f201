use crate::error::Result;
use crate::index::{LineIdx, OperatorIdx, PhysicalModeIdx, PoolOffset};
use crate::string_pool::StringPool;
use crate::table::{column_table, ColumnTable};

use super::pooled_str;

#[derive(Clone, Copy, Debug)]
pub struct NewLine<'a> {
    pub id: &'a str,
    pub code: &'a str,
    pub name: &'a str,
    /// Hex RGB, e.g. "FF0000".
    pub color: &'a str,
    pub text_color: &'a str,
    pub operator: OperatorIdx,
    pub physical_mode: PhysicalModeIdx,
}

column_table! {
    pub struct Lines {
        name: "lines",
        index: LineIdx,
        slack: 16,
        columns: {
            ids: PoolOffset,
            codes: PoolOffset,
            names: PoolOffset,
            colors: PoolOffset,
            text_colors: PoolOffset,
            operators: OperatorIdx,
            physical_modes: PhysicalModeIdx,
        }
    }
}

impl Lines {
    pub fn add(&mut self, pool: &mut StringPool, rows: &[NewLine<'_>]) -> Result<LineIdx> {
        let start = self.begin_append(rows.len())?;
        let interned = rows
            .iter()
            .map(|row| -> Result<[PoolOffset; 5]> {
                Ok([
                    pool.intern(row.id)?,
                    pool.intern(row.code)?,
                    pool.intern(row.name)?,
                    pool.intern(row.color)?,
                    pool.intern(row.text_color)?,
                ])
            })
            .collect::<Result<Vec<_>>>()?;

        for (row, [id, code, name, color, text_color]) in rows.iter().zip(interned) {
            self.push_row(
                id,
                code,
                name,
                color,
                text_color,
                row.operator,
                row.physical_mode,
            )?;
        }
        Ok(start)
    }

    pub fn id<'p>(&self, pool: &'p StringPool, line: LineIdx) -> Option<&'p str> {
        pooled_str(pool, self.ids(), line as usize)
    }

    pub fn code<'p>(&self, pool: &'p StringPool, line: LineIdx) -> Option<&'p str> {
        pooled_str(pool, self.codes(), line as usize)
    }

    pub fn name<'p>(&self, pool: &'p StringPool, line: LineIdx) -> Option<&'p str> {
        pooled_str(pool, self.names(), line as usize)
    }

    pub fn color<'p>(&self, pool: &'p StringPool, line: LineIdx) -> Option<&'p str> {
        pooled_str(pool, self.colors(), line as usize)
    }

    pub fn text_color<'p>(&self, pool: &'p StringPool, line: LineIdx) -> Option<&'p str> {
        pooled_str(pool, self.text_colors(), line as usize)
    }

    pub fn operator(&self, line: LineIdx) -> Option<OperatorIdx> {
        self.operators().get(line as usize).copied()
    }

    pub fn physical_mode(&self, line: LineIdx) -> Option<PhysicalModeIdx> {
        self.physical_modes().get(line as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_read_back() {
        let mut pool = StringPool::new();
        let mut lines = Lines::new();
        lines
            .add(
                &mut pool,
                &[NewLine {
                    id: "line:s25",
                    code: "S25",
                    name: "Hennigsdorf - Teltow Stadt",
                    color: "00854A",
                    text_color: "FFFFFF",
                    operator: 0,
                    physical_mode: 1,
                }],
            )
            .unwrap();

        assert_eq!(lines.code(&pool, 0), Some("S25"));
        assert_eq!(lines.color(&pool, 0), Some("00854A"));
        assert_eq!(lines.text_color(&pool, 0), Some("FFFFFF"));
        assert_eq!(lines.operator(0), Some(0));
        assert_eq!(lines.physical_mode(0), Some(1));
        assert_eq!(lines.operator(1), None);
    }
}
