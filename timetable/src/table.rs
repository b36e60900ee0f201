//! The growable column table discipline shared by every entity family.
//!
//! A table is a fixed set of parallel [`Column`](crate::column::Column)s with
//! one element per row. Rows are only ever appended; an index handed out by
//! an append stays valid for the lifetime of the table.

use crate::error::{Result, TimetableError};
use crate::index::RowIndex;

pub trait ColumnTable {
    /// Human-readable name used in errors and logs.
    const NAME: &'static str;

    /// Extra rows reserved on top of what an append needs, to amortize growth.
    const SLACK: usize;

    type Index: RowIndex;

    fn len(&self) -> usize;

    fn capacity(&self) -> usize;

    fn is_mapped(&self) -> bool;

    /// Reserves `target` rows in every column. Does nothing if the table
    /// already has room for `target` rows.
    fn ensure_capacity(&mut self, target: usize) -> Result<()>;

    /// Frees the columns and returns the table to its empty state.
    fn reset(&mut self) -> Result<()>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks that `count` more rows may be appended and makes room for them.
    ///
    /// Returns the index the batch will start at. The whole batch is rejected
    /// if it would take the table past the range of its index type.
    fn begin_append(&mut self, count: usize) -> Result<Self::Index> {
        if self.is_mapped() {
            return Err(TimetableError::Denied { what: Self::NAME });
        }

        let start = self.len();
        let max = <Self::Index as RowIndex>::MAX_ROWS;
        let overflow = TimetableError::IndexOverflow {
            table: Self::NAME,
            max,
            requested: start.saturating_add(count),
        };
        let end = match start.checked_add(count) {
            Some(end) if end <= max => end,
            _ => return Err(overflow),
        };

        if end > self.capacity() {
            let target = end.saturating_add(Self::SLACK).min(max);
            log::debug!("Growing {} to {} rows", Self::NAME, target);
            self.ensure_capacity(target)?;
        }

        Self::Index::from_usize(start).ok_or(overflow)
    }
}

/// Declares a table struct over a set of columns and implements
/// [`ColumnTable`] for it.
macro_rules! column_table {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            name: $label:literal,
            index: $index:ty,
            slack: $slack:expr,
            columns: {
                $( $(#[$col_meta:meta])* $col:ident: $ty:ty ),+ $(,)?
            }
        }
    ) => {
        $(#[$meta])*
        pub struct $name {
            $( $col: $crate::column::Column<$ty>, )+
            len: usize,
            capacity: usize,
            mapped: bool,
        }

        impl $name {
            pub fn new() -> Self {
                Self {
                    $( $col: $crate::column::Column::new(), )+
                    len: 0,
                    capacity: 0,
                    mapped: false,
                }
            }

            $(
                $(#[$col_meta])*
                pub fn $col(&self) -> &[$ty] {
                    self.$col.as_slice()
                }
            )+

            /// Builds a read-only table over columns bound to a mapping.
            #[allow(clippy::too_many_arguments)]
            pub(crate) fn from_mapped(
                $( $col: $crate::column::Column<$ty> ),+
            ) -> $crate::error::Result<Self> {
                let lens = [$( $col.len() ),+];
                let len = lens[0];
                if lens.iter().any(|&other| other != len) {
                    return Err($crate::error::TimetableError::Malformed(format!(
                        "{} columns have unequal lengths {:?}",
                        $label, lens
                    )));
                }
                if len > <$index as $crate::index::RowIndex>::MAX_ROWS {
                    return Err($crate::error::TimetableError::Malformed(format!(
                        "{} has {} rows, more than its index type allows",
                        $label, len
                    )));
                }
                Ok(Self {
                    $( $col, )+
                    len,
                    capacity: 0,
                    mapped: true,
                })
            }

            #[allow(clippy::too_many_arguments)]
            fn push_row(&mut self, $( $col: $ty ),+) -> $crate::error::Result<()> {
                $( self.$col.push($col, $label)?; )+
                self.len += 1;
                Ok(())
            }
        }

        impl $crate::table::ColumnTable for $name {
            const NAME: &'static str = $label;
            const SLACK: usize = $slack;
            type Index = $index;

            fn len(&self) -> usize {
                self.len
            }

            fn capacity(&self) -> usize {
                self.capacity
            }

            fn is_mapped(&self) -> bool {
                self.mapped
            }

            fn ensure_capacity(&mut self, target: usize) -> $crate::error::Result<()> {
                if self.mapped {
                    return Err($crate::error::TimetableError::Denied { what: $label });
                }
                if target <= self.capacity {
                    return Ok(());
                }
                $( self.$col.reserve_total(target, $label)?; )+
                self.capacity = target;
                Ok(())
            }

            fn reset(&mut self) -> $crate::error::Result<()> {
                if self.mapped {
                    return Err($crate::error::TimetableError::Denied { what: $label });
                }
                *self = Self::new();
                Ok(())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("len", &self.len)
                    .field("capacity", &self.capacity)
                    .field("mapped", &self.mapped)
                    .finish()
            }
        }
    };
}

pub(crate) use column_table;

#[cfg(test)]
mod tests {
    use super::*;

    column_table! {
        pub struct Samples {
            name: "samples",
            index: u8,
            slack: 4,
            columns: {
                values: u32,
                flags: u8,
            }
        }
    }

    impl Samples {
        fn add(&mut self, rows: &[(u32, u8)]) -> Result<u8> {
            let start = self.begin_append(rows.len())?;
            for &(value, flag) in rows {
                self.push_row(value, flag)?;
            }
            Ok(start)
        }
    }

    #[test]
    fn test_add_reports_start_and_grows_with_slack() {
        let mut samples = Samples::new();
        assert_eq!(samples.add(&[(10, 1), (20, 2)]).unwrap(), 0);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples.capacity(), 2 + 4);

        assert_eq!(samples.add(&[(30, 3)]).unwrap(), 2);
        assert_eq!(samples.values(), &[10, 20, 30]);
        assert_eq!(samples.flags(), &[1, 2, 3]);
    }

    #[test]
    fn test_add_zero_rows_is_noop() {
        let mut samples = Samples::new();
        assert_eq!(samples.add(&[]).unwrap(), 0);
        assert_eq!(samples.len(), 0);
        assert_eq!(samples.capacity(), 0);
    }

    #[test]
    fn test_rows_survive_growth() {
        let mut samples = Samples::new();
        let mut expected = Vec::new();
        for batch in 0..20u32 {
            let rows: Vec<(u32, u8)> = (0..7).map(|i| (batch * 100 + i, i as u8)).collect();
            let start = samples.add(&rows).unwrap();
            assert_eq!(start as usize, expected.len());
            expected.extend(rows);
        }
        assert_eq!(samples.len(), expected.len());
        let values: Vec<u32> = expected.iter().map(|row| row.0).collect();
        assert_eq!(samples.values(), values.as_slice());
    }

    #[test]
    fn test_ensure_capacity_is_noop_when_large_enough() {
        let mut samples = Samples::new();
        samples.ensure_capacity(100).unwrap();
        samples.add(&[(1, 1)]).unwrap();
        let values_ptr = samples.values.as_ptr();
        let flags_ptr = samples.flags.as_ptr();

        samples.ensure_capacity(50).unwrap();
        samples.ensure_capacity(100).unwrap();
        assert_eq!(samples.capacity(), 100);
        assert_eq!(samples.values.as_ptr(), values_ptr);
        assert_eq!(samples.flags.as_ptr(), flags_ptr);
        assert_eq!(samples.values(), &[1]);
    }

    #[test]
    fn test_overflow_rejects_whole_batch() {
        let mut samples = Samples::new();
        let rows: Vec<(u32, u8)> = (0..250).map(|i| (i, 0)).collect();
        samples.add(&rows).unwrap();

        let err = samples.add(&[(0, 0); 6]).unwrap_err();
        assert!(matches!(
            err,
            TimetableError::IndexOverflow { max: 255, requested: 256, .. }
        ));
        assert_eq!(samples.len(), 250);

        assert_eq!(samples.add(&[(0, 0); 5]).unwrap(), 250);
        assert_eq!(samples.len(), 255);
        assert!(samples.add(&[(0, 0)]).is_err());
    }

    #[test]
    fn test_reset() {
        let mut samples = Samples::new();
        samples.add(&[(1, 1), (2, 2)]).unwrap();
        samples.reset().unwrap();
        assert!(samples.is_empty());
        assert_eq!(samples.capacity(), 0);
        assert!(samples.values().is_empty());
    }
}
