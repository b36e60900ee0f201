use crate::error::Result;
use crate::index::{RTime, StopIdx, TransferIdx};
use crate::table::{column_table, ColumnTable};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NewTransfer {
    pub target_stop: StopIdx,
    pub duration: RTime,
}

column_table! {
    /// Walking transfers between stop points, grouped by origin stop.
    pub struct Transfers {
        name: "transfers",
        index: TransferIdx,
        slack: 256,
        columns: {
            target_stops: StopIdx,
            durations: RTime,
        }
    }
}

impl Transfers {
    pub fn add(&mut self, rows: &[NewTransfer]) -> Result<TransferIdx> {
        let start = self.begin_append(rows.len())?;
        for row in rows {
            self.push_row(row.target_stop, row.duration)?;
        }
        Ok(start)
    }

    pub fn get(&self, transfer: usize) -> Option<NewTransfer> {
        Some(NewTransfer {
            target_stop: *self.target_stops().get(transfer)?,
            duration: *self.durations().get(transfer)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batches_are_contiguous() {
        let mut transfers = Transfers::new();
        let first = transfers
            .add(&[
                NewTransfer { target_stop: 1, duration: 30 },
                NewTransfer { target_stop: 2, duration: 45 },
            ])
            .unwrap();
        let second = transfers
            .add(&[NewTransfer { target_stop: 0, duration: 30 }])
            .unwrap();

        assert_eq!((first, second), (0, 2));
        assert_eq!(transfers.target_stops(), &[1, 2, 0]);
        assert_eq!(transfers.get(1), Some(NewTransfer { target_stop: 2, duration: 45 }));
        assert_eq!(transfers.get(3), None);
    }
}
