use crate::error::Result;
use crate::index::{VehicleJourneyRef, VehicleTransferIdx};
use crate::table::{column_table, ColumnTable};

column_table! {
    /// Interline connections: the vehicle journeys a passenger can stay
    /// seated into (forward) or came from (backward). Vehicle journeys point
    /// at runs of this table.
    pub struct VehicleTransfers {
        name: "vehicle transfers",
        index: VehicleTransferIdx,
        slack: 256,
        columns: {
            refs: VehicleJourneyRef,
        }
    }
}

impl VehicleTransfers {
    pub fn add(&mut self, refs: &[VehicleJourneyRef]) -> Result<VehicleTransferIdx> {
        let start = self.begin_append(refs.len())?;
        for &vj_ref in refs {
            self.push_row(vj_ref)?;
        }
        Ok(start)
    }
}
