use std::ops::Range;

use crate::error::Result;
use crate::index::{LatLon, PoolOffset, RTime, StopIdx, TransferIdx};
use crate::string_pool::StringPool;
use crate::table::{column_table, ColumnTable};

use super::pooled_str;

#[derive(Clone, Copy, Debug)]
pub struct NewStopPoint<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub platform_code: &'a str,
    pub coord: LatLon,
    /// Minimum time needed to change vehicles here.
    pub wait_time: RTime,
    pub attributes: u8,
    pub stop_area: StopIdx,
    /// First row of this stop's outgoing transfers in the transfer table.
    pub transfers_offset: TransferIdx,
}

column_table! {
    /// Boardable locations.
    ///
    /// Outgoing transfers are stored contiguously per stop in
    /// [`Transfers`](super::Transfers): a stop's list starts at its
    /// `transfers_offsets` entry and ends where the next stop's list starts, or
    /// at the end of the transfer table for the last stop.
    pub struct StopPoints {
        name: "stop points",
        index: StopIdx,
        slack: 16,
        columns: {
            ids: PoolOffset,
            names: PoolOffset,
            platform_codes: PoolOffset,
            coords: LatLon,
            wait_times: RTime,
            attributes: u8,
            stop_areas: StopIdx,
            transfers_offsets: TransferIdx,
        }
    }
}

impl StopPoints {
    pub fn add(&mut self, pool: &mut StringPool, rows: &[NewStopPoint<'_>]) -> Result<StopIdx> {
        let start = self.begin_append(rows.len())?;
        let interned = rows
            .iter()
            .map(|row| -> Result<[PoolOffset; 3]> {
                Ok([
                    pool.intern(row.id)?,
                    pool.intern(row.name)?,
                    pool.intern(row.platform_code)?,
                ])
            })
            .collect::<Result<Vec<_>>>()?;

        for (row, [id, name, platform_code]) in rows.iter().zip(interned) {
            self.push_row(
                id,
                name,
                platform_code,
                row.coord,
                row.wait_time,
                row.attributes,
                row.stop_area,
                row.transfers_offset,
            )?;
        }
        Ok(start)
    }

    pub fn id<'p>(&self, pool: &'p StringPool, stop: StopIdx) -> Option<&'p str> {
        pooled_str(pool, self.ids(), stop as usize)
    }

    pub fn name<'p>(&self, pool: &'p StringPool, stop: StopIdx) -> Option<&'p str> {
        pooled_str(pool, self.names(), stop as usize)
    }

    pub fn platform_code<'p>(&self, pool: &'p StringPool, stop: StopIdx) -> Option<&'p str> {
        pooled_str(pool, self.platform_codes(), stop as usize)
    }

    pub fn coord(&self, stop: StopIdx) -> Option<LatLon> {
        self.coords().get(stop as usize).copied()
    }

    pub fn stop_area(&self, stop: StopIdx) -> Option<StopIdx> {
        self.stop_areas().get(stop as usize).copied()
    }

    /// Rows of `stop`'s outgoing transfers, given the transfer table length.
    pub fn transfers_range(&self, stop: StopIdx, n_transfers: usize) -> Option<Range<usize>> {
        let offsets = self.transfers_offsets();
        let stop = stop as usize;
        let start = *offsets.get(stop)? as usize;
        let end = offsets
            .get(stop + 1)
            .map_or(n_transfers, |&next| next as usize);
        (start <= end && end <= n_transfers).then_some(start..end)
    }

    pub fn find_by_id(&self, pool: &StringPool, id: &str) -> Option<StopIdx> {
        self.ids()
            .iter()
            .position(|&offset| pool.get_str(offset) == Some(id))
            .and_then(|position| StopIdx::try_from(position).ok())
    }
}
