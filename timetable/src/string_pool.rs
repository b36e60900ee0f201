//! Append-only byte arena shared by every string-valued column.
//!
//! Strings are referenced by the byte offset at which they begin. Offsets stay
//! valid for the lifetime of the pool: content is never moved, rewritten or
//! deduplicated.

use std::ffi::CStr;

use crate::column::Column;
use crate::error::{Result, TimetableError};
use crate::index::PoolOffset;

const NAME: &str = "string pool";
const REALLOC_EXTRA_SIZE: usize = 16;

#[derive(Debug, Default)]
pub struct StringPool {
    bytes: Column<u8>,
}

impl StringPool {
    pub fn new() -> Self {
        StringPool {
            bytes: Column::new(),
        }
    }

    pub(crate) fn from_mapped(bytes: Column<u8>) -> Result<Self> {
        if bytes.len() > PoolOffset::MAX as usize {
            return Err(TimetableError::Malformed(format!(
                "string pool of {} bytes exceeds the offset range",
                bytes.len()
            )));
        }
        Ok(StringPool { bytes })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    pub fn is_mapped(&self) -> bool {
        self.bytes.is_mapped()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    pub fn ensure_capacity(&mut self, target: usize) -> Result<()> {
        self.bytes.reserve_total(target, NAME)
    }

    /// Copies `bytes` into the pool and returns the offset they start at.
    ///
    /// An empty input writes nothing and yields `None`; it is not the same as
    /// a string stored at offset 0.
    pub fn add(&mut self, bytes: &[u8]) -> Result<Option<PoolOffset>> {
        if self.is_mapped() {
            return Err(TimetableError::Denied { what: NAME });
        }
        if bytes.is_empty() {
            return Ok(None);
        }
        self.append(&[bytes]).map(Some)
    }

    /// Stores `value` NUL-terminated, so that even an empty string gets an
    /// offset that [`StringPool::get_str`] resolves. A value containing NUL
    /// reads back truncated at its first NUL.
    pub fn intern(&mut self, value: &str) -> Result<PoolOffset> {
        if self.is_mapped() {
            return Err(TimetableError::Denied { what: NAME });
        }
        self.append(&[value.as_bytes(), b"\0"])
    }

    fn append(&mut self, parts: &[&[u8]]) -> Result<PoolOffset> {
        let start = self.len();
        let size: usize = parts.iter().map(|part| part.len()).sum();
        let end = start
            .checked_add(size)
            .filter(|&end| end <= PoolOffset::MAX as usize)
            .ok_or(TimetableError::IndexOverflow {
                table: NAME,
                max: PoolOffset::MAX as usize,
                requested: start.saturating_add(size),
            })?;

        if end > self.capacity() {
            self.ensure_capacity(end + REALLOC_EXTRA_SIZE)?;
        }
        for part in parts {
            self.bytes.extend_from_slice(part, NAME)?;
        }
        Ok(start as PoolOffset)
    }

    pub fn get(&self, offset: PoolOffset, len: usize) -> Option<&[u8]> {
        let start = offset as usize;
        self.as_bytes().get(start..start.checked_add(len)?)
    }

    /// Reads the NUL-terminated string starting at `offset`.
    pub fn get_str(&self, offset: PoolOffset) -> Option<&str> {
        let tail = self.as_bytes().get(offset as usize..)?;
        CStr::from_bytes_until_nul(tail).ok()?.to_str().ok()
    }

    pub fn reset(&mut self) -> Result<()> {
        if self.is_mapped() {
            return Err(TimetableError::Denied { what: NAME });
        }
        *self = StringPool::new();
        Ok(())
    }
}
