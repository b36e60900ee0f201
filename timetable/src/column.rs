//! A single column of a structure-of-arrays table.
//!
//! A column either owns a growable buffer or is a zero-copy view into a
//! memory-mapped snapshot. The two cases are an explicit tag rather than a
//! property derived from the counters, and a mapped column refuses every
//! mutation.

use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use memmap2::Mmap;
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::error::{Result, TimetableError};

pub struct Column<T: Copy> {
    repr: Repr<T>,
}

enum Repr<T> {
    Owned(Vec<T>),
    Mapped(MappedSlice<T>),
}

struct MappedSlice<T> {
    ptr: NonNull<T>,
    len: usize,
    // Keeps the pages behind `ptr` mapped for as long as this view exists.
    _map: Arc<Mmap>,
}

// The view is read-only and the mapping it points into is shared, so it can
// move between and be read from any thread.
unsafe impl<T: Sync> Send for MappedSlice<T> {}
unsafe impl<T: Sync> Sync for MappedSlice<T> {}

impl<T: Copy> Column<T> {
    pub fn new() -> Self {
        Column {
            repr: Repr::Owned(Vec::new()),
        }
    }

    pub fn from_vec(values: Vec<T>) -> Self {
        Column {
            repr: Repr::Owned(values),
        }
    }

    pub fn as_slice(&self) -> &[T] {
        match &self.repr {
            Repr::Owned(values) => values,
            // Safety: the range was checked for size and alignment when the
            // column was bound, and `_map` keeps it mapped. This is safe for as
            // long as the underlying file is not modified.
            Repr::Mapped(mapped) => unsafe {
                std::slice::from_raw_parts(mapped.ptr.as_ptr(), mapped.len)
            },
        }
    }

    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Owned(values) => values.len(),
            Repr::Mapped(mapped) => mapped.len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self.repr, Repr::Mapped(_))
    }

    /// Allocated rows. Always zero for mapped columns.
    pub fn capacity(&self) -> usize {
        match &self.repr {
            Repr::Owned(values) => values.capacity(),
            Repr::Mapped(_) => 0,
        }
    }

    pub fn as_ptr(&self) -> *const T {
        self.as_slice().as_ptr()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.as_slice().get(index).copied()
    }

    /// Makes room for `target` rows in total, keeping existing rows at their
    /// offsets. Does not touch the buffer if it already fits.
    pub fn reserve_total(&mut self, target: usize, what: &'static str) -> Result<()> {
        match &mut self.repr {
            Repr::Owned(values) => {
                let additional = target.saturating_sub(values.len());
                values
                    .try_reserve_exact(additional)
                    .map_err(|source| TimetableError::OutOfMemory { what, source })
            }
            Repr::Mapped(_) => Err(TimetableError::Denied { what }),
        }
    }

    pub fn push(&mut self, value: T, what: &'static str) -> Result<()> {
        match &mut self.repr {
            Repr::Owned(values) => {
                values.push(value);
                Ok(())
            }
            Repr::Mapped(_) => Err(TimetableError::Denied { what }),
        }
    }

    pub fn extend_from_slice(&mut self, values: &[T], what: &'static str) -> Result<()> {
        match &mut self.repr {
            Repr::Owned(owned) => {
                owned.extend_from_slice(values);
                Ok(())
            }
            Repr::Mapped(_) => Err(TimetableError::Denied { what }),
        }
    }
}

impl<T: Copy + FromBytes + Immutable + KnownLayout> Column<T> {
    /// Binds a column to `count` elements starting `offset` bytes into `map`.
    pub(crate) fn mapped(map: &Arc<Mmap>, offset: usize, count: usize, name: &str) -> Result<Self> {
        let range = count
            .checked_mul(std::mem::size_of::<T>())
            .and_then(|size| offset.checked_add(size))
            .map(|end| offset..end)
            .ok_or_else(|| {
                TimetableError::Malformed(format!("column {name} size overflows"))
            })?;
        let bytes = map.get(range.clone()).ok_or_else(|| {
            TimetableError::Malformed(format!(
                "column {name} spans bytes {}..{} but the file has {} bytes",
                range.start,
                range.end,
                map.len()
            ))
        })?;
        let slice = <[T]>::ref_from_bytes(bytes).map_err(|_| {
            TimetableError::Malformed(format!(
                "column {name} at offset {offset} is misaligned for {}",
                std::any::type_name::<T>()
            ))
        })?;

        Ok(Column {
            repr: Repr::Mapped(MappedSlice {
                ptr: NonNull::from(slice).cast::<T>(),
                len: slice.len(),
                _map: Arc::clone(map),
            }),
        })
    }
}

impl<T: Copy> Default for Column<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + fmt::Debug> fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("len", &self.len())
            .field("mapped", &self.is_mapped())
            .finish()
    }
}
