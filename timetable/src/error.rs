//! Error type shared by every table, the string pool, the loader and the
//! import stage.

use std::collections::TryReserveError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TimetableError {
    #[error("Out of memory while growing {what}")]
    OutOfMemory {
        what: &'static str,
        #[source]
        source: TryReserveError,
    },

    /// The storage is bound to a read-only memory mapping.
    #[error("Write denied: {what} is backed by a memory-mapped snapshot")]
    Denied { what: &'static str },

    #[error("Index overflow: {table} holds at most {max} rows, {requested} requested")]
    IndexOverflow {
        table: &'static str,
        max: usize,
        requested: usize,
    },

    #[error("Malformed timetable snapshot: {0}")]
    Malformed(String),

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("GTFS error: {0}")]
    Gtfs(#[from] gtfs_structures::Error),
}

impl TimetableError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            TimetableError::NotFound(path)
        } else {
            TimetableError::Io { path, source }
        }
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, TimetableError::Denied { .. })
    }
}

pub type Result<T> = std::result::Result<T, TimetableError>;
