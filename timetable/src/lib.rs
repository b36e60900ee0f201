//! Columnar timetable storage for a journey planner.
//!
//! A [`Container`] holds every entity of a public transport network in
//! structure-of-arrays tables. It is either built in memory, usually by
//! [`prepare_gtfs::import_gtfs`], or mapped zero-copy from a snapshot written
//! by [`snapshot::write_snapshot`].

pub mod column;
pub mod container;
pub mod error;
pub mod export_stop_locations;
pub mod index;
pub mod memory_mapped;
pub mod pattern_times;
pub mod patterns_at_stop;
pub mod prepare_gtfs;
pub mod snapshot;
pub mod string_pool;
pub mod table;
pub mod tables;
pub mod validation;

pub use container::{Backing, Container, Metadata};
pub use error::{Result, TimetableError};
pub use memory_mapped::LoadOptions;
pub use prepare_gtfs::ImportOptions;
pub use table::ColumnTable;
