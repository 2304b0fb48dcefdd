//! Polling replication from PostgreSQL into MongoDB
//!
//! This crate handles:
//! - Resolving the resume watermark from the destination
//! - Fetching, strictly validating and writing rows per table
//! - Running all tables as one concurrent cycle
//! - Scheduling cycles forever, surviving failed ones

pub mod cycle;
pub mod dead_letter;
pub mod destination;
pub mod mapping;
pub mod metrics;
pub mod scheduler;
pub mod source;
pub mod table_sync;
pub mod watermark;

#[cfg(test)]
pub(crate) mod testing;

pub use cycle::*;
pub use dead_letter::*;
pub use destination::*;
pub use mapping::*;
pub use scheduler::*;
pub use source::*;
pub use table_sync::*;
pub use watermark::*;
