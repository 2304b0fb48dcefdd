//! Strict row shapes of the replicated tables.
//!
//! Every table is a plain serde struct that rejects unknown and missing
//! fields. The [`Record`] trait and [`validate_row`] turn the raw JSON rows
//! handed over by the relational store into destination documents.

pub mod record;
pub mod rows;
pub mod timestamp;

pub use record::*;
pub use rows::*;
