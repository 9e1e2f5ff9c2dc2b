//! A columnar storage engine for SQL table batches.
//!
//! A batch is a set of columns sharing one row count, keyed by a
//! [`key::CompositeKey`] inside a distributed key-value store. Each column
//! is encoded independently (`encoding`) into one of seven schemes chosen
//! per its declared data type and observed values, with per-column
//! statistics (`stats`) computed alongside. The whole set of encoded
//! columns, plus its compression and residency state, is wrapped by
//! [`value::ColumnBatchValue`] and walked in bulk by [`iterator`].

pub mod collaborators;
pub mod config;
pub mod encoding;
pub mod error;
pub mod iterator;
pub mod key;
pub mod stats;
pub mod types;
pub mod value;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
