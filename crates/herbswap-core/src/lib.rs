//! herbswap-core - Composition model & formula database
//!
//! Value types shared by every other crate: herb compositions, the read-only
//! formula database, and the YAML record format it is loaded from.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// Composition value type and arithmetic helpers
pub mod composition;

/// Formula database and YAML record loading
pub mod database;

/// Core error types
pub mod error;

/// Query parsing and target construction
pub mod query;

pub use composition::{combine, Composition};
pub use database::{FormulaDatabase, FormulaRecord};
pub use error::CoreError;
pub use query::{build_target, parse_items, parse_target, QueryError};
