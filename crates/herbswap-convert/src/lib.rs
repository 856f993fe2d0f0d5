//! Conversion of the national TCM license registry into herbswap databases.
//!
//! The registry publishes concentrated-granule product licenses as a CSV
//! export. [`LicenseConverter`] parses that export into
//! [`FormulaRecord`](herbswap_core::FormulaRecord) values, applying the
//! corrections in a [`ConverterConfig`], and writes the YAML database file
//! the search engine loads.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

pub mod config;
pub mod error;
pub mod license;

pub use config::{ConverterConfig, Patch};
pub use error::{ConvertError, RowError};
pub use license::{LicenseConverter, LoadOptions};
