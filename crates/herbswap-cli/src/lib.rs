//! herbswap-cli - Command-line interface
//!
//! Subcommands for substitute search, registry conversion, database
//! listings, and the web server, plus the terminal result reports.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// Command definitions and dispatch
pub mod cli;

/// Terminal result formatting
pub mod report;

pub use cli::Cli;
