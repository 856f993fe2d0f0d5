//! herbswap-serve - HTTP API and web form
//!
//! Axum-based server exposing the substitute search over a JSON API plus an
//! embedded single-page form. The formula database is loaded once at startup
//! and shared read-only across requests; searches run on the blocking pool.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// API error types
pub mod error;

/// HTTP handlers for REST endpoints
pub mod handlers;

/// Server configuration from TOML or environment
pub mod config;

/// API response types
pub mod responses;

/// Server instance management
pub mod server;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use server::HerbswapServer;
