//! Logging setup shared by the ingestion binaries.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Standard tracing filter (e.g., `info`, `grid_ingest=debug`)
//! - `LOG_FORMAT`: `pretty` (default), `compact`, or `json`
//! - `LOG_TIMESTAMPS`: `local` (default), `utc`, or `none`
//! - `LOG_LEVEL`: fallback level when `RUST_LOG` is not set
//!
//! # Usage
//!
//! ```rust,ignore
//! use grid_common::logging::{init_logging, LogConfig};
//!
//! init_logging(LogConfig::from_env().with_default_level("debug"))?;
//! ```

mod config;

pub use config::{init_logging, LogConfig, LogFormat, TimestampFormat};
