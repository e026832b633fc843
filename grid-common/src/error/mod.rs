//! Shared error handling for the ingestion workspace.
//!
//! This module provides:
//! - Error types reused across crates (database, network, configuration)
//! - The `ErrorClassification` trait that drives retry and fatality decisions
//! - A generic retry helper for transient failures
//!
//! # Usage
//!
//! ```rust,ignore
//! use grid_common::error::{ErrorClassification, retry_with_backoff};
//!
//! let body = retry_with_backoff(|| client.fetch(&request), 3, Duration::from_millis(500)).await?;
//! ```

mod common;
mod traits;

pub use common::*;
pub use traits::*;
