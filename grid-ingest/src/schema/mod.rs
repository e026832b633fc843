//! Common normalized data types
//!
//! Parsers emit [`RawSample`]s; the combiner and aggregator turn them into
//! [`NormalizedRecord`]s and [`AggregatedRecord`]s keyed by trade period.
//! Nothing here is persisted directly: datasets lower records into storage
//! rows.

mod record;
mod sample;

pub use record::*;
pub use sample::*;
