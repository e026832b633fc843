//! Run windows and chunk planning
//!
//! A run covers one `[start, end)` window, resolved from the run mode, and
//! is split into contiguous chunks that the backfill driver executes in
//! order.

mod chunks;
mod window;

pub use chunks::*;
pub use window::*;
