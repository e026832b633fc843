//! # Period Calendar
//!
//! Maps timezone-qualified instants onto the canonical 15-minute trade
//! period grid of a fixed reference zone (Europe/Prague by default).
//!
//! ## Features
//!
//! - **Period keys**: `(trade_date, period, time_interval)` for any instant
//! - **DST aware**: 92 periods on the spring-forward date, 100 on the fall-back date
//! - **Instant parsing**: offset-qualified and provider-local naive timestamps

mod instant;
mod period;

pub use instant::*;
pub use period::*;
