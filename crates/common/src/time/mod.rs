//! Wall-clock abstraction
//!
//! Token lifetimes are absolute UTC instants, so components that compare
//! against "now" take a [`Clock`] instead of calling `Utc::now()` directly.

pub mod clock;

pub use clock::{Clock, MockClock, SystemClock};
