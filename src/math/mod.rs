//! Numeric utilities: column statistics and null-safe rounding.

pub mod rounding;
pub mod stats;

pub use rounding::*;
pub use stats::*;
