//! External data sources.
//!
//! - Census ACS client and response parsing (`census`)
//! - county fetch loop and the tract left join (`join`)

pub mod census;
pub mod join;

pub use census::*;
pub use join::*;
