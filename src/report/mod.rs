//! Reporting: summary statistics (`summary`), terminal formatting (`format`)
//! and the JSON run manifest (`manifest`).

pub mod format;
pub mod manifest;
pub mod summary;

pub use format::*;
pub use manifest::*;
pub use summary::*;
