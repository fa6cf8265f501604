//! Scoring: pillar construction (`pillars`) and the weighted composite
//! (`composite`).

pub mod composite;
pub mod pillars;

pub use composite::*;
pub use pillars::*;
