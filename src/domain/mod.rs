//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - tract records, pillars, metrics and categorical fields (`types`)
//! - weighting presets (`weights`)
//! - ordinal encoding tables (`encoding`)
//! - run configuration and the TOML settings file (`config`)

pub mod config;
pub mod encoding;
pub mod types;
pub mod weights;

pub use config::*;
pub use encoding::*;
pub use types::*;
pub use weights::*;
