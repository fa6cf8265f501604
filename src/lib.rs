//! `tract-dvi` library crate.
//!
//! The binary (`dvi`) is a thin wrapper around this library so that:
//!
//! - the scoring pipeline is testable without spawning processes
//! - enrichment sources can be swapped for fakes in tests
//! - modules stay easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod logging;
pub mod math;
pub mod report;
pub mod schema;
pub mod score;
