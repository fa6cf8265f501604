//! Input/output helpers.
//!
//! - GeoJSON read/write with opaque geometry (`geojson`)
//! - tract table construction + GEOID normalization (`ingest`)
//! - artifact exports (`export`)
//! - column inventory for `dvi inspect` (`inspect`)

pub mod export;
pub mod geojson;
pub mod ingest;
pub mod inspect;

pub use export::*;
pub use geojson::*;
pub use ingest::*;
pub use inspect::*;
