//! Schema resolution: semantic concepts → actual dataset columns.

pub mod concepts;
pub mod resolver;

pub use concepts::*;
pub use resolver::*;
