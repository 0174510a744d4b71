//! Error types and result aliases for chromasim.
//!
//! Every crate in the workspace reports failures through [`ChromaError`]. Nothing is
//! recovered locally: errors propagate unchanged to the caller of `process()` / `sample()`.

mod error;

pub use error::{ChromaError, ChromaResult};
