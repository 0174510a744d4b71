//! chromasim - catalog aggregation and sampling for chromatic shear simulations
//!
//! Reference catalogs are aggregated with a small Arrow-native query engine and then
//! sampled, with replacement, to parametrize simulated galaxies and stars.

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

// Re-export member crates
pub use chromasim_engine as engine;
pub use chromasim_logical as logical;
pub use chromasim_pipeline as pipeline;
pub use chromasim_storage as storage;
pub use common_config as config;
pub use common_error as error;

pub use chromasim_pipeline::{AggregateResult, Loader, MultiLoader};

/// chromasim version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
