//! Catalog loaders for chromasim.
//!
//! A [`Loader`] binds one dataset configuration to the engine: `process()`
//! aggregates the selected rows once and caches the result, after which
//! `sample()` draws rows with replacement from the selection. A
//! [`MultiLoader`] drives several loaders with positionally aligned results.
//!
//! Around the loaders sit the consumers of their output: the
//! [`GalaxyParameterSampler`], the per-band [`ThroughputCache`] and the
//! [`measurement`] table schema.

#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod aggregate;
pub mod galaxies;
pub mod loader;
pub mod measurement;
pub mod multi;
pub mod sampler;
pub mod throughputs;

pub use aggregate::{AggregateResult, COUNT_OUTPUT};
pub use galaxies::{GalaxyParameterSampler, GalaxyParameters};
pub use loader::Loader;
pub use measurement::measurement_schema;
pub use multi::MultiLoader;
pub use sampler::select_indices;
pub use throughputs::{Band, Throughput, ThroughputCache};
