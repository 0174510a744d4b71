//! Physical planning.
//!
//! Builds the two plan shapes a loader runs against a dataset.

mod builder;

pub use builder::{PlanBuilder, PlannerConfig};
