//! Plan execution.
//!
//! - [`ExecutionContext`]: configuration and metrics shared by the operators of a plan
//! - [`LocalExecutor`]: drives a plan to completion on the current runtime
//! - [`ExecutionResult`]: collected batches plus execution statistics

mod context;
mod local;
mod result;

pub use context::{ExecutionContext, RuntimeConfig};
pub use local::LocalExecutor;
pub use result::ExecutionResult;
