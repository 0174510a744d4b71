//! Physical execution operators.
//!
//! Every operator implements [`PhysicalOperator`] and follows the pull-based
//! execution model.
//!
//! | Category | Blocking | Operators |
//! |----------|----------|-----------|
//! | Source | No | `ScanExec`, `MemoryExec` |
//! | Unary | No | `FilterExec`, `ProjectExec` |
//! | Blocking | Yes | `AggregateExec`, `TakeExec` |

mod accumulator;
mod aggregate;
mod filter;
mod memory;
mod project;
mod scan;
mod take;
mod traits;

pub use traits::{BoxedPhysicalOperator, PhysicalOperator};

pub use aggregate::AggregateExec;
pub use filter::FilterExec;
pub use memory::MemoryExec;
pub use project::ProjectExec;
pub use scan::ScanExec;
pub use take::TakeExec;
