//! Physical plan structures.

mod plan;
mod properties;
mod schema;

pub use plan::PhysicalPlan;
pub use properties::{OperatorCaps, PlanProperties};
pub use schema::PhysicalSchema;
