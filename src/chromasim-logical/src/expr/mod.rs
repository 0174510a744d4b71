//! Expression trees for dataset queries.

mod agg;
mod expr;
mod func;
mod types;

pub use agg::{
    AggExpr, AggFunc, AggOptions, CountMode, CountOptions, ScalarAggregateOptions,
    VarianceOptions,
};
pub use expr::{col, lit, LogicalExpr};
pub use func::{Arity, ScalarFunc};
pub use types::{comparison_type, numeric_supertype};
