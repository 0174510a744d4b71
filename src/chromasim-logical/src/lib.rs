//! Logical layer for chromasim.
//!
//! Turns the declarative trees of a [`DatasetConfig`](common_config::DatasetConfig) into a
//! typed expression AST:
//!
//! - [`LogicalExpr`]: `Column | Literal | Call { func, args }`
//! - [`ScalarFunc`] / [`AggFunc`]: closed registries of the functions a config may name
//! - [`parse_expression`], [`parse_projection`], [`parse_options`], [`parse_aggregate`]:
//!   eager, validating parsers
//!
//! Unknown function names, malformed nodes and wrong arities are rejected here, at
//! configuration-load time, never during execution.
//!
//! ```rust,ignore
//! use chromasim_logical::parse_expression;
//! use serde_json::json;
//!
//! let predicate = parse_expression(&json!({"greater": ["color", 0]}))?;
//! assert_eq!(predicate.to_string(), "greater(color, 0)");
//! ```

pub mod expr;
mod parse;
mod projection;
mod value;

pub use expr::{
    col, lit, AggExpr, AggFunc, AggOptions, Arity, CountMode, CountOptions, LogicalExpr,
    ScalarAggregateOptions, ScalarFunc, VarianceOptions,
};
pub use parse::{
    parse_aggregate, parse_expression, parse_options, parse_predicate, parse_projection,
};
pub use projection::Projection;
pub use value::Value;
