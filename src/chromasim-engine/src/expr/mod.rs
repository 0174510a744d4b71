//! Vectorized expression evaluation.

mod evaluator;

pub use evaluator::ExprEvaluator;
