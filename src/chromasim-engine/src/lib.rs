//! Local execution engine for chromasim.
//!
//! Plans and runs columnar queries over on-disk datasets with Arrow-native,
//! vectorized operators.

#![allow(clippy::missing_const_for_fn)] // Builder patterns often can't be const
#![allow(clippy::return_self_not_must_use)]
#![allow(
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation
)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::significant_drop_tightening)] // Operator state locks span the pull
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │ Dataset + typed │ ──▶ │   PlanBuilder    │ ──▶ │  LocalExecutor   │
//! │ expressions     │     │                  │     │                  │
//! └─────────────────┘     └──────────────────┘     └──────────────────┘
//!                                │                         │
//!                                ▼                         ▼
//!                         PhysicalPlan              Arrow RecordBatch
//! ```
//!
//! # Key Components
//!
//! - [`PhysicalPlan`]: root operator plus plan properties
//! - Operators ([`operators`]), all implementing the pull-based [`PhysicalOperator`]:
//!   - **Source**: [`ScanExec`], [`MemoryExec`]
//!   - **Transform**: [`FilterExec`], [`ProjectExec`]
//!   - **Blocking**: [`AggregateExec`] (global, one row), [`TakeExec`] (positional)
//! - [`ExprEvaluator`]: evaluates `LogicalExpr` trees into Arrow arrays
//! - [`PlanBuilder`]: the aggregate plan (`scan → filter? → project → aggregate`) and
//!   the sample plan (`scan → filter? → project → take`)
//! - [`LocalExecutor`]: drives a plan and collects an [`ExecutionResult`]
//!
//! ```rust,ignore
//! use chromasim_engine::{LocalExecutor, PlanBuilder};
//!
//! let plan = PlanBuilder::new().aggregate_plan(&dataset, Some(&predicate), &projection, &aggs)?;
//! let result = LocalExecutor::new().execute(plan).await?;
//! let row = result.concat()?;
//! ```

pub mod executor;
pub mod expr;
pub mod metrics;
pub mod operators;
pub mod physical;
pub mod planner;

pub use executor::{ExecutionContext, ExecutionResult, LocalExecutor, RuntimeConfig};
pub use expr::ExprEvaluator;
pub use metrics::{ExecutionTimer, MetricsSink, OperatorMetrics, OperatorMetricsHandle};
pub use operators::{
    AggregateExec, BoxedPhysicalOperator, FilterExec, MemoryExec, PhysicalOperator, ProjectExec,
    ScanExec, TakeExec,
};
pub use physical::{OperatorCaps, PhysicalPlan, PhysicalSchema, PlanProperties};
pub use planner::{PlanBuilder, PlannerConfig};
