//! Physical operator trait.

use std::fmt::Debug;
use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;

use common_error::ChromaResult;

use crate::executor::ExecutionContext;
use crate::physical::{OperatorCaps, PhysicalSchema};

/// An operator of a physical plan.
///
/// Operators form a tree that is driven **pull-based**: each call to `next()`
/// returns the next batch of output.
///
/// ```text
/// create → open → next* → close
/// ```
///
/// - `open()` prepares resources and opens the children
/// - `next()` returns batches until exhausted (`None`)
/// - `close()` releases resources and must be idempotent
#[async_trait]
pub trait PhysicalOperator: Send + Sync + Debug {
    /// Operator name for display.
    fn name(&self) -> &'static str;

    /// Output schema.
    fn schema(&self) -> &PhysicalSchema;

    fn capabilities(&self) -> OperatorCaps;

    fn children(&self) -> Vec<&Arc<dyn PhysicalOperator>>;

    /// Initialize the operator and its children.
    async fn open(&self, ctx: &ExecutionContext) -> ChromaResult<()>;

    /// Next batch of output, `Ok(None)` once exhausted.
    async fn next(&self) -> ChromaResult<Option<RecordBatch>>;

    /// Release resources. Safe to call more than once.
    async fn close(&self) -> ChromaResult<()>;

    /// EXPLAIN output at the given indentation level.
    fn explain(&self, indent: usize) -> String {
        let prefix = "  ".repeat(indent);
        let mut output = format!("{}{}\n", prefix, self.display());
        for child in self.children() {
            output.push_str(&child.explain(indent + 1));
        }
        output
    }

    /// Display string for EXPLAIN.
    fn display(&self) -> String {
        self.name().to_string()
    }
}

/// Shared physical operator for dynamic dispatch.
pub type BoxedPhysicalOperator = Arc<dyn PhysicalOperator>;
