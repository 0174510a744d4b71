//! Physical plan structure.

use std::sync::Arc;

use crate::operators::PhysicalOperator;
use crate::physical::{PhysicalSchema, PlanProperties};

/// An executable tree of physical operators.
#[derive(Debug, Clone)]
pub struct PhysicalPlan {
    root: Arc<dyn PhysicalOperator>,
    properties: PlanProperties,
}

impl PhysicalPlan {
    pub fn new(root: Arc<dyn PhysicalOperator>) -> Self {
        let properties = PlanProperties::default();
        let mut plan = Self { root, properties };
        if plan.has_blocking_operators() {
            plan.properties = plan.properties.with_blocking();
        }
        plan
    }

    pub fn with_properties(root: Arc<dyn PhysicalOperator>, properties: PlanProperties) -> Self {
        Self { root, properties }
    }

    pub fn root(&self) -> &Arc<dyn PhysicalOperator> {
        &self.root
    }

    pub fn properties(&self) -> &PlanProperties {
        &self.properties
    }

    /// Output schema of the root operator.
    pub fn schema(&self) -> &PhysicalSchema {
        self.root.schema()
    }

    /// Generate EXPLAIN output.
    pub fn explain(&self) -> String {
        let mut output = String::from("Physical Plan:\n");
        output.push_str(&self.root.explain(1));
        output
    }

    pub fn has_blocking_operators(&self) -> bool {
        fn check_blocking(op: &dyn PhysicalOperator) -> bool {
            op.capabilities().blocking || op.children().iter().any(|c| check_blocking(c.as_ref()))
        }
        check_blocking(self.root.as_ref())
    }
}

impl std::fmt::Display for PhysicalPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.explain())
    }
}
