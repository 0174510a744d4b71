//! Plan and operator properties.

/// Properties of a physical plan.
#[derive(Debug, Clone, Default)]
pub struct PlanProperties {
    /// Whether the plan contains blocking operators.
    pub contains_blocking: bool,
    /// Number of fragments a scan decodes concurrently.
    pub scan_parallelism: usize,
}

impl PlanProperties {
    /// Mark as containing blocking operators.
    pub fn with_blocking(mut self) -> Self {
        self.contains_blocking = true;
        self
    }

    pub fn with_scan_parallelism(mut self, parallelism: usize) -> Self {
        self.scan_parallelism = parallelism;
        self
    }
}

/// Capabilities of a physical operator.
#[derive(Debug, Clone, Default)]
pub struct OperatorCaps {
    /// Must consume all input before producing output.
    pub blocking: bool,
}

impl OperatorCaps {
    /// Capabilities of a streaming (non-blocking) operator.
    pub const fn streaming() -> Self {
        Self {
            blocking: false,
        }
    }

    /// Capabilities of a blocking operator.
    pub const fn blocking() -> Self {
        Self {
            blocking: true,
        }
    }
}
