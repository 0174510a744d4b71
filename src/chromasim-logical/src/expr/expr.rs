//! Logical expression tree.

use serde::{Deserialize, Serialize};

use super::ScalarFunc;
use crate::Value;

/// Typed expression over named columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogicalExpr {
    /// Column reference.
    Column(String),
    /// Literal value.
    Literal(Value),
    /// Function application.
    Call {
        func: ScalarFunc,
        args: Vec<LogicalExpr>,
    },
}

/// Create a column reference expression.
pub fn col(name: impl Into<String>) -> LogicalExpr {
    LogicalExpr::Column(name.into())
}

/// Create a literal expression.
pub fn lit(value: impl Into<Value>) -> LogicalExpr {
    LogicalExpr::Literal(value.into())
}

impl LogicalExpr {
    /// Create a function application.
    pub fn call(func: ScalarFunc, args: Vec<LogicalExpr>) -> Self {
        Self::Call { func, args }
    }

    fn binary(self, func: ScalarFunc, other: LogicalExpr) -> Self {
        Self::call(func, vec![self, other])
    }

    // Comparison operators

    /// Equality comparison.
    pub fn eq(self, other: LogicalExpr) -> Self {
        self.binary(ScalarFunc::Equal, other)
    }

    /// Greater than comparison.
    pub fn gt(self, other: LogicalExpr) -> Self {
        self.binary(ScalarFunc::Greater, other)
    }

    /// Greater than or equal comparison.
    pub fn gt_eq(self, other: LogicalExpr) -> Self {
        self.binary(ScalarFunc::GreaterEqual, other)
    }

    /// Less than comparison.
    pub fn lt(self, other: LogicalExpr) -> Self {
        self.binary(ScalarFunc::Less, other)
    }

    /// Less than or equal comparison.
    pub fn lt_eq(self, other: LogicalExpr) -> Self {
        self.binary(ScalarFunc::LessEqual, other)
    }

    // Logical operators

    /// Logical AND.
    pub fn and(self, other: LogicalExpr) -> Self {
        self.binary(ScalarFunc::And, other)
    }

    /// Logical OR.
    pub fn or(self, other: LogicalExpr) -> Self {
        self.binary(ScalarFunc::Or, other)
    }

    /// Logical NOT.
    pub fn not(self) -> Self {
        Self::call(ScalarFunc::Invert, vec![self])
    }

    // Arithmetic operators

    /// Addition.
    pub fn add(self, other: LogicalExpr) -> Self {
        self.binary(ScalarFunc::Add, other)
    }

    /// Subtraction.
    pub fn sub(self, other: LogicalExpr) -> Self {
        self.binary(ScalarFunc::Subtract, other)
    }

    /// Column name, if this is a plain column reference.
    pub fn as_column(&self) -> Option<&str> {
        match self {
            Self::Column(name) => Some(name),
            _ => None,
        }
    }

    /// Referenced column names, in first-appearance order, without duplicates.
    pub fn columns(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    pub(crate) fn collect_columns(&self, out: &mut Vec<String>) {
        match self {
            Self::Column(name) => {
                if !out.iter().any(|c| c == name) {
                    out.push(name.clone());
                }
            }
            Self::Literal(_) => {}
            Self::Call { args, .. } => {
                for arg in args {
                    arg.collect_columns(out);
                }
            }
        }
    }
}

impl std::fmt::Display for LogicalExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Column(name) => write!(f, "{name}"),
            Self::Literal(val) => write!(f, "{val}"),
            Self::Call { func, args } => {
                write!(f, "{func}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}
