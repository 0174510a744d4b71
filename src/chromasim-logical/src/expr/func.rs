//! Registry of scalar functions addressable by name from configuration trees.

use serde::{Deserialize, Serialize};

/// Number of operands a function accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly `n` operands.
    Exact(usize),
    /// At least `n` operands (folded left).
    AtLeast(usize),
}

impl Arity {
    /// Check whether `n` operands satisfy this arity.
    pub const fn accepts(&self, n: usize) -> bool {
        match self {
            Self::Exact(k) => n == *k,
            Self::AtLeast(k) => n >= *k,
        }
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(n) => write!(f, "exactly {n}"),
            Self::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

/// Scalar functions known to the expression parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarFunc {
    /// Column reference constructor.
    Field,
    /// Literal constructor.
    Scalar,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    /// Boolean AND; null if either side is null.
    And,
    /// Boolean OR; null if either side is null.
    Or,
    Xor,
    /// Three-valued AND (`false AND null = false`).
    AndKleene,
    /// Three-valued OR (`true OR null = true`).
    OrKleene,
    /// Boolean NOT.
    Invert,
    Add,
    Subtract,
    Multiply,
    Divide,
    Negate,
    Abs,
    Sqrt,
    Power,
    IsNull,
    IsValid,
    IsFinite,
}

impl ScalarFunc {
    /// Every registered function.
    pub const ALL: [Self; 25] = [
        Self::Field,
        Self::Scalar,
        Self::Equal,
        Self::NotEqual,
        Self::Greater,
        Self::GreaterEqual,
        Self::Less,
        Self::LessEqual,
        Self::And,
        Self::Or,
        Self::Xor,
        Self::AndKleene,
        Self::OrKleene,
        Self::Invert,
        Self::Add,
        Self::Subtract,
        Self::Multiply,
        Self::Divide,
        Self::Negate,
        Self::Abs,
        Self::Sqrt,
        Self::Power,
        Self::IsNull,
        Self::IsValid,
        Self::IsFinite,
    ];

    /// Configuration name of the function.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Field => "field",
            Self::Scalar => "scalar",
            Self::Equal => "equal",
            Self::NotEqual => "not_equal",
            Self::Greater => "greater",
            Self::GreaterEqual => "greater_equal",
            Self::Less => "less",
            Self::LessEqual => "less_equal",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::AndKleene => "and_kleene",
            Self::OrKleene => "or_kleene",
            Self::Invert => "invert",
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
            Self::Negate => "negate",
            Self::Abs => "abs",
            Self::Sqrt => "sqrt",
            Self::Power => "power",
            Self::IsNull => "is_null",
            Self::IsValid => "is_valid",
            Self::IsFinite => "is_finite",
        }
    }

    /// Resolve a configuration name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }

    /// Operand count accepted by the function.
    pub const fn arity(&self) -> Arity {
        match self {
            Self::And
            | Self::Or
            | Self::AndKleene
            | Self::OrKleene
            | Self::Add
            | Self::Multiply => Arity::AtLeast(2),
            Self::Equal
            | Self::NotEqual
            | Self::Greater
            | Self::GreaterEqual
            | Self::Less
            | Self::LessEqual
            | Self::Xor
            | Self::Subtract
            | Self::Divide
            | Self::Power => Arity::Exact(2),
            Self::Field
            | Self::Scalar
            | Self::Invert
            | Self::Negate
            | Self::Abs
            | Self::Sqrt
            | Self::IsNull
            | Self::IsValid
            | Self::IsFinite => Arity::Exact(1),
        }
    }

    /// Whether the function compares two values.
    pub const fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::Greater
                | Self::GreaterEqual
                | Self::Less
                | Self::LessEqual
        )
    }

    /// Whether the function combines boolean operands.
    pub const fn is_logical(&self) -> bool {
        matches!(
            self,
            Self::And | Self::Or | Self::Xor | Self::AndKleene | Self::OrKleene | Self::Invert
        )
    }

    /// Comma-separated list of all names, for error messages.
    pub fn known_names() -> String {
        Self::ALL
            .iter()
            .map(|f| f.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Display for ScalarFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_roundtrip() {
        for func in ScalarFunc::ALL {
            assert_eq!(ScalarFunc::from_name(func.name()), Some(func));
        }
        assert_eq!(ScalarFunc::from_name("frobnicate"), None);
        assert_eq!(ScalarFunc::from_name("Greater"), None);
    }

    #[test]
    fn test_arity() {
        assert!(ScalarFunc::And.arity().accepts(5));
        assert!(!ScalarFunc::And.arity().accepts(1));
        assert!(ScalarFunc::Greater.arity().accepts(2));
        assert!(!ScalarFunc::Greater.arity().accepts(3));
        assert_eq!(ScalarFunc::Invert.arity(), Arity::Exact(1));
    }

    #[test]
    fn test_categories() {
        assert!(ScalarFunc::LessEqual.is_comparison());
        assert!(ScalarFunc::OrKleene.is_logical());
        assert!(!ScalarFunc::Add.is_logical());
    }
}
