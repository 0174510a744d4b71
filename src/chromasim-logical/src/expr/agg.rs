//! Aggregate functions and their options.

use arrow::datatypes::DataType;
use serde::{Deserialize, Serialize};

/// Aggregate functions known to the aggregate stage.
///
/// All aggregates are global: each produces exactly one value over the whole
/// filtered and projected row set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggFunc {
    /// Count values according to a [`CountMode`].
    Count,
    /// Count rows; takes no input column.
    CountAll,
    /// Count distinct values.
    CountDistinct,
    /// Sum of values.
    Sum,
    /// Arithmetic mean.
    Mean,
    /// Minimum value.
    Min,
    /// Maximum value.
    Max,
    /// Standard deviation.
    Stddev,
    /// Variance.
    Variance,
    /// First value in scan order.
    First,
    /// Last value in scan order.
    Last,
}

impl AggFunc {
    /// Every registered aggregate function.
    pub const ALL: [Self; 11] = [
        Self::Count,
        Self::CountAll,
        Self::CountDistinct,
        Self::Sum,
        Self::Mean,
        Self::Min,
        Self::Max,
        Self::Stddev,
        Self::Variance,
        Self::First,
        Self::Last,
    ];

    /// Configuration name of the function.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::CountAll => "count_all",
            Self::CountDistinct => "count_distinct",
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Min => "min",
            Self::Max => "max",
            Self::Stddev => "stddev",
            Self::Variance => "variance",
            Self::First => "first",
            Self::Last => "last",
        }
    }

    /// Resolve a configuration name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }

    /// Whether the function reads an input column.
    pub const fn requires_input(&self) -> bool {
        !matches!(self, Self::CountAll)
    }

    /// Whether the given options kind applies to this function.
    pub const fn accepts(&self, options: &AggOptions) -> bool {
        match options {
            AggOptions::Count(_) => matches!(self, Self::Count | Self::CountDistinct),
            AggOptions::ScalarAggregate(_) => matches!(
                self,
                Self::Sum | Self::Mean | Self::Min | Self::Max | Self::First | Self::Last
            ),
            AggOptions::Variance(_) => matches!(self, Self::Stddev | Self::Variance),
        }
    }

    /// Result type given the input type; `None` if the input type is not supported.
    pub fn result_type(&self, input: &DataType) -> Option<DataType> {
        match self {
            Self::Count | Self::CountAll | Self::CountDistinct => Some(DataType::Int64),

            Self::Sum => match input {
                DataType::Null => Some(DataType::Int64),
                dt if dt.is_integer() => Some(DataType::Int64),
                dt if dt.is_numeric() => Some(DataType::Float64),
                _ => None,
            },

            Self::Mean | Self::Stddev | Self::Variance => match input {
                DataType::Null => Some(DataType::Float64),
                dt if dt.is_numeric() => Some(DataType::Float64),
                _ => None,
            },

            Self::Min | Self::Max | Self::First | Self::Last => match input {
                DataType::Null => Some(DataType::Null),
                DataType::Boolean => Some(DataType::Boolean),
                DataType::Utf8 | DataType::LargeUtf8 => Some(DataType::Utf8),
                dt if dt.is_integer() => Some(DataType::Int64),
                dt if dt.is_numeric() => Some(DataType::Float64),
                _ => None,
            },
        }
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

impl std::fmt::Display for AggFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Which values `count` counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountMode {
    /// Non-null values.
    #[default]
    OnlyValid,
    /// Null values.
    OnlyNull,
    /// All values.
    All,
}

/// Options for `count` and `count_distinct`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CountOptions {
    #[serde(default)]
    pub mode: CountMode,
}

/// Options for sum, mean, min, max, first and last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScalarAggregateOptions {
    /// Ignore nulls; when false any null makes the result null.
    #[serde(default = "default_true")]
    pub skip_nulls: bool,
    /// Minimum number of non-null values for a non-null result.
    #[serde(default = "default_one")]
    pub min_count: u32,
}

impl Default for ScalarAggregateOptions {
    fn default() -> Self {
        Self {
            skip_nulls: true,
            min_count: 1,
        }
    }
}

/// Options for stddev and variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VarianceOptions {
    /// Delta degrees of freedom.
    #[serde(default)]
    pub ddof: u32,
    #[serde(default = "default_true")]
    pub skip_nulls: bool,
    #[serde(default)]
    pub min_count: u32,
}

impl Default for VarianceOptions {
    fn default() -> Self {
        Self {
            ddof: 0,
            skip_nulls: true,
            min_count: 0,
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_one() -> u32 {
    1
}

/// Parsed aggregate options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggOptions {
    Count(CountOptions),
    ScalarAggregate(ScalarAggregateOptions),
    Variance(VarianceOptions),
}

impl AggOptions {
    /// Names of the options kinds as written in configuration trees.
    pub const KINDS: [&'static str; 3] =
        ["CountOptions", "ScalarAggregateOptions", "VarianceOptions"];

    /// Configuration name of this options kind.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Count(_) => "CountOptions",
            Self::ScalarAggregate(_) => "ScalarAggregateOptions",
            Self::Variance(_) => "VarianceOptions",
        }
    }
}

/// A resolved `{input, function, options, output}` aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggExpr {
    /// The aggregate function.
    pub func: AggFunc,
    /// Input column (absent only for `count_all`).
    pub input: Option<String>,
    /// Function options, if given.
    pub options: Option<AggOptions>,
    /// Output column name.
    pub output: String,
}

impl AggExpr {
    /// Create an aggregate over `input` with default options.
    pub fn new(func: AggFunc, input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            func,
            input: Some(input.into()),
            options: None,
            output: output.into(),
        }
    }

    /// Create a `count_all` aggregate.
    pub fn count_all(output: impl Into<String>) -> Self {
        Self {
            func: AggFunc::CountAll,
            input: None,
            options: None,
            output: output.into(),
        }
    }

    /// Set options.
    pub fn with_options(mut self, options: AggOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Count options, defaulted when absent.
    pub fn count_options(&self) -> CountOptions {
        match self.options {
            Some(AggOptions::Count(opts)) => opts,
            _ => CountOptions::default(),
        }
    }

    /// Scalar aggregate options, defaulted when absent.
    pub fn scalar_options(&self) -> ScalarAggregateOptions {
        match self.options {
            Some(AggOptions::ScalarAggregate(opts)) => opts,
            _ => ScalarAggregateOptions::default(),
        }
    }

    /// Variance options, defaulted when absent.
    pub fn variance_options(&self) -> VarianceOptions {
        match self.options {
            Some(AggOptions::Variance(opts)) => opts,
            _ => VarianceOptions::default(),
        }
    }
}

impl std::fmt::Display for AggExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.input {
            Some(input) => write!(f, "{}({}) AS {}", self.func, input, self.output),
            None => write!(f, "{}() AS {}", self.func, self.output),
        }
    }
}
