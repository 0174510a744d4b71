//! Static type inference for logical expressions.

use arrow::datatypes::{DataType, Schema};
use common_error::{ChromaError, ChromaResult};

use super::{LogicalExpr, ScalarFunc};

/// Common numeric type of two operands.
///
/// Two integer operands widen to `Int64`; any other numeric pair widens to
/// `Float64`. `Null` combines with any numeric type.
pub fn numeric_supertype(left: &DataType, right: &DataType) -> Option<DataType> {
    match (left, right) {
        (DataType::Null, DataType::Null) => Some(DataType::Int64),
        (DataType::Null, other) | (other, DataType::Null) => numeric_family(other),
        (l, r) if l.is_integer() && r.is_integer() => Some(DataType::Int64),
        (l, r) if l.is_numeric() && r.is_numeric() => Some(DataType::Float64),
        _ => None,
    }
}

/// Type both sides of a comparison are cast to before comparing.
pub fn comparison_type(left: &DataType, right: &DataType) -> Option<DataType> {
    match (left, right) {
        (DataType::Null, DataType::Null) => Some(DataType::Null),
        (DataType::Null, other) | (other, DataType::Null) => comparable_family(other),
        (DataType::Boolean, DataType::Boolean) => Some(DataType::Boolean),
        (l, r) if is_string(l) && is_string(r) => Some(DataType::Utf8),
        (l, r) => numeric_supertype(l, r),
    }
}

fn numeric_family(dt: &DataType) -> Option<DataType> {
    if dt.is_integer() {
        Some(DataType::Int64)
    } else if dt.is_numeric() {
        Some(DataType::Float64)
    } else {
        None
    }
}

fn comparable_family(dt: &DataType) -> Option<DataType> {
    match dt {
        DataType::Boolean => Some(DataType::Boolean),
        dt if is_string(dt) => Some(DataType::Utf8),
        dt => numeric_family(dt),
    }
}

fn is_string(dt: &DataType) -> bool {
    matches!(dt, DataType::Utf8 | DataType::LargeUtf8)
}

fn is_boolish(dt: &DataType) -> bool {
    matches!(dt, DataType::Boolean | DataType::Null)
}

impl LogicalExpr {
    /// Infer the output type of this expression against an input schema.
    ///
    /// Fails with `ColumnNotFound` for unknown columns and `TypeError` when a
    /// function is applied to operands it does not support.
    pub fn data_type(&self, schema: &Schema) -> ChromaResult<DataType> {
        match self {
            Self::Column(name) => schema
                .field_with_name(name)
                .map(|f| f.data_type().clone())
                .map_err(|_| ChromaError::column_not_found(name.clone())),
            Self::Literal(value) => Ok(value.data_type()),
            Self::Call { func, args } => {
                if !func.arity().accepts(args.len()) {
                    return Err(ChromaError::config(format!(
                        "function '{func}' expects {} operands, got {}",
                        func.arity(),
                        args.len()
                    )));
                }
                let types = args
                    .iter()
                    .map(|a| a.data_type(schema))
                    .collect::<ChromaResult<Vec<_>>>()?;
                call_type(*func, &types).ok_or_else(|| {
                    let rendered = types
                        .iter()
                        .map(|t| t.to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    ChromaError::type_error(format!(
                        "function '{func}' does not support operands ({rendered}) in {self}"
                    ))
                })
            }
        }
    }
}

fn call_type(func: ScalarFunc, types: &[DataType]) -> Option<DataType> {
    use ScalarFunc::*;

    match func {
        Field | Scalar => types.first().cloned(),

        Equal | NotEqual | Greater | GreaterEqual | Less | LessEqual => {
            comparison_type(&types[0], &types[1]).map(|_| DataType::Boolean)
        }

        And | Or | Xor | AndKleene | OrKleene | Invert => types
            .iter()
            .all(is_boolish)
            .then_some(DataType::Boolean),

        Add | Subtract | Multiply | Divide => {
            let (first, rest) = types.split_first()?;
            rest.iter()
                .try_fold(numeric_family_or_null(first)?, |acc, t| {
                    numeric_supertype(&acc, t)
                })
        }

        Negate | Abs => numeric_family_or_null(&types[0]),

        Sqrt | Power => types
            .iter()
            .all(|t| numeric_family_or_null(t).is_some())
            .then_some(DataType::Float64),

        IsNull | IsValid => Some(DataType::Boolean),

        IsFinite => numeric_family_or_null(&types[0]).map(|_| DataType::Boolean),
    }
}

fn numeric_family_or_null(dt: &DataType) -> Option<DataType> {
    match dt {
        DataType::Null => Some(DataType::Int64),
        dt => numeric_family(dt),
    }
}
