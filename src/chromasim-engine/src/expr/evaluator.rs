//! Expression evaluator implementation.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array};
use arrow::compute::kernels::{arity, boolean, cmp, numeric};
use arrow::compute::{cast, is_not_null, is_null, prep_null_mask_filter};
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use chromasim_logical::expr::{comparison_type, numeric_supertype};
use chromasim_logical::{LogicalExpr, ScalarFunc};
use common_error::{ChromaError, ChromaResult};

/// Evaluates [`LogicalExpr`] trees against record batches.
///
/// Operands are coerced before each kernel: integers widen to `Int64`, other
/// numerics to `Float64`, and `Null` arrays cast to whatever the other side needs.
#[derive(Debug, Default)]
pub struct ExprEvaluator;

impl ExprEvaluator {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Evaluate an expression to an array with one value per row of `batch`.
    pub fn evaluate(&self, expr: &LogicalExpr, batch: &RecordBatch) -> ChromaResult<ArrayRef> {
        match expr {
            LogicalExpr::Column(name) => batch
                .column_by_name(name)
                .cloned()
                .ok_or_else(|| ChromaError::column_not_found(name.clone())),

            LogicalExpr::Literal(value) => Ok(value.to_array(batch.num_rows())),

            LogicalExpr::Call { func, args } => {
                let arrays = args
                    .iter()
                    .map(|arg| self.evaluate(arg, batch))
                    .collect::<ChromaResult<Vec<_>>>()?;
                self.eval_call(*func, arrays)
            }
        }
    }

    /// Evaluate a predicate; `null` results select no row.
    pub fn evaluate_predicate(
        &self,
        expr: &LogicalExpr,
        batch: &RecordBatch,
    ) -> ChromaResult<BooleanArray> {
        let result = self.evaluate(expr, batch)?;
        let mask = to_boolean(&result).map_err(|_| {
            ChromaError::type_error(format!(
                "predicate {expr} must evaluate to boolean, got {}",
                result.data_type()
            ))
        })?;
        Ok(if mask.null_count() > 0 {
            prep_null_mask_filter(&mask)
        } else {
            mask
        })
    }

    fn eval_call(&self, func: ScalarFunc, args: Vec<ArrayRef>) -> ChromaResult<ArrayRef> {
        use ScalarFunc::*;

        match func {
            Field | Scalar => unary_operand(func, args),

            Equal | NotEqual | Greater | GreaterEqual | Less | LessEqual => {
                let (left, right) = binary_operands(func, args)?;
                compare(func, &left, &right)
            }

            And | Or | Xor | AndKleene | OrKleene => {
                fold_operands(func, args, |l, r| logical(func, l, r))
            }

            Invert => {
                let operand = to_boolean(&unary_operand(func, args)?)?;
                Ok(Arc::new(boolean::not(&operand)?))
            }

            Add | Subtract | Multiply | Divide => {
                fold_operands(func, args, |l, r| arithmetic(func, l, r))
            }

            Negate => {
                let operand = to_numeric(&unary_operand(func, args)?)?;
                Ok(numeric::neg(&operand)?)
            }

            Abs => abs(&to_numeric(&unary_operand(func, args)?)?),

            Sqrt => {
                let operand = cast(&unary_operand(func, args)?, &DataType::Float64)?;
                let floats = operand.as_primitive::<Float64Type>();
                Ok(Arc::new(floats.unary::<_, Float64Type>(f64::sqrt)))
            }

            Power => {
                let (base, exponent) = binary_operands(func, args)?;
                let base = cast(&to_numeric(&base)?, &DataType::Float64)?;
                let exponent = cast(&to_numeric(&exponent)?, &DataType::Float64)?;
                let result: Float64Array = arity::binary(
                    base.as_primitive::<Float64Type>(),
                    exponent.as_primitive::<Float64Type>(),
                    f64::powf,
                )?;
                Ok(Arc::new(result))
            }

            IsNull => Ok(Arc::new(is_null(&unary_operand(func, args)?)?)),

            IsValid => Ok(Arc::new(is_not_null(&unary_operand(func, args)?)?)),

            IsFinite => {
                let operand = cast(&to_numeric(&unary_operand(func, args)?)?, &DataType::Float64)?;
                let finite: BooleanArray = operand
                    .as_primitive::<Float64Type>()
                    .iter()
                    .map(|v| v.map(f64::is_finite))
                    .collect();
                Ok(Arc::new(finite))
            }
        }
    }
}

fn arity_error(func: ScalarFunc, got: usize) -> ChromaError {
    ChromaError::internal(format!(
        "function '{func}' expects {} operands, got {got}",
        func.arity()
    ))
}

fn unary_operand(func: ScalarFunc, args: Vec<ArrayRef>) -> ChromaResult<ArrayRef> {
    let got = args.len();
    let mut iter = args.into_iter();
    match (iter.next(), iter.next()) {
        (Some(operand), None) => Ok(operand),
        _ => Err(arity_error(func, got)),
    }
}

fn binary_operands(func: ScalarFunc, args: Vec<ArrayRef>) -> ChromaResult<(ArrayRef, ArrayRef)> {
    let got = args.len();
    let mut iter = args.into_iter();
    match (iter.next(), iter.next(), iter.next()) {
        (Some(left), Some(right), None) => Ok((left, right)),
        _ => Err(arity_error(func, got)),
    }
}

/// Left fold over N operands.
fn fold_operands<F>(func: ScalarFunc, args: Vec<ArrayRef>, f: F) -> ChromaResult<ArrayRef>
where
    F: Fn(&ArrayRef, &ArrayRef) -> ChromaResult<ArrayRef>,
{
    if !func.arity().accepts(args.len()) {
        return Err(arity_error(func, args.len()));
    }
    let mut iter = args.into_iter();
    let first = iter.next().ok_or_else(|| arity_error(func, 0))?;
    iter.try_fold(first, |acc, next| f(&acc, &next))
}

fn to_boolean(array: &ArrayRef) -> ChromaResult<BooleanArray> {
    match array.data_type() {
        DataType::Boolean => Ok(array.as_boolean().clone()),
        DataType::Null => Ok(BooleanArray::new_null(array.len())),
        other => Err(ChromaError::type_error(format!(
            "expected a boolean operand, got {other}"
        ))),
    }
}

/// Widen a numeric operand to `Int64` or `Float64`.
fn to_numeric(array: &ArrayRef) -> ChromaResult<ArrayRef> {
    let target = match array.data_type() {
        DataType::Null => DataType::Int64,
        dt if dt.is_integer() => DataType::Int64,
        dt if dt.is_numeric() => DataType::Float64,
        other => {
            return Err(ChromaError::type_error(format!(
                "expected a numeric operand, got {other}"
            )))
        }
    };
    Ok(cast(array, &target)?)
}

fn compare(func: ScalarFunc, left: &ArrayRef, right: &ArrayRef) -> ChromaResult<ArrayRef> {
    let target = comparison_type(left.data_type(), right.data_type()).ok_or_else(|| {
        ChromaError::type_error(format!(
            "cannot compare {} with {} in '{func}'",
            left.data_type(),
            right.data_type()
        ))
    })?;
    if target == DataType::Null {
        return Ok(Arc::new(BooleanArray::new_null(left.len())));
    }

    let left = cast(left, &target)?;
    let right = cast(right, &target)?;
    let result = match func {
        ScalarFunc::Equal => cmp::eq(&left, &right)?,
        ScalarFunc::NotEqual => cmp::neq(&left, &right)?,
        ScalarFunc::Greater => cmp::gt(&left, &right)?,
        ScalarFunc::GreaterEqual => cmp::gt_eq(&left, &right)?,
        ScalarFunc::Less => cmp::lt(&left, &right)?,
        ScalarFunc::LessEqual => cmp::lt_eq(&left, &right)?,
        other => return Err(ChromaError::internal(format!("'{other}' is not a comparison"))),
    };
    Ok(Arc::new(result))
}

fn logical(func: ScalarFunc, left: &ArrayRef, right: &ArrayRef) -> ChromaResult<ArrayRef> {
    let left = to_boolean(left)?;
    let right = to_boolean(right)?;
    let result = match func {
        ScalarFunc::And => boolean::and(&left, &right)?,
        ScalarFunc::Or => boolean::or(&left, &right)?,
        ScalarFunc::AndKleene => boolean::and_kleene(&left, &right)?,
        ScalarFunc::OrKleene => boolean::or_kleene(&left, &right)?,
        ScalarFunc::Xor => cmp::neq(&left, &right)?,
        other => return Err(ChromaError::internal(format!("'{other}' is not logical"))),
    };
    Ok(Arc::new(result))
}

fn arithmetic(func: ScalarFunc, left: &ArrayRef, right: &ArrayRef) -> ChromaResult<ArrayRef> {
    let target = numeric_supertype(left.data_type(), right.data_type()).ok_or_else(|| {
        ChromaError::type_error(format!(
            "'{func}' requires numeric operands, got {} and {}",
            left.data_type(),
            right.data_type()
        ))
    })?;
    let left = cast(left, &target)?;
    let right = cast(right, &target)?;
    let result = match func {
        ScalarFunc::Add => numeric::add(&left, &right)?,
        ScalarFunc::Subtract => numeric::sub(&left, &right)?,
        ScalarFunc::Multiply => numeric::mul(&left, &right)?,
        ScalarFunc::Divide => numeric::div(&left, &right)?,
        other => return Err(ChromaError::internal(format!("'{other}' is not arithmetic"))),
    };
    Ok(result)
}

fn abs(operand: &ArrayRef) -> ChromaResult<ArrayRef> {
    match operand.data_type() {
        DataType::Int64 => {
            let result: Int64Array = operand.as_primitive::<Int64Type>().try_unary(|v| {
                v.checked_abs()
                    .ok_or_else(|| ArrowError::ComputeError(format!("Overflow in abs({v})")))
            })?;
            Ok(Arc::new(result))
        }
        _ => {
            let floats = operand.as_primitive::<Float64Type>();
            Ok(Arc::new(floats.unary::<_, Float64Type>(f64::abs)))
        }
    }
}
