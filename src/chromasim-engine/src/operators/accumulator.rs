//! Accumulators for global aggregation.
//!
//! Each accumulator receives the aggregate's input column, already cast to
//! [`input_type`], one batch at a time and produces a single [`Value`].

use std::collections::HashSet;
use std::fmt::Debug;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute;
use arrow::datatypes::{DataType, Float64Type, Int64Type};

use chromasim_logical::{AggExpr, AggFunc, CountMode, Value};
use common_error::{ChromaError, ChromaResult};

pub(crate) trait Accumulator: Send + Sync + Debug {
    fn update(&mut self, values: &ArrayRef) -> ChromaResult<()>;

    fn evaluate(&self) -> ChromaResult<Value>;
}

/// Type the input column is cast to before it reaches the accumulator.
pub(crate) fn input_type(func: AggFunc, input: &DataType) -> ChromaResult<DataType> {
    let unsupported = || {
        ChromaError::type_error(format!(
            "aggregate '{func}' does not support input of type {input}"
        ))
    };
    match func {
        AggFunc::Count | AggFunc::CountAll => Ok(input.clone()),
        AggFunc::CountDistinct => AggFunc::Min.result_type(input).ok_or_else(unsupported),
        AggFunc::Mean | AggFunc::Stddev | AggFunc::Variance => {
            func.result_type(input).ok_or_else(unsupported)?;
            Ok(DataType::Float64)
        }
        _ => func.result_type(input).ok_or_else(unsupported),
    }
}

pub(crate) fn create_accumulator(agg: &AggExpr, input: &DataType) -> Box<dyn Accumulator> {
    match agg.func {
        AggFunc::Count => Box::new(CountAccumulator::new(agg.count_options().mode)),
        AggFunc::CountAll => Box::new(CountAccumulator::new(CountMode::All)),
        AggFunc::CountDistinct => {
            Box::new(CountDistinctAccumulator::new(agg.count_options().mode))
        }
        AggFunc::Sum => {
            let options = agg.scalar_options();
            Box::new(SumAccumulator::new(
                NullPolicy::new(options.skip_nulls, options.min_count),
                input == &DataType::Float64,
            ))
        }
        AggFunc::Mean => {
            let options = agg.scalar_options();
            Box::new(MeanAccumulator::new(NullPolicy::new(options.skip_nulls, options.min_count)))
        }
        AggFunc::Min | AggFunc::Max => {
            let options = agg.scalar_options();
            Box::new(MinMaxAccumulator::new(
                NullPolicy::new(options.skip_nulls, options.min_count),
                agg.func == AggFunc::Max,
            ))
        }
        AggFunc::First | AggFunc::Last => {
            let options = agg.scalar_options();
            Box::new(FirstLastAccumulator::new(
                NullPolicy::new(options.skip_nulls, options.min_count),
                agg.func == AggFunc::Last,
            ))
        }
        AggFunc::Stddev | AggFunc::Variance => {
            let options = agg.variance_options();
            Box::new(VarianceAccumulator::new(
                NullPolicy::new(options.skip_nulls, options.min_count),
                options.ddof,
                agg.func == AggFunc::Stddev,
            ))
        }
    }
}

/// Null count that treats every slot of a `Null`-typed array as null.
fn null_count(values: &ArrayRef) -> usize {
    if values.data_type() == &DataType::Null {
        values.len()
    } else {
        values.null_count()
    }
}

/// Tracks valid and null inputs for the `skip_nulls` / `min_count` options.
#[derive(Debug, Clone, Copy)]
struct NullPolicy {
    skip_nulls: bool,
    min_count: u32,
    valid: u64,
    nulls: u64,
}

impl NullPolicy {
    const fn new(skip_nulls: bool, min_count: u32) -> Self {
        Self {
            skip_nulls,
            min_count,
            valid: 0,
            nulls: 0,
        }
    }

    fn observe(&mut self, values: &ArrayRef) {
        let nulls = null_count(values);
        self.nulls += nulls as u64;
        self.valid += (values.len() - nulls) as u64;
    }

    /// Whether the options turn the result into `null`.
    fn yields_null(&self) -> bool {
        (!self.skip_nulls && self.nulls > 0) || self.valid < u64::from(self.min_count)
    }
}

#[derive(Debug)]
struct CountAccumulator {
    mode: CountMode,
    valid: i64,
    nulls: i64,
}

impl CountAccumulator {
    const fn new(mode: CountMode) -> Self {
        Self {
            mode,
            valid: 0,
            nulls: 0,
        }
    }
}

impl Accumulator for CountAccumulator {
    fn update(&mut self, values: &ArrayRef) -> ChromaResult<()> {
        let nulls = null_count(values);
        self.nulls += nulls as i64;
        self.valid += (values.len() - nulls) as i64;
        Ok(())
    }

    fn evaluate(&self) -> ChromaResult<Value> {
        Ok(Value::Int64(match self.mode {
            CountMode::OnlyValid => self.valid,
            CountMode::OnlyNull => self.nulls,
            CountMode::All => self.valid + self.nulls,
        }))
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum DistinctKey {
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(String),
}

impl DistinctKey {
    fn float(value: f64) -> Self {
        // -0.0 and 0.0 count once, as do all NaNs.
        let canonical = if value == 0.0 {
            0.0
        } else if value.is_nan() {
            f64::NAN
        } else {
            value
        };
        Self::Float(canonical.to_bits())
    }
}

#[derive(Debug)]
struct CountDistinctAccumulator {
    mode: CountMode,
    seen: HashSet<DistinctKey>,
    has_null: bool,
}

impl CountDistinctAccumulator {
    fn new(mode: CountMode) -> Self {
        Self {
            mode,
            seen: HashSet::new(),
            has_null: false,
        }
    }
}

impl Accumulator for CountDistinctAccumulator {
    fn update(&mut self, values: &ArrayRef) -> ChromaResult<()> {
        self.has_null |= null_count(values) > 0;
        match values.data_type() {
            DataType::Null => {}
            DataType::Boolean => self
                .seen
                .extend(values.as_boolean().iter().flatten().map(DistinctKey::Bool)),
            DataType::Int64 => self.seen.extend(
                values
                    .as_primitive::<Int64Type>()
                    .iter()
                    .flatten()
                    .map(DistinctKey::Int),
            ),
            DataType::Float64 => self.seen.extend(
                values
                    .as_primitive::<Float64Type>()
                    .iter()
                    .flatten()
                    .map(DistinctKey::float),
            ),
            DataType::Utf8 => self.seen.extend(
                values
                    .as_string::<i32>()
                    .iter()
                    .flatten()
                    .map(|s| DistinctKey::Str(s.to_string())),
            ),
            other => {
                return Err(ChromaError::internal(format!(
                    "count_distinct received unnormalized input {other}"
                )))
            }
        }
        Ok(())
    }

    fn evaluate(&self) -> ChromaResult<Value> {
        let distinct = self.seen.len() as i64;
        let null = i64::from(self.has_null);
        Ok(Value::Int64(match self.mode {
            CountMode::OnlyValid => distinct,
            CountMode::OnlyNull => null,
            CountMode::All => distinct + null,
        }))
    }
}

#[derive(Debug)]
struct SumAccumulator {
    policy: NullPolicy,
    is_float: bool,
    int_sum: i64,
    float_sum: f64,
}

impl SumAccumulator {
    const fn new(policy: NullPolicy, is_float: bool) -> Self {
        Self {
            policy,
            is_float,
            int_sum: 0,
            float_sum: 0.0,
        }
    }
}

impl Accumulator for SumAccumulator {
    fn update(&mut self, values: &ArrayRef) -> ChromaResult<()> {
        self.policy.observe(values);
        match values.data_type() {
            DataType::Null => {}
            DataType::Int64 => {
                let partial = compute::sum_checked(values.as_primitive::<Int64Type>())?;
                if let Some(partial) = partial {
                    self.int_sum = self
                        .int_sum
                        .checked_add(partial)
                        .ok_or_else(|| ChromaError::execution("integer overflow in sum"))?;
                }
            }
            DataType::Float64 => {
                self.float_sum += compute::sum(values.as_primitive::<Float64Type>()).unwrap_or(0.0);
            }
            other => {
                return Err(ChromaError::internal(format!(
                    "sum received unnormalized input {other}"
                )))
            }
        }
        Ok(())
    }

    fn evaluate(&self) -> ChromaResult<Value> {
        if self.policy.yields_null() {
            return Ok(Value::Null);
        }
        Ok(if self.is_float {
            Value::Float64(self.float_sum)
        } else {
            Value::Int64(self.int_sum)
        })
    }
}

#[derive(Debug)]
struct MeanAccumulator {
    policy: NullPolicy,
    sum: f64,
}

impl MeanAccumulator {
    const fn new(policy: NullPolicy) -> Self {
        Self { policy, sum: 0.0 }
    }
}

impl Accumulator for MeanAccumulator {
    fn update(&mut self, values: &ArrayRef) -> ChromaResult<()> {
        self.policy.observe(values);
        self.sum += compute::sum(values.as_primitive::<Float64Type>()).unwrap_or(0.0);
        Ok(())
    }

    fn evaluate(&self) -> ChromaResult<Value> {
        if self.policy.yields_null() || self.policy.valid == 0 {
            return Ok(Value::Null);
        }
        Ok(Value::Float64(self.sum / self.policy.valid as f64))
    }
}

#[derive(Debug)]
struct MinMaxAccumulator {
    policy: NullPolicy,
    is_max: bool,
    current: Option<Value>,
}

impl MinMaxAccumulator {
    const fn new(policy: NullPolicy, is_max: bool) -> Self {
        Self {
            policy,
            is_max,
            current: None,
        }
    }

    fn batch_extreme(&self, values: &ArrayRef) -> ChromaResult<Option<Value>> {
        let value = match values.data_type() {
            DataType::Null => None,
            DataType::Boolean => {
                let array = values.as_boolean();
                let v = if self.is_max {
                    compute::max_boolean(array)
                } else {
                    compute::min_boolean(array)
                };
                v.map(Value::Bool)
            }
            DataType::Int64 => {
                let array = values.as_primitive::<Int64Type>();
                let v = if self.is_max {
                    compute::max(array)
                } else {
                    compute::min(array)
                };
                v.map(Value::Int64)
            }
            // NaN only wins when a batch holds nothing else.
            DataType::Float64 => {
                let pick = if self.is_max { f64::max } else { f64::min };
                values
                    .as_primitive::<Float64Type>()
                    .iter()
                    .flatten()
                    .reduce(pick)
                    .map(Value::Float64)
            }
            DataType::Utf8 => {
                let array = values.as_string::<i32>();
                let v = if self.is_max {
                    compute::max_string(array)
                } else {
                    compute::min_string(array)
                };
                v.map(Value::from)
            }
            other => {
                return Err(ChromaError::internal(format!(
                    "min/max received unnormalized input {other}"
                )))
            }
        };
        Ok(value)
    }

    /// Whether `candidate` should replace `current`.
    fn replaces(&self, candidate: &Value, current: &Value) -> bool {
        let ordering = match (candidate, current) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int64(a), Value::Int64(b)) => a.cmp(b),
            (Value::Float64(a), Value::Float64(b)) => {
                if a.is_nan() || b.is_nan() {
                    return b.is_nan() && !a.is_nan();
                }
                a.total_cmp(b)
            }
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => return false,
        };
        if self.is_max {
            ordering.is_gt()
        } else {
            ordering.is_lt()
        }
    }
}

impl Accumulator for MinMaxAccumulator {
    fn update(&mut self, values: &ArrayRef) -> ChromaResult<()> {
        self.policy.observe(values);
        if let Some(candidate) = self.batch_extreme(values)? {
            let replace = match &self.current {
                Some(current) => self.replaces(&candidate, current),
                None => true,
            };
            if replace {
                self.current = Some(candidate);
            }
        }
        Ok(())
    }

    fn evaluate(&self) -> ChromaResult<Value> {
        if self.policy.yields_null() {
            return Ok(Value::Null);
        }
        Ok(self.current.clone().unwrap_or(Value::Null))
    }
}

#[derive(Debug)]
struct FirstLastAccumulator {
    policy: NullPolicy,
    is_last: bool,
    current: Option<Value>,
}

impl FirstLastAccumulator {
    const fn new(policy: NullPolicy, is_last: bool) -> Self {
        Self {
            policy,
            is_last,
            current: None,
        }
    }
}

impl Accumulator for FirstLastAccumulator {
    fn update(&mut self, values: &ArrayRef) -> ChromaResult<()> {
        self.policy.observe(values);
        if values.is_empty() || (!self.is_last && self.current.is_some()) {
            return Ok(());
        }

        let mut positions: Box<dyn Iterator<Item = usize>> = if self.is_last {
            Box::new((0..values.len()).rev())
        } else {
            Box::new(0..values.len())
        };
        let position = if self.policy.skip_nulls {
            positions.find(|&i| values.is_valid(i))
        } else {
            positions.next()
        };
        if let Some(i) = position {
            self.current = Some(Value::from_array(values.as_ref(), i)?);
        }
        Ok(())
    }

    fn evaluate(&self) -> ChromaResult<Value> {
        if self.policy.valid < u64::from(self.policy.min_count) {
            return Ok(Value::Null);
        }
        Ok(self.current.clone().unwrap_or(Value::Null))
    }
}

/// Welford's online variance.
#[derive(Debug)]
struct VarianceAccumulator {
    policy: NullPolicy,
    ddof: u32,
    stddev: bool,
    count: u64,
    mean: f64,
    m2: f64,
}

impl VarianceAccumulator {
    const fn new(policy: NullPolicy, ddof: u32, stddev: bool) -> Self {
        Self {
            policy,
            ddof,
            stddev,
            count: 0,
            mean: 0.0,
            m2: 0.0,
        }
    }
}

impl Accumulator for VarianceAccumulator {
    fn update(&mut self, values: &ArrayRef) -> ChromaResult<()> {
        self.policy.observe(values);
        for x in values.as_primitive::<Float64Type>().iter().flatten() {
            self.count += 1;
            let delta = x - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (x - self.mean);
        }
        Ok(())
    }

    fn evaluate(&self) -> ChromaResult<Value> {
        if self.policy.yields_null() || self.count <= u64::from(self.ddof) {
            return Ok(Value::Null);
        }
        let variance = self.m2 / (self.count - u64::from(self.ddof)) as f64;
        Ok(Value::Float64(if self.stddev {
            variance.sqrt()
        } else {
            variance
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::{BooleanArray, Float64Array, Int64Array, StringArray};
    use chromasim_logical::{AggOptions, CountOptions, ScalarAggregateOptions, VarianceOptions};

    fn run(agg: &AggExpr, batches: Vec<ArrayRef>) -> Value {
        let mut acc = create_accumulator(agg, batches[0].data_type());
        for batch in &batches {
            acc.update(batch).unwrap();
        }
        acc.evaluate().unwrap()
    }

    fn ints(values: Vec<Option<i64>>) -> ArrayRef {
        Arc::new(Int64Array::from(values))
    }

    fn floats(values: Vec<Option<f64>>) -> ArrayRef {
        Arc::new(Float64Array::from(values))
    }

    #[test]
    fn test_count_modes() {
        let data = || vec![ints(vec![Some(1), None]), ints(vec![Some(3), None, None])];
        let count = |mode| {
            AggExpr::new(AggFunc::Count, "x", "n")
                .with_options(AggOptions::Count(CountOptions { mode }))
        };

        assert_eq!(run(&count(CountMode::OnlyValid), data()), Value::Int64(2));
        assert_eq!(run(&count(CountMode::OnlyNull), data()), Value::Int64(3));
        assert_eq!(run(&count(CountMode::All), data()), Value::Int64(5));
        assert_eq!(run(&AggExpr::count_all("n"), data()), Value::Int64(5));
    }

    #[test]
    fn test_count_distinct() {
        let agg = AggExpr::new(AggFunc::CountDistinct, "x", "n");
        let data = vec![
            floats(vec![Some(1.0), Some(-0.0), None]),
            floats(vec![Some(0.0), Some(1.0), Some(2.5)]),
        ];
        assert_eq!(run(&agg, data.clone()), Value::Int64(3));

        let all = agg.with_options(AggOptions::Count(CountOptions {
            mode: CountMode::All,
        }));
        assert_eq!(run(&all, data), Value::Int64(4));

        let strings: ArrayRef = Arc::new(StringArray::from(vec!["g", "r", "g"]));
        let agg = AggExpr::new(AggFunc::CountDistinct, "band", "n");
        assert_eq!(run(&agg, vec![strings]), Value::Int64(2));
    }

    #[test]
    fn test_sum_and_min_count() {
        let agg = AggExpr::new(AggFunc::Sum, "x", "s");
        assert_eq!(
            run(&agg, vec![ints(vec![Some(1), Some(2)]), ints(vec![None, Some(4)])]),
            Value::Int64(7)
        );
        assert_eq!(run(&agg, vec![ints(vec![None])]), Value::Null);

        let zero_min = agg.clone().with_options(AggOptions::ScalarAggregate(
            ScalarAggregateOptions {
                skip_nulls: true,
                min_count: 0,
            },
        ));
        assert_eq!(run(&zero_min, vec![ints(vec![None])]), Value::Int64(0));

        let keep_nulls = agg.with_options(AggOptions::ScalarAggregate(ScalarAggregateOptions {
            skip_nulls: false,
            min_count: 1,
        }));
        assert_eq!(run(&keep_nulls, vec![ints(vec![Some(1), None])]), Value::Null);
    }

    #[test]
    fn test_sum_overflow_is_error() {
        let agg = AggExpr::new(AggFunc::Sum, "x", "s");
        let mut acc = create_accumulator(&agg, &DataType::Int64);
        acc.update(&ints(vec![Some(i64::MAX)])).unwrap();
        assert!(acc.update(&ints(vec![Some(1)])).is_err());
    }

    #[test]
    fn test_mean() {
        let agg = AggExpr::new(AggFunc::Mean, "x", "m");
        let value = run(
            &agg,
            vec![floats(vec![Some(1.0), None]), floats(vec![Some(2.0), Some(6.0)])],
        );
        assert_eq!(value, Value::Float64(3.0));
    }

    #[test]
    fn test_min_max() {
        let min = AggExpr::new(AggFunc::Min, "color", "min_color");
        let max = AggExpr::new(AggFunc::Max, "color", "max_color");
        let data = || {
            vec![
                floats(vec![Some(0.5), None, Some(-1.5)]),
                floats(vec![Some(1.75), Some(-0.25)]),
            ]
        };
        assert_eq!(run(&min, data()), Value::Float64(-1.5));
        assert_eq!(run(&max, data()), Value::Float64(1.75));

        let strings: ArrayRef = Arc::new(StringArray::from(vec!["r", "g", "z"]));
        assert_eq!(run(&max, vec![strings]), Value::from("z"));

        let bools: ArrayRef = Arc::new(BooleanArray::from(vec![true, false]));
        assert_eq!(run(&min, vec![bools]), Value::Bool(false));
    }

    #[test]
    fn test_min_max_skip_nan() {
        let min = AggExpr::new(AggFunc::Min, "color", "min_color");
        let max = AggExpr::new(AggFunc::Max, "color", "max_color");
        let data = || vec![floats(vec![Some(-1.0), Some(f64::NAN), Some(1.5)])];
        assert_eq!(run(&min, data()), Value::Float64(-1.0));
        assert_eq!(run(&max, data()), Value::Float64(1.5));

        let nan_first = || vec![floats(vec![Some(f64::NAN)]), floats(vec![Some(0.25), None])];
        assert_eq!(run(&min, nan_first()), Value::Float64(0.25));
        assert_eq!(run(&max, nan_first()), Value::Float64(0.25));

        let only_nan = run(&max, vec![floats(vec![Some(f64::NAN), Some(f64::NAN)])]);
        assert!(matches!(only_nan, Value::Float64(v) if v.is_nan()));
    }

    #[test]
    fn test_first_last() {
        let data = || vec![ints(vec![None, Some(2)]), ints(vec![Some(3), None])];

        let first = AggExpr::new(AggFunc::First, "x", "f");
        assert_eq!(run(&first, data()), Value::Int64(2));
        let last = AggExpr::new(AggFunc::Last, "x", "l");
        assert_eq!(run(&last, data()), Value::Int64(3));

        let keep_nulls = AggOptions::ScalarAggregate(ScalarAggregateOptions {
            skip_nulls: false,
            min_count: 0,
        });
        assert_eq!(run(&first.with_options(keep_nulls), data()), Value::Null);
        assert_eq!(run(&last.with_options(keep_nulls), data()), Value::Null);
    }

    #[test]
    fn test_variance_and_stddev() {
        let data = || {
            vec![
                floats(vec![Some(2.0), Some(4.0), Some(4.0)]),
                floats(vec![Some(4.0), Some(5.0), Some(5.0), Some(7.0), Some(9.0)]),
            ]
        };
        let as_f64 = |value: Value| value.as_float64().unwrap();

        let variance = AggExpr::new(AggFunc::Variance, "x", "v");
        assert!((as_f64(run(&variance, data())) - 4.0).abs() < 1e-12);

        let stddev = AggExpr::new(AggFunc::Stddev, "x", "s");
        assert!((as_f64(run(&stddev, data())) - 2.0).abs() < 1e-12);

        let sample = variance.with_options(AggOptions::Variance(VarianceOptions {
            ddof: 1,
            skip_nulls: true,
            min_count: 0,
        }));
        assert!((as_f64(run(&sample, data())) - 32.0 / 7.0).abs() < 1e-12);
        assert_eq!(run(&sample, vec![floats(vec![Some(1.0)])]), Value::Null);
    }

    #[test]
    fn test_input_type() {
        assert_eq!(input_type(AggFunc::Mean, &DataType::Int32).unwrap(), DataType::Float64);
        assert_eq!(input_type(AggFunc::Min, &DataType::Float32).unwrap(), DataType::Float64);
        assert_eq!(input_type(AggFunc::Count, &DataType::Utf8).unwrap(), DataType::Utf8);
        assert!(input_type(AggFunc::Sum, &DataType::Utf8).is_err());
    }
}
