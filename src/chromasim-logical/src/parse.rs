//! Parsers from configuration trees to the typed AST.
//!
//! All parsers validate eagerly: unknown names, malformed nodes and arity
//! mismatches fail with `ConfigError` before any plan is built.

use common_config::{AggregateConfig, ConfigTree};
use common_error::{config_err, ChromaError, ChromaResult};
use serde::de::DeserializeOwned;
use serde_json::Map;

use crate::expr::{
    AggExpr, AggFunc, AggOptions, CountOptions, ScalarAggregateOptions, VarianceOptions,
};
use crate::{LogicalExpr, Projection, ScalarFunc, Value};

/// Parse an expression tree.
///
/// A terminal string is a column reference and any other terminal is a literal.
/// A single-key mapping `{function: [operands..]}` parses each operand
/// recursively; `{function: operand}` applies the function to the raw terminal
/// operand. `field` and `scalar` build column references and literals explicitly.
pub fn parse_expression(tree: &ConfigTree) -> ChromaResult<LogicalExpr> {
    match tree {
        ConfigTree::Object(map) => parse_call(map),
        ConfigTree::Array(_) => {
            config_err!("expected an expression, found a bare sequence: {tree}")
        }
        terminal => terminal_expr(terminal),
    }
}

/// Parse an optional row-selection tree. `None` means no filter stage.
pub fn parse_predicate(tree: Option<&ConfigTree>) -> ChromaResult<Option<LogicalExpr>> {
    tree.map(parse_expression).transpose()
}

/// Resolve a projection list into an ordered name → expression mapping.
///
/// Each entry is either a bare column name or `{output_name: expression}`.
/// Repeated output names are last-write-wins.
pub fn parse_projection(entries: &[ConfigTree]) -> ChromaResult<Projection> {
    let mut projection = Projection::new();
    for entry in entries {
        match entry {
            ConfigTree::String(name) => {
                projection.insert(name.clone(), LogicalExpr::Column(name.clone()));
            }
            ConfigTree::Object(map) => {
                let (name, tree) = single_entry(map, "projection entry")?;
                if name.is_empty() {
                    config_err!("projection output name must not be empty");
                }
                projection.insert(name.clone(), parse_expression(tree)?);
            }
            other => config_err!(
                "projection entry must be a column name or {{output: expression}}, found {other}"
            ),
        }
    }
    Ok(projection)
}

/// Parse an optional aggregate options tree `{OptionsKind: {key: value, ..}}`.
pub fn parse_options(tree: Option<&ConfigTree>) -> ChromaResult<Option<AggOptions>> {
    let Some(tree) = tree else {
        return Ok(None);
    };
    let ConfigTree::Object(map) = tree else {
        config_err!("options must be a mapping {{OptionsKind: {{..}}}}, found {tree}");
    };
    let (kind, body) = single_entry(map, "options")?;
    let options = match kind.as_str() {
        "CountOptions" => AggOptions::Count(options_body::<CountOptions>(kind, body)?),
        "ScalarAggregateOptions" => {
            AggOptions::ScalarAggregate(options_body::<ScalarAggregateOptions>(kind, body)?)
        }
        "VarianceOptions" => AggOptions::Variance(options_body::<VarianceOptions>(kind, body)?),
        other => config_err!(
            "unknown options kind '{other}' (known: {})",
            AggOptions::KINDS.join(", ")
        ),
    };
    Ok(Some(options))
}

/// Resolve an aggregate tuple.
pub fn parse_aggregate(config: &AggregateConfig) -> ChromaResult<AggExpr> {
    let func = AggFunc::from_name(&config.function).ok_or_else(|| {
        ChromaError::config(format!(
            "unknown aggregate function '{}' (known: {})",
            config.function,
            AggFunc::known_names()
        ))
    })?;

    if config.output.is_empty() {
        config_err!("aggregate '{func}' has an empty output name");
    }

    match (&config.input, func.requires_input()) {
        (None, true) => config_err!(
            "aggregate '{func}' for output '{}' requires an input column",
            config.output
        ),
        (Some(input), false) => config_err!(
            "aggregate '{func}' takes no input column, got '{input}'"
        ),
        _ => {}
    }

    let options = parse_options(config.options.as_ref())?;
    if let Some(opts) = &options {
        if !func.accepts(opts) {
            config_err!(
                "options kind '{}' is not accepted by aggregate '{func}'",
                opts.kind()
            );
        }
    }

    Ok(AggExpr {
        func,
        input: config.input.clone(),
        options,
        output: config.output.clone(),
    })
}

fn parse_call(map: &Map<String, ConfigTree>) -> ChromaResult<LogicalExpr> {
    let (name, operand) = single_entry(map, "expression node")?;
    let func = ScalarFunc::from_name(name).ok_or_else(|| {
        ChromaError::config(format!(
            "unknown function '{name}' (known: {})",
            ScalarFunc::known_names()
        ))
    })?;

    let args = match operand {
        ConfigTree::Array(items) => items
            .iter()
            .map(parse_expression)
            .collect::<ChromaResult<Vec<_>>>()?,
        ConfigTree::Object(_) => config_err!(
            "function '{name}' applied to a mapping; wrap nested expressions in a sequence"
        ),
        raw => return apply_unary(func, raw),
    };

    if !func.arity().accepts(args.len()) {
        config_err!(
            "function '{name}' expects {} operands, got {}",
            func.arity(),
            args.len()
        );
    }

    match func {
        ScalarFunc::Field => match args.into_iter().next() {
            Some(LogicalExpr::Column(c)) => Ok(LogicalExpr::Column(c)),
            Some(other) => config_err!("field expects a column name, got {other}"),
            None => config_err!("field expects a column name"),
        },
        ScalarFunc::Scalar => match args.into_iter().next() {
            Some(LogicalExpr::Column(s)) => Ok(LogicalExpr::Literal(Value::String(s))),
            Some(lit @ LogicalExpr::Literal(_)) => Ok(lit),
            Some(other) => config_err!("scalar expects a terminal value, got {other}"),
            None => config_err!("scalar expects a terminal value"),
        },
        _ => Ok(LogicalExpr::call(func, args)),
    }
}

fn apply_unary(func: ScalarFunc, raw: &ConfigTree) -> ChromaResult<LogicalExpr> {
    let value = Value::from_json(raw)
        .ok_or_else(|| ChromaError::internal(format!("non-terminal raw operand {raw}")))?;
    match (func, value) {
        (ScalarFunc::Field, Value::String(name)) => Ok(LogicalExpr::Column(name)),
        (ScalarFunc::Field, other) => config_err!("field expects a column name, got {other}"),
        (ScalarFunc::Scalar, value) => Ok(LogicalExpr::Literal(value)),
        (func, value) => {
            if !func.arity().accepts(1) {
                config_err!(
                    "function '{func}' expects {} operands, got 1",
                    func.arity()
                );
            }
            let arg = match value {
                Value::String(name) => LogicalExpr::Column(name),
                other => LogicalExpr::Literal(other),
            };
            Ok(LogicalExpr::call(func, vec![arg]))
        }
    }
}

fn terminal_expr(terminal: &ConfigTree) -> ChromaResult<LogicalExpr> {
    match Value::from_json(terminal) {
        Some(Value::String(name)) => Ok(LogicalExpr::Column(name)),
        Some(value) => Ok(LogicalExpr::Literal(value)),
        None => Err(ChromaError::internal(format!(
            "non-terminal node {terminal}"
        ))),
    }
}

fn single_entry<'a>(
    map: &'a Map<String, ConfigTree>,
    what: &str,
) -> ChromaResult<(&'a String, &'a ConfigTree)> {
    let mut iter = map.iter();
    match (iter.next(), iter.next()) {
        (Some(entry), None) => Ok(entry),
        (None, _) => config_err!("{what} is an empty mapping"),
        (Some(_), Some(_)) => {
            let keys = map.keys().cloned().collect::<Vec<_>>().join(", ");
            config_err!("{what} must have exactly one key, found [{keys}]")
        }
    }
}

fn options_body<T: DeserializeOwned + Default>(kind: &str, body: &ConfigTree) -> ChromaResult<T> {
    if body.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(body.clone())
        .map_err(|e| ChromaError::config(format!("invalid {kind}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::CountMode;
    use crate::{col, lit};
    use serde_json::json;

    #[test]
    fn test_terminals() {
        assert_eq!(parse_expression(&json!("color")).unwrap(), col("color"));
        assert_eq!(parse_expression(&json!(3)).unwrap(), lit(3));
        assert_eq!(parse_expression(&json!(24.5)).unwrap(), lit(24.5));
        assert_eq!(parse_expression(&json!(true)).unwrap(), lit(true));
        assert_eq!(
            parse_expression(&json!(null)).unwrap(),
            LogicalExpr::Literal(Value::Null)
        );
    }

    #[test]
    fn test_list_operands_parse_recursively() {
        let tree = json!({"and": [
            {"greater": ["color", 0]},
            {"less": ["imag", 24.5]},
            {"is_valid": "redshift"}
        ]});
        let expr = parse_expression(&tree).unwrap();
        let expected = LogicalExpr::call(
            ScalarFunc::And,
            vec![
                col("color").gt(lit(0)),
                col("imag").lt(lit(24.5)),
                LogicalExpr::call(ScalarFunc::IsValid, vec![col("redshift")]),
            ],
        );
        assert_eq!(expr, expected);
        assert_eq!(
            expr.to_string(),
            "and(greater(color, 0), less(imag, 24.5), is_valid(redshift))"
        );
    }

    #[test]
    fn test_field_and_scalar() {
        assert_eq!(parse_expression(&json!({"field": "x"})).unwrap(), col("x"));
        assert_eq!(parse_expression(&json!({"field": ["x"]})).unwrap(), col("x"));
        assert_eq!(
            parse_expression(&json!({"equal": ["band", {"scalar": "r"}]})).unwrap(),
            col("band").eq(lit("r"))
        );
        assert_eq!(
            parse_expression(&json!({"scalar": ["r"]})).unwrap(),
            lit("r")
        );
        assert!(parse_expression(&json!({"field": 3})).unwrap_err().is_config());
    }

    #[test]
    fn test_unary_operand_is_not_parsed() {
        let err = parse_expression(&json!({"invert": {"is_null": "x"}})).unwrap_err();
        assert!(err.is_config());

        let ok = parse_expression(&json!({"invert": [{"is_null": "x"}]})).unwrap();
        assert_eq!(
            ok,
            LogicalExpr::call(ScalarFunc::IsNull, vec![col("x")]).not()
        );
    }

    #[test]
    fn test_rejects_malformed_nodes() {
        let err = parse_expression(&json!({"frobnicate": ["x", 1]})).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("frobnicate"));

        assert!(parse_expression(&json!({})).unwrap_err().is_config());
        assert!(parse_expression(&json!({"greater": ["a", 1], "less": ["b", 2]}))
            .unwrap_err()
            .is_config());
        assert!(parse_expression(&json!({"greater": ["a"]}))
            .unwrap_err()
            .is_config());
        assert!(parse_expression(&json!({"and": ["a"]}))
            .unwrap_err()
            .is_config());
        assert!(parse_expression(&json!({"greater": "a"}))
            .unwrap_err()
            .is_config());
        assert!(parse_expression(&json!(["a", "b"])).unwrap_err().is_config());
    }

    #[test]
    fn test_predicate_absent() {
        assert_eq!(parse_predicate(None).unwrap(), None);
        let tree = json!({"greater": ["color", 0]});
        assert!(parse_predicate(Some(&tree)).unwrap().is_some());
    }

    #[test]
    fn test_projection() {
        let entries = vec![
            json!("color"),
            json!({"g_i": {"subtract": ["g", "i"]}}),
            json!({"color": {"multiply": ["color", 2]}}),
        ];
        let p = parse_projection(&entries).unwrap();
        assert_eq!(p.names(), vec!["color", "g_i"]);
        assert_eq!(
            p.get("color"),
            Some(&LogicalExpr::call(ScalarFunc::Multiply, vec![col("color"), lit(2)]))
        );

        assert!(parse_projection(&[json!(5)]).unwrap_err().is_config());
        assert!(parse_projection(&[json!({"a": "x", "b": "y"})])
            .unwrap_err()
            .is_config());
        assert!(parse_projection(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_options() {
        assert_eq!(parse_options(None).unwrap(), None);

        let opts = parse_options(Some(&json!({"CountOptions": {"mode": "all"}}))).unwrap();
        assert_eq!(
            opts,
            Some(AggOptions::Count(CountOptions {
                mode: CountMode::All
            }))
        );

        let opts = parse_options(Some(&json!({"ScalarAggregateOptions": {"skip_nulls": false}})))
            .unwrap();
        assert_eq!(
            opts,
            Some(AggOptions::ScalarAggregate(ScalarAggregateOptions {
                skip_nulls: false,
                min_count: 1
            }))
        );

        let opts = parse_options(Some(&json!({"VarianceOptions": null}))).unwrap();
        assert_eq!(opts, Some(AggOptions::Variance(VarianceOptions::default())));

        assert!(parse_options(Some(&json!({"FancyOptions": {}})))
            .unwrap_err()
            .is_config());
        assert!(parse_options(Some(&json!({"CountOptions": {"bogus": 1}})))
            .unwrap_err()
            .is_config());
        assert!(parse_options(Some(&json!({"CountOptions": {"mode": "sometimes"}})))
            .unwrap_err()
            .is_config());
    }

    #[test]
    fn test_aggregate() {
        let cfg = AggregateConfig::new("color", "min", "min_color");
        let agg = parse_aggregate(&cfg).unwrap();
        assert_eq!(agg, AggExpr::new(AggFunc::Min, "color", "min_color"));

        let cfg = AggregateConfig::count_all("count");
        assert_eq!(parse_aggregate(&cfg).unwrap(), AggExpr::count_all("count"));

        let mut cfg = AggregateConfig::new("color", "min", "min_color");
        cfg.input = None;
        assert!(parse_aggregate(&cfg).unwrap_err().is_config());

        let cfg = AggregateConfig::new("color", "median", "m");
        assert!(parse_aggregate(&cfg).unwrap_err().is_config());

        let cfg = AggregateConfig::new("color", "min", "m")
            .with_options(json!({"CountOptions": {"mode": "all"}}));
        assert!(parse_aggregate(&cfg).unwrap_err().is_config());
    }
}
