//! `$filter` and `$apply` values.
//!
//! A filter is either a raw string passed through untouched, a structured
//! [`Expr`](crate::ast::Expr) tree, or a JSON object in the widely used
//! "query object" shape:
//!
//! ```text
//! {"Price": {"gt": 10}, "Name": "Milk"}        -> Price gt 10 and Name eq 'Milk'
//! {"or": [{"Id": 1}, {"Id": 2}]}               -> ((Id eq 1) or (Id eq 2))
//! {"Category": {"Name": {"startswith": "B"}}}  -> startswith(Category/Name,'B')
//! ```
//!
//! Rendering goes through an [`ExpressionEncoder`] so callers can plug their own
//! dialect in; [`StandardEncoder`] implements the rules above.

use std::fmt;

use serde_json::{Map, Value};

use crate::ast::{CompareOperator, Expr};
use crate::error::{Error, Result};
use crate::literal;

#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    Raw(String),
    Expr(Expr),
    Json(Value),
}

impl Filter {
    /// A filter with nothing to render is treated as absent by `QueryOptions`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Filter::Raw(s) => s.trim().is_empty(),
            Filter::Expr(_) => false,
            Filter::Json(v) => match v {
                Value::Null => true,
                Value::String(s) => s.trim().is_empty(),
                Value::Array(a) => a.is_empty(),
                Value::Object(o) => o.is_empty(),
                _ => false,
            },
        }
    }
}

impl From<&str> for Filter {
    fn from(s: &str) -> Self {
        Filter::Raw(s.to_owned())
    }
}

impl From<String> for Filter {
    fn from(s: String) -> Self {
        Filter::Raw(s)
    }
}

impl From<Expr> for Filter {
    fn from(e: Expr) -> Self {
        Filter::Expr(e)
    }
}

impl From<Value> for Filter {
    fn from(v: Value) -> Self {
        Filter::Json(v)
    }
}

/// Aggregation method accepted inside `aggregate(...)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateMethod {
    Sum,
    Min,
    Max,
    Average,
    CountDistinct,
}

impl fmt::Display for AggregateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AggregateMethod::Sum => "sum",
            AggregateMethod::Min => "min",
            AggregateMethod::Max => "max",
            AggregateMethod::Average => "average",
            AggregateMethod::CountDistinct => "countdistinct",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Aggregate {
    pub property: String,
    pub with: AggregateMethod,
    pub alias: String,
}

impl Aggregate {
    pub fn new(property: impl Into<String>, with: AggregateMethod, alias: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            with,
            alias: alias.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GroupBy {
    pub properties: Vec<String>,
    pub transform: Option<Box<Transform>>,
}

impl GroupBy {
    pub fn new<I, S>(properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            properties: properties.into_iter().map(Into::into).collect(),
            transform: None,
        }
    }

    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }
}

/// One `$apply` transformation, or a `/`-separated sequence of them.
#[derive(Clone, Debug, PartialEq)]
pub enum Transform {
    Raw(String),
    Aggregate(Vec<Aggregate>),
    Filter(Filter),
    GroupBy(GroupBy),
    Sequence(Vec<Transform>),
}

impl Transform {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Transform::Raw(s) => s.trim().is_empty(),
            Transform::Aggregate(a) => a.is_empty(),
            Transform::Filter(f) => f.is_empty(),
            Transform::GroupBy(g) => g.properties.is_empty(),
            Transform::Sequence(s) => s.iter().all(Transform::is_empty),
        }
    }
}

/// Renders filter values and `$apply` transformations into their wire form.
pub trait ExpressionEncoder: Send + Sync {
    /// # Errors
    /// Returns `Error::Encoding` when the filter has an unsupported shape.
    fn encode_filter(&self, filter: &Filter) -> Result<String>;

    /// # Errors
    /// Returns `Error::Encoding` when a nested filter cannot be rendered.
    fn encode_transform(&self, transform: &Transform) -> Result<String> {
        match transform {
            Transform::Raw(s) => Ok(s.clone()),
            Transform::Aggregate(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|a| format!("{} with {} as {}", a.property, a.with, a.alias))
                    .collect();
                Ok(format!("aggregate({})", parts.join(",")))
            }
            Transform::Filter(f) => Ok(format!("filter({})", self.encode_filter(f)?)),
            Transform::GroupBy(g) => self.encode_group_by(g),
            Transform::Sequence(steps) => {
                let mut parts = Vec::with_capacity(steps.len());
                for step in steps.iter().filter(|s| !s.is_empty()) {
                    parts.push(self.encode_transform(step)?);
                }
                Ok(parts.join("/"))
            }
        }
    }

    /// # Errors
    /// Returns `Error::Encoding` when the nested transformation cannot be rendered.
    fn encode_group_by(&self, group_by: &GroupBy) -> Result<String> {
        let props = group_by.properties.join(",");
        match group_by.transform.as_deref() {
            Some(t) if !t.is_empty() => {
                Ok(format!("groupby(({props}),{})", self.encode_transform(t)?))
            }
            _ => Ok(format!("groupby(({props}))")),
        }
    }
}

/// Default encoder: raw strings verbatim, expressions via `Display`, JSON
/// objects with the comparison/function/logical rules described at module level.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardEncoder;

const LOGICAL_OPERATORS: [&str; 3] = ["and", "or", "not"];
const STRING_FUNCTIONS: [&str; 3] = ["contains", "startswith", "endswith"];

impl ExpressionEncoder for StandardEncoder {
    fn encode_filter(&self, filter: &Filter) -> Result<String> {
        match filter {
            Filter::Raw(s) => Ok(s.clone()),
            Filter::Expr(e) => Ok(e.to_string()),
            Filter::Json(v) => json_filter(v, None),
        }
    }
}

fn json_filter(value: &Value, prefix: Option<&str>) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Array(items) => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                let built = json_filter(item, prefix)?;
                if !built.is_empty() {
                    parts.push(built);
                }
            }
            Ok(parts.join(" and "))
        }
        Value::Object(map) => json_object_filter(map, prefix),
        other => Err(Error::encoding(format!(
            "filter must be a string, object or array, got {other}"
        ))),
    }
}

fn json_object_filter(map: &Map<String, Value>, prefix: Option<&str>) -> Result<String> {
    let mut clauses = Vec::new();
    for (key, value) in map {
        let lowered = key.to_ascii_lowercase();
        if LOGICAL_OPERATORS.contains(&lowered.as_str()) {
            if let Some(clause) = logical_clause(&lowered, value, prefix)? {
                clauses.push(clause);
            }
            continue;
        }
        let property = match prefix {
            Some(p) => format!("{p}/{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(ops) => {
                for (op, operand) in ops {
                    clauses.push(operator_clause(&property, op, operand)?);
                }
            }
            Value::Array(_) => {
                return Err(Error::encoding(format!(
                    "filter on '{property}' needs an operator for a collection value"
                )));
            }
            scalar => clauses.push(format!("{property} eq {}", literal::encode(scalar)?)),
        }
    }
    Ok(clauses.join(" and "))
}

fn logical_clause(op: &str, value: &Value, prefix: Option<&str>) -> Result<Option<String>> {
    let operands: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    let mut built = Vec::with_capacity(operands.len());
    for operand in operands {
        let f = json_filter(operand, prefix)?;
        if !f.is_empty() {
            built.push(format!("({f})"));
        }
    }
    if built.is_empty() {
        return Ok(None);
    }
    if op == "not" {
        return Ok(Some(format!("not{}", built.join(" and "))));
    }
    Ok(Some(format!("({})", built.join(&format!(" {op} ")))))
}

fn operator_clause(property: &str, op: &str, operand: &Value) -> Result<String> {
    let lowered = op.to_ascii_lowercase();
    if let Some(cmp) = CompareOperator::from_keyword(&lowered) {
        return Ok(format!("{property} {cmp} {}", literal::encode(operand)?));
    }
    if STRING_FUNCTIONS.contains(&lowered.as_str()) {
        return Ok(format!("{lowered}({property},{})", literal::encode(operand)?));
    }
    if lowered == "in" {
        let Value::Array(items) = operand else {
            return Err(Error::encoding(format!(
                "'in' on '{property}' expects an array"
            )));
        };
        let mut encoded = Vec::with_capacity(items.len());
        for item in items {
            encoded.push(literal::encode(item)?);
        }
        return Ok(format!("{property} in ({})", encoded.join(",")));
    }
    // Anything else is a nested property path.
    let mut nested = Map::new();
    nested.insert(op.to_owned(), operand.clone());
    json_object_filter(&nested, Some(property))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(v: Value) -> String {
        StandardEncoder.encode_filter(&Filter::Json(v)).unwrap()
    }

    #[test]
    fn object_comparison() {
        assert_eq!(encode(json!({"Price": {"gt": 10}})), "Price gt 10");
    }

    #[test]
    fn scalar_members_mean_equality_and_are_anded() {
        assert_eq!(
            encode(json!({"Name": "Milk", "Price": {"lt": 5}})),
            "Name eq 'Milk' and Price lt 5"
        );
    }

    #[test]
    fn logical_operators_wrap_operands() {
        assert_eq!(
            encode(json!({"or": [{"Id": 1}, {"Id": 2}]})),
            "((Id eq 1) or (Id eq 2))"
        );
        assert_eq!(encode(json!({"not": {"Id": 1}})), "not(Id eq 1)");
    }

    #[test]
    fn nested_properties_use_path_syntax() {
        assert_eq!(
            encode(json!({"Category": {"Name": {"startswith": "B"}}})),
            "startswith(Category/Name,'B')"
        );
    }

    #[test]
    fn in_operator() {
        assert_eq!(encode(json!({"Id": {"in": [1, 2]}})), "Id in (1,2)");
    }

    #[test]
    fn arrays_at_top_level_are_anded() {
        assert_eq!(
            encode(json!(["Price gt 1", {"Stock": 0}])),
            "Price gt 1 and Stock eq 0"
        );
    }

    #[test]
    fn unsupported_shapes_fail() {
        let err = StandardEncoder
            .encode_filter(&Filter::Json(json!(42)))
            .unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
        let err = StandardEncoder
            .encode_filter(&Filter::Json(json!({"Id": {"in": 3}})))
            .unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
    }

    #[test]
    fn transforms() {
        let t = Transform::Sequence(vec![
            Transform::Filter(Filter::Raw("Amount gt 0".into())),
            Transform::GroupBy(GroupBy::new(["Country"]).with_transform(Transform::Aggregate(
                vec![Aggregate::new("Amount", AggregateMethod::Sum, "Total")],
            ))),
        ]);
        assert_eq!(
            StandardEncoder.encode_transform(&t).unwrap(),
            "filter(Amount gt 0)/groupby((Country),aggregate(Amount with sum as Total))"
        );
        assert_eq!(
            StandardEncoder
                .encode_group_by(&GroupBy::new(["A", "B"]))
                .unwrap(),
            "groupby((A,B))"
        );
    }
}
