//! Filter expression tree.
//!
//! Structured `$filter` expressions are built as an [`Expr`] tree and rendered to
//! `OData` syntax through `Display`. Identifiers are written verbatim, which also
//! lets callers reference parameter aliases (`@name`) from inside an expression.

use std::fmt;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::literal;

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare(Box<Expr>, CompareOperator, Box<Expr>),
    In(Box<Expr>, Vec<Expr>),
    Function(String, Vec<Expr>),
    Identifier(String),
    Value(Value),
}

impl Expr {
    /// Reference a property (or a `/`-separated property path).
    pub fn field(name: impl Into<String>) -> Expr {
        Expr::Identifier(name.into())
    }

    /// Reference a parameter alias declared with `QueryOptions::alias`.
    pub fn alias(name: &str) -> Expr {
        Expr::Identifier(format!("@{}", name.trim_start_matches('@')))
    }

    pub fn value(v: impl Into<Value>) -> Expr {
        Expr::Value(v.into())
    }

    /// Combine two expressions with AND: `expr1 and expr2`
    #[must_use]
    pub fn and(self, other: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(other))
    }

    /// Combine two expressions with OR: `expr1 or expr2`
    #[must_use]
    pub fn or(self, other: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(other))
    }

    /// Negate an expression: `not expr`
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Expr {
        !self
    }

    #[must_use]
    pub fn compare(self, op: CompareOperator, rhs: impl Into<Value>) -> Expr {
        Expr::Compare(Box::new(self), op, Box::new(Expr::Value(rhs.into())))
    }

    #[must_use]
    pub fn eq(self, rhs: impl Into<Value>) -> Expr {
        self.compare(CompareOperator::Eq, rhs)
    }

    #[must_use]
    pub fn ne(self, rhs: impl Into<Value>) -> Expr {
        self.compare(CompareOperator::Ne, rhs)
    }

    #[must_use]
    pub fn gt(self, rhs: impl Into<Value>) -> Expr {
        self.compare(CompareOperator::Gt, rhs)
    }

    #[must_use]
    pub fn ge(self, rhs: impl Into<Value>) -> Expr {
        self.compare(CompareOperator::Ge, rhs)
    }

    #[must_use]
    pub fn lt(self, rhs: impl Into<Value>) -> Expr {
        self.compare(CompareOperator::Lt, rhs)
    }

    #[must_use]
    pub fn le(self, rhs: impl Into<Value>) -> Expr {
        self.compare(CompareOperator::Le, rhs)
    }

    #[must_use]
    pub fn is_in<I, V>(self, values: I) -> Expr
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Expr::In(
            Box::new(self),
            values.into_iter().map(|v| Expr::Value(v.into())).collect(),
        )
    }

    #[must_use]
    pub fn contains(self, needle: impl Into<String>) -> Expr {
        self.string_fn("contains", needle.into())
    }

    #[must_use]
    pub fn startswith(self, prefix: impl Into<String>) -> Expr {
        self.string_fn("startswith", prefix.into())
    }

    #[must_use]
    pub fn endswith(self, suffix: impl Into<String>) -> Expr {
        self.string_fn("endswith", suffix.into())
    }

    fn string_fn(self, name: &str, arg: String) -> Expr {
        Expr::Function(name.to_owned(), vec![self, Expr::Value(Value::String(arg))])
    }

    /// Operands that need no parentheses under a prefix operator.
    fn is_atom(&self) -> bool {
        matches!(self, Expr::Identifier(_) | Expr::Value(_) | Expr::Function(..))
    }
}

impl std::ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Self::Output {
        Expr::Not(Box::new(self))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::And(a, b) => {
                // `and` binds tighter than `or`
                let wrap = |e: &Expr| {
                    if matches!(e, Expr::Or(..)) {
                        format!("({e})")
                    } else {
                        e.to_string()
                    }
                };
                write!(f, "{} and {}", wrap(a), wrap(b))
            }
            Expr::Or(a, b) => write!(f, "{a} or {b}"),
            Expr::Not(inner) if inner.is_atom() => write!(f, "not {inner}"),
            Expr::Not(inner) => write!(f, "not ({inner})"),
            Expr::Compare(l, op, r) => write!(f, "{l} {op} {r}"),
            Expr::In(l, list) => {
                let items: Vec<String> = list.iter().map(ToString::to_string).collect();
                write!(f, "{l} in ({})", items.join(","))
            }
            Expr::Function(name, args) => {
                let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                write!(f, "{name}({})", args.join(","))
            }
            Expr::Identifier(name) => f.write_str(name),
            Expr::Value(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOperator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOperator {
    /// Look up an operator by its `OData` keyword (`eq`, `gt`, ...).
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "eq" => Some(CompareOperator::Eq),
            "ne" => Some(CompareOperator::Ne),
            "gt" => Some(CompareOperator::Gt),
            "ge" => Some(CompareOperator::Ge),
            "lt" => Some(CompareOperator::Lt),
            "le" => Some(CompareOperator::Le),
            _ => None,
        }
    }

    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            CompareOperator::Eq => "eq",
            CompareOperator::Ne => "ne",
            CompareOperator::Gt => "gt",
            CompareOperator::Ge => "ge",
            CompareOperator::Lt => "lt",
            CompareOperator::Le => "le",
        }
    }
}

impl fmt::Display for CompareOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(BigDecimal),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    String(String),
}

impl Value {
    /// Short name of the value's kind, used in diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Uuid(_) => "uuid",
            Value::DateTime(_) => "datetime",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::String(_) => "string",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Uuid(u) => write!(f, "{u}"),
            Value::DateTime(dt) => f.write_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            Value::String(s) => f.write_str(&literal::quote(s)),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(BigDecimal::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(BigDecimal::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(BigDecimal::from(n))
    }
}

impl From<BigDecimal> for Value {
    fn from(n: BigDecimal) -> Self {
        Value::Number(n)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Uuid(u)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveTime> for Value {
    fn from(t: NaiveTime) -> Self {
        Value::Time(t)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
