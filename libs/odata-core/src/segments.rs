//! Ordered resource-path model.
//!
//! A path is a sequence of typed segments (`People(1)/Friends/NS.Manager/$count`).
//! Structural kinds (entity set, singleton, `$count`, `$ref`, `$value`) appear at
//! most once; navigation, property, cast and callable segments may repeat and are
//! appended in the order they are entered. Cloning is a structural deep copy.

use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;

pub use crate::ast::Value as KeyValue;
use crate::error::{Error, Result};
use crate::literal;

pub const PATH_SEPARATOR: char = '/';
pub const COUNT_SEGMENT: &str = "$count";
pub const REF_SEGMENT: &str = "$ref";
pub const VALUE_SEGMENT: &str = "$value";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    EntitySet,
    Singleton,
    TypeCast,
    NavigationProperty,
    Property,
    Action,
    Function,
    Count,
    Reference,
    Value,
}

impl SegmentKind {
    /// Kinds that may appear only once in a path.
    #[must_use]
    pub fn is_unique(self) -> bool {
        matches!(
            self,
            SegmentKind::EntitySet
                | SegmentKind::Singleton
                | SegmentKind::Count
                | SegmentKind::Reference
                | SegmentKind::Value
        )
    }

    /// Fixed wire name for `$count`, `$ref` and `$value`.
    #[must_use]
    pub fn constant(self) -> Option<&'static str> {
        match self {
            SegmentKind::Count => Some(COUNT_SEGMENT),
            SegmentKind::Reference => Some(REF_SEGMENT),
            SegmentKind::Value => Some(VALUE_SEGMENT),
            _ => None,
        }
    }

    #[must_use]
    pub fn accepts_key(self) -> bool {
        matches!(
            self,
            SegmentKind::EntitySet | SegmentKind::NavigationProperty
        )
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SegmentKind::EntitySet => "entity-set",
            SegmentKind::Singleton => "singleton",
            SegmentKind::TypeCast => "type-cast",
            SegmentKind::NavigationProperty => "navigation-property",
            SegmentKind::Property => "property",
            SegmentKind::Action => "action",
            SegmentKind::Function => "function",
            SegmentKind::Count => "count",
            SegmentKind::Reference => "reference",
            SegmentKind::Value => "value",
        })
    }
}

/// Entity identity: one scalar, or named members for composite keys.
#[derive(Clone, Debug, PartialEq)]
pub enum EntityKey {
    Single(KeyValue),
    Composite(Vec<(String, KeyValue)>),
}

impl EntityKey {
    pub fn single(value: impl Into<KeyValue>) -> Self {
        EntityKey::Single(value.into())
    }

    pub fn composite<I, K, V>(members: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<KeyValue>,
    {
        EntityKey::Composite(
            members
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a key from JSON: objects become composite keys in member order,
    /// scalars become single keys.
    ///
    /// # Errors
    /// Returns `Error::Encoding` for arrays, `null` or empty objects.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Object(map) if !map.is_empty() => {
                let mut members = Vec::with_capacity(map.len());
                for (name, v) in map {
                    members.push((name.clone(), key_value_from_json(v)?));
                }
                Ok(EntityKey::Composite(members))
            }
            serde_json::Value::Null
            | serde_json::Value::Array(_)
            | serde_json::Value::Object(_) => Err(Error::encoding(format!(
                "cannot use {value} as an entity key"
            ))),
            scalar => Ok(EntityKey::Single(key_value_from_json(scalar)?)),
        }
    }

    /// Reorder composite members to follow the declared key fields.
    /// Members not named in `fields` keep their relative order at the end.
    #[must_use]
    pub fn ordered_by<S: AsRef<str>>(self, fields: &[S]) -> Self {
        match self {
            EntityKey::Composite(mut members) => {
                members.sort_by_key(|(name, _)| {
                    fields
                        .iter()
                        .position(|f| f.as_ref() == name)
                        .unwrap_or(usize::MAX)
                });
                EntityKey::Composite(members)
            }
            single @ EntityKey::Single(_) => single,
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&KeyValue> {
        match self {
            EntityKey::Single(_) => None,
            EntityKey::Composite(members) => {
                members.iter().find(|(n, _)| n == name).map(|(_, v)| v)
            }
        }
    }

    /// Drop one member of a composite key.
    ///
    /// When exactly one member remains the key collapses to a single scalar,
    /// so `(a=1,b=2)` minus `b` serializes as `(1)`. Returns `None` once no
    /// member is left.
    #[must_use]
    pub fn without(self, name: &str) -> Option<EntityKey> {
        match self {
            EntityKey::Single(_) => None,
            EntityKey::Composite(mut members) => {
                members.retain(|(n, _)| n != name);
                match members.len() {
                    0 => None,
                    1 => members.pop().map(|(_, v)| EntityKey::Single(v)),
                    _ => Some(EntityKey::Composite(members)),
                }
            }
        }
    }

    /// Render the inside of the key parentheses: `1` or `a=1,b='x'`.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            EntityKey::Single(v) => v.to_string(),
            EntityKey::Composite(members) => members
                .iter()
                .map(|(n, v)| format!("{n}={v}"))
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.encode())
    }
}

macro_rules! key_from {
    ($($t:ty),*) => {
        $(impl From<$t> for EntityKey {
            fn from(v: $t) -> Self {
                EntityKey::Single(KeyValue::from(v))
            }
        })*
    };
}

key_from!(i32, i64, u64, &str, String, uuid::Uuid, BigDecimal);

/// Convert a JSON scalar into a key literal.
///
/// # Errors
/// Returns `Error::Encoding` for arrays and objects.
pub fn key_value_from_json(value: &serde_json::Value) -> Result<KeyValue> {
    match value {
        serde_json::Value::Null => Ok(KeyValue::Null),
        serde_json::Value::Bool(b) => Ok(KeyValue::Bool(*b)),
        serde_json::Value::Number(n) => BigDecimal::from_str(&n.to_string())
            .map(KeyValue::Number)
            .map_err(|e| Error::encoding(e.to_string())),
        serde_json::Value::String(s) => Ok(KeyValue::String(s.clone())),
        other => Err(Error::encoding(format!(
            "key members must be scalars, got {other}"
        ))),
    }
}

/// A function-call argument: an inline value or a reference to an alias.
#[derive(Clone, Debug, PartialEq)]
pub enum ParameterValue {
    Value(serde_json::Value),
    Alias(String),
}

impl From<serde_json::Value> for ParameterValue {
    fn from(v: serde_json::Value) -> Self {
        ParameterValue::Value(v)
    }
}

impl ParameterValue {
    fn encode(&self) -> Result<String> {
        match self {
            ParameterValue::Value(v) => literal::encode_parameter(v),
            ParameterValue::Alias(name) => Ok(format!("@{}", name.trim_start_matches('@'))),
        }
    }
}

/// Per-segment options. Only keys and call parameters are meaningful today.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SegmentOptions {
    pub key: Option<EntityKey>,
    pub parameters: Option<Vec<(String, ParameterValue)>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PathSegment {
    kind: SegmentKind,
    name: String,
    type_name: Option<String>,
    options: SegmentOptions,
}

impl PathSegment {
    pub fn new(kind: SegmentKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            type_name: None,
            options: SegmentOptions::default(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[must_use]
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn set_type(&mut self, type_name: Option<String>) -> &mut Self {
        self.type_name = type_name;
        self
    }

    #[must_use]
    pub fn options(&self) -> &SegmentOptions {
        &self.options
    }

    #[must_use]
    pub fn key(&self) -> Option<&EntityKey> {
        self.options.key.as_ref()
    }

    #[must_use]
    pub fn has_key(&self) -> bool {
        self.options.key.is_some()
    }

    /// # Errors
    /// Returns `Error::InvalidKeySegment` unless this is an entity-set or
    /// navigation-property segment.
    pub fn set_key(&mut self, key: EntityKey) -> Result<()> {
        if !self.kind.accepts_key() {
            return Err(Error::InvalidKeySegment { kind: self.kind });
        }
        self.options.key = Some(key);
        Ok(())
    }

    pub fn clear_key(&mut self) {
        self.options.key = None;
    }

    /// Remove one member of a composite key (see [`EntityKey::without`]).
    pub fn unset_key_member(&mut self, name: &str) {
        self.options.key = self.options.key.take().and_then(|k| k.without(name));
    }

    #[must_use]
    pub fn parameters(&self) -> Option<&[(String, ParameterValue)]> {
        self.options.parameters.as_deref()
    }

    pub fn set_parameters(&mut self, parameters: Vec<(String, ParameterValue)>) {
        self.options.parameters = Some(parameters);
    }

    /// # Errors
    /// Returns `Error::Encoding` if a call parameter has no URL form.
    pub fn encode(&self) -> Result<String> {
        if let Some(constant) = self.kind.constant() {
            return Ok(constant.to_owned());
        }
        if self.kind == SegmentKind::Function {
            let mut args = Vec::new();
            for (name, value) in self.parameters().unwrap_or_default() {
                args.push(format!("{name}={}", value.encode()?));
            }
            return Ok(format!("{}({})", self.name, args.join(",")));
        }
        match &self.options.key {
            Some(key) => Ok(format!("{}{key}", self.name)),
            None => Ok(self.name.clone()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PathSegments(Vec<PathSegment>);

impl PathSegments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A path holding a single root segment (entity set or singleton).
    #[must_use]
    pub fn root(kind: SegmentKind, name: &str, type_name: Option<String>) -> Self {
        let mut segment = PathSegment::new(kind, name);
        segment.set_type(type_name);
        Self(vec![segment])
    }

    /// Find-or-create a segment.
    ///
    /// Without a name the existing segment of that kind is returned; `$count`,
    /// `$ref` and `$value` are created on demand since their name is fixed.
    /// With a name, unique kinds are renamed in place (entity sets and singletons
    /// always sit first) and repeatable kinds are appended.
    ///
    /// # Errors
    /// Returns `Error::MissingSegment` when no name is given and no segment of
    /// that kind exists.
    pub fn segment(&mut self, kind: SegmentKind, name: Option<&str>) -> Result<&mut PathSegment> {
        let name = match (name, kind.constant()) {
            (_, Some(constant)) => Some(constant),
            (name, None) => name,
        };
        let Some(name) = name else {
            return self
                .0
                .iter_mut()
                .rev()
                .find(|s| s.kind == kind)
                .ok_or(Error::MissingSegment { kind });
        };

        if kind.is_unique()
            && let Some(idx) = self.0.iter().position(|s| s.kind == kind)
        {
            let seg = &mut self.0[idx];
            seg.name = name.to_owned();
            return Ok(seg);
        }
        let idx = if matches!(kind, SegmentKind::EntitySet | SegmentKind::Singleton) {
            self.0.insert(0, PathSegment::new(kind, name));
            0
        } else {
            self.0.push(PathSegment::new(kind, name));
            self.0.len() - 1
        };
        Ok(&mut self.0[idx])
    }

    /// Last segment of the given kind.
    #[must_use]
    pub fn find(&self, kind: SegmentKind) -> Option<&PathSegment> {
        self.0.iter().rev().find(|s| s.kind == kind)
    }

    #[must_use]
    pub fn has(&self, kind: SegmentKind) -> bool {
        self.0.iter().any(|s| s.kind == kind)
    }

    #[must_use]
    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    pub fn last_mut(&mut self) -> Option<&mut PathSegment> {
        self.0.last_mut()
    }

    /// Types bound along the chain, in path order.
    #[must_use]
    pub fn types(&self) -> Vec<&str> {
        self.0.iter().filter_map(PathSegment::type_name).collect()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &PathSegment> + '_ {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialize to the slash-joined resource path.
    ///
    /// # Errors
    /// Returns `Error::Encoding` if a function parameter cannot be encoded.
    pub fn path(&self) -> Result<String> {
        let mut parts = Vec::with_capacity(self.0.len());
        for segment in &self.0 {
            parts.push(segment.encode()?);
        }
        Ok(parts.join(&PATH_SEPARATOR.to_string()))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_and_composite_keys() {
        let mut segs = PathSegments::new();
        segs.segment(SegmentKind::EntitySet, Some("People"))
            .unwrap()
            .set_key(EntityKey::from("russell"))
            .unwrap();
        assert_eq!(segs.path().unwrap(), "People('russell')");

        let mut segs = PathSegments::new();
        segs.segment(SegmentKind::EntitySet, Some("OrderLines"))
            .unwrap()
            .set_key(EntityKey::composite([("OrderId", 1), ("Line", 2)]))
            .unwrap();
        assert_eq!(segs.path().unwrap(), "OrderLines(OrderId=1,Line=2)");
    }

    #[test]
    fn composite_key_follows_declared_order() {
        let key = EntityKey::from_json(&json!({"b": 2, "a": 1}))
            .unwrap()
            .ordered_by(&["a", "b"]);
        let mut segs = PathSegments::new();
        segs.segment(SegmentKind::EntitySet, Some("Name"))
            .unwrap()
            .set_key(key)
            .unwrap();
        assert_eq!(segs.path().unwrap(), "Name(a=1,b=2)");
    }

    #[test]
    fn unsetting_a_member_collapses_to_scalar() {
        let key = EntityKey::composite([("a", 1), ("b", 2)]);
        let key = key.without("b").unwrap();
        assert_eq!(key, EntityKey::single(1));
        assert!(key.without("a").is_none());
    }

    #[test]
    fn constant_and_cast_segments() {
        let mut segs = PathSegments::new();
        segs.segment(SegmentKind::EntitySet, Some("People")).unwrap();
        segs.segment(SegmentKind::TypeCast, Some("NS.Employee"))
            .unwrap();
        segs.segment(SegmentKind::Count, None).unwrap();
        assert_eq!(segs.path().unwrap(), "People/NS.Employee/$count");

        // unique kinds are not duplicated
        segs.segment(SegmentKind::Count, None).unwrap();
        assert_eq!(segs.len(), 3);
    }

    #[test]
    fn iteration_runs_both_ways() {
        let mut segs = PathSegments::new();
        segs.segment(SegmentKind::EntitySet, Some("People")).unwrap();
        segs.segment(SegmentKind::NavigationProperty, Some("Trips"))
            .unwrap();
        segs.segment(SegmentKind::Property, Some("Name")).unwrap();

        let innermost_navigable = segs
            .iter()
            .rev()
            .find(|s| s.kind() != SegmentKind::Property)
            .map(PathSegment::name);
        assert_eq!(innermost_navigable, Some("Trips"));
        assert_eq!(segs.iter().next().map(PathSegment::name), Some("People"));
    }

    #[test]
    fn entity_set_always_comes_first() {
        let mut segs = PathSegments::new();
        segs.segment(SegmentKind::NavigationProperty, Some("Friends"))
            .unwrap();
        segs.segment(SegmentKind::EntitySet, Some("People")).unwrap();
        assert_eq!(segs.path().unwrap(), "People/Friends");
    }

    #[test]
    fn navigation_segments_repeat() {
        let mut segs = PathSegments::new();
        segs.segment(SegmentKind::EntitySet, Some("People"))
            .unwrap()
            .set_key(EntityKey::from(1))
            .unwrap();
        segs.segment(SegmentKind::NavigationProperty, Some("Friends"))
            .unwrap()
            .set_key(EntityKey::from(2))
            .unwrap();
        segs.segment(SegmentKind::NavigationProperty, Some("Friends"))
            .unwrap();
        assert_eq!(segs.path().unwrap(), "People(1)/Friends(2)/Friends");
    }

    #[test]
    fn missing_segment_without_name() {
        let mut segs = PathSegments::new();
        let err = segs.segment(SegmentKind::EntitySet, None).unwrap_err();
        assert_eq!(
            err,
            Error::MissingSegment {
                kind: SegmentKind::EntitySet
            }
        );
    }

    #[test]
    fn keys_only_on_collections() {
        let mut segs = PathSegments::new();
        let err = segs
            .segment(SegmentKind::Property, Some("Name"))
            .unwrap()
            .set_key(EntityKey::from(1))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidKeySegment { .. }));
    }

    #[test]
    fn function_call_syntax() {
        let mut segs = PathSegments::new();
        segs.segment(SegmentKind::EntitySet, Some("Products")).unwrap();
        segs.segment(SegmentKind::Function, Some("NS.MostExpensive"))
            .unwrap()
            .set_parameters(vec![
                ("top".to_owned(), json!(3).into()),
                ("category".to_owned(), json!("Toys").into()),
                ("max".to_owned(), ParameterValue::Alias("max".to_owned())),
            ]);
        assert_eq!(
            segs.path().unwrap(),
            "Products/NS.MostExpensive(top=3,category='Toys',max=@max)"
        );
    }

    #[test]
    fn clone_is_deep() {
        let mut original = PathSegments::new();
        original
            .segment(SegmentKind::EntitySet, Some("People"))
            .unwrap();
        let mut copy = original.clone();
        copy.last_mut()
            .unwrap()
            .set_key(EntityKey::from(7))
            .unwrap();
        assert_eq!(original.path().unwrap(), "People");
        assert_eq!(copy.path().unwrap(), "People(7)");
    }

    #[test]
    fn types_follow_the_chain() {
        let mut segs = PathSegments::new();
        segs.segment(SegmentKind::EntitySet, Some("People"))
            .unwrap()
            .set_type(Some("NS.Person".to_owned()));
        segs.segment(SegmentKind::NavigationProperty, Some("Trips"))
            .unwrap()
            .set_type(Some("NS.Trip".to_owned()));
        assert_eq!(segs.types(), vec!["NS.Person", "NS.Trip"]);
    }
}
