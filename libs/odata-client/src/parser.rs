//! Type-name driven value conversion.
//!
//! A [`ParserRegistry`] maps declared type identifiers (`TripPin.Person`) to
//! [`Parser`]s. The client uses it to resolve entity keys, to find the type
//! behind a navigation or property name, and to convert values between the
//! wire form and the form handed to `serde`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use odata_core::EntityKey;
use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};

/// Wire flags applied while serializing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    pub ieee754_compatible: bool,
    pub string_as_enum: bool,
}

/// Converts values of one declared type.
pub trait Parser: Send + Sync + fmt::Debug {
    fn type_name(&self) -> &str;

    /// Declared key properties, in key order.
    fn key_fields(&self) -> &[String];

    /// Key of a (possibly partial) entity. One key field gives a scalar key,
    /// several give a composite key in declared order; a missing member gives
    /// `None`.
    fn resolve_key(&self, value: &Value) -> Option<EntityKey> {
        let fields = self.key_fields();
        let object = value.as_object()?;
        let mut members = Vec::with_capacity(fields.len());
        for field in fields {
            let member = object.get(field).filter(|v| !v.is_null())?;
            members.push((field.clone(), odata_core::segments::key_value_from_json(member).ok()?));
        }
        match members.len() {
            0 => None,
            1 => members.pop().map(|(_, v)| EntityKey::Single(v)),
            _ => Some(EntityKey::Composite(members)),
        }
    }

    /// Type identifier of a property or navigation property.
    fn property_type(&self, name: &str) -> Option<&str>;

    /// Local value to wire value.
    ///
    /// # Errors
    /// Returns `Error::Parser` when the value does not fit the declared type.
    fn serialize(
        &self,
        value: &Value,
        options: SerializeOptions,
        registry: &ParserRegistry,
    ) -> Result<Value>;

    /// Wire value to local value.
    ///
    /// # Errors
    /// Returns `Error::Parser` when the value does not fit the declared type.
    fn parse(&self, value: Value, registry: &ParserRegistry) -> Result<Value>;
}

/// Declared shape of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    Boolean,
    Int32,
    Int64,
    Decimal,
    Double,
    Guid,
    DateTimeOffset,
    Date,
    /// Enum members and their numeric values; `flags` allows combinations
    Enum { members: Vec<(String, i64)>, flags: bool },
    /// Complex or related entity type, converted through the registry
    Related(String),
    Collection(Box<FieldKind>),
}

/// Declarative parser: key fields plus a field table.
#[derive(Debug, Clone, Default)]
pub struct EntityParser {
    type_name: String,
    keys: Vec<String>,
    fields: BTreeMap<String, FieldKind>,
}

impl EntityParser {
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn key<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.insert(name.into(), kind);
        self
    }

    fn error(&self, field: &str, reason: impl fmt::Display) -> Error {
        Error::parser(&self.type_name, format!("field '{field}': {reason}"))
    }

    fn serialize_field(
        &self,
        field: &str,
        kind: &FieldKind,
        value: &Value,
        options: SerializeOptions,
        registry: &ParserRegistry,
    ) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match kind {
            FieldKind::Int64 | FieldKind::Decimal if options.ieee754_compatible => match value {
                Value::Number(n) => Ok(Value::String(n.to_string())),
                other => Ok(other.clone()),
            },
            FieldKind::Enum { members, flags } => {
                let names = enum_names(value).ok_or_else(|| {
                    self.error(field, format!("{value} is not an enum member"))
                })?;
                if names.len() > 1 && !flags {
                    return Err(self.error(field, "only flag enums accept several members"));
                }
                if options.string_as_enum {
                    return Ok(Value::String(names.join(", ")));
                }
                let mut total = 0i64;
                for name in &names {
                    let (_, v) = members
                        .iter()
                        .find(|(m, _)| m == name)
                        .ok_or_else(|| self.error(field, format!("unknown member '{name}'")))?;
                    total |= v;
                }
                Ok(Value::from(total))
            }
            FieldKind::Related(type_name) => {
                registry.serialize(Some(type_name.as_str()), value, options)
            }
            FieldKind::Collection(inner) => match value {
                Value::Array(items) => items
                    .iter()
                    .map(|item| self.serialize_field(field, inner, item, options, registry))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Array),
                other => Err(self.error(field, format!("expected an array, got {other}"))),
            },
            _ => Ok(value.clone()),
        }
    }

    fn parse_field(
        &self,
        field: &str,
        kind: &FieldKind,
        value: Value,
        registry: &ParserRegistry,
    ) -> Result<Value> {
        match (kind, value) {
            (FieldKind::Int64, Value::String(s)) => s
                .parse::<i64>()
                .map(Value::from)
                .map_err(|e| self.error(field, e)),
            (FieldKind::Decimal, Value::String(s)) => s
                .parse::<Number>()
                .map(Value::Number)
                .map_err(|e| self.error(field, e)),
            (FieldKind::Enum { members, flags }, Value::Number(n)) => {
                let raw = n
                    .as_i64()
                    .ok_or_else(|| self.error(field, format!("{n} is not an enum value")))?;
                let names: Vec<&str> = if *flags {
                    members
                        .iter()
                        .filter(|(_, v)| *v != 0 && raw & v == *v)
                        .map(|(m, _)| m.as_str())
                        .collect()
                } else {
                    members
                        .iter()
                        .filter(|(_, v)| *v == raw)
                        .map(|(m, _)| m.as_str())
                        .collect()
                };
                if names.is_empty() {
                    return Err(self.error(field, format!("{raw} matches no member")));
                }
                Ok(Value::String(names.join(", ")))
            }
            (FieldKind::Related(type_name), value) => registry.parse(Some(type_name.as_str()), value),
            (FieldKind::Collection(inner), Value::Array(items)) => items
                .into_iter()
                .map(|item| self.parse_field(field, inner, item, registry))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            (_, value) => Ok(value),
        }
    }
}

fn enum_names(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(
            s.split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_owned)
                .collect(),
        ),
        Value::Array(items) => items
            .iter()
            .map(|i| i.as_str().map(str::to_owned))
            .collect(),
        _ => None,
    }
}

impl Parser for EntityParser {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn key_fields(&self) -> &[String] {
        &self.keys
    }

    fn property_type(&self, name: &str) -> Option<&str> {
        let mut kind = self.fields.get(name)?;
        while let FieldKind::Collection(inner) = kind {
            kind = inner;
        }
        match kind {
            FieldKind::Related(type_name) => Some(type_name.as_str()),
            _ => None,
        }
    }

    fn serialize(
        &self,
        value: &Value,
        options: SerializeOptions,
        registry: &ParserRegistry,
    ) -> Result<Value> {
        let Value::Object(object) = value else {
            return Ok(value.clone());
        };
        let mut out = Map::with_capacity(object.len());
        for (name, member) in object {
            let converted = match self.fields.get(name) {
                Some(kind) => self.serialize_field(name, kind, member, options, registry)?,
                None => member.clone(),
            };
            out.insert(name.clone(), converted);
        }
        Ok(Value::Object(out))
    }

    fn parse(&self, value: Value, registry: &ParserRegistry) -> Result<Value> {
        let Value::Object(object) = value else {
            return Ok(value);
        };
        let mut out = Map::with_capacity(object.len());
        for (name, member) in object {
            let converted = match self.fields.get(&name) {
                Some(kind) => self.parse_field(&name, kind, member, registry)?,
                None => member,
            };
            out.insert(name, converted);
        }
        Ok(Value::Object(out))
    }
}

/// Parsers by type identifier, plus the invocation path of callables.
#[derive(Debug, Clone, Default)]
pub struct ParserRegistry {
    parsers: BTreeMap<String, Arc<dyn Parser>>,
    callables: BTreeMap<String, String>,
}

impl ParserRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, parser: impl Parser + 'static) -> &mut Self {
        self.parsers
            .insert(parser.type_name().to_owned(), Arc::new(parser));
        self
    }

    /// Declare the path under which a bound or unbound callable is invoked,
    /// e.g. `TripPin.GetNearestAirport` at `GetNearestAirport`.
    pub fn callable(&mut self, type_name: impl Into<String>, path: impl Into<String>) -> &mut Self {
        self.callables.insert(type_name.into(), path.into());
        self
    }

    #[must_use]
    pub fn get(&self, type_name: &str) -> Option<&Arc<dyn Parser>> {
        self.parsers.get(type_name)
    }

    /// Parser of the type behind `property` on `type_name`.
    #[must_use]
    pub fn parser_for(&self, type_name: &str, property: &str) -> Option<&Arc<dyn Parser>> {
        self.property_type(type_name, property)
            .and_then(|t| self.parsers.get(t))
    }

    #[must_use]
    pub fn property_type(&self, type_name: &str, property: &str) -> Option<&str> {
        self.get(type_name)?.property_type(property)
    }

    /// Invocation path of a callable; unknown callables use their own name.
    #[must_use]
    pub fn resolve_callable_path(&self, type_name: &str) -> String {
        self.callables
            .get(type_name)
            .cloned()
            .unwrap_or_else(|| type_name.to_owned())
    }

    #[must_use]
    pub fn resolve_key(&self, type_name: Option<&str>, value: &Value) -> Option<EntityKey> {
        self.get(type_name?)?.resolve_key(value)
    }

    #[must_use]
    pub fn key_fields(&self, type_name: Option<&str>) -> Option<&[String]> {
        type_name
            .and_then(|t| self.get(t))
            .map(|p| p.key_fields())
    }

    /// Serialize through the parser of `type_name`; arrays are converted item
    /// by item and unknown types pass through untouched.
    ///
    /// # Errors
    /// Returns `Error::Parser` when the parser rejects the value.
    pub fn serialize(
        &self,
        type_name: Option<&str>,
        value: &Value,
        options: SerializeOptions,
    ) -> Result<Value> {
        let Some(parser) = type_name.and_then(|t| self.get(t)) else {
            return Ok(value.clone());
        };
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| parser.serialize(item, options, self))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => parser.serialize(other, options, self),
        }
    }

    /// # Errors
    /// Returns `Error::Parser` when the parser rejects the value.
    pub fn parse(&self, type_name: Option<&str>, value: Value) -> Result<Value> {
        let Some(parser) = type_name.and_then(|t| self.get(t)) else {
            return Ok(value);
        };
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| parser.parse(item, self))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => parser.parse(other, self),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> ParserRegistry {
        let mut registry = ParserRegistry::new();
        registry
            .register(
                EntityParser::new("Shop.Line")
                    .key(["OrderId", "LineNo"])
                    .field("Quantity", FieldKind::Int64)
                    .field("Price", FieldKind::Decimal),
            )
            .register(
                EntityParser::new("Shop.Order")
                    .key(["Id"])
                    .field("Id", FieldKind::Int64)
                    .field(
                        "Colors",
                        FieldKind::Enum {
                            members: vec![("Red".into(), 1), ("Green".into(), 2), ("Blue".into(), 4)],
                            flags: true,
                        },
                    )
                    .field("Lines", FieldKind::Collection(Box::new(FieldKind::Related("Shop.Line".into())))),
            )
            .callable("Shop.Checkout", "Shop.Checkout");
        registry
    }

    #[test]
    fn composite_key_in_declared_order() {
        let reg = registry();
        let key = reg
            .resolve_key(Some("Shop.Line"), &json!({"LineNo": 2, "OrderId": 7, "Price": 1}))
            .unwrap();
        assert_eq!(key.to_string(), "(OrderId=7,LineNo=2)");
        assert!(reg.resolve_key(Some("Shop.Line"), &json!({"LineNo": 2})).is_none());
    }

    #[test]
    fn single_key_is_scalar() {
        let key = registry().resolve_key(Some("Shop.Order"), &json!({"Id": 5})).unwrap();
        assert_eq!(key.to_string(), "(5)");
    }

    #[test]
    fn ieee754_serializes_int64_and_decimal_as_strings() {
        let reg = registry();
        let opts = SerializeOptions {
            ieee754_compatible: true,
            string_as_enum: true,
        };
        let wire = reg
            .serialize(
                Some("Shop.Order"),
                &json!({"Id": 9, "Colors": ["Red", "Blue"], "Lines": [{"Quantity": 3, "Price": 2.5}]}),
                opts,
            )
            .unwrap();
        assert_eq!(
            wire,
            json!({"Id": "9", "Colors": "Red, Blue", "Lines": [{"Quantity": "3", "Price": "2.5"}]})
        );
    }

    #[test]
    fn flag_enums_become_numbers_without_string_as_enum() {
        let wire = registry()
            .serialize(
                Some("Shop.Order"),
                &json!({"Colors": "Red, Green"}),
                SerializeOptions::default(),
            )
            .unwrap();
        assert_eq!(wire, json!({"Colors": 3}));
    }

    #[test]
    fn parse_restores_numbers_and_enum_names() {
        let local = registry()
            .parse(
                Some("Shop.Order"),
                json!({"Id": "12", "Colors": 5, "Lines": [{"Quantity": "4"}]}),
            )
            .unwrap();
        assert_eq!(
            local,
            json!({"Id": 12, "Colors": "Red, Blue", "Lines": [{"Quantity": 4}]})
        );
    }

    #[test]
    fn unknown_enum_member_is_an_error() {
        let err = registry()
            .serialize(Some("Shop.Order"), &json!({"Colors": "Pink"}), SerializeOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Parser { .. }));
    }

    #[test]
    fn lookups() {
        let reg = registry();
        assert_eq!(reg.property_type("Shop.Order", "Lines"), Some("Shop.Line"));
        assert_eq!(
            reg.parser_for("Shop.Order", "Lines").map(|p| p.type_name().to_owned()),
            Some("Shop.Line".to_owned())
        );
        assert_eq!(reg.resolve_callable_path("Shop.Checkout"), "Shop.Checkout");
        assert_eq!(reg.resolve_callable_path("Refresh"), "Refresh");
        assert_eq!(reg.parse(Some("Unknown"), json!(1)).unwrap(), json!(1));
    }
}
