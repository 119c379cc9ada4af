//! `OData` URL literal encoding.
//!
//! Keys, function parameters and parameter aliases all end up inside the URL as
//! literals: strings are single-quoted with embedded quotes doubled, numbers,
//! booleans and `null` are written bare.

use serde_json::Value;

use crate::error::{Error, Result};

/// Quote a string as an `OData` string literal (`O'Neil` becomes `'O''Neil'`).
#[must_use]
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Encode a scalar JSON value as a URL literal.
///
/// # Errors
/// Returns `Error::Encoding` for arrays and objects, which have no scalar form.
pub fn encode(value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok("null".to_owned()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(quote(s)),
        Value::Array(_) | Value::Object(_) => Err(Error::encoding(format!(
            "expected a scalar literal, got {value}"
        ))),
    }
}

/// Encode a function-call parameter.
///
/// Scalars use [`encode`]; collections and complex values are written in their
/// JSON form, which is what servers accept inside call syntax.
///
/// # Errors
/// Returns `Error::Encoding` if a complex value cannot be rendered as JSON.
pub fn encode_parameter(value: &Value) -> Result<String> {
    match value {
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string(value).map_err(|e| Error::encoding(e.to_string()))
        }
        _ => encode(value),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strings_are_quoted_and_escaped() {
        assert_eq!(encode(&json!("O'Neil")).unwrap(), "'O''Neil'");
        assert_eq!(encode(&json!("plain")).unwrap(), "'plain'");
    }

    #[test]
    fn scalars_are_bare() {
        assert_eq!(encode(&json!(42)).unwrap(), "42");
        assert_eq!(encode(&json!(1.5)).unwrap(), "1.5");
        assert_eq!(encode(&json!(true)).unwrap(), "true");
        assert_eq!(encode(&Value::Null).unwrap(), "null");
    }

    #[test]
    fn composite_values_are_rejected_as_keys() {
        assert!(matches!(encode(&json!([1, 2])), Err(Error::Encoding(_))));
        assert!(matches!(encode(&json!({"a": 1})), Err(Error::Encoding(_))));
    }

    #[test]
    fn parameters_accept_collections() {
        assert_eq!(encode_parameter(&json!([1, 2])).unwrap(), "[1,2]");
        assert_eq!(encode_parameter(&json!("x")).unwrap(), "'x'");
    }
}
