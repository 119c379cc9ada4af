//! Response annotations and the typed envelopes built around them.

use http::header::{ETAG, HeaderMap};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::pager::PageCursor;

pub const ODATA_CONTEXT: &str = "@odata.context";
pub const ODATA_ETAG: &str = "@odata.etag";
pub const ODATA_COUNT: &str = "@odata.count";
pub const ODATA_NEXT_LINK: &str = "@odata.nextLink";
pub const ODATA_ID: &str = "@odata.id";

const VALUE_MEMBER: &str = "value";

/// Annotations of a single entity or property response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityAnnotations {
    pub context: Option<String>,
    pub etag: Option<String>,
}

impl EntityAnnotations {
    /// The etag comes from `@odata.etag`, falling back to the `ETag` header.
    #[must_use]
    pub fn from_response(body: Option<&Map<String, Value>>, headers: &HeaderMap) -> Self {
        let member = |name: &str| {
            body.and_then(|b| b.get(name))
                .and_then(Value::as_str)
                .map(str::to_owned)
        };
        Self {
            context: member(ODATA_CONTEXT),
            etag: member(ODATA_ETAG).or_else(|| {
                headers
                    .get(ETAG)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned)
            }),
        }
    }
}

/// Annotations of a collection response, including the paging cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitiesAnnotations {
    pub context: Option<String>,
    pub count: Option<u64>,
    pub skip: Option<u64>,
    pub skiptoken: Option<String>,
    pub top: Option<u64>,
    pub next_link: Option<String>,
}

impl EntitiesAnnotations {
    /// Read `@odata.count` and split `@odata.nextLink` into `skip`, `skiptoken`
    /// and `top`.
    ///
    /// # Errors
    /// Returns `Error::Core` when the next link query cannot be decoded or
    /// carries a non-numeric `$skip` or `$top`.
    pub fn from_body(body: &Map<String, Value>) -> Result<Self> {
        let mut annotations = Self {
            context: body
                .get(ODATA_CONTEXT)
                .and_then(Value::as_str)
                .map(str::to_owned),
            count: body.get(ODATA_COUNT).and_then(count_value),
            next_link: body
                .get(ODATA_NEXT_LINK)
                .and_then(Value::as_str)
                .map(str::to_owned),
            ..Self::default()
        };
        if let Some((_, query)) = annotations
            .next_link
            .as_deref()
            .and_then(|link| link.split_once('?'))
        {
            for (name, value) in odata_core::serialize::parse_query(query)? {
                match name.as_str() {
                    odata_core::options::SKIP => annotations.skip = Some(number(&name, &value)?),
                    odata_core::options::TOP => annotations.top = Some(number(&name, &value)?),
                    odata_core::options::SKIP_TOKEN => annotations.skiptoken = Some(value),
                    _ => {}
                }
            }
        }
        Ok(annotations)
    }

    /// Cursor for the next page. The skip token wins over a numeric skip.
    #[must_use]
    pub fn next_cursor(&self) -> Option<PageCursor> {
        let cursor = match (&self.skiptoken, self.skip) {
            (Some(token), _) => PageCursor::skiptoken(token.clone()),
            (None, Some(skip)) => PageCursor::skip(skip),
            (None, None) => return None,
        };
        Some(cursor.with_top(self.top))
    }
}

fn number(name: &str, value: &str) -> Result<u64> {
    value.parse::<u64>().map_err(|e| {
        odata_core::Error::InvalidParam {
            name: name.to_owned(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// `@odata.count` is a number, or a string under IEEE754 compatibility.
fn count_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// A single entity. `entity` is `None` when the server answered without a
/// body (e.g. `204 No Content` after an update).
#[derive(Debug, Clone, PartialEq)]
pub struct Entity<T> {
    pub entity: Option<T>,
    pub meta: EntityAnnotations,
}

/// One page of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Entities<T> {
    pub entities: Vec<T>,
    pub meta: EntitiesAnnotations,
}

/// The `value` member of a property response.
#[derive(Debug, Clone, PartialEq)]
pub struct Property<T> {
    pub value: Option<T>,
    pub meta: EntityAnnotations,
}

/// Split a collection body into its `value` items and annotations.
pub(crate) fn split_collection(body: Value) -> Result<(Vec<Value>, EntitiesAnnotations)> {
    let Value::Object(mut map) = body else {
        return Err(Error::UnexpectedResponse(
            "collection response is not a JSON object".to_owned(),
        ));
    };
    let meta = EntitiesAnnotations::from_body(&map)?;
    match map.remove(VALUE_MEMBER) {
        Some(Value::Array(items)) => Ok((items, meta)),
        Some(other) => Err(Error::UnexpectedResponse(format!(
            "collection 'value' member is not an array: {other}"
        ))),
        None => Err(Error::UnexpectedResponse(
            "collection response has no 'value' member".to_owned(),
        )),
    }
}

/// Take the `value` member of a property body; `null` reads as absent.
pub(crate) fn property_value(body: Option<Value>) -> Option<Value> {
    match body {
        Some(Value::Object(mut map)) => map.remove(VALUE_MEMBER).filter(|v| !v.is_null()),
        _ => None,
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http::header::HeaderValue;
    use serde_json::json;

    fn object(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn next_link_cursor_prefers_skiptoken() {
        let body = object(json!({
            "@odata.context": "$metadata#People",
            "@odata.count": 12,
            "@odata.nextLink": "https://svc/People?$skip=10&$skiptoken=abc",
            "value": []
        }));
        let meta = EntitiesAnnotations::from_body(&body).unwrap();
        assert_eq!(meta.count, Some(12));
        assert_eq!(meta.skip, Some(10));
        assert_eq!(meta.skiptoken.as_deref(), Some("abc"));
        assert_eq!(meta.next_cursor(), Some(PageCursor::skiptoken("abc")));
    }

    #[test]
    fn skip_only_cursor() {
        let body = object(json!({"@odata.nextLink": "People?$skip=2", "value": []}));
        let meta = EntitiesAnnotations::from_body(&body).unwrap();
        assert_eq!(meta.next_cursor(), Some(PageCursor::skip(2)));
    }

    #[test]
    fn next_link_top_rides_on_the_cursor() {
        let body = object(json!({"@odata.nextLink": "People?$top=1&$skip=2", "value": []}));
        let meta = EntitiesAnnotations::from_body(&body).unwrap();
        assert_eq!(meta.top, Some(1));
        assert_eq!(meta.next_cursor(), Some(PageCursor::skip(2).with_top(Some(1))));
    }

    #[test]
    fn non_numeric_next_link_top_is_rejected() {
        let body = object(json!({"@odata.nextLink": "People?$top=x&$skip=2", "value": []}));
        assert!(EntitiesAnnotations::from_body(&body).is_err());
    }

    #[test]
    fn no_next_link_means_no_cursor() {
        let body = object(json!({"@odata.count": "7", "value": []}));
        let meta = EntitiesAnnotations::from_body(&body).unwrap();
        assert_eq!(meta.count, Some(7));
        assert_eq!(meta.next_cursor(), None);
    }

    #[test]
    fn etag_falls_back_to_header() {
        let mut headers = HeaderMap::new();
        headers.insert(ETAG, HeaderValue::from_static("W/\"1\""));
        let meta = EntityAnnotations::from_response(None, &headers);
        assert_eq!(meta.etag.as_deref(), Some("W/\"1\""));

        let body = object(json!({"@odata.etag": "W/\"2\""}));
        let meta = EntityAnnotations::from_response(Some(&body), &headers);
        assert_eq!(meta.etag.as_deref(), Some("W/\"2\""));
    }

    #[test]
    fn collection_without_value_is_rejected() {
        assert!(matches!(
            split_collection(json!({"items": []})),
            Err(Error::UnexpectedResponse(_))
        ));
    }
}
