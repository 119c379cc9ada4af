//! Turning segments and options into a request path, parameters and URL.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::filter::ExpressionEncoder;
use crate::options::{
    QueryOptions, APPLY, COUNT, EXPAND, FILTER, FORMAT, ORDER_BY, SEARCH, SELECT, SKIP, SKIP_TOKEN,
    TOP,
};
use crate::segments::PathSegments;

pub const QUERY_SEPARATOR: char = '?';
pub const PARAM_SEPARATOR: char = '&';

/// Wire parameters in protocol order; aliases and custom parameters follow.
const PROTOCOL_ORDER: [&str; 11] = [
    SELECT, FILTER, SEARCH, APPLY, ORDER_BY, TOP, SKIP, SKIP_TOKEN, COUNT, EXPAND, FORMAT,
];

/// Serialize a resource description into `(path, params)`.
///
/// A `?query` already embedded in the path is split off and merged into the
/// parameters; values derived from `options` win on name collisions.
///
/// # Errors
/// Returns `Error::Encoding` when a segment or option cannot be rendered and
/// `Error::InvalidParam` when the embedded query is malformed.
pub fn path_and_params(
    segments: &PathSegments,
    options: &QueryOptions,
    encoder: &dyn ExpressionEncoder,
) -> Result<(String, BTreeMap<String, String>)> {
    let path = segments.path()?;
    let mut params = options.to_params_with(encoder)?;
    let path = match path.split_once(QUERY_SEPARATOR) {
        Some((path, query)) => {
            for (name, value) in parse_query(query)? {
                params.entry(name).or_insert(value);
            }
            path.to_owned()
        }
        None => path,
    };
    Ok((path, params))
}

/// Decode an `application/x-www-form-urlencoded` query string.
///
/// # Errors
/// Returns `Error::InvalidParam` if the query cannot be decoded.
pub fn parse_query(query: &str) -> Result<Vec<(String, String)>> {
    serde_urlencoded::from_str(query.trim_start_matches(QUERY_SEPARATOR))
        .map_err(|e| Error::invalid_param("query", e.to_string()))
}

fn rank(name: &str) -> usize {
    PROTOCOL_ORDER
        .iter()
        .position(|p| *p == name)
        .unwrap_or(if name.starts_with('@') {
            PROTOCOL_ORDER.len()
        } else {
            PROTOCOL_ORDER.len() + 1
        })
}

fn encode_component(raw: &str) -> String {
    match raw.strip_prefix(['$', '@']) {
        Some(rest) => format!("{}{}", &raw[..1], urlencoding::encode(rest)),
        None => urlencoding::encode(raw).into_owned(),
    }
}

/// Render parameters as a query string in protocol order.
#[must_use]
pub fn query_string(params: &BTreeMap<String, String>) -> String {
    let mut pairs: Vec<(&String, &String)> = params.iter().collect();
    pairs.sort_by_key(|(name, _)| rank(name));
    pairs
        .into_iter()
        .map(|(name, value)| format!("{}={}", encode_component(name), urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join(&PARAM_SEPARATOR.to_string())
}

/// `path?query`, or just `path` without parameters.
#[must_use]
pub fn path_with_query(path: &str, params: &BTreeMap<String, String>) -> String {
    if params.is_empty() {
        path.to_owned()
    } else {
        format!("{path}{QUERY_SEPARATOR}{}", query_string(params))
    }
}

/// Join a service root and a resource path.
#[must_use]
pub fn join_url(service_root: &str, path: &str) -> String {
    let root = service_root.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    match (root.is_empty(), path.is_empty()) {
        (true, _) => path.to_owned(),
        (false, true) => root.to_owned(),
        (false, false) => format!("{root}/{path}"),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::filter::StandardEncoder;
    use crate::options::QueryOption;
    use crate::segments::SegmentKind;

    #[test]
    fn embedded_query_is_merged_with_options_first() {
        let mut segs = PathSegments::new();
        segs.segment(SegmentKind::EntitySet, Some("People?$top=1&x=y"))
            .unwrap();
        let mut opts = QueryOptions::new();
        opts.set(QueryOption::Top(7));
        let (path, params) = path_and_params(&segs, &opts, &StandardEncoder).unwrap();
        assert_eq!(path, "People");
        assert_eq!(params["$top"], "7");
        assert_eq!(params["x"], "y");
    }

    #[test]
    fn query_string_follows_protocol_order() {
        let params = BTreeMap::from([
            ("$top".to_owned(), "5".to_owned()),
            ("api".to_owned(), "1".to_owned()),
            ("$filter".to_owned(), "Name eq 'a b'".to_owned()),
            ("$select".to_owned(), "Id,Name".to_owned()),
            ("@p".to_owned(), "3".to_owned()),
        ]);
        assert_eq!(
            query_string(&params),
            "$select=Id%2CName&$filter=Name%20eq%20%27a%20b%27&$top=5&@p=3&api=1"
        );
    }

    #[test]
    fn parse_query_decodes() {
        let parsed = parse_query("?$filter=Name%20eq%20%27x%27&$top=2").unwrap();
        assert_eq!(
            parsed,
            vec![
                ("$filter".to_owned(), "Name eq 'x'".to_owned()),
                ("$top".to_owned(), "2".to_owned()),
            ]
        );
    }

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("https://svc/odata/", "/People(1)"), "https://svc/odata/People(1)");
        assert_eq!(join_url("", "People"), "People");
    }
}
