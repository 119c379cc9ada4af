//! `$expand` values, nested to any depth.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::filter::{ExpressionEncoder, Filter};
use crate::order::ODataOrderBy;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Expand(pub Vec<ExpandItem>);

/// One navigation to expand together with the options applied inside it.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpandItem {
    pub path: String,
    pub options: ExpandOptions,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExpandOptions {
    pub select: Vec<String>,
    pub filter: Option<Filter>,
    pub search: Option<String>,
    pub order_by: ODataOrderBy,
    pub top: Option<u64>,
    pub skip: Option<u64>,
    pub count: Option<bool>,
    pub expand: Option<Expand>,
}

impl ExpandOptions {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.select.is_empty()
            && self.filter.as_ref().is_none_or(Filter::is_empty)
            && self.search.is_none()
            && self.order_by.is_empty()
            && self.top.is_none()
            && self.skip.is_none()
            && self.count.is_none()
            && self.expand.as_ref().is_none_or(Expand::is_empty)
    }
}

impl ExpandItem {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            options: ExpandOptions::default(),
        }
    }

    #[must_use]
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.select = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: impl Into<Filter>) -> Self {
        self.options.filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn order_by(mut self, order: impl Into<ODataOrderBy>) -> Self {
        self.options.order_by = order.into();
        self
    }

    #[must_use]
    pub fn top(mut self, top: u64) -> Self {
        self.options.top = Some(top);
        self
    }

    #[must_use]
    pub fn skip(mut self, skip: u64) -> Self {
        self.options.skip = Some(skip);
        self
    }

    #[must_use]
    pub fn count(mut self, count: bool) -> Self {
        self.options.count = Some(count);
        self
    }

    #[must_use]
    pub fn expand(mut self, expand: impl Into<Expand>) -> Self {
        self.options.expand = Some(expand.into());
        self
    }

    fn encode(&self, encoder: &dyn ExpressionEncoder) -> Result<String> {
        if self.options.is_empty() {
            return Ok(self.path.clone());
        }
        let o = &self.options;
        let mut parts = Vec::new();
        if !o.select.is_empty() {
            parts.push(format!("$select={}", o.select.join(",")));
        }
        if let Some(filter) = o.filter.as_ref().filter(|f| !f.is_empty()) {
            let filter = encoder.encode_filter(filter)?;
            parts.push(format!("$filter={}", single_option("$filter", &filter)?));
        }
        if let Some(search) = &o.search {
            parts.push(format!("$search={}", single_option("$search", search)?));
        }
        if !o.order_by.is_empty() {
            parts.push(format!("$orderby={}", o.order_by));
        }
        if let Some(top) = o.top {
            parts.push(format!("$top={top}"));
        }
        if let Some(skip) = o.skip {
            parts.push(format!("$skip={skip}"));
        }
        if let Some(count) = o.count {
            parts.push(format!("$count={count}"));
        }
        if let Some(nested) = o.expand.as_ref().filter(|e| !e.is_empty()) {
            parts.push(format!("$expand={}", nested.encode(encoder)?));
        }
        Ok(format!("{}({})", self.path, parts.join(";")))
    }
}

impl Expand {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn item(mut self, item: ExpandItem) -> Self {
        self.0.push(item);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render the `$expand` value.
    ///
    /// # Errors
    /// Returns `Error::Encoding` if a nested filter cannot be rendered.
    pub fn encode(&self, encoder: &dyn ExpressionEncoder) -> Result<String> {
        let mut items = Vec::with_capacity(self.0.len());
        for item in &self.0 {
            items.push(item.encode(encoder)?);
        }
        Ok(items.join(","))
    }

    /// Read a serialized `$expand` value back, e.g.
    /// `Orders($select=Id;$expand=Lines($top=5)),Owner`.
    ///
    /// # Errors
    /// Returns `Error::InvalidParam` for unbalanced parentheses or unknown
    /// nested options.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut items = Vec::new();
        for part in split_top_level(raw, ',')? {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let Some(open) = part.find('(') else {
                items.push(ExpandItem::new(part));
                continue;
            };
            if !part.ends_with(')') {
                return Err(Error::invalid_param("$expand", format!("unbalanced '{part}'")));
            }
            let mut item = ExpandItem::new(&part[..open]);
            let inner = &part[open + 1..part.len() - 1];
            for option in split_top_level(inner, ';')? {
                parse_nested_option(&mut item.options, option)?;
            }
            items.push(item);
        }
        Ok(Expand(items))
    }

    /// Build from the dynamic JSON shape: a string, an object mapping navigation
    /// names to nested options, or an array mixing both.
    ///
    /// # Errors
    /// Returns `Error::Encoding` when the value (or a nested one) is neither a
    /// string, an object nor an array.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Self::parse(s),
            Value::Array(items) => {
                let mut out = Vec::new();
                for item in items {
                    out.extend(Self::from_json(item)?.0);
                }
                Ok(Expand(out))
            }
            Value::Object(map) => {
                let mut out = Vec::with_capacity(map.len());
                for (path, opts) in map {
                    let mut item = ExpandItem::new(path);
                    match opts {
                        Value::Null => {}
                        Value::Object(opts) => {
                            for (name, v) in opts {
                                json_nested_option(&mut item.options, name, v)?;
                            }
                        }
                        other => {
                            return Err(Error::encoding(format!(
                                "expand options for '{path}' must be an object, got {other}"
                            )));
                        }
                    }
                    out.push(item);
                }
                Ok(Expand(out))
            }
            other => Err(Error::encoding(format!(
                "expand value is neither string, object nor array: {other}"
            ))),
        }
    }
}

impl From<ExpandItem> for Expand {
    fn from(item: ExpandItem) -> Self {
        Expand(vec![item])
    }
}

impl From<&str> for Expand {
    /// Plain navigation names (`"Orders,Owner"`); nested syntax goes through
    /// [`Expand::parse`].
    fn from(names: &str) -> Self {
        Expand(
            names
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ExpandItem::new)
                .collect(),
        )
    }
}

fn parse_nested_option(options: &mut ExpandOptions, raw: &str) -> Result<()> {
    let Some((name, value)) = raw.split_once('=') else {
        return Err(Error::invalid_param("$expand", format!("malformed option '{raw}'")));
    };
    let number = |v: &str| {
        v.parse::<u64>()
            .map_err(|e| Error::invalid_param(name, e.to_string()))
    };
    match name.trim() {
        "$select" => options.select = split_list(value),
        "$filter" => options.filter = Some(Filter::Raw(value.to_owned())),
        "$search" => options.search = Some(value.to_owned()),
        "$orderby" => options.order_by = ODataOrderBy::parse(value)?,
        "$top" => options.top = Some(number(value)?),
        "$skip" => options.skip = Some(number(value)?),
        "$count" => options.count = Some(parse_bool(name, value)?),
        "$expand" => options.expand = Some(Expand::parse(value)?),
        other => {
            return Err(Error::invalid_param(
                "$expand",
                format!("unsupported nested option '{other}'"),
            ));
        }
    }
    Ok(())
}

fn json_nested_option(options: &mut ExpandOptions, name: &str, value: &Value) -> Result<()> {
    let strings = |v: &Value| -> Result<Vec<String>> {
        match v {
            Value::String(s) => Ok(split_list(s)),
            Value::Array(items) => items
                .iter()
                .map(|i| {
                    i.as_str()
                        .map(str::to_owned)
                        .ok_or_else(|| Error::encoding(format!("expected a string in {name}")))
                })
                .collect(),
            other => Err(Error::encoding(format!(
                "{name} expects a string or array, got {other}"
            ))),
        }
    };
    let number = |v: &Value| {
        v.as_u64()
            .ok_or_else(|| Error::encoding(format!("{name} expects a non-negative integer")))
    };
    match name {
        "select" => options.select = strings(value)?,
        "filter" => options.filter = Some(Filter::Json(value.clone())),
        "search" => {
            options.search = Some(
                value
                    .as_str()
                    .ok_or_else(|| Error::encoding("search expects a string"))?
                    .to_owned(),
            );
        }
        "orderBy" => {
            let items = strings(value)?;
            options.order_by = ODataOrderBy::parse(&items.join(","))?;
        }
        "top" => options.top = Some(number(value)?),
        "skip" => options.skip = Some(number(value)?),
        "count" => {
            options.count = Some(
                value
                    .as_bool()
                    .ok_or_else(|| Error::encoding("count expects a boolean"))?,
            );
        }
        "expand" => options.expand = Some(Expand::from_json(value)?),
        other => {
            return Err(Error::encoding(format!("unknown expand option '{other}'")));
        }
    }
    Ok(())
}

pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

pub(crate) fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(Error::invalid_param(name, format!("expected true/false, got '{other}'"))),
    }
}

/// A nested value must not contain `;` outside quotes or parentheses, since
/// that separates the options of one expanded item.
fn single_option<'a>(name: &str, value: &'a str) -> Result<&'a str> {
    match split_top_level(value, ';') {
        Ok(parts) if parts.len() == 1 => Ok(value),
        _ => Err(Error::encoding(format!(
            "nested {name} '{value}' needs ';' and parentheses inside quotes"
        ))),
    }
}

/// Split on `sep` outside parentheses and quoted strings (`'...'` literals and
/// `"..."` search phrases).
fn split_top_level(raw: &str, sep: char) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (idx, ch) in raw.char_indices() {
        match (quote, ch) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| Error::invalid_param("$expand", "unbalanced ')'"))?;
            }
            (None, c) if c == sep && depth == 0 => {
                parts.push(&raw[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(Error::invalid_param("$expand", "unbalanced '('"));
    }
    parts.push(&raw[start..]);
    Ok(parts)
}
