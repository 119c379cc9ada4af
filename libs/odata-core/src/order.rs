//! `$orderby` primitives.

use std::fmt;

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderKey {
    pub field: String,
    pub dir: SortDir,
}

impl OrderKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            dir: SortDir::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            dir: SortDir::Desc,
        }
    }

    /// Parse `"Name"`, `"Name asc"` or `"Name desc"`.
    ///
    /// # Errors
    /// Returns `Error::Encoding` for an empty field or an unknown direction.
    pub fn parse(item: &str) -> Result<Self> {
        let mut parts = item.split_whitespace();
        let field = parts
            .next()
            .ok_or_else(|| Error::encoding("empty $orderby item"))?;
        let dir = match parts.next().map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => SortDir::Asc,
            Some("desc") => SortDir::Desc,
            Some(other) => {
                return Err(Error::encoding(format!(
                    "unknown sort direction '{other}' for {field}"
                )));
            }
        };
        if parts.next().is_some() {
            return Err(Error::encoding(format!("malformed $orderby item '{item}'")));
        }
        Ok(Self {
            field: field.to_owned(),
            dir,
        })
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dir {
            SortDir::Asc => f.write_str(&self.field),
            SortDir::Desc => write!(f, "{} desc", self.field),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct ODataOrderBy(pub Vec<OrderKey>);

impl ODataOrderBy {
    pub fn empty() -> Self {
        Self(vec![])
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a comma-separated `$orderby` value.
    ///
    /// # Errors
    /// Returns `Error::Encoding` if any item is malformed.
    pub fn parse(raw: &str) -> Result<Self> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(OrderKey::parse)
            .collect::<Result<Vec<_>>>()
            .map(ODataOrderBy)
    }
}

impl fmt::Display for ODataOrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&items.join(","))
    }
}

impl From<Vec<OrderKey>> for ODataOrderBy {
    fn from(keys: Vec<OrderKey>) -> Self {
        ODataOrderBy(keys)
    }
}

impl From<OrderKey> for ODataOrderBy {
    fn from(key: OrderKey) -> Self {
        ODataOrderBy(vec![key])
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn parses_and_renders() {
        let order = ODataOrderBy::parse("Name desc, Age asc,Id").unwrap();
        assert_eq!(order.0.len(), 3);
        assert_eq!(order.0[0].dir, SortDir::Desc);
        assert_eq!(order.to_string(), "Name desc,Age,Id");
    }

    #[test]
    fn rejects_bad_direction() {
        assert!(ODataOrderBy::parse("Name sideways").is_err());
        assert!(OrderKey::parse("Name desc extra").is_err());
    }
}
