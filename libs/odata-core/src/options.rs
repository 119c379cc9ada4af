//! Query options attached to a resource and their wire encoding.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::expand::{parse_bool, split_list, Expand};
use crate::filter::{ExpressionEncoder, Filter, StandardEncoder, Transform};
use crate::literal;
use crate::order::ODataOrderBy;
use crate::segments::ParameterValue;

pub const SELECT: &str = "$select";
pub const FILTER: &str = "$filter";
pub const SEARCH: &str = "$search";
pub const APPLY: &str = "$apply";
pub const ORDER_BY: &str = "$orderby";
pub const TOP: &str = "$top";
pub const SKIP: &str = "$skip";
pub const SKIP_TOKEN: &str = "$skiptoken";
pub const COUNT: &str = "$count";
pub const EXPAND: &str = "$expand";
pub const FORMAT: &str = "$format";

/// Recognised option names. Declaration order is the protocol order used on
/// the wire, so the derived `Ord` drives serialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueryOptionName {
    Select,
    Filter,
    RawFilter,
    Search,
    GroupBy,
    Transform,
    OrderBy,
    Top,
    Skip,
    SkipToken,
    Count,
    Expand,
    Format,
    Custom,
}

impl QueryOptionName {
    pub const ALL: [QueryOptionName; 14] = [
        QueryOptionName::Select,
        QueryOptionName::Filter,
        QueryOptionName::RawFilter,
        QueryOptionName::Search,
        QueryOptionName::GroupBy,
        QueryOptionName::Transform,
        QueryOptionName::OrderBy,
        QueryOptionName::Top,
        QueryOptionName::Skip,
        QueryOptionName::SkipToken,
        QueryOptionName::Count,
        QueryOptionName::Expand,
        QueryOptionName::Format,
        QueryOptionName::Custom,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QueryOptionName::Select => "select",
            QueryOptionName::Filter => "filter",
            QueryOptionName::RawFilter => "rawFilter",
            QueryOptionName::Search => "search",
            QueryOptionName::GroupBy => "groupBy",
            QueryOptionName::Transform => "transform",
            QueryOptionName::OrderBy => "orderBy",
            QueryOptionName::Top => "top",
            QueryOptionName::Skip => "skip",
            QueryOptionName::SkipToken => "skiptoken",
            QueryOptionName::Count => "count",
            QueryOptionName::Expand => "expand",
            QueryOptionName::Format => "format",
            QueryOptionName::Custom => "custom",
        }
    }
}

impl fmt::Display for QueryOptionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum QueryOption {
    Select(Vec<String>),
    Filter(Filter),
    RawFilter(String),
    Search(String),
    GroupBy(crate::filter::GroupBy),
    Transform(Transform),
    OrderBy(ODataOrderBy),
    Top(u64),
    Skip(u64),
    SkipToken(String),
    Count(bool),
    Expand(Expand),
    Format(String),
    Custom(BTreeMap<String, String>),
}

impl QueryOption {
    #[must_use]
    pub fn name(&self) -> QueryOptionName {
        match self {
            QueryOption::Select(_) => QueryOptionName::Select,
            QueryOption::Filter(_) => QueryOptionName::Filter,
            QueryOption::RawFilter(_) => QueryOptionName::RawFilter,
            QueryOption::Search(_) => QueryOptionName::Search,
            QueryOption::GroupBy(_) => QueryOptionName::GroupBy,
            QueryOption::Transform(_) => QueryOptionName::Transform,
            QueryOption::OrderBy(_) => QueryOptionName::OrderBy,
            QueryOption::Top(_) => QueryOptionName::Top,
            QueryOption::Skip(_) => QueryOptionName::Skip,
            QueryOption::SkipToken(_) => QueryOptionName::SkipToken,
            QueryOption::Count(_) => QueryOptionName::Count,
            QueryOption::Expand(_) => QueryOptionName::Expand,
            QueryOption::Format(_) => QueryOptionName::Format,
            QueryOption::Custom(_) => QueryOptionName::Custom,
        }
    }

    /// Empty values are never stored; setting one removes the option instead.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            QueryOption::Select(v) => v.is_empty(),
            QueryOption::Filter(f) => f.is_empty(),
            QueryOption::RawFilter(s)
            | QueryOption::Search(s)
            | QueryOption::SkipToken(s)
            | QueryOption::Format(s) => s.trim().is_empty(),
            QueryOption::GroupBy(g) => g.properties.is_empty(),
            QueryOption::Transform(t) => t.is_empty(),
            QueryOption::OrderBy(o) => o.is_empty(),
            QueryOption::Expand(e) => e.is_empty(),
            QueryOption::Custom(c) => c.is_empty(),
            QueryOption::Top(_) | QueryOption::Skip(_) | QueryOption::Count(_) => false,
        }
    }
}

/// The option set of one resource.
///
/// Cloning copies every nested value; two clones never share state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryOptions {
    options: BTreeMap<QueryOptionName, QueryOption>,
    aliases: BTreeMap<String, String>,
}

impl QueryOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `option`, replacing any previous value under the same name.
    pub fn set(&mut self, option: QueryOption) -> &mut Self {
        let name = option.name();
        if option.is_empty() {
            self.options.remove(&name);
        } else {
            self.options.insert(name, option);
        }
        self
    }

    #[must_use]
    pub fn get(&self, name: QueryOptionName) -> Option<&QueryOption> {
        self.options.get(&name)
    }

    #[must_use]
    pub fn has(&self, name: QueryOptionName) -> bool {
        self.options.contains_key(&name)
    }

    pub fn remove(&mut self, name: QueryOptionName) -> Option<QueryOption> {
        self.options.remove(&name)
    }

    /// Drop every option whose name is not listed. Aliases survive.
    pub fn keep(&mut self, names: &[QueryOptionName]) -> &mut Self {
        self.options.retain(|name, _| names.contains(name));
        self
    }

    /// A keyed entity has no collection semantics.
    pub fn clear_collection_options(&mut self) -> &mut Self {
        for name in [
            QueryOptionName::Filter,
            QueryOptionName::RawFilter,
            QueryOptionName::OrderBy,
            QueryOptionName::Count,
            QueryOptionName::Skip,
            QueryOptionName::Top,
        ] {
            self.options.remove(&name);
        }
        self
    }

    /// Projections do not cross a navigation boundary.
    pub fn clear_projection(&mut self) -> &mut Self {
        self.options.remove(&QueryOptionName::Select);
        self.options.remove(&QueryOptionName::Expand);
        self
    }

    #[must_use]
    pub fn names(&self) -> Vec<QueryOptionName> {
        self.options.keys().copied().collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.options.is_empty() && self.aliases.is_empty()
    }

    /// Register a parameter alias (`@name=value`) and return the reference to
    /// use inside filters or function parameters.
    ///
    /// # Errors
    /// Returns `Error::Encoding` if the value has no literal form.
    pub fn alias(&mut self, name: &str, value: &Value) -> Result<ParameterValue> {
        let name = name.trim_start_matches('@');
        if name.is_empty() {
            return Err(Error::encoding("alias name must not be empty"));
        }
        self.aliases
            .insert(format!("@{name}"), literal::encode_parameter(value)?);
        Ok(ParameterValue::Alias(name.to_owned()))
    }

    #[must_use]
    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    #[must_use]
    pub fn select(&self) -> Option<&[String]> {
        match self.get(QueryOptionName::Select) {
            Some(QueryOption::Select(v)) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn filter(&self) -> Option<&Filter> {
        match self.get(QueryOptionName::Filter) {
            Some(QueryOption::Filter(f)) => Some(f),
            _ => None,
        }
    }

    #[must_use]
    pub fn order_by(&self) -> Option<&ODataOrderBy> {
        match self.get(QueryOptionName::OrderBy) {
            Some(QueryOption::OrderBy(o)) => Some(o),
            _ => None,
        }
    }

    #[must_use]
    pub fn expand(&self) -> Option<&Expand> {
        match self.get(QueryOptionName::Expand) {
            Some(QueryOption::Expand(e)) => Some(e),
            _ => None,
        }
    }

    #[must_use]
    pub fn top(&self) -> Option<u64> {
        match self.get(QueryOptionName::Top) {
            Some(QueryOption::Top(n)) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn skip(&self) -> Option<u64> {
        match self.get(QueryOptionName::Skip) {
            Some(QueryOption::Skip(n)) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn skiptoken(&self) -> Option<&str> {
        match self.get(QueryOptionName::SkipToken) {
            Some(QueryOption::SkipToken(t)) => Some(t),
            _ => None,
        }
    }

    #[must_use]
    pub fn count(&self) -> Option<bool> {
        match self.get(QueryOptionName::Count) {
            Some(QueryOption::Count(c)) => Some(*c),
            _ => None,
        }
    }

    #[must_use]
    pub fn format(&self) -> Option<&str> {
        match self.get(QueryOptionName::Format) {
            Some(QueryOption::Format(f)) => Some(f),
            _ => None,
        }
    }

    /// Encode with the [`StandardEncoder`].
    ///
    /// # Errors
    /// Returns `Error::Encoding` when a filter, transform or expand value
    /// cannot be rendered.
    pub fn to_params(&self) -> Result<BTreeMap<String, String>> {
        self.to_params_with(&StandardEncoder)
    }

    /// Encode every option into its wire parameter. Custom parameters are
    /// written first so a standard option always wins a name collision.
    ///
    /// # Errors
    /// Returns `Error::Encoding` when a filter, transform or expand value
    /// cannot be rendered.
    pub fn to_params_with(
        &self,
        encoder: &dyn ExpressionEncoder,
    ) -> Result<BTreeMap<String, String>> {
        let mut params = BTreeMap::new();
        if let Some(QueryOption::Custom(custom)) = self.get(QueryOptionName::Custom) {
            params.extend(custom.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let mut filters = Vec::new();
        let mut apply = Vec::new();
        for option in self.options.values() {
            match option {
                QueryOption::Select(fields) => {
                    params.insert(SELECT.to_owned(), fields.join(","));
                }
                QueryOption::Filter(filter) => {
                    let encoded = encoder.encode_filter(filter)?;
                    if !encoded.is_empty() {
                        filters.push(encoded);
                    }
                }
                QueryOption::RawFilter(raw) => filters.push(raw.clone()),
                QueryOption::Search(search) => {
                    params.insert(SEARCH.to_owned(), search.clone());
                }
                QueryOption::GroupBy(group_by) => apply.push(encoder.encode_group_by(group_by)?),
                QueryOption::Transform(transform) => {
                    apply.push(encoder.encode_transform(transform)?);
                }
                QueryOption::OrderBy(order) => {
                    params.insert(ORDER_BY.to_owned(), order.to_string());
                }
                QueryOption::Top(top) => {
                    params.insert(TOP.to_owned(), top.to_string());
                }
                QueryOption::Skip(skip) => {
                    params.insert(SKIP.to_owned(), skip.to_string());
                }
                QueryOption::SkipToken(token) => {
                    params.insert(SKIP_TOKEN.to_owned(), token.clone());
                }
                QueryOption::Count(count) => {
                    params.insert(COUNT.to_owned(), count.to_string());
                }
                QueryOption::Expand(expand) => {
                    params.insert(EXPAND.to_owned(), expand.encode(encoder)?);
                }
                QueryOption::Format(format) => {
                    params.insert(FORMAT.to_owned(), format.clone());
                }
                QueryOption::Custom(_) => {}
            }
        }

        match filters.len() {
            0 => {}
            1 => {
                params.insert(FILTER.to_owned(), filters.remove(0));
            }
            _ => {
                let joined = filters
                    .iter()
                    .map(|f| format!("({f})"))
                    .collect::<Vec<_>>()
                    .join(" and ");
                params.insert(FILTER.to_owned(), joined);
            }
        }
        apply.retain(|a| !a.is_empty());
        if !apply.is_empty() {
            params.insert(APPLY.to_owned(), apply.join("/"));
        }
        params.extend(self.aliases.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(params)
    }

    /// Rebuild options from serialized parameters. Structured filters and
    /// transforms come back as raw strings; unknown names become custom
    /// parameters and `@`-prefixed names become aliases.
    ///
    /// # Errors
    /// Returns `Error::InvalidParam` for malformed numeric, boolean, order or
    /// expand values.
    pub fn from_params<I, K, V>(params: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut options = QueryOptions::new();
        let mut custom = BTreeMap::new();
        for (key, value) in params {
            let (key, value) = (key.as_ref(), value.as_ref());
            let number = || {
                value
                    .parse::<u64>()
                    .map_err(|e| Error::invalid_param(key, e.to_string()))
            };
            match key {
                SELECT => options.set(QueryOption::Select(split_list(value))),
                FILTER => options.set(QueryOption::Filter(Filter::Raw(value.to_owned()))),
                SEARCH => options.set(QueryOption::Search(value.to_owned())),
                APPLY => options.set(QueryOption::Transform(Transform::Raw(value.to_owned()))),
                ORDER_BY => options.set(QueryOption::OrderBy(ODataOrderBy::parse(value)?)),
                TOP => options.set(QueryOption::Top(number()?)),
                SKIP => options.set(QueryOption::Skip(number()?)),
                SKIP_TOKEN => options.set(QueryOption::SkipToken(value.to_owned())),
                COUNT => options.set(QueryOption::Count(parse_bool(key, value)?)),
                EXPAND => options.set(QueryOption::Expand(Expand::parse(value)?)),
                FORMAT => options.set(QueryOption::Format(value.to_owned())),
                alias if alias.starts_with('@') => {
                    options.aliases.insert(alias.to_owned(), value.to_owned());
                    &mut options
                }
                other => {
                    custom.insert(other.to_owned(), value.to_owned());
                    &mut options
                }
            };
        }
        options.set(QueryOption::Custom(custom));
        Ok(options)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::ast::Expr;
    use crate::expand::ExpandItem;
    use crate::filter::{Aggregate, AggregateMethod, GroupBy};
    use crate::order::OrderKey;
    use serde_json::json;

    #[test]
    fn empty_values_remove_the_option() {
        let mut o = QueryOptions::new();
        o.set(QueryOption::Top(3));
        o.set(QueryOption::Select(vec!["Id".into()]));
        o.set(QueryOption::Select(Vec::new()));
        assert!(!o.has(QueryOptionName::Select));
        assert_eq!(o.top(), Some(3));
    }

    #[test]
    fn key_application_clears_collection_options() {
        let mut o = QueryOptions::new();
        o.set(QueryOption::Filter("Id gt 1".into()))
            .set(QueryOption::OrderBy(OrderKey::asc("Id").into()))
            .set(QueryOption::Top(1))
            .set(QueryOption::Skip(1))
            .set(QueryOption::Count(true))
            .set(QueryOption::Format("json".into()));
        o.clear_collection_options();
        assert_eq!(o.names(), vec![QueryOptionName::Format]);
    }

    #[test]
    fn filters_and_raw_filters_are_combined() {
        let mut o = QueryOptions::new();
        o.set(QueryOption::Filter(Expr::field("Price").gt(10).into()))
            .set(QueryOption::RawFilter("Active eq true".into()));
        let params = o.to_params().unwrap();
        assert_eq!(params[FILTER], "(Price gt 10) and (Active eq true)");
    }

    #[test]
    fn apply_joins_group_by_and_transform() {
        let mut o = QueryOptions::new();
        o.set(QueryOption::GroupBy(GroupBy::new(["Country"])))
            .set(QueryOption::Transform(Transform::Aggregate(vec![Aggregate::new(
                "Amount",
                AggregateMethod::Sum,
                "Total",
            )])));
        assert_eq!(
            o.to_params().unwrap()[APPLY],
            "groupby((Country))/aggregate(Amount with sum as Total)"
        );
    }

    #[test]
    fn standard_options_win_over_custom() {
        let mut o = QueryOptions::new();
        o.set(QueryOption::Custom(BTreeMap::from([
            ("$top".to_owned(), "99".to_owned()),
            ("api-version".to_owned(), "2".to_owned()),
        ])))
        .set(QueryOption::Top(5));
        let params = o.to_params().unwrap();
        assert_eq!(params[TOP], "5");
        assert_eq!(params["api-version"], "2");
    }

    #[test]
    fn aliases_are_serialized_with_at_prefix() {
        let mut o = QueryOptions::new();
        let reference = o.alias("city", &json!("Oslo")).unwrap();
        assert_eq!(reference, ParameterValue::Alias("city".into()));
        assert_eq!(o.to_params().unwrap()["@city"], "'Oslo'");
    }

    #[test]
    fn from_params_round_trips() {
        let mut o = QueryOptions::new();
        o.set(QueryOption::Select(vec!["Id".into(), "Name".into()]))
            .set(QueryOption::Filter(json!({"Price": {"lt": 3}}).into()))
            .set(QueryOption::OrderBy(OrderKey::desc("Name").into()))
            .set(QueryOption::Expand(ExpandItem::new("Orders").top(2).into()))
            .set(QueryOption::Top(10))
            .set(QueryOption::Skip(20))
            .set(QueryOption::Count(true))
            .set(QueryOption::Search("milk".into()));
        let params = o.to_params().unwrap();
        let back = QueryOptions::from_params(&params).unwrap();
        assert_eq!(back.to_params().unwrap(), params);
    }

    #[test]
    fn from_params_rejects_bad_numbers() {
        let err = QueryOptions::from_params([("$top", "many")]).unwrap_err();
        assert!(matches!(err, Error::InvalidParam { ref name, .. } if name == "$top"));
    }
}
