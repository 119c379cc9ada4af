use std::collections::BTreeMap;

use serde_json::json;

use crate::ast::Expr;
use crate::expand::{Expand, ExpandItem};
use crate::filter::StandardEncoder;
use crate::options::{QueryOption, QueryOptionName, QueryOptions};
use crate::order::OrderKey;
use crate::segments::{EntityKey, PathSegments, SegmentKind};
use crate::serialize::{path_and_params, path_with_query};

fn entity_set(name: &str) -> PathSegments {
    let mut segs = PathSegments::new();
    segs.segment(SegmentKind::EntitySet, Some(name)).unwrap();
    segs
}

fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

#[test]
fn products_filter_and_top() {
    let segs = entity_set("Products");
    let mut opts = QueryOptions::new();
    opts.set(QueryOption::Filter(json!({"Price": {"gt": 10}}).into()))
        .set(QueryOption::Top(5));

    let (path, p) = path_and_params(&segs, &opts, &StandardEncoder).unwrap();
    assert_eq!(path, "Products");
    assert_eq!(p, params(&[("$filter", "Price gt 10"), ("$top", "5")]));
}

#[test]
fn keep_retains_exactly_the_listed_options() {
    let mut opts = QueryOptions::new();
    opts.set(QueryOption::Select(vec!["Id".into()]))
        .set(QueryOption::Filter("Id gt 2".into()))
        .set(QueryOption::Top(3))
        .set(QueryOption::Skip(6));
    opts.keep(&[QueryOptionName::Filter, QueryOptionName::Top]);
    assert_eq!(
        opts.names(),
        vec![QueryOptionName::Filter, QueryOptionName::Top]
    );
}

#[test]
fn keyed_entity_drops_collection_options() {
    let mut segs = entity_set("Orders");
    let mut opts = QueryOptions::new();
    opts.set(QueryOption::Filter(Expr::field("Total").gt(3).into()))
        .set(QueryOption::OrderBy(OrderKey::desc("Total").into()))
        .set(QueryOption::Select(vec!["Id".into()]));

    segs.segment(SegmentKind::EntitySet, None)
        .unwrap()
        .set_key(EntityKey::from(1))
        .unwrap();
    opts.clear_collection_options();

    let (path, p) = path_and_params(&segs, &opts, &StandardEncoder).unwrap();
    assert_eq!(path, "Orders(1)");
    assert!(!p.contains_key("$filter"));
    assert!(!p.contains_key("$orderby"));
    assert_eq!(p["$select"], "Id");
}

#[test]
fn composite_key_follows_declared_order() {
    let mut segs = entity_set("Lines");
    let key = EntityKey::from_json(&json!({"b": 2, "a": 1}))
        .unwrap()
        .ordered_by(&["a", "b"]);
    segs.segment(SegmentKind::EntitySet, None)
        .unwrap()
        .set_key(key)
        .unwrap();
    assert_eq!(segs.path().unwrap(), "Lines(a=1,b=2)");
}

#[test]
fn clones_are_independent() {
    let mut segs = entity_set("People");
    let mut opts = QueryOptions::new();
    opts.set(QueryOption::Expand(
        ExpandItem::new("Trips").select(["Name"]).into(),
    ));
    let before = path_and_params(&segs, &opts, &StandardEncoder).unwrap();

    let mut segs2 = segs.clone();
    let mut opts2 = opts.clone();
    segs2
        .segment(SegmentKind::NavigationProperty, Some("Friends"))
        .unwrap();
    opts2.set(QueryOption::Expand(ExpandItem::new("Photos").into()));

    assert_eq!(path_and_params(&segs, &opts, &StandardEncoder).unwrap(), before);
    segs.segment(SegmentKind::Count, None).unwrap();
    assert_eq!(segs2.path().unwrap(), "People/Friends");
}

#[test]
fn round_trip_through_params() {
    let mut opts = QueryOptions::new();
    opts.set(QueryOption::Select(vec!["Id".into(), "Name".into()]))
        .set(QueryOption::Filter(Expr::field("Name").startswith("A").into()))
        .set(QueryOption::Search("blue".into()))
        .set(QueryOption::OrderBy(OrderKey::asc("Name").into()))
        .set(QueryOption::Top(20))
        .set(QueryOption::Skip(40))
        .set(QueryOption::Count(true))
        .set(QueryOption::Expand(
            ExpandItem::new("Orders")
                .filter("Total gt 1")
                .expand(ExpandItem::new("Lines").top(2))
                .into(),
        ))
        .set(QueryOption::Format("json".into()));

    let serialized = opts.to_params().unwrap();
    let restored = QueryOptions::from_params(&serialized).unwrap();
    assert_eq!(restored.to_params().unwrap(), serialized);
}

#[test]
fn rendered_url_is_in_protocol_order() {
    let segs = entity_set("People");
    let mut opts = QueryOptions::new();
    opts.set(QueryOption::Format("json".into()))
        .set(QueryOption::Count(true))
        .set(QueryOption::Top(2))
        .set(QueryOption::Select(vec!["Id".into()]));
    let (path, p) = path_and_params(&segs, &opts, &StandardEncoder).unwrap();
    assert_eq!(
        path_with_query(&path, &p),
        "People?$select=Id&$top=2&$count=true&$format=json"
    );
}

#[test]
fn negated_comparison_keeps_its_meaning() {
    let mut opts = QueryOptions::new();
    opts.set(QueryOption::Filter(Expr::field("Price").gt(10).not().into()));
    let p = opts.to_params().unwrap();
    assert_eq!(p["$filter"], "not (Price gt 10)");
}

#[test]
fn expand_values_with_separators_round_trip() {
    let mut opts = QueryOptions::new();
    opts.set(QueryOption::Expand(
        Expand::from_json(&json!({
            "Orders": {"search": "\"red;blue\"", "filter": "Note eq 'a;b'"}
        }))
        .unwrap(),
    ));

    let serialized = opts.to_params().unwrap();
    assert_eq!(
        serialized["$expand"],
        "Orders($filter=Note eq 'a;b';$search=\"red;blue\")"
    );
    let restored = QueryOptions::from_params(&serialized).unwrap();
    assert_eq!(restored.to_params().unwrap(), serialized);
}

#[test]
fn unquoted_separator_in_expand_fails_to_encode() {
    let mut opts = QueryOptions::new();
    opts.set(QueryOption::Expand(
        Expand::from_json(&json!({"Orders": {"search": "red;blue"}})).unwrap(),
    ));
    assert!(matches!(opts.to_params(), Err(crate::Error::Encoding(_))));
}
