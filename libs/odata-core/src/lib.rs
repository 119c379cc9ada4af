#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Transport-free OData v4 request model.
//!
//! [`PathSegments`] describe the resource path, [`QueryOptions`] the query
//! options; [`serialize::path_and_params`] turns the pair into the request
//! path and its wire parameters.

pub mod ast;
pub mod error;
pub mod expand;
pub mod filter;
pub mod literal;
pub mod options;
pub mod order;
pub mod segments;
pub mod serialize;

pub use error::{Error, Result};
pub use expand::{Expand, ExpandItem, ExpandOptions};
pub use filter::{
    Aggregate, AggregateMethod, ExpressionEncoder, Filter, GroupBy, StandardEncoder, Transform,
};
pub use options::{QueryOption, QueryOptionName, QueryOptions};
pub use order::{ODataOrderBy, OrderKey, SortDir};
pub use segments::{
    EntityKey, KeyValue, ParameterValue, PathSegment, PathSegments, SegmentKind,
};

#[cfg(test)]
mod tests;
