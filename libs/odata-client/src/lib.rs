#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! # `odata-client` - `OData` v4 resources over a pluggable transport
//!
//! Resources are immutable descriptors built from an [`ODataClient`]:
//!
//! - **Collections** - [`EntitySetResource`], [`NavigationPropertyResource`]
//!   with filter, ordering, paging and `$apply` options
//! - **Single entities** - [`EntityResource`], [`SingletonResource`]
//! - **Terminals** - [`PropertyResource`], [`ValueResource`], [`CountResource`],
//!   [`ReferenceResource`]
//! - **Callables** - [`ActionResource`], [`FunctionResource`]
//!
//! Requests go through the [`Transport`] trait; the crate ships no HTTP stack.
//! Collections can be consumed page by page or as one stream that follows
//! `$skip` and `$skiptoken` continuations (see [`pager`]).
//!
//! ## Example
//!
//! ```rust,ignore
//! use odata_client::{ODataClient, ODataClientConfig};
//! use odata_core::ast::Expr;
//!
//! let client = ODataClient::new(ODataClientConfig::new("https://services.example/odata"), transport)?;
//! let people = client
//!     .entity_set::<Person>("People", "TripPin.Person")
//!     .filter(Expr::field("FirstName").eq("Scott"))
//!     .top(10);
//! let everyone: Vec<Person> = people.fetch_all().await?;
//! ```

pub mod annotations;
pub mod client;
pub mod config;
pub mod error;
pub mod pager;
pub mod parser;
pub mod resource;
pub mod service;
pub mod transport;

pub use annotations::{Entities, EntitiesAnnotations, Entity, EntityAnnotations, Property};
pub use client::{ODataClient, ODataClientBuilder};
pub use config::ODataClientConfig;
pub use error::{Error, Result, TransportError};
pub use pager::{Continuation, ItemsPager, PageCursor, PagesPager};
pub use parser::{EntityParser, FieldKind, Parser, ParserRegistry, SerializeOptions};
pub use resource::{
    ActionResource, CountResource, EntityResource, EntitySetResource, FunctionResource,
    NavigationPropertyResource, PropertyResource, ReferenceResource, ResourcePath,
    SingletonResource, ValueResource,
};
pub use service::EntityService;
pub use transport::{ODataRequest, ODataResponse, Transport};
