//! Immutable resource descriptors.
//!
//! Every resource pairs a [`PathSegments`] with a [`QueryOptions`] and a client
//! binding. Builder methods never mutate: they clone, adjust the copy and return
//! it, so resources derived from a common parent never share state. Whether a
//! resource is collection- or entity-shaped follows from its trailing segment
//! and whether that segment carries a key.

use std::collections::BTreeMap;
use std::fmt;

use http::Method;
use odata_core::options::COUNT;
use odata_core::{
    EntityKey, PathSegment, PathSegments, QueryOption, QueryOptionName, QueryOptions, SegmentKind,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::annotations::{
    Entities, EntitiesAnnotations, Entity, EntityAnnotations, Property, property_value,
    split_collection,
};
use crate::client::ODataClient;
use crate::error::{Error, Result};
use crate::pager::{
    BoxedPageFetcher, BoxedPageFuture, Continuation, ItemsPager, ItemsStream, PageCursor,
    PagesPager, PagesStream,
};
use crate::transport::{ODataRequest, ODataResponse};

mod callable;
mod count;
mod entity;
mod entity_set;
mod navigation;
mod property;
mod reference;
mod singleton;
mod value;

pub use callable::{ActionResource, FunctionResource};
pub use count::CountResource;
pub use entity::EntityResource;
pub use entity_set::EntitySetResource;
pub use navigation::NavigationPropertyResource;
pub use property::PropertyResource;
pub use reference::ReferenceResource;
pub use singleton::SingletonResource;
pub use value::ValueResource;

/// Options that survive into a single entity.
pub(crate) const ENTITY_KEEP: &[QueryOptionName] = &[
    QueryOptionName::Select,
    QueryOptionName::Expand,
    QueryOptionName::Format,
    QueryOptionName::Custom,
];

/// Options kept by terminal and callable resources.
pub(crate) const FORMAT_KEEP: &[QueryOptionName] = &[QueryOptionName::Format, QueryOptionName::Custom];

/// `$count` retains only the filter, structured or raw.
pub(crate) const COUNT_KEEP: &[QueryOptionName] =
    &[QueryOptionName::Filter, QueryOptionName::RawFilter];

/// Anything that renders to a resource path, usable as a `$ref` target.
pub trait ResourcePath {
    /// # Errors
    /// Returns `Error::Core` when the path cannot be encoded.
    fn resource_path(&self) -> Result<String>;
}

#[derive(Clone, Debug)]
pub(crate) struct ResourceCore {
    pub(crate) client: ODataClient,
    pub(crate) segments: PathSegments,
    pub(crate) options: QueryOptions,
}

impl ResourceCore {
    pub(crate) fn root(client: ODataClient, kind: SegmentKind, name: &str, type_name: &str) -> Self {
        let type_name = (!type_name.is_empty()).then(|| type_name.to_owned());
        Self {
            client,
            segments: PathSegments::root(kind, name, type_name),
            options: QueryOptions::new(),
        }
    }

    pub(crate) fn type_name(&self) -> Option<&str> {
        self.segments.last().and_then(PathSegment::type_name)
    }

    pub(crate) fn path_and_params(&self) -> Result<(String, BTreeMap<String, String>)> {
        Ok(odata_core::serialize::path_and_params(
            &self.segments,
            &self.options,
            self.client.encoder(),
        )?)
    }

    pub(crate) fn url(&self) -> Result<String> {
        let (path, params) = self.path_and_params()?;
        Ok(odata_core::serialize::path_with_query(
            &self.client.endpoint_url(&path),
            &params,
        ))
    }

    pub(crate) fn fmt_url(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (path, params) = self.path_and_params().map_err(|_| fmt::Error)?;
        f.write_str(&odata_core::serialize::path_with_query(&path, &params))
    }

    pub(crate) fn with_option(&self, option: QueryOption) -> Self {
        let mut next = self.clone();
        next.options.set(option);
        next
    }

    pub(crate) fn with_custom<I, K, V>(&self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut custom = match self.options.get(QueryOptionName::Custom) {
            Some(QueryOption::Custom(existing)) => existing.clone(),
            _ => BTreeMap::new(),
        };
        custom.extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self.with_option(QueryOption::Custom(custom))
    }

    /// Derive a core with one more segment; only `keep` options survive.
    pub(crate) fn append(
        &self,
        kind: SegmentKind,
        name: &str,
        type_name: Option<String>,
        keep: &[QueryOptionName],
    ) -> Result<Self> {
        let mut next = self.clone();
        next.options.keep(keep);
        next.segments.segment(kind, Some(name))?.set_type(type_name);
        Ok(next)
    }

    /// Append a type cast; every option carries over.
    pub(crate) fn cast(&self, type_name: &str) -> Result<Self> {
        let mut next = self.clone();
        next.segments
            .segment(SegmentKind::TypeCast, Some(type_name))?
            .set_type(Some(type_name.to_owned()));
        Ok(next)
    }

    /// Type behind `property` of the trailing type, as declared by its parser.
    pub(crate) fn property_type(&self, property: &str) -> Option<String> {
        self.type_name()
            .and_then(|t| self.client.registry().property_type(t, property))
            .map(str::to_owned)
    }

    /// The segment that carries the entity identity.
    pub(crate) fn key_segment(&self) -> Option<&PathSegment> {
        self.segments.iter().rev().find(|s| s.kind().accepts_key())
    }

    pub(crate) fn key(&self) -> Option<&EntityKey> {
        self.key_segment().and_then(PathSegment::key)
    }

    /// # Errors
    /// `MissingKey` when the identity segment has no key.
    pub(crate) fn require_key(&self) -> Result<()> {
        match self.key_segment() {
            Some(segment) if segment.has_key() => Ok(()),
            Some(segment) => Err(Error::missing_key(segment.name())),
            None => Err(odata_core::Error::MissingSegment {
                kind: SegmentKind::EntitySet,
            }
            .into()),
        }
    }

    /// Apply `key` to the identity segment. Composite members follow the
    /// declared key order and collection options are dropped.
    pub(crate) fn with_key(&self, key: EntityKey) -> Result<Self> {
        let (kind, type_name) = self
            .key_segment()
            .map(|s| (s.kind(), s.type_name().map(str::to_owned)))
            .ok_or(odata_core::Error::MissingSegment {
                kind: SegmentKind::EntitySet,
            })?;
        let key = match self.client.registry().key_fields(type_name.as_deref()) {
            Some(fields) => key.ordered_by(fields),
            None => key,
        };
        let mut next = self.clone();
        next.segments.segment(kind, None)?.set_key(key)?;
        next.options.clear_collection_options();
        Ok(next)
    }

    /// Key of `value` through the parser of the trailing type.
    pub(crate) fn resolve_key(&self, value: &Value) -> Option<EntityKey> {
        self.client.registry().resolve_key(self.type_name(), value)
    }

    /// Position the request at `cursor`. Exactly one of `$skip` and
    /// `$skiptoken` survives; a next-link `$top` replaces the caller's.
    pub(crate) fn with_cursor(&self, cursor: Option<PageCursor>) -> Self {
        let mut next = self.clone();
        let Some(cursor) = cursor else {
            return next;
        };
        match cursor.position {
            Continuation::SkipToken(token) => {
                next.options.remove(QueryOptionName::Skip);
                next.options.set(QueryOption::SkipToken(token));
            }
            Continuation::Skip(skip) => {
                next.options.remove(QueryOptionName::SkipToken);
                next.options.set(QueryOption::Skip(skip));
            }
        }
        if let Some(top) = cursor.top {
            next.options.set(QueryOption::Top(top));
        }
        next
    }

    pub(crate) fn serialize_body<V: Serialize + ?Sized>(&self, value: &V) -> Result<Value> {
        let raw = serde_json::to_value(value)?;
        self.client
            .registry()
            .serialize(self.type_name(), &raw, self.client.serialize_options())
    }

    pub(crate) fn decode<T: DeserializeOwned>(&self, value: Value) -> Result<T> {
        let local = self.client.registry().parse(self.type_name(), value)?;
        Ok(serde_json::from_value(local)?)
    }

    fn request(
        &self,
        method: Method,
        body: Option<Value>,
        etag: Option<&str>,
        with_count: bool,
    ) -> Result<ODataRequest> {
        let (path, mut params) = self.path_and_params()?;
        if with_count {
            params.insert(COUNT.to_owned(), true.to_string());
        }
        let request = ODataRequest::new(method, self.client.endpoint_url(&path))
            .with_params(params)
            .with_etag(etag.map(str::to_owned));
        Ok(match body {
            Some(body) => request.with_body(body),
            None => request,
        })
    }

    pub(crate) async fn send(
        &self,
        method: Method,
        body: Option<Value>,
        etag: Option<&str>,
        with_count: bool,
    ) -> Result<ODataResponse> {
        let request = self.request(method, body, etag, with_count)?;
        self.client.execute(request).await
    }

    fn entity_response<T: DeserializeOwned>(&self, response: &ODataResponse) -> Result<Entity<T>> {
        let body = response.json_body()?;
        let meta = EntityAnnotations::from_response(
            body.as_ref().and_then(Value::as_object),
            &response.headers,
        );
        let entity = body.map(|b| self.decode(b)).transpose()?;
        Ok(Entity { entity, meta })
    }

    pub(crate) async fn fetch_entity<T: DeserializeOwned>(&self) -> Result<Entity<T>> {
        let response = self.send(Method::GET, None, None, false).await?;
        self.entity_response(&response)
    }

    pub(crate) async fn write_entity<T: DeserializeOwned>(
        &self,
        method: Method,
        body: Value,
        etag: Option<&str>,
    ) -> Result<Entity<T>> {
        let response = self.send(method, Some(body), etag, false).await?;
        self.entity_response(&response)
    }

    pub(crate) async fn fetch_entities<T: DeserializeOwned>(
        &self,
        with_count: bool,
    ) -> Result<Entities<T>> {
        let with_count = with_count || self.client.config().with_count;
        let response = self.send(Method::GET, None, None, with_count).await?;
        self.entities_response(&response)
    }

    pub(crate) fn entities_response<T: DeserializeOwned>(
        &self,
        response: &ODataResponse,
    ) -> Result<Entities<T>> {
        let body = response.json_body()?.ok_or_else(|| {
            Error::UnexpectedResponse("collection response has no body".to_owned())
        })?;
        let (items, meta): (Vec<Value>, EntitiesAnnotations) = split_collection(body)?;
        let entities = items
            .into_iter()
            .map(|item| self.decode(item))
            .collect::<Result<Vec<T>>>()?;
        Ok(Entities { entities, meta })
    }

    pub(crate) async fn fetch_property<T: DeserializeOwned>(&self) -> Result<Property<T>> {
        let response = self.send(Method::GET, None, None, false).await?;
        let body = response.json_body()?;
        let meta = EntityAnnotations::from_response(
            body.as_ref().and_then(Value::as_object),
            &response.headers,
        );
        let value = property_value(body).map(|v| self.decode(v)).transpose()?;
        Ok(Property { value, meta })
    }

    pub(crate) async fn delete(&self, etag: Option<&str>) -> Result<()> {
        self.send(Method::DELETE, None, etag, false).await?;
        Ok(())
    }

    fn page_fetcher<T>(&self) -> BoxedPageFetcher<'static, T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let base = self.clone();
        Box::new(
            move |cursor: Option<PageCursor>| -> BoxedPageFuture<'static, T> {
                let page = base.with_cursor(cursor);
                Box::pin(async move { page.fetch_entities::<T>(false).await })
            },
        )
    }

    pub(crate) fn items<T>(&self) -> ItemsStream<'static, T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        ItemsPager::new(self.page_fetcher())
    }

    pub(crate) fn pages<T>(&self) -> PagesStream<'static, T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        PagesPager::new(self.page_fetcher())
    }
}

/// Shared accessors, `Display` and [`ResourcePath`] for a resource type.
macro_rules! resource_accessors {
    (impl[$($g:ident),*] $ty:ty) => {
        impl<$($g),*> std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.core.fmt_url(f)
            }
        }

        impl<$($g),*> $crate::resource::ResourcePath for $ty {
            fn resource_path(&self) -> $crate::error::Result<String> {
                Ok(self.core.path_and_params()?.0)
            }
        }

        impl<$($g),*> $ty {
            /// Request path and wire parameters.
            ///
            /// # Errors
            /// Returns `Error::Core` when a segment or option cannot be encoded.
            pub fn path_and_params(
                &self,
            ) -> $crate::error::Result<(String, std::collections::BTreeMap<String, String>)> {
                self.core.path_and_params()
            }

            /// Absolute URL including the service root and query string.
            ///
            /// # Errors
            /// Returns `Error::Core` when a segment or option cannot be encoded.
            pub fn url(&self) -> $crate::error::Result<String> {
                self.core.url()
            }

            /// Types bound along the path.
            #[must_use]
            pub fn types(&self) -> Vec<&str> {
                self.core.segments.types()
            }

            /// Type of the trailing segment.
            #[must_use]
            pub fn type_name(&self) -> Option<&str> {
                self.core.type_name()
            }

            #[must_use]
            pub fn query(&self) -> &odata_core::QueryOptions {
                &self.core.options
            }

            #[must_use]
            pub fn segments(&self) -> &odata_core::PathSegments {
                &self.core.segments
            }

            /// Register a parameter alias and get back the resource carrying it
            /// together with the `@name` reference to use in filters or calls.
            ///
            /// # Errors
            /// Returns `Error::Core` when the value has no literal form.
            pub fn alias(
                &self,
                name: &str,
                value: &serde_json::Value,
            ) -> $crate::error::Result<(Self, odata_core::ParameterValue)> {
                let mut next = self.clone();
                let reference = next.core.options.alias(name, value)?;
                Ok((next, reference))
            }

            /// Extra query parameters passed through verbatim.
            #[must_use]
            pub fn custom<I, K, V>(&self, params: I) -> Self
            where
                I: IntoIterator<Item = (K, V)>,
                K: Into<String>,
                V: Into<String>,
            {
                let mut next = self.clone();
                next.core = self.core.with_custom(params);
                next
            }

            #[must_use]
            pub fn format(&self, format: impl Into<String>) -> Self {
                self.with_option(odata_core::QueryOption::Format(format.into()))
            }

            fn with_option(&self, option: odata_core::QueryOption) -> Self {
                let mut next = self.clone();
                next.core = self.core.with_option(option);
                next
            }
        }
    };
}

/// `Clone`/`Debug` and the constructor of a resource typed by its entity.
macro_rules! typed_resource {
    ($name:ident) => {
        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                Self {
                    core: self.core.clone(),
                    _marker: std::marker::PhantomData,
                }
            }
        }

        impl<T> std::fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("segments", &self.core.segments)
                    .field("options", &self.core.options)
                    .finish_non_exhaustive()
            }
        }

        impl<T> $name<T> {
            pub(crate) fn from_core(core: $crate::resource::ResourceCore) -> Self {
                Self {
                    core,
                    _marker: std::marker::PhantomData,
                }
            }
        }

        $crate::resource::resource_accessors!(impl[T] $name<T>);
    };
}

/// Projection options shared by entity-shaped resources.
macro_rules! projection_options {
    (impl[$($g:ident),*] $ty:ty) => {
        impl<$($g),*> $ty {
            #[must_use]
            pub fn select<I, S>(&self, fields: I) -> Self
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                self.with_option(odata_core::QueryOption::Select(
                    fields.into_iter().map(Into::into).collect(),
                ))
            }

            #[must_use]
            pub fn expand(&self, expand: impl Into<odata_core::Expand>) -> Self {
                self.with_option(odata_core::QueryOption::Expand(expand.into()))
            }
        }
    };
}

/// Collection options shared by collection-shaped resources.
macro_rules! collection_options {
    (impl[$($g:ident),*] $ty:ty) => {
        $crate::resource::projection_options!(impl[$($g),*] $ty);

        impl<$($g),*> $ty {
            #[must_use]
            pub fn filter(&self, filter: impl Into<odata_core::Filter>) -> Self {
                self.with_option(odata_core::QueryOption::Filter(filter.into()))
            }

            /// A literal filter combined with `filter` using `and`.
            #[must_use]
            pub fn raw_filter(&self, filter: impl Into<String>) -> Self {
                self.with_option(odata_core::QueryOption::RawFilter(filter.into()))
            }

            #[must_use]
            pub fn search(&self, search: impl Into<String>) -> Self {
                self.with_option(odata_core::QueryOption::Search(search.into()))
            }

            #[must_use]
            pub fn transform(&self, transform: odata_core::Transform) -> Self {
                self.with_option(odata_core::QueryOption::Transform(transform))
            }

            #[must_use]
            pub fn group_by(&self, group_by: odata_core::GroupBy) -> Self {
                self.with_option(odata_core::QueryOption::GroupBy(group_by))
            }

            #[must_use]
            pub fn order_by(&self, order: impl Into<odata_core::ODataOrderBy>) -> Self {
                self.with_option(odata_core::QueryOption::OrderBy(order.into()))
            }

            #[must_use]
            pub fn top(&self, top: u64) -> Self {
                self.with_option(odata_core::QueryOption::Top(top))
            }

            #[must_use]
            pub fn skip(&self, skip: u64) -> Self {
                self.with_option(odata_core::QueryOption::Skip(skip))
            }

            #[must_use]
            pub fn skiptoken(&self, token: impl Into<String>) -> Self {
                self.with_option(odata_core::QueryOption::SkipToken(token.into()))
            }
        }
    };
}

pub(crate) use collection_options;
pub(crate) use projection_options;
pub(crate) use resource_accessors;
pub(crate) use typed_resource;
