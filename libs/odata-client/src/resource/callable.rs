use std::marker::PhantomData;

use futures_util::TryStreamExt;
use http::Method;
use odata_core::{ParameterValue, SegmentKind};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{FORMAT_KEEP, ResourceCore, collection_options, typed_resource};
use crate::annotations::Entities;
use crate::client::ODataClient;
use crate::error::Result;
use crate::pager::{ItemsStream, PagesStream};

/// Member carrying primitive and collection results.
const RESULT_VALUE: &str = "value";

/// Strip the `{"value": ..}` envelope of primitive and collection results.
/// Entity results are returned as-is; `null` means no result.
fn callable_result(body: Value) -> Option<Value> {
    let body = match body {
        Value::Object(mut map)
            if map.contains_key(RESULT_VALUE)
                && map.keys().all(|k| k == RESULT_VALUE || k.starts_with('@')) =>
        {
            map.remove(RESULT_VALUE).unwrap_or(Value::Null)
        }
        other => other,
    };
    (!body.is_null()).then_some(body)
}

/// Segment for the callable `type_name`, placed at its registered path.
fn callable_core(
    parent: &ResourceCore,
    kind: SegmentKind,
    type_name: &str,
) -> Result<ResourceCore> {
    let path = parent.client.registry().resolve_callable_path(type_name);
    parent.append(kind, &path, Some(type_name.to_owned()), FORMAT_KEEP)
}

/// An action, invoked with `POST` and a JSON parameter object.
pub struct ActionResource<R> {
    core: ResourceCore,
    _marker: PhantomData<fn() -> R>,
}

typed_resource!(ActionResource);

impl<R> ActionResource<R> {
    pub(crate) fn bound(parent: &ResourceCore, type_name: &str) -> Result<Self> {
        Ok(Self::from_core(callable_core(
            parent,
            SegmentKind::Action,
            type_name,
        )?))
    }

    pub(crate) fn unbound(client: ODataClient, type_name: &str) -> Self {
        let path = client.registry().resolve_callable_path(type_name);
        Self::from_core(ResourceCore::root(
            client,
            SegmentKind::Action,
            &path,
            type_name,
        ))
    }
}

impl<R: DeserializeOwned> ActionResource<R> {
    /// Invoke the action. `None` when the action returns nothing.
    ///
    /// # Errors
    /// Returns transport or decoding errors.
    pub async fn call<P: Serialize + ?Sized>(&self, parameters: &P) -> Result<Option<R>> {
        let body = serde_json::to_value(parameters)?;
        let response = self
            .core
            .send(Method::POST, Some(body), None, false)
            .await?;
        response
            .json_body()?
            .and_then(callable_result)
            .map(|v| self.core.decode(v))
            .transpose()
    }
}

/// A function, invoked with `GET`; parameters are inlined into the segment,
/// e.g. `GetNearestAirport(lat=33.0,lon=-118.0)`.
pub struct FunctionResource<R> {
    core: ResourceCore,
    _marker: PhantomData<fn() -> R>,
}

typed_resource!(FunctionResource);
collection_options!(impl[R] FunctionResource<R>);

impl<R> FunctionResource<R> {
    pub(crate) fn bound(parent: &ResourceCore, type_name: &str) -> Result<Self> {
        Ok(Self::from_core(callable_core(
            parent,
            SegmentKind::Function,
            type_name,
        )?))
    }

    pub(crate) fn unbound(client: ODataClient, type_name: &str) -> Self {
        let path = client.registry().resolve_callable_path(type_name);
        Self::from_core(ResourceCore::root(
            client,
            SegmentKind::Function,
            &path,
            type_name,
        ))
    }

    /// Replace the call parameters. Use [`alias`](Self::alias) for values
    /// that should travel as `@name` query parameters.
    ///
    /// # Errors
    /// Returns `Error::Core` if the function segment is gone.
    pub fn parameters<I, K, V>(&self, parameters: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ParameterValue>,
    {
        let mut next = self.clone();
        next.core
            .segments
            .segment(SegmentKind::Function, None)?
            .set_parameters(
                parameters
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            );
        Ok(next)
    }
}

impl<R: DeserializeOwned> FunctionResource<R> {
    /// Single or composable result. `None` when the function returns nothing.
    ///
    /// # Errors
    /// Returns transport or decoding errors.
    pub async fn get(&self) -> Result<Option<R>> {
        let response = self.core.send(Method::GET, None, None, false).await?;
        response
            .json_body()?
            .and_then(callable_result)
            .map(|v| self.core.decode(v))
            .transpose()
    }

    /// One page of an entity-collection result.
    ///
    /// # Errors
    /// Returns transport or decoding errors.
    pub async fn get_entities(&self, with_count: bool) -> Result<Entities<R>> {
        self.core.fetch_entities(with_count).await
    }
}

impl<R> FunctionResource<R>
where
    R: DeserializeOwned + Send + 'static,
{
    #[must_use]
    pub fn all(&self) -> ItemsStream<'static, R> {
        self.core.items()
    }

    #[must_use]
    pub fn pages(&self) -> PagesStream<'static, R> {
        self.core.pages()
    }

    /// # Errors
    /// Returns the first page error.
    pub async fn fetch_all(&self) -> Result<Vec<R>> {
        self.all().try_collect().await
    }
}
