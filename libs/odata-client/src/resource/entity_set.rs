use std::marker::PhantomData;

use futures_util::TryStreamExt;
use http::Method;
use odata_core::{EntityKey, SegmentKind};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{
    ActionResource, CountResource, EntityResource, FunctionResource, ResourceCore, COUNT_KEEP,
    ENTITY_KEEP, collection_options, typed_resource,
};
use crate::annotations::{Entities, Entity};
use crate::client::ODataClient;
use crate::error::Result;
use crate::pager::{ItemsStream, PagesStream};

/// A collection of entities addressed by name, e.g. `People`.
pub struct EntitySetResource<T> {
    core: ResourceCore,
    _marker: PhantomData<fn() -> T>,
}

typed_resource!(EntitySetResource);
collection_options!(impl[T] EntitySetResource<T>);

impl<T> EntitySetResource<T> {
    pub(crate) fn factory(client: ODataClient, name: &str, type_name: &str) -> Self {
        Self::from_core(ResourceCore::root(client, SegmentKind::EntitySet, name, type_name))
    }

    /// Single entity by key; collection options are dropped.
    ///
    /// # Errors
    /// Returns `Error::Core` if the key cannot be applied.
    pub fn entity(&self, key: impl Into<EntityKey>) -> Result<EntityResource<T>> {
        let mut core = self.core.clone();
        core.options.keep(ENTITY_KEEP);
        Ok(EntityResource::from_core(core.with_key(key.into())?))
    }

    /// Entity addressed by the key found in `value`. Without a resolvable key
    /// the result has no identity and identity-requiring calls fail with
    /// `MissingKey`.
    ///
    /// # Errors
    /// Returns `Error::Core` if the key cannot be applied.
    pub fn entity_from(&self, value: &Value) -> Result<EntityResource<T>> {
        let mut core = self.core.clone();
        core.options.keep(ENTITY_KEEP);
        match core.resolve_key(value) {
            Some(key) => Ok(EntityResource::from_core(core.with_key(key)?)),
            None => Ok(EntityResource::from_core(core)),
        }
    }

    /// Restrict to a derived type: `People/NS.Employee`.
    ///
    /// # Errors
    /// Returns `Error::Core` if the segment cannot be added.
    pub fn cast<C>(&self, type_name: &str) -> Result<EntitySetResource<C>> {
        Ok(EntitySetResource::from_core(self.core.cast(type_name)?))
    }

    /// Action bound to the collection.
    ///
    /// # Errors
    /// Returns `Error::Core` if the segment cannot be added.
    pub fn action<R>(&self, type_name: &str) -> Result<ActionResource<R>> {
        ActionResource::bound(&self.core, type_name)
    }

    /// Function bound to the collection.
    ///
    /// # Errors
    /// Returns `Error::Core` if the segment cannot be added.
    pub fn function<R>(&self, type_name: &str) -> Result<FunctionResource<R>> {
        FunctionResource::bound(&self.core, type_name)
    }

    /// `$count` of the collection; only the filter is retained.
    ///
    /// # Errors
    /// Returns `Error::Core` if the segment cannot be added.
    pub fn count(&self) -> Result<CountResource> {
        Ok(CountResource::from_core(self.core.append(
            SegmentKind::Count,
            odata_core::segments::COUNT_SEGMENT,
            None,
            COUNT_KEEP,
        )?))
    }

    #[must_use]
    pub fn client(&self) -> &ODataClient {
        &self.core.client
    }
}

impl<T> EntitySetResource<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// One page of the collection; `with_count` asks for `@odata.count`.
    ///
    /// # Errors
    /// Returns transport, decoding or encoding errors.
    pub async fn get(&self, with_count: bool) -> Result<Entities<T>> {
        self.core.fetch_entities(with_count).await
    }

    /// Every entity across all pages, following skip and skiptoken cursors.
    #[must_use]
    pub fn all(&self) -> ItemsStream<'static, T> {
        self.core.items()
    }

    /// Like [`all`](Self::all) but yielding whole pages.
    #[must_use]
    pub fn pages(&self) -> PagesStream<'static, T> {
        self.core.pages()
    }

    /// Drain [`all`](Self::all) into a vector.
    ///
    /// # Errors
    /// Returns the first page error; no partial result is returned.
    pub async fn fetch_all(&self) -> Result<Vec<T>> {
        self.all().try_collect().await
    }
}

impl<T> EntitySetResource<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Create an entity in the collection.
    ///
    /// # Errors
    /// Returns transport, decoding or encoding errors.
    pub async fn post(&self, entity: &T) -> Result<Entity<T>> {
        self.create(&serde_json::to_value(entity)?).await
    }
}

impl<T: DeserializeOwned> EntitySetResource<T> {
    /// `POST` of an already serialized entity.
    pub(crate) async fn create(&self, entity: &Value) -> Result<Entity<T>> {
        let body = self.core.serialize_body(entity)?;
        let mut core = self.core.clone();
        core.options.keep(ENTITY_KEEP);
        core.write_entity(Method::POST, body, None).await
    }
}
