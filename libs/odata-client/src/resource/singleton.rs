use std::marker::PhantomData;

use http::Method;
use odata_core::SegmentKind;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{
    ActionResource, FORMAT_KEEP, FunctionResource, NavigationPropertyResource, PropertyResource,
    ResourceCore, projection_options, typed_resource,
};
use crate::annotations::Entity;
use crate::client::ODataClient;
use crate::error::Result;

/// A single named entity exposed at the service root, e.g. `Me`.
pub struct SingletonResource<T> {
    core: ResourceCore,
    _marker: PhantomData<fn() -> T>,
}

typed_resource!(SingletonResource);
projection_options!(impl[T] SingletonResource<T>);

impl<T> SingletonResource<T> {
    pub(crate) fn factory(client: ODataClient, name: &str, type_name: &str) -> Self {
        Self::from_core(ResourceCore::root(client, SegmentKind::Singleton, name, type_name))
    }

    /// # Errors
    /// Returns `Error::Core` if the segment cannot be added.
    pub fn navigation_property<N>(&self, name: &str) -> Result<NavigationPropertyResource<N>> {
        NavigationPropertyResource::enter(&self.core, name)
    }

    /// # Errors
    /// Returns `Error::Core` if the segment cannot be added.
    pub fn property<P>(&self, name: &str) -> Result<PropertyResource<P>> {
        let type_name = self.core.property_type(name);
        Ok(PropertyResource::from_core(self.core.append(
            SegmentKind::Property,
            name,
            type_name,
            FORMAT_KEEP,
        )?))
    }

    /// # Errors
    /// Returns `Error::Core` if the segment cannot be added.
    pub fn action<R>(&self, type_name: &str) -> Result<ActionResource<R>> {
        ActionResource::bound(&self.core, type_name)
    }

    /// # Errors
    /// Returns `Error::Core` if the segment cannot be added.
    pub fn function<R>(&self, type_name: &str) -> Result<FunctionResource<R>> {
        FunctionResource::bound(&self.core, type_name)
    }
}

impl<T: DeserializeOwned> SingletonResource<T> {
    /// # Errors
    /// Returns transport or decoding errors.
    pub async fn get(&self) -> Result<Entity<T>> {
        self.core.fetch_entity().await
    }

    /// # Errors
    /// Returns transport or decoding errors.
    pub async fn patch(&self, changes: &Value, etag: Option<&str>) -> Result<Entity<T>> {
        let body = self.core.serialize_body(changes)?;
        self.core.write_entity(Method::PATCH, body, etag).await
    }
}

impl<T: Serialize + DeserializeOwned> SingletonResource<T> {
    /// # Errors
    /// Returns transport or decoding errors.
    pub async fn put(&self, entity: &T, etag: Option<&str>) -> Result<Entity<T>> {
        let body = self.core.serialize_body(entity)?;
        self.core.write_entity(Method::PUT, body, etag).await
    }
}
