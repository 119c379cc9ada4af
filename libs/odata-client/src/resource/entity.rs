use std::marker::PhantomData;

use http::Method;
use odata_core::{EntityKey, SegmentKind};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{
    ActionResource, FunctionResource, NavigationPropertyResource, PropertyResource, ResourceCore,
    FORMAT_KEEP, projection_options, typed_resource,
};
use crate::annotations::Entity;
use crate::error::Result;

/// One entity, e.g. `People('russellwhyte')`.
///
/// Built without a key (see `EntitySetResource::entity_from`) it only
/// describes the collection position; every call that needs identity fails
/// with `MissingKey` until [`with_key`](Self::with_key) supplies one.
pub struct EntityResource<T> {
    core: ResourceCore,
    _marker: PhantomData<fn() -> T>,
}

typed_resource!(EntityResource);
projection_options!(impl[T] EntityResource<T>);

impl<T> EntityResource<T> {
    #[must_use]
    pub fn key(&self) -> Option<&EntityKey> {
        self.core.key()
    }

    #[must_use]
    pub fn has_key(&self) -> bool {
        self.core.key().is_some()
    }

    /// Same entity position with another key.
    ///
    /// # Errors
    /// Returns `Error::Core` if the key cannot be applied.
    pub fn with_key(&self, key: impl Into<EntityKey>) -> Result<Self> {
        Ok(Self::from_core(self.core.with_key(key.into())?))
    }

    /// Drop one member of a composite key; see `EntityKey::without`.
    #[must_use]
    pub fn without_key_member(&self, name: &str) -> Self {
        let mut core = self.core.clone();
        if let Some(kind) = core.key_segment().map(odata_core::PathSegment::kind)
            && let Ok(segment) = core.segments.segment(kind, None)
        {
            segment.unset_key_member(name);
        }
        Self::from_core(core)
    }

    /// View the entity as a derived type: `People(1)/NS.Employee`.
    ///
    /// # Errors
    /// Returns `Error::Core` if the segment cannot be added.
    pub fn cast<C>(&self, type_name: &str) -> Result<EntityResource<C>> {
        Ok(EntityResource::from_core(self.core.cast(type_name)?))
    }

    /// Navigate to a related entity or collection. Select and expand stay
    /// behind; format carries over.
    ///
    /// # Errors
    /// `MissingKey` when this entity has no key.
    pub fn navigation_property<N>(&self, name: &str) -> Result<NavigationPropertyResource<N>> {
        self.core.require_key()?;
        NavigationPropertyResource::enter(&self.core, name)
    }

    /// # Errors
    /// `MissingKey` when this entity has no key.
    pub fn property<P>(&self, name: &str) -> Result<PropertyResource<P>> {
        self.core.require_key()?;
        let type_name = self.core.property_type(name);
        Ok(PropertyResource::from_core(self.core.append(
            SegmentKind::Property,
            name,
            type_name,
            FORMAT_KEEP,
        )?))
    }

    /// # Errors
    /// `MissingKey` when this entity has no key.
    pub fn action<R>(&self, type_name: &str) -> Result<ActionResource<R>> {
        self.core.require_key()?;
        ActionResource::bound(&self.core, type_name)
    }

    /// # Errors
    /// `MissingKey` when this entity has no key.
    pub fn function<R>(&self, type_name: &str) -> Result<FunctionResource<R>> {
        self.core.require_key()?;
        FunctionResource::bound(&self.core, type_name)
    }

    /// # Errors
    /// `MissingKey` when this entity has no key.
    pub async fn delete(&self, etag: Option<&str>) -> Result<()> {
        self.core.require_key()?;
        self.core.delete(etag).await
    }
}

impl<T: DeserializeOwned> EntityResource<T> {
    /// # Errors
    /// `MissingKey` when this entity has no key, otherwise transport or
    /// decoding errors.
    pub async fn get(&self) -> Result<Entity<T>> {
        self.core.require_key()?;
        self.core.fetch_entity().await
    }

    /// Partial update with the given members.
    ///
    /// # Errors
    /// `MissingKey` when this entity has no key, otherwise transport or
    /// decoding errors.
    pub async fn patch(&self, changes: &Value, etag: Option<&str>) -> Result<Entity<T>> {
        self.core.require_key()?;
        let body = self.core.serialize_body(changes)?;
        self.core.write_entity(Method::PATCH, body, etag).await
    }

    /// `PUT` of an already serialized entity.
    pub(crate) async fn replace(&self, entity: &Value, etag: Option<&str>) -> Result<Entity<T>> {
        self.core.require_key()?;
        let body = self.core.serialize_body(entity)?;
        self.core.write_entity(Method::PUT, body, etag).await
    }
}

impl<T: Serialize + DeserializeOwned> EntityResource<T> {
    /// Full replacement.
    ///
    /// # Errors
    /// `MissingKey` when this entity has no key, otherwise transport or
    /// decoding errors.
    pub async fn put(&self, entity: &T, etag: Option<&str>) -> Result<Entity<T>> {
        self.replace(&serde_json::to_value(entity)?, etag).await
    }
}
