use std::marker::PhantomData;

use futures_util::TryStreamExt;
use http::Method;
use odata_core::segments::{COUNT_SEGMENT, REF_SEGMENT};
use odata_core::{EntityKey, SegmentKind};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{
    ActionResource, COUNT_KEEP, CountResource, FORMAT_KEEP, FunctionResource, PropertyResource,
    ReferenceResource, ResourceCore, collection_options, typed_resource,
};
use crate::annotations::{Entities, Entity};
use crate::error::Result;
use crate::pager::{ItemsStream, PagesStream};

/// A navigation from an entity, e.g. `People('x')/Trips`.
///
/// Collection-shaped until a key is applied, entity-shaped afterwards.
pub struct NavigationPropertyResource<T> {
    core: ResourceCore,
    _marker: PhantomData<fn() -> T>,
}

typed_resource!(NavigationPropertyResource);
collection_options!(impl[T] NavigationPropertyResource<T>);

impl<T> NavigationPropertyResource<T> {
    /// Append the navigation segment to `parent`. Only format survives the
    /// boundary; the segment type comes from the parent's parser.
    pub(crate) fn enter(parent: &ResourceCore, name: &str) -> Result<Self> {
        let type_name = parent.property_type(name);
        Ok(Self::from_core(parent.append(
            SegmentKind::NavigationProperty,
            name,
            type_name,
            FORMAT_KEEP,
        )?))
    }

    #[must_use]
    pub fn key(&self) -> Option<&EntityKey> {
        self.core.key()
    }

    #[must_use]
    pub fn has_key(&self) -> bool {
        self.key().is_some()
    }

    /// Address one member of the collection: `Trips(3)`. Collection options
    /// are dropped.
    ///
    /// # Errors
    /// Returns `Error::Core` if the key cannot be applied.
    pub fn with_key(&self, key: impl Into<EntityKey>) -> Result<Self> {
        Ok(Self::from_core(self.core.with_key(key.into())?))
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
    pub fn cast<C>(&self, type_name: &str) -> Result<NavigationPropertyResource<C>> {
        let mut core = self.core.clone();
        core.segments
            .segment(SegmentKind::TypeCast, Some(type_name))?
            .set_type(Some(type_name.to_owned()));
        Ok(NavigationPropertyResource::from_core(core))
    }

    /// The `$ref` of this navigation, to link or unlink entities.
    ///
    /// # Errors
    /// Returns `Error::Core` if the segment cannot be added.
    pub fn reference(&self) -> Result<ReferenceResource> {
        Ok(ReferenceResource::from_core(self.core.append(
            SegmentKind::Reference,
            REF_SEGMENT,
            None,
            FORMAT_KEEP,
        )?))
    }

    /// # Errors
    /// Returns `Error::Core` if the segment cannot be added.
    pub fn count(&self) -> Result<CountResource> {
        Ok(CountResource::from_core(self.core.append(
            SegmentKind::Count,
            COUNT_SEGMENT,
            None,
            COUNT_KEEP,
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

    /// # Errors
    /// Returns transport errors.
    pub async fn delete(&self, etag: Option<&str>) -> Result<()> {
        self.core.delete(etag).await
    }
}

impl<T: DeserializeOwned> NavigationPropertyResource<T> {
    /// Read a single-valued navigation or a keyed member.
    ///
    /// # Errors
    /// Returns transport or decoding errors.
    pub async fn single(&self) -> Result<Entity<T>> {
        self.core.fetch_entity().await
    }

    /// One page of a collection-valued navigation.
    ///
    /// # Errors
    /// Returns transport or decoding errors.
    pub async fn collection(&self, with_count: bool) -> Result<Entities<T>> {
        self.core.fetch_entities(with_count).await
    }

    /// # Errors
    /// Returns transport or decoding errors.
    pub async fn patch(&self, changes: &Value, etag: Option<&str>) -> Result<Entity<T>> {
        let body = self.core.serialize_body(changes)?;
        self.core.write_entity(Method::PATCH, body, etag).await
    }
}

impl<T> NavigationPropertyResource<T>
where
    T: DeserializeOwned + Send + 'static,
{
    #[must_use]
    pub fn all(&self) -> ItemsStream<'static, T> {
        self.core.items()
    }

    #[must_use]
    pub fn pages(&self) -> PagesStream<'static, T> {
        self.core.pages()
    }

    /// # Errors
    /// Returns the first page error.
    pub async fn fetch_all(&self) -> Result<Vec<T>> {
        self.all().try_collect().await
    }
}

impl<T: Serialize + DeserializeOwned> NavigationPropertyResource<T> {
    /// Create a related entity in the navigation collection.
    ///
    /// # Errors
    /// Returns transport, decoding or encoding errors.
    pub async fn post(&self, entity: &T) -> Result<Entity<T>> {
        let body = self.core.serialize_body(entity)?;
        self.core.write_entity(Method::POST, body, None).await
    }

    /// # Errors
    /// Returns transport, decoding or encoding errors.
    pub async fn put(&self, entity: &T, etag: Option<&str>) -> Result<Entity<T>> {
        let body = self.core.serialize_body(entity)?;
        self.core.write_entity(Method::PUT, body, etag).await
    }
}
