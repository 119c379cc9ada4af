use std::marker::PhantomData;

use futures_util::TryStreamExt;
use odata_core::SegmentKind;
use odata_core::segments::VALUE_SEGMENT;
use serde::de::DeserializeOwned;

use super::{FORMAT_KEEP, ResourceCore, ValueResource, typed_resource};
use crate::annotations::Property;
use crate::error::Result;
use crate::pager::{ItemsStream, PagesStream};

/// A structural property of an entity, e.g. `People('x')/FirstName`.
pub struct PropertyResource<T> {
    core: ResourceCore,
    _marker: PhantomData<fn() -> T>,
}

typed_resource!(PropertyResource);

impl<T> PropertyResource<T> {
    /// The raw `$value` of the property. No query option applies.
    ///
    /// # Errors
    /// Returns `Error::Core` if the segment cannot be added.
    pub fn value(&self) -> Result<ValueResource> {
        Ok(ValueResource::from_core(self.core.append(
            SegmentKind::Value,
            VALUE_SEGMENT,
            None,
            &[],
        )?))
    }

    /// Member of a complex-typed property: `Address/City`.
    ///
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
}

impl<T: DeserializeOwned> PropertyResource<T> {
    /// Read the `value` member of the response.
    ///
    /// # Errors
    /// Returns transport or decoding errors.
    pub async fn get(&self) -> Result<Property<T>> {
        self.core.fetch_property().await
    }
}

impl<T> PropertyResource<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Items of a collection-valued property across all pages.
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
