//! Record-style persistence on top of an entity set.

use std::marker::PhantomData;

use odata_core::EntityKey;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::annotations::{Entity, ODATA_ETAG};
use crate::client::ODataClient;
use crate::error::{Error, Result};
use crate::resource::{EntityResource, EntitySetResource};

/// Create, read, update and delete entities of one entity set, addressing
/// each by the key its parser resolves from the value itself.
pub struct EntityService<T> {
    client: ODataClient,
    entity_set: String,
    type_name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for EntityService<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            entity_set: self.entity_set.clone(),
            type_name: self.type_name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for EntityService<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityService")
            .field("entity_set", &self.entity_set)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Serialized value with its `@odata.etag` taken out.
struct Record {
    body: Value,
    etag: Option<String>,
}

impl Record {
    fn new<T: Serialize>(value: &T) -> Result<Self> {
        let mut body = serde_json::to_value(value)?;
        let etag = body
            .as_object_mut()
            .and_then(|o| o.remove(ODATA_ETAG))
            .and_then(|e| e.as_str().map(str::to_owned));
        Ok(Self { body, etag })
    }
}

impl<T> EntityService<T> {
    #[must_use]
    pub fn new(client: ODataClient, entity_set: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            client,
            entity_set: entity_set.into(),
            type_name: type_name.into(),
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn entities(&self) -> EntitySetResource<T> {
        self.client.entity_set(&self.entity_set, &self.type_name)
    }

    /// # Errors
    /// Returns `Error::Core` if the key cannot be applied.
    pub fn entity(&self, key: impl Into<EntityKey>) -> Result<EntityResource<T>> {
        self.entities().entity(key)
    }

    /// Entity addressed by the key inside `record`.
    fn addressed(&self, record: &Record) -> Result<EntityResource<T>> {
        let entity = self.entities().entity_from(&record.body)?;
        if entity.has_key() {
            Ok(entity)
        } else {
            Err(Error::missing_key(self.entity_set.as_str()))
        }
    }
}

impl<T> EntityService<T>
where
    T: Serialize + DeserializeOwned,
{
    /// # Errors
    /// Returns transport, decoding or encoding errors.
    pub async fn create(&self, value: &T) -> Result<Entity<T>> {
        let record = Record::new(value)?;
        self.entities().create(&record.body).await
    }

    /// Replace the stored entity, sending its `@odata.etag` as `If-Match`.
    ///
    /// # Errors
    /// `MissingKey` when `value` has no resolvable key, otherwise transport,
    /// decoding or encoding errors.
    pub async fn update(&self, value: &T) -> Result<Entity<T>> {
        let record = Record::new(value)?;
        self.addressed(&record)?
            .replace(&record.body, record.etag.as_deref())
            .await
    }

    /// Patch `changes` onto the stored entity and return its new state. When
    /// the server answers without a body the local value with `changes`
    /// merged in is returned instead.
    ///
    /// # Errors
    /// `MissingKey` when `value` has no resolvable key, otherwise transport,
    /// decoding or encoding errors.
    pub async fn assign(&self, value: &T, changes: &Map<String, Value>) -> Result<T> {
        let record = Record::new(value)?;
        let entity = self.addressed(&record)?;
        let patched = entity
            .patch(&Value::Object(changes.clone()), record.etag.as_deref())
            .await?;
        if let Some(updated) = patched.entity {
            return Ok(updated);
        }
        let mut merged = match record.body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        merged.extend(changes.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Some(etag) = patched.meta.etag {
            merged.insert(ODATA_ETAG.to_owned(), Value::String(etag));
        }
        Ok(serde_json::from_value(Value::Object(merged))?)
    }

    /// # Errors
    /// `MissingKey` when `value` has no resolvable key, otherwise transport
    /// errors.
    pub async fn destroy(&self, value: &T) -> Result<()> {
        let record = Record::new(value)?;
        self.addressed(&record)?
            .delete(record.etag.as_deref())
            .await
    }

    /// Re-read the stored state of `value`.
    ///
    /// # Errors
    /// `MissingKey` when `value` has no resolvable key, otherwise transport or
    /// decoding errors.
    pub async fn fetch(&self, value: &T) -> Result<Entity<T>> {
        let record = Record::new(value)?;
        self.addressed(&record)?.get().await
    }

    /// [`fetch`](Self::fetch), creating the entity when the server reports
    /// `404 Not Found`. Any other failure propagates.
    ///
    /// # Errors
    /// Returns errors of the read or of the create.
    pub async fn fetch_or_create(&self, value: &T) -> Result<Entity<T>> {
        match self.fetch(value).await {
            Err(err) if err.is_not_found() => {
                tracing::debug!(entity_set = %self.entity_set, "entity not found, creating");
                self.create(value).await
            }
            other => other,
        }
    }

    /// Create when `value` has no key yet, update otherwise.
    ///
    /// # Errors
    /// Returns errors of the create or of the update.
    pub async fn save(&self, value: &T) -> Result<Entity<T>> {
        let record = Record::new(value)?;
        if self.addressed(&record).is_ok() {
            self.update(value).await
        } else {
            self.entities().create(&record.body).await
        }
    }
}
