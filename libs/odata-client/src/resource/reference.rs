use http::Method;
use serde_json::{Value, json};

use super::{ResourceCore, ResourcePath, resource_accessors};
use crate::annotations::ODATA_ID;
use crate::error::Result;

/// Query parameter naming the entity to unlink from a collection.
const ID_PARAM: &str = "$id";

/// The `$ref` of a navigation property, used to link and unlink entities.
#[derive(Clone, Debug)]
pub struct ReferenceResource {
    core: ResourceCore,
}

resource_accessors!(impl[] ReferenceResource);

impl ReferenceResource {
    pub(crate) fn from_core(core: ResourceCore) -> Self {
        Self { core }
    }

    fn target_id<R: ResourcePath>(&self, target: &R) -> Result<String> {
        Ok(self.core.client.endpoint_url(&target.resource_path()?))
    }

    /// The `@odata.id` currently referenced (single-valued navigation).
    ///
    /// # Errors
    /// Returns transport or decoding errors.
    pub async fn get(&self) -> Result<Option<String>> {
        let body = self
            .core
            .send(Method::GET, None, None, false)
            .await?
            .json_body()?;
        Ok(body
            .as_ref()
            .and_then(|b| b.get(ODATA_ID))
            .and_then(Value::as_str)
            .map(str::to_owned))
    }

    /// Add `target` to a collection-valued navigation.
    ///
    /// # Errors
    /// Returns transport or encoding errors.
    pub async fn add<R: ResourcePath>(&self, target: &R) -> Result<()> {
        let body = json!({ ODATA_ID: self.target_id(target)? });
        self.core.send(Method::POST, Some(body), None, false).await?;
        Ok(())
    }

    /// Point a single-valued navigation at `target`.
    ///
    /// # Errors
    /// Returns transport or encoding errors.
    pub async fn set<R: ResourcePath>(&self, target: &R, etag: Option<&str>) -> Result<()> {
        let body = json!({ ODATA_ID: self.target_id(target)? });
        self.core.send(Method::PUT, Some(body), etag, false).await?;
        Ok(())
    }

    /// Clear a single-valued navigation.
    ///
    /// # Errors
    /// Returns transport errors.
    pub async fn remove(&self, etag: Option<&str>) -> Result<()> {
        self.core.delete(etag).await
    }

    /// Remove `target` from a collection-valued navigation (`$id=...`).
    ///
    /// # Errors
    /// Returns transport or encoding errors.
    pub async fn remove_target<R: ResourcePath>(&self, target: &R, etag: Option<&str>) -> Result<()> {
        let id = self.target_id(target)?;
        self.core.with_custom([(ID_PARAM, id)]).delete(etag).await
    }
}
