use bytes::Bytes;
use http::Method;

use super::{ResourceCore, resource_accessors};
use crate::error::Result;

/// The raw value of a property or media entity: `.../Photo/$value`.
#[derive(Clone, Debug)]
pub struct ValueResource {
    core: ResourceCore,
}

resource_accessors!(impl[] ValueResource);

impl ValueResource {
    pub(crate) fn from_core(core: ResourceCore) -> Self {
        Self { core }
    }

    /// # Errors
    /// Returns transport errors.
    pub async fn get_bytes(&self) -> Result<Bytes> {
        Ok(self.core.send(Method::GET, None, None, false).await?.body)
    }

    /// Body decoded as UTF-8, invalid sequences replaced.
    ///
    /// # Errors
    /// Returns transport errors.
    pub async fn get_text(&self) -> Result<String> {
        Ok(self.core.send(Method::GET, None, None, false).await?.text())
    }
}
