use http::Method;

use super::{ResourceCore, resource_accessors};
use crate::error::{Error, Result};

/// `$count` of a collection. Only the filter of the collection is kept.
#[derive(Clone, Debug)]
pub struct CountResource {
    core: ResourceCore,
}

resource_accessors!(impl[] CountResource);

impl CountResource {
    pub(crate) fn from_core(core: ResourceCore) -> Self {
        Self { core }
    }

    #[must_use]
    pub fn filter(&self, filter: impl Into<odata_core::Filter>) -> Self {
        self.with_option(odata_core::QueryOption::Filter(filter.into()))
    }

    /// The plain-text count.
    ///
    /// # Errors
    /// Returns transport errors, or `UnexpectedResponse` if the body is not a
    /// non-negative integer.
    pub async fn get(&self) -> Result<u64> {
        let text = self.core.send(Method::GET, None, None, false).await?.text();
        text.trim()
            .parse()
            .map_err(|_| Error::UnexpectedResponse(format!("'{}' is not a count", text.trim())))
    }
}
