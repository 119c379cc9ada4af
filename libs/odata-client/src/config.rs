use std::collections::BTreeMap;

use figment::Figment;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration section read by [`ODataClientConfig::from_figment`].
pub const CONFIG_SECTION: &str = "odata";

/// Client configuration.
///
/// ```yaml
/// odata:
///   service_root: "https://services.example.com/TripPin"
///   with_count: false
///   ieee754_compatible: true
///   headers:
///     OData-MaxVersion: "4.0"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ODataClientConfig {
    /// Prefix for every request path (default: empty, paths stay relative)
    pub service_root: String,

    /// Ask for `$count=true` on every collection fetch
    pub with_count: bool,

    /// Send enum members as plain strings instead of their numeric value
    pub string_as_enum: bool,

    /// Int64 and Decimal values travel as JSON strings
    pub ieee754_compatible: bool,

    /// Extra static headers passed with every request
    pub headers: BTreeMap<String, String>,
}

impl ODataClientConfig {
    #[must_use]
    pub fn new(service_root: impl Into<String>) -> Self {
        Self {
            service_root: service_root.into(),
            ..Self::default()
        }
    }

    /// Extract the `odata` section; a missing section yields the defaults.
    ///
    /// # Errors
    /// Returns a `figment::Error` when the section exists but does not match
    /// the expected shape.
    pub fn from_figment(figment: &Figment) -> Result<Self, figment::Error> {
        if !figment.contains(CONFIG_SECTION) {
            return Ok(Self::default());
        }
        figment.extract_inner(CONFIG_SECTION)
    }

    /// Static headers as an [`http::HeaderMap`].
    ///
    /// # Errors
    /// Returns `Error::InvalidHeaderName`/`Error::InvalidHeaderValue` for
    /// entries that are not valid HTTP headers.
    pub fn header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            map.insert(
                HeaderName::from_bytes(name.as_bytes())?,
                HeaderValue::from_str(value)?,
            );
        }
        Ok(map)
    }
}
