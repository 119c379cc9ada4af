use std::fmt;
use std::sync::Arc;

use http::header::{HeaderMap, HeaderValue, IF_MATCH};
use odata_core::{ExpressionEncoder, StandardEncoder};

use crate::config::ODataClientConfig;
use crate::error::{Result, TransportError};
use crate::parser::{ParserRegistry, SerializeOptions};
use crate::resource::{ActionResource, EntitySetResource, FunctionResource, SingletonResource};
use crate::transport::{ODataRequest, ODataResponse, Transport};

/// Entry point: holds configuration, transport and parser registry, and
/// hands out resource descriptors.
///
/// Cloning is cheap; clones share the same inner state.
#[derive(Clone)]
pub struct ODataClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ODataClientConfig,
    headers: HeaderMap,
    transport: Arc<dyn Transport>,
    registry: ParserRegistry,
    encoder: Arc<dyn ExpressionEncoder>,
}

impl fmt::Debug for ODataClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ODataClient")
            .field("config", &self.inner.config)
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ODataClient`].
pub struct ODataClientBuilder {
    config: ODataClientConfig,
    transport: Arc<dyn Transport>,
    registry: ParserRegistry,
    encoder: Arc<dyn ExpressionEncoder>,
}

impl ODataClientBuilder {
    #[must_use]
    pub fn registry(mut self, registry: ParserRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the [`StandardEncoder`] used to render filters and `$apply`.
    #[must_use]
    pub fn encoder(mut self, encoder: Arc<dyn ExpressionEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// # Errors
    /// Returns `Error::InvalidHeaderName`/`Error::InvalidHeaderValue` when a
    /// configured static header is not a valid HTTP header.
    pub fn build(self) -> Result<ODataClient> {
        let headers = self.config.header_map()?;
        Ok(ODataClient {
            inner: Arc::new(ClientInner {
                config: self.config,
                headers,
                transport: self.transport,
                registry: self.registry,
                encoder: self.encoder,
            }),
        })
    }
}

impl ODataClient {
    #[must_use]
    pub fn builder(config: ODataClientConfig, transport: Arc<dyn Transport>) -> ODataClientBuilder {
        ODataClientBuilder {
            config,
            transport,
            registry: ParserRegistry::default(),
            encoder: Arc::new(StandardEncoder),
        }
    }

    /// Client with an empty registry and the standard encoder.
    ///
    /// # Errors
    /// See [`ODataClientBuilder::build`].
    pub fn new(config: ODataClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        Self::builder(config, transport).build()
    }

    #[must_use]
    pub fn config(&self) -> &ODataClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn registry(&self) -> &ParserRegistry {
        &self.inner.registry
    }

    #[must_use]
    pub fn encoder(&self) -> &dyn ExpressionEncoder {
        self.inner.encoder.as_ref()
    }

    #[must_use]
    pub fn serialize_options(&self) -> SerializeOptions {
        SerializeOptions {
            ieee754_compatible: self.inner.config.ieee754_compatible,
            string_as_enum: self.inner.config.string_as_enum,
        }
    }

    /// Service root joined with `path`.
    #[must_use]
    pub fn endpoint_url(&self, path: &str) -> String {
        odata_core::serialize::join_url(&self.inner.config.service_root, path)
    }

    /// Entity set `name` holding entities of type `type_name`.
    #[must_use]
    pub fn entity_set<T>(&self, name: &str, type_name: &str) -> EntitySetResource<T> {
        EntitySetResource::factory(self.clone(), name, type_name)
    }

    #[must_use]
    pub fn singleton<T>(&self, name: &str, type_name: &str) -> SingletonResource<T> {
        SingletonResource::factory(self.clone(), name, type_name)
    }

    /// Unbound action, addressed at its registered path.
    #[must_use]
    pub fn action<R>(&self, type_name: &str) -> ActionResource<R> {
        ActionResource::unbound(self.clone(), type_name)
    }

    /// Unbound function, addressed at its registered path.
    #[must_use]
    pub fn function<R>(&self, type_name: &str) -> FunctionResource<R> {
        FunctionResource::unbound(self.clone(), type_name)
    }

    /// Send a request: static headers, `If-Match` from the etag, then any
    /// non-2xx status becomes `TransportError::Status`.
    pub(crate) async fn execute(&self, mut request: ODataRequest) -> Result<ODataResponse> {
        for (name, value) in &self.inner.headers {
            request
                .headers
                .entry(name)
                .or_insert_with(|| value.clone());
        }
        if let Some(etag) = &request.etag {
            request.headers.insert(IF_MATCH, HeaderValue::from_str(etag)?);
        }

        let method = request.method.clone();
        let path = request.path.clone();
        tracing::debug!(
            method = %method,
            path = %path,
            params = request.params.len(),
            "dispatching OData request"
        );

        let response = self.inner.transport.execute(request).await?;
        if !response.status.is_success() {
            tracing::warn!(
                method = %method,
                path = %path,
                status = %response.status,
                "OData request failed"
            );
            return Err(TransportError::Status {
                status: response.status,
                body_preview: response.body_preview(),
            }
            .into());
        }
        Ok(response)
    }
}
