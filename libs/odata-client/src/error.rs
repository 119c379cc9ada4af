use thiserror::Error;

/// Failure reported by a [`Transport`](crate::transport::Transport), or a
/// non-2xx answer turned into an error by the client.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TransportError {
    /// HTTP non-2xx status
    #[error("HTTP {status}: {body_preview}")]
    Status {
        status: http::StatusCode,
        body_preview: String,
    },

    /// Network-level failure (connection, DNS, TLS, timeout)
    #[error("Transport error: {0}")]
    Failed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    #[must_use]
    pub fn failed(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        TransportError::Failed(err.into())
    }

    #[must_use]
    pub fn status(&self) -> Option<http::StatusCode> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Failed(_) => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(http::StatusCode::NOT_FOUND)
    }
}

/// Client error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Invalid resource chain or option value
    #[error(transparent)]
    Core(#[from] odata_core::Error),

    /// Transport failure or non-2xx status, propagated unchanged
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// JSON encoding or decoding failed
    #[error("JSON processing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Configured header name is not a valid HTTP header name
    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// Configured header or etag value is not a valid HTTP header value
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// The response did not have the expected shape
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A registered parser rejected a value
    #[error("Parser for '{type_name}' failed: {reason}")]
    Parser { type_name: String, reason: String },
}

impl Error {
    pub(crate) fn missing_key(segment: impl Into<String>) -> Self {
        Error::Core(odata_core::Error::MissingKey {
            segment: segment.into(),
        })
    }

    pub(crate) fn parser(type_name: &str, reason: impl Into<String>) -> Self {
        Error::Parser {
            type_name: type_name.to_owned(),
            reason: reason.into(),
        }
    }

    /// The server answered 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Transport(t) if t.is_not_found())
    }

    #[must_use]
    pub fn is_missing_key(&self) -> bool {
        matches!(self, Error::Core(odata_core::Error::MissingKey { .. }))
    }

    #[must_use]
    pub fn status(&self) -> Option<http::StatusCode> {
        match self {
            Error::Transport(t) => t.status(),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_detected_through_the_wrapper() {
        let err: Error = TransportError::Status {
            status: http::StatusCode::NOT_FOUND,
            body_preview: String::new(),
        }
        .into();
        assert!(err.is_not_found());
        assert_eq!(err.status(), Some(http::StatusCode::NOT_FOUND));
    }

    #[test]
    fn failed_has_no_status() {
        let err = TransportError::failed("connection reset");
        assert!(err.status().is_none());
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "Transport error: connection reset");
    }

    #[test]
    fn missing_key_wraps_core_error() {
        let err = Error::missing_key("People");
        assert!(err.is_missing_key());
        assert!(err.to_string().contains("People"));
    }
}
