//! Errors raised while building or serializing an `OData` request.
//!
//! All of these are local to the call that detects them: they are produced
//! synchronously while composing segments or encoding query options, before any
//! request reaches a transport.

use crate::segments::SegmentKind;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The operation needs a structural segment that the path does not have.
    #[error("missing {kind} segment")]
    MissingSegment { kind: SegmentKind },

    /// The operation needs an entity identity but the segment carries no key.
    #[error("segment '{segment}' has no entity key")]
    MissingKey { segment: String },

    /// Keys can only be applied to entity-set and navigation-property segments.
    #[error("a key cannot be applied to a {kind} segment")]
    InvalidKeySegment { kind: SegmentKind },

    /// A query option or literal value does not fit its declared shape.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// A serialized query parameter could not be read back.
    #[error("invalid query parameter {name}: {reason}")]
    InvalidParam { name: String, reason: String },
}

impl Error {
    pub(crate) fn encoding(msg: impl Into<String>) -> Self {
        Error::Encoding(msg.into())
    }

    pub(crate) fn invalid_param(name: &str, reason: impl Into<String>) -> Self {
        Error::InvalidParam {
            name: name.to_owned(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
