use std::io;

use thiserror::Error;

/// The closed error taxonomy surfaced to hosts.
///
/// Handlers abort on the first error; recoverable per-object failures during
/// inspection are logged and degrade to absent report fields instead.
#[derive(Debug, Error)]
pub enum PdfError {
    /// Malformed PDF syntax or a malformed embedded structure
    #[error("parse failure: {message}")]
    ParseFailure {
        message: String,
        /// Byte offset into the source, when known
        offset: Option<usize>,
    },

    /// An instruction that contradicts the document state
    #[error("validation failure: {message}")]
    ValidationFailure { message: String },

    /// A named thing (node id, page, font resource, annotation index) that
    /// does not exist in the container it was sought in
    #[error("{what} not found in {container}")]
    NotFound { what: String, container: String },

    #[error("unsupported operation: {message}")]
    UnsupportedOperation { message: String },

    #[error("internal failure: {message}")]
    InternalFailure { message: String },

    /// Cooperative cancellation; distinct from failure
    #[error("operation cancelled")]
    Cancelled,
}

impl PdfError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::ParseFailure {
            message: message.into(),
            offset: None,
        }
    }

    pub fn parse_at(message: impl Into<String>, offset: usize) -> Self {
        Self::ParseFailure {
            message: message.into(),
            offset: Some(offset),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailure {
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>, container: impl Into<String>) -> Self {
        Self::NotFound {
            what: what.into(),
            container: container.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalFailure {
            message: message.into(),
        }
    }

    /// The stable kind tag of this error
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ParseFailure { .. } => "parse_failure",
            Self::ValidationFailure { .. } => "validation_failure",
            Self::NotFound { .. } => "not_found",
            Self::UnsupportedOperation { .. } => "unsupported_operation",
            Self::InternalFailure { .. } => "internal_failure",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<io::Error> for PdfError {
    fn from(err: io::Error) -> Self {
        Self::InternalFailure {
            message: err.to_string(),
        }
    }
}

pub type PdfResult<T> = Result<T, PdfError>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kind_tags_are_stable() {
        assert_eq!(PdfError::parse("x").kind(), "parse_failure");
        assert_eq!(
            PdfError::not_found("node \"h1\"", "node index").kind(),
            "not_found"
        );
        assert_eq!(PdfError::Cancelled.kind(), "cancelled");
    }

    #[test]
    fn not_found_message_names_both_sides() {
        let err = PdfError::not_found("annotation index 4", "page 2 (2 annotations)");
        assert_eq!(
            err.to_string(),
            "annotation index 4 not found in page 2 (2 annotations)"
        );
    }
}
