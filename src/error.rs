//! Error types for the importer.
//!
//! This module defines all error types that can occur while dispatching,
//! parsing, decomposing or handling a document.

/// Result type alias for importer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed underlying cause carried by wrapped errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error types that can occur during document import.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A parser could not process a document at all
    #[error("Could not parse document \"{reference}\": {source}")]
    Parse {
        /// Reference of the document being parsed
        reference: String,
        /// Underlying cause
        #[source]
        source: BoxError,
    },

    /// A filter, tagger, transformer or splitter failed mid-document
    #[error("Handler {handler} failed on document \"{reference}\": {source}")]
    Handler {
        /// Reference of the document being handled
        reference: String,
        /// Name of the failing handler
        handler: String,
        /// Underlying cause
        #[source]
        source: BoxError,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid regular expression in configuration
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Invalid or unknown configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON configuration error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Container format error (corrupt or unsupported archive)
    #[error("Archive error: {0}")]
    Archive(String),

    /// Unknown explicitly configured charset
    #[error("Unsupported charset: {0}")]
    Charset(String),
}

impl Error {
    /// Wrap any error as a parse error for the given document.
    pub fn parse(reference: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Parse {
            reference: reference.into(),
            source: source.into(),
        }
    }

    /// Wrap any error as a handler error for the given document.
    pub fn handler(
        reference: impl Into<String>,
        handler: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Error::Handler {
            reference: reference.into(),
            handler: handler.into(),
            source: source.into(),
        }
    }

    /// Reference of the document this error is about, when known.
    pub fn reference(&self) -> Option<&str> {
        match self {
            Error::Parse { reference, .. } | Error::Handler { reference, .. } => Some(reference),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error() {
        let err = Error::parse("doc.zip", Error::Archive("bad central directory".to_string()));
        let msg = format!("{}", err);
        assert!(msg.contains("doc.zip"));
        assert!(msg.contains("bad central directory"));
        assert_eq!(err.reference(), Some("doc.zip"));
    }

    #[test]
    fn test_handler_error() {
        let err = Error::handler("a.txt", "ReplaceTransformer", "boom");
        let msg = format!("{}", err);
        assert!(msg.contains("ReplaceTransformer"));
        assert!(msg.contains("a.txt"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn test_source_is_kept() {
        use std::error::Error as _;
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated");
        let err = Error::parse("x", io);
        let source = err.source().expect("parse error should carry a source");
        assert!(source.to_string().contains("truncated"));
    }

    #[test]
    fn test_config_error_has_no_reference() {
        let err = Error::Config("unknown handler".to_string());
        assert!(err.reference().is_none());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
