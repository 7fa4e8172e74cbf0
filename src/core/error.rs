use std::sync::Arc;
use thiserror::Error;

/// Universal error type for PDF operations.
///
/// Errors are local: a tokenizer or operator error affects one token or one
/// operator, a stream-level error affects one page or form. Nothing here is
/// meant to cross a page boundary.
#[derive(Debug, Clone, Error)]
pub enum PDFError {
    /// End of stream reached unexpectedly
    #[error("Unexpected end of stream")]
    UnexpectedEndOfStream,

    /// Invalid byte range requested
    #[error("Invalid byte range: {begin}..{end}")]
    InvalidByteRange { begin: usize, end: usize },

    /// Invalid stream position
    #[error("Invalid position {pos} for stream of length {length}")]
    InvalidPosition { pos: usize, length: usize },

    /// Malformed token in a content stream or object body
    #[error("Syntax error at byte {pos}: {message}")]
    Syntax { pos: usize, message: String },

    /// Operator-level problem (bad operand types, unknown operator)
    #[error("Content stream error: {0}")]
    ContentStream(String),

    /// Stream filter failure
    #[error("{filter} error: {message}")]
    Decode { filter: String, message: String },

    /// A required object could not be found in the document
    #[error("Missing object: {0}")]
    MissingObject(String),

    /// Stream operation failed
    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

impl PDFError {
    pub fn syntax(pos: usize, message: impl Into<String>) -> Self {
        PDFError::Syntax {
            pos,
            message: message.into(),
        }
    }

    pub fn content_stream_error(message: impl Into<String>) -> Self {
        PDFError::ContentStream(message.into())
    }

    pub fn decode(filter: &str, message: impl Into<String>) -> Self {
        PDFError::Decode {
            filter: filter.to_string(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for PDFError {
    fn from(err: std::io::Error) -> Self {
        PDFError::Io(Arc::new(err))
    }
}

/// Result type alias for PDF operations
pub type PDFResult<T> = Result<T, PDFError>;
