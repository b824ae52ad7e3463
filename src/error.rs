//! Error types for asset resolution, decoding and fetching

use thiserror::Error;

/// Why an icon or animation could not be produced.
///
/// On the lookup path every variant collapses to "no asset available": the
/// identifier is memoized as failed and the caller receives `None`. The
/// variants exist so the cause can be logged and tested.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IconError {
    /// No catalog entry, sheet or local file matches the identifier
    #[error("no asset found for '{0}'")]
    NotFound(String),
    /// Bad magic, unsupported bit depth, truncated header or out-of-range tile
    #[error("malformed asset: {0}")]
    Malformed(String),
    /// A buffer reservation failed while decoding
    #[error("failed to allocate {bytes} bytes")]
    AllocationFailure { bytes: usize },
    /// Timeout, non-200 status, exhausted redirects or empty body
    #[error("network failure: {0}")]
    NetworkFailure(String),
    /// The PNG or GIF codec rejected the stream
    #[error("decode failure: {0}")]
    DecodeFailure(String),
    /// Storage I/O error
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<png::DecodingError> for IconError {
    fn from(e: png::DecodingError) -> Self {
        match e {
            png::DecodingError::IoError(io) => IconError::Io(io),
            other => IconError::DecodeFailure(format!("png: {}", other)),
        }
    }
}

impl From<gif::DecodingError> for IconError {
    fn from(e: gif::DecodingError) -> Self {
        IconError::DecodeFailure(format!("gif: {}", e))
    }
}

impl From<reqwest::Error> for IconError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            IconError::NetworkFailure(format!("timed out: {}", e))
        } else {
            IconError::NetworkFailure(e.to_string())
        }
    }
}

impl From<image::ImageError> for IconError {
    fn from(e: image::ImageError) -> Self {
        IconError::DecodeFailure(e.to_string())
    }
}
