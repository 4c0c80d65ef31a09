//! Error types for reader operations

use crate::types::ElementKind;
use thiserror::Error;

/// Main error type for container and reader operations
///
/// Variants fall into four classes: open failures (`InvalidFormat`,
/// `UnsupportedVersion`, `DatasetIndex`, `TypeMismatch`), range failures
/// (`OutOfBounds`, `BufferTooSmall`), runtime storage failures (`Io`,
/// `Corrupt`, `Decompression`, `Serialization`), and codec misuse
/// (`Compression`). Use-after-close has no variant: `ImageReader::close`
/// consumes the reader, so the state cannot be reached.
#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid container format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported container version: {0}")]
    UnsupportedVersion(u32),

    #[error("Dataset index {index} out of range, file holds {count} dataset(s)")]
    DatasetIndex { index: usize, count: usize },

    #[error("Element type mismatch: reader opened as {requested:?}, dataset stores {actual:?}")]
    TypeMismatch {
        requested: ElementKind,
        actual: ElementKind,
    },

    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    #[error("Output buffer too small: {required} elements required, got {actual}")]
    BufferTooSmall { required: usize, actual: usize },

    #[error("Corrupt container: {0}")]
    Corrupt(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Decompression error: {0}")]
    Decompression(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Specialized Result type for reader operations
pub type Result<T> = std::result::Result<T, ReaderError>;

impl From<bincode::Error> for ReaderError {
    fn from(err: bincode::Error) -> Self {
        ReaderError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for ReaderError {
    fn from(err: serde_json::Error) -> Self {
        ReaderError::Serialization(err.to_string())
    }
}
