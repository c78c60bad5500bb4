//! Error types for 3DU16 stack operations

use thiserror::Error;

/// Main error type for stack operations
#[derive(Error, Debug)]
pub enum StackError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Only 3DU16 files are supported (*.3du16 or *.3DU16): {filename}")]
    WrongFileKind { filename: String },

    #[error("{filename} might not be a valid 3DU16 file: {reason}")]
    InvalidFormat { filename: String, reason: String },

    #[error("Index is out of boundary: {axis}={index} (valid range 0..{frames})")]
    IndexOutOfRange {
        axis: &'static str,
        index: usize,
        frames: usize,
    },

    #[error("Mapped file is truncated: need {len} bytes at offset {offset}, file has {file_len}")]
    Truncated {
        offset: usize,
        len: usize,
        file_len: usize,
    },

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Chunk size must be positive, got {0}")]
    InvalidChunkSize(usize),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Decompression error: {0}")]
    Decompression(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Sink error: {0}")]
    Sink(String),
}

impl StackError {
    /// True for errors caused by a file that is not a readable 3DU16 container
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            StackError::WrongFileKind { .. }
                | StackError::InvalidFormat { .. }
                | StackError::Truncated { .. }
        )
    }

    /// True for out-of-range frame requests
    pub fn is_index_error(&self) -> bool {
        matches!(self, StackError::IndexOutOfRange { .. })
    }
}

/// Specialized Result type for stack operations
pub type Result<T> = std::result::Result<T, StackError>;

impl From<serde_json::Error> for StackError {
    fn from(err: serde_json::Error) -> Self {
        StackError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for StackError {
    fn from(err: ndarray::ShapeError) -> Self {
        StackError::Shape(err.to_string())
    }
}
