use std::fmt;
use thiserror::Error;

/// Errors surfaced by the store, the async façade and the persistence layer.
///
/// Missing records are not errors: lookups and removals return `Option`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed input, such as a record with a blank id or a negative price.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation attempted on a closed store or pool.
    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    /// The task was cancelled before it produced a result.
    #[error("task cancelled")]
    Cancelled,

    /// The task panicked or its worker went away.
    #[error("task failed: {0}")]
    TaskFailed(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn closed(what: impl fmt::Display) -> Self {
        Self::IllegalState(format!("{} is closed", what))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::IllegalState(_) => ErrorKind::IllegalState,
            Self::Io(_) | Self::Serialization(_) => ErrorKind::Io,
            Self::Config(_) => ErrorKind::Config,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::TaskFailed(_) => ErrorKind::TaskFailed,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::IllegalState(_))
    }
}

/// Coarse classification of a [`StoreError`], handy for assertions and
/// for batched results where the error itself is not `Clone`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    IllegalState,
    Io,
    Config,
    Cancelled,
    TaskFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidArgument => "invalid argument",
            Self::IllegalState => "illegal state",
            Self::Io => "io",
            Self::Config => "config",
            Self::Cancelled => "cancelled",
            Self::TaskFailed => "task failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_message() {
        let err = StoreError::closed("store");
        assert_eq!(err.to_string(), "illegal state: store is closed");
        assert_eq!(err.kind(), ErrorKind::IllegalState);
        assert!(err.is_closed());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: StoreError = io.into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
