//! Sorted-set engine errors

use crate::store::StoreError;

/// Boxed error produced by a caller-supplied batch sink
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for sorted-set operations
///
/// Absence is never an error: missing members come back as `None`, `false`
/// or an empty `Vec`. Duplicate-key races are retried inside `increment_by`
/// and never reach the caller.
#[derive(Debug)]
pub enum ZsetError {
    /// Empty set identifier on a write path, malformed lex bound, bad option
    InvalidArgument(String),
    /// Any other backing-store failure, unchanged
    Store(StoreError),
    /// The `process_all` sink failed
    Sink(BoxError),
}

impl ZsetError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ZsetError::InvalidArgument(msg.into())
    }
}

impl std::fmt::Display for ZsetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZsetError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            ZsetError::Store(e) => write!(f, "{}", e),
            ZsetError::Sink(e) => write!(f, "Sink failed: {}", e),
        }
    }
}

impl std::error::Error for ZsetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ZsetError::InvalidArgument(_) => None,
            ZsetError::Store(e) => Some(e),
            ZsetError::Sink(e) => Some(e.as_ref()),
        }
    }
}

impl From<StoreError> for ZsetError {
    fn from(e: StoreError) -> Self {
        ZsetError::Store(e)
    }
}

pub type ZsetResult<T> = Result<T, ZsetError>;
