//! Common error types used throughout marquee.
//!
//! Lookup failures against metadata providers are *not* errors here; they are
//! recorded as cache misses. This type covers caller defects, snapshot
//! (de)serialization and I/O.

/// Common error type for marquee.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input was provided by the caller.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A cache key could not be encoded or decoded.
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    /// A snapshot document was structurally unusable.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// JSON (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new InvalidKey error.
    pub fn invalid_key<S: Into<String>>(msg: S) -> Self {
        Self::InvalidKey(msg.into())
    }

    /// Create a new Snapshot error.
    pub fn snapshot<S: Into<String>>(msg: S) -> Self {
        Self::Snapshot(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// An owned copy of this error with the same variant.
    ///
    /// Wrapped source errors cannot be cloned; their copies keep the I/O kind
    /// and message but lose the underlying cause.
    pub fn duplicate(&self) -> Self {
        match self {
            Self::InvalidInput(msg) => Self::InvalidInput(msg.clone()),
            Self::InvalidKey(msg) => Self::InvalidKey(msg.clone()),
            Self::Snapshot(msg) => Self::Snapshot(msg.clone()),
            Self::Serialization(e) => Self::Serialization(serde_json::Error::io(std::io::Error::other(
                e.to_string(),
            ))),
            Self::Io(e) => Self::Io(std::io::Error::new(e.kind(), e.to_string())),
            Self::Internal(msg) => Self::Internal(msg.clone()),
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
