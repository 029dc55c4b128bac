//! Versioned Object Store Error Hierarchy
//!
//! Defines the error taxonomy shared by both store backends, categorized by
//! operational concern: key-level conflicts, version ordering, retry
//! exhaustion, codec failures and store initialization.

use std::path::PathBuf;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The key has no live object.
    #[error("key not found: {0}")]
    NotFound(String),

    /// Create was called on a key that already holds a live object.
    #[error("key already exists: {0}")]
    AlreadyExists(String),

    /// A caller-supplied precondition did not match the live object.
    #[error("precondition failed for {key}: {reason}")]
    PreconditionFailed { key: String, reason: String },

    /// The caller asked for a minimum resource version newer than what this
    /// store currently holds. The store, not the client, is behind.
    #[error("resource version too large: store has {current}, caller requires at least {required}")]
    ResourceVersionTooLarge { required: u64, current: u64 },

    /// GuaranteedUpdate consumed every attempt without committing. The last
    /// soft failure (precondition mismatch or caller error) is the source.
    #[error("guaranteed update of {key} exhausted {attempts} attempts")]
    RetryLimitExceeded {
        key: String,
        attempts: u32,
        #[source]
        source: Option<Box<StorageError>>,
    },

    /// A resource version string supplied by a caller could not be parsed.
    #[error("invalid resource version {0:?}")]
    InvalidResourceVersion(String),

    /// The caller passed an object or list shape the store cannot handle.
    #[error("unsupported object: {0}")]
    Unsupported(String),

    /// Caller-hook failures (delete validation, update callbacks) propagated
    /// verbatim.
    #[error(transparent)]
    External(Box<dyn std::error::Error + Send + Sync>),

    /// Encode/decode failures for persisted objects.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Store construction failures, surfaced once, never per-call.
    #[error(transparent)]
    Init(#[from] InitError),

    /// Disk I/O failure with the offending path attached.
    #[error("io failure at {path}")]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Disk I/O failures without a more specific location.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON serialization/deserialization failures
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Decoded document is structurally valid but unusable
    #[error("malformed document: {0}")]
    Malformed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    /// Snowflake node id must fit in 10 bits
    #[error("generator node id {0} out of range (must be < 1024)")]
    NodeIdOutOfRange(u16),

    /// Watch channels need room for at least one event
    #[error("watch channel capacity must be non-zero")]
    ZeroWatchCapacity,

    /// Configuration loading/validation failures
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),
}

// ============== Conversion Implementations ============== //

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Codec(CodecError::Json(e))
    }
}

impl From<config::ConfigError> for StorageError {
    fn from(e: config::ConfigError) -> Self {
        StorageError::Init(InitError::Config(e))
    }
}

impl StorageError {
    /// Wraps a caller-hook error for verbatim propagation.
    pub fn external<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StorageError::External(Box::new(e))
    }
}
