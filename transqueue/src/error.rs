//! Error types for the reconciliation engine
//!
//! Three layers of errors exist: the corpus store (`StoreError`), the
//! translation providers (`ProviderError`) and the engine itself (`Error`),
//! which wraps the other two and adds the reconciliation-level conditions.

use thiserror::Error;

/// Errors raised by a `CorpusStore` implementation
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by translation providers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Missing or rejected credentials, unsupported language pair
    #[error("provider configuration error: {0}")]
    Config(String),

    /// The request never produced a usable HTTP response
    #[error("provider network error: {0}")]
    Network(String),

    /// The provider answered but refused or failed the work
    #[error("translation error: {0}")]
    Translation(String),

    /// The provider answered with something we could not interpret
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("invalid language code: {0}")]
    InvalidLanguage(String),
}

impl ProviderError {
    /// Whether retrying the same call later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Network(_)
                | ProviderError::Translation(_)
                | ProviderError::InvalidResponse(_)
        )
    }
}

/// Result type for provider operations
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Engine-level errors
#[derive(Debug, Error)]
pub enum Error {
    /// Missing provider credentials or invalid engine settings
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The requested transition is not valid for the current state
    #[error("state conflict: {0}")]
    StateConflict(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The submission or result document could not be built or read
    #[error("payload error: {0}")]
    Payload(String),

    /// A source message file could not be read or parsed
    #[error("message source error: {0}")]
    Source(String),
}

impl Error {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Fatal errors abort a whole run; everything else only skips the
    /// project or item it occurred on.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Configuration(_) | Error::Store(_) | Error::Source(_) => true,
            Error::Provider(e) => matches!(e, ProviderError::Config(_)),
            _ => false,
        }
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;
