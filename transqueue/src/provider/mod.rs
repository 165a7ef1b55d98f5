//! Translation provider capabilities
//!
//! Providers come in two shapes, and the engine only ever sees one of these
//! two traits:
//!
//! - [`SyncBatchProvider`] translates a batch of texts and answers in the same
//!   call (machine translation).
//! - [`AsyncProjectProvider`] accepts an uploaded resource, works on it for a
//!   while and makes the result available for download later (human
//!   translation). Its progress is observed by polling.
//!
//! Which shape a [`ProviderKind`] has is decided once, when it is registered
//! in the [`ProviderRegistry`]; the lifecycle controller dispatches on the
//! [`Provider`] variant and never compares provider names.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use transqueue::provider::{Provider, ProviderRegistry, MockSyncProvider, MockMode};
//! use transqueue::ProviderKind;
//!
//! let mut registry = ProviderRegistry::new();
//! registry.register(
//!     ProviderKind::Gct,
//!     Provider::Sync(Arc::new(MockSyncProvider::new(MockMode::Suffix))),
//! );
//! ```

pub mod mock;
pub mod payload;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, ProviderError, ProviderResult, Result};
use crate::model::{ProviderKind, ProviderProjectData};

pub use mock::{MockAsyncProvider, MockMode, MockSyncProvider, ResultMode};

/// A provider that translates a batch of texts in one call
#[async_trait]
pub trait SyncBatchProvider: Send + Sync {
    /// Translate `texts`, a mapping of caller-chosen id to source text
    ///
    /// # Returns
    ///
    /// A mapping of id to translated text. Ids whose translation failed
    /// transiently are omitted rather than failing the whole call; the
    /// caller treats an omitted id as "not translated yet".
    async fn translate_batch(
        &self,
        texts: &BTreeMap<String, String>,
        source_language: &str,
        target_language: &str,
    ) -> ProviderResult<BTreeMap<String, String>>;

    /// Used for logging to identify which provider handled a batch
    fn provider_name(&self) -> &str;
}

/// A document uploaded to an asynchronous provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePayload {
    pub file_name: String,
    pub content: String,
}

/// Everything an asynchronous provider needs to open a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRequest {
    /// Our project id, used as the provider-side project name
    pub project_id: String,
    /// Provider-specific language codes
    pub source_language: String,
    pub target_language: String,
    pub resource_ids: Vec<String>,
    pub word_count: usize,
}

/// Raw status report of an asynchronous project
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteStatus {
    /// Provider-specific status code, e.g. `"in_progress"`
    pub code: String,
    /// Human readable status, if the provider sends one
    pub label: Option<String>,
    /// Ids of the translated resources available for download
    pub translations: Vec<String>,
}

/// The closed vocabulary provider status codes are mapped onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteProgress {
    WaitingForTranslator,
    InProgress,
    ReadyToCommit,
    Unknown,
}

impl fmt::Display for RemoteProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RemoteProgress::WaitingForTranslator => "waiting for translator",
            RemoteProgress::InProgress => "in progress",
            RemoteProgress::ReadyToCommit => "ready to commit",
            RemoteProgress::Unknown => "unknown",
        })
    }
}

/// A provider that works on uploaded resources in the background
#[async_trait]
pub trait AsyncProjectProvider: Send + Sync {
    /// Upload a submission document and return the provider's resource id
    async fn upload_resource(&self, payload: &ResourcePayload) -> ProviderResult<String>;

    /// Open a project over previously uploaded resources
    async fn create_project(&self, request: &ProjectRequest) -> ProviderResult<ProviderProjectData>;

    async fn project_status(&self, external_id: &str) -> ProviderResult<RemoteStatus>;

    /// Download a translated resource of a project
    async fn download_resource(
        &self,
        resource_id: &str,
        external_id: &str,
    ) -> ProviderResult<String>;

    /// Map a provider status code onto [`RemoteProgress`]
    fn progress(&self, status_code: &str) -> RemoteProgress;

    /// Convert an ISO-like language code to the provider's own code
    fn language_code(&self, language: &str) -> String {
        language.to_string()
    }

    fn provider_name(&self) -> &str;
}

/// A configured provider, tagged with its capability
#[derive(Clone)]
pub enum Provider {
    Sync(Arc<dyn SyncBatchProvider>),
    Async(Arc<dyn AsyncProjectProvider>),
}

impl Provider {
    pub fn name(&self) -> &str {
        match self {
            Provider::Sync(provider) => provider.provider_name(),
            Provider::Async(provider) => provider.provider_name(),
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Sync(p) => f.debug_tuple("Sync").field(&p.provider_name()).finish(),
            Provider::Async(p) => f.debug_tuple("Async").field(&p.provider_name()).finish(),
        }
    }
}

/// The providers available to one engine instance
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Provider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: ProviderKind, provider: Provider) -> &mut Self {
        self.providers.insert(kind, provider);
        self
    }

    pub fn with(mut self, kind: ProviderKind, provider: Provider) -> Self {
        self.providers.insert(kind, provider);
        self
    }

    /// Look up the provider for `kind`
    ///
    /// A kind that was never registered means its credentials were not
    /// configured, which is a configuration error.
    pub fn resolve(&self, kind: ProviderKind) -> Result<Provider> {
        self.providers.get(&kind).cloned().ok_or_else(|| {
            Error::Configuration(format!(
                "provider {kind} is not configured, missing credentials?"
            ))
        })
    }

    pub fn is_configured(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }
}

/// Normalize a language code by stripping region information
///
/// - `en-US` → `en`
/// - `zh-Hans` → `zh`
/// - `fr` → `fr`
pub fn normalize_language(language: &str) -> String {
    language
        .split(['-', '_'])
        .next()
        .unwrap_or(language)
        .to_lowercase()
}

/// Validate that a language code only contains alphanumerics, hyphens and
/// underscores
pub fn validate_language(language: &str) -> ProviderResult<()> {
    if language.is_empty() {
        return Err(ProviderError::InvalidLanguage(
            "Language code is empty".to_string(),
        ));
    }

    if !language
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ProviderError::InvalidLanguage(format!(
            "Invalid characters in language code: {}",
            language
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language("en-US"), "en");
        assert_eq!(normalize_language("zh_Hans"), "zh");
        assert_eq!(normalize_language("FR"), "fr");
        assert_eq!(normalize_language("de"), "de");
    }

    #[test]
    fn test_validate_language() {
        assert!(validate_language("en").is_ok());
        assert!(validate_language("zh-TW").is_ok());
        assert!(validate_language("pt_BR").is_ok());
        assert!(validate_language("").is_err());
        assert!(validate_language("en@US").is_err());
    }

    #[test]
    fn test_unregistered_provider_is_configuration_error() {
        let registry = ProviderRegistry::new();
        match registry.resolve(ProviderKind::Oht) {
            Err(Error::Configuration(msg)) => assert!(msg.contains("OHT")),
            other => panic!("Expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_registered_provider_resolves_with_capability() {
        let registry = ProviderRegistry::new()
            .with(
                ProviderKind::Gct,
                Provider::Sync(Arc::new(MockSyncProvider::new(MockMode::Suffix))),
            )
            .with(
                ProviderKind::Oht,
                Provider::Async(Arc::new(MockAsyncProvider::new())),
            );

        assert!(matches!(registry.resolve(ProviderKind::Gct), Ok(Provider::Sync(_))));
        assert!(matches!(registry.resolve(ProviderKind::Oht), Ok(Provider::Async(_))));
        assert!(registry.is_configured(ProviderKind::Gct));
    }
}
