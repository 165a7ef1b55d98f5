//! Translation provider clients for transqueue
//!
//! - [`GoogleTranslateProvider`] answers synchronously (machine translation)
//! - [`OneHourTranslationProvider`] runs human translation projects that are
//!   polled and downloaded later
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use transqueue::provider::{Provider, ProviderRegistry};
//! use transqueue::ProviderKind;
//! use transqueue_mt::{GoogleTranslateProvider, OhtConfig, OneHourTranslationProvider};
//!
//! let mut registry = ProviderRegistry::new();
//! registry.register(
//!     ProviderKind::Gct,
//!     Provider::Sync(Arc::new(GoogleTranslateProvider::from_env()?)),
//! );
//! registry.register(
//!     ProviderKind::Oht,
//!     Provider::Async(Arc::new(OneHourTranslationProvider::new(OhtConfig::new("pub", "secret"))?)),
//! );
//! ```

pub mod google_translate;
pub mod http_error;
pub mod one_hour;

pub use google_translate::GoogleTranslateProvider;
pub use one_hour::{DEFAULT_NOTE, OhtConfig, OneHourTranslationProvider};
