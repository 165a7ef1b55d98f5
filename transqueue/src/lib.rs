//! Translation corpus reconciliation engine
//!
//! Keeps a content-addressed corpus of translation entries in sync across
//! languages. Source entries missing in a target language are queued into
//! bounded projects, handed to a translation provider, collected when done
//! and written back as target-language entries.
//!
//! # Overview
//!
//! 1. **Diff** ([`diff`], [`batcher`]) - find missing translations and group
//!    them into pending projects
//! 2. **Add** ([`lifecycle`]) - submit pending projects to their provider
//! 3. **Status / Commit** ([`lifecycle`]) - poll asynchronous providers and
//!    pull finished work into the queue
//! 4. **Push** ([`push`]) - materialize ready queue items as corpus entries
//!
//! Storage and providers sit behind the [`store::CorpusStore`] and
//! [`provider`] traits; [`Reconciler`] ties them together.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use transqueue::provider::{MockMode, MockSyncProvider, Provider, ProviderRegistry};
//! use transqueue::store::MemoryStore;
//! use transqueue::{EngineConfig, ProviderKind, Reconciler};
//!
//! #[tokio::main]
//! async fn main() -> transqueue::Result<()> {
//!     let providers = ProviderRegistry::new().with(
//!         ProviderKind::Gct,
//!         Provider::Sync(Arc::new(MockSyncProvider::new(MockMode::Suffix))),
//!     );
//!     let engine = Reconciler::new(Arc::new(MemoryStore::new()), providers, EngineConfig::default());
//!
//!     engine.diff("fr", ProviderKind::Gct, None).await?;
//!     engine.add(&[]).await?;
//!     engine.push().await?;
//!     Ok(())
//! }
//! ```

pub mod batcher;
pub mod config;
pub mod diff;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod model;
pub mod provider;
pub mod push;
pub mod reconciler;
pub mod source;
pub mod store;


pub use config::EngineConfig;
pub use error::{Error, ProviderError, ProviderResult, Result, StoreError, StoreResult};
pub use identity::entry_id;
pub use lifecycle::{CommitOutcome, CommitReport, ProjectProgress, SubmitOutcome};
pub use model::{
    Project, ProjectStatus, ProviderKind, ProviderProjectData, QueueItem, QueueItemKey,
    QueueStatus, TranslationEntry,
};
pub use push::PushReport;
pub use reconciler::{DiffOutcome, ProjectReport, Reconciler, Step, SyncReport};
