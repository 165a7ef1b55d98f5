//! Diff engine
//!
//! Finds the source entries that still need work for one target language and
//! provider. An entry needs work when neither of these exists:
//!
//! - a queue item with its composite id (any status)
//! - a target-language entry with the source text's own identity, i.e. text
//!   authored identically in the target language
//!
//! The source collection is scanned page by page. Nothing about the scan
//! position is persisted: a restarted diff rescans from the start and the
//! existence checks skip everything queued by the interrupted run.

use tracing::{debug, info};

use crate::batcher::Batcher;
use crate::error::{Error, Result};
use crate::identity::entry_id;
use crate::model::{ProviderKind, QueueItemKey, TranslationEntry};
use crate::provider::validate_language;
use crate::store::CorpusStore;

/// Work descriptor for one missing translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingItem {
    pub key: QueueItemKey,
    pub namespace: Option<String>,
}

/// What the diff found for one source entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    Translated,
    Queued,
    Missing(MissingItem),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRequest {
    pub source_language: String,
    /// Restrict the scan to one namespace
    pub namespace: Option<String>,
    pub target_language: String,
    pub provider: ProviderKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffReport {
    pub scanned: usize,
    pub translated: usize,
    pub queued: usize,
    pub missing: usize,
}

pub struct DiffEngine<'a> {
    store: &'a dyn CorpusStore,
    page_size: usize,
}

impl<'a> DiffEngine<'a> {
    pub fn new(store: &'a dyn CorpusStore, page_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
        }
    }

    /// Classify one source entry
    pub async fn check(
        &self,
        source: &TranslationEntry,
        target_language: &str,
        provider: ProviderKind,
    ) -> Result<Presence> {
        let key = QueueItemKey::new(&source.id, target_language, provider);
        if self.store.get_queue_item(&key.to_string()).await?.is_some() {
            return Ok(Presence::Queued);
        }

        let target_id = entry_id(target_language, source.namespace.as_deref(), &source.text);
        if self.store.get_entry(&target_id).await?.is_some() {
            return Ok(Presence::Translated);
        }

        Ok(Presence::Missing(MissingItem {
            key,
            namespace: source.namespace.clone(),
        }))
    }

    /// Scan the source corpus and hand every missing item to `batcher`
    pub async fn run(&self, request: &DiffRequest, batcher: &mut Batcher<'_>) -> Result<DiffReport> {
        validate_language(&request.source_language)
            .and_then(|_| validate_language(&request.target_language))
            .map_err(|e| Error::Configuration(e.to_string()))?;
        if request.source_language == request.target_language {
            return Err(Error::Configuration(format!(
                "target language '{}' is the source language",
                request.target_language
            )));
        }
        if batcher.provider() != request.provider
            || batcher.target_language() != request.target_language
        {
            return Err(Error::StateConflict(
                "batcher was opened for another provider or target language".to_string(),
            ));
        }

        info!(
            "Source Language: [{}]. Target Language: [{}]. Target Provider: [{}]",
            request.source_language, request.target_language, request.provider
        );

        let mut report = DiffReport::default();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .store
                .scan_entries(
                    &request.source_language,
                    request.namespace.as_deref(),
                    cursor.as_deref(),
                    self.page_size,
                )
                .await?;

            for source in &page.items {
                report.scanned += 1;
                match self
                    .check(source, &request.target_language, request.provider)
                    .await?
                {
                    Presence::Translated => report.translated += 1,
                    Presence::Queued => report.queued += 1,
                    Presence::Missing(missing) => {
                        debug!("Missing translation for source {}", source.id);
                        report.missing += 1;
                        batcher.accept(missing).await?;
                    }
                }
            }

            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QueueItem;
    use crate::store::MemoryStore;

    fn request(target: &str) -> DiffRequest {
        DiffRequest {
            source_language: "en".to_string(),
            namespace: None,
            target_language: target.to_string(),
            provider: ProviderKind::Gct,
        }
    }

    async fn seed(store: &MemoryStore, texts: &[&str]) -> Vec<TranslationEntry> {
        let entries: Vec<_> = texts
            .iter()
            .map(|t| TranslationEntry::new("en", None, t))
            .collect();
        store.batch_put_entries(&entries).await.unwrap();
        entries
    }

    async fn run(store: &MemoryStore, page_size: usize) -> (DiffReport, usize) {
        let engine = DiffEngine::new(store, page_size);
        let mut batcher = Batcher::new(store, ProviderKind::Gct, "fr", 100);
        let report = engine.run(&request("fr"), &mut batcher).await.unwrap();
        let summary = batcher.finish().await.unwrap();
        (report, summary.item_count())
    }

    #[tokio::test]
    async fn test_everything_missing_on_first_run() {
        let store = MemoryStore::new();
        seed(&store, &["one", "two", "three"]).await;
        let (report, queued) = run(&store, 2).await;
        assert_eq!(report.scanned, 3);
        assert_eq!(report.missing, 3);
        assert_eq!(queued, 3);
    }

    #[tokio::test]
    async fn test_second_run_queues_nothing() {
        let store = MemoryStore::new();
        seed(&store, &["one", "two", "three"]).await;
        run(&store, 2).await;

        let (report, queued) = run(&store, 2).await;
        assert_eq!(report.queued, 3);
        assert_eq!(report.missing, 0);
        assert_eq!(queued, 0);
        assert_eq!(store.queue_items().await.len(), 3);
        assert_eq!(store.projects().await.len(), 1);
    }

    #[tokio::test]
    async fn test_identical_target_text_counts_as_translated() {
        let store = MemoryStore::new();
        let sources = seed(&store, &["OK", "Cancel"]).await;
        store
            .put_entry(&TranslationEntry::new("fr", None, "OK"))
            .await
            .unwrap();

        let engine = DiffEngine::new(&store, 10);
        assert_eq!(
            engine.check(&sources[0], "fr", ProviderKind::Gct).await.unwrap(),
            Presence::Translated
        );
        let (report, _) = run(&store, 10).await;
        assert_eq!(report.translated, 1);
        assert_eq!(report.missing, 1);
    }

    #[tokio::test]
    async fn test_queue_items_of_any_status_count() {
        let store = MemoryStore::new();
        let sources = seed(&store, &["Save"]).await;
        let mut item = QueueItem::new(
            &QueueItemKey::new(&sources[0].id, "fr", ProviderKind::Gct),
            "p-old",
            None,
        );
        item.mark_ready("Enregistrer");
        item.mark_completed();
        store.put_queue_item(&item).await.unwrap();

        let engine = DiffEngine::new(&store, 10);
        assert_eq!(
            engine.check(&sources[0], "fr", ProviderKind::Gct).await.unwrap(),
            Presence::Queued
        );
    }

    #[tokio::test]
    async fn test_other_provider_is_independent() {
        let store = MemoryStore::new();
        seed(&store, &["Save"]).await;
        run(&store, 10).await;

        let engine = DiffEngine::new(&store, 10);
        let mut batcher = Batcher::new(&store, ProviderKind::Oht, "fr", 100);
        let mut req = request("fr");
        req.provider = ProviderKind::Oht;
        let report = engine.run(&req, &mut batcher).await.unwrap();
        assert_eq!(report.missing, 1);
    }

    #[tokio::test]
    async fn test_namespace_restriction() {
        let store = MemoryStore::new();
        store
            .batch_put_entries(&[
                TranslationEntry::new("en", Some("menu"), "Open"),
                TranslationEntry::new("en", Some("dialog"), "Open"),
                TranslationEntry::new("en", None, "Open"),
            ])
            .await
            .unwrap();

        let engine = DiffEngine::new(&store, 10);
        let mut batcher = Batcher::new(&store, ProviderKind::Gct, "fr", 100);
        let mut req = request("fr");
        req.namespace = Some("menu".to_string());
        let report = engine.run(&req, &mut batcher).await.unwrap();
        batcher.finish().await.unwrap();

        assert_eq!(report.scanned, 1);
        let items = store.queue_items().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].namespace.as_deref(), Some("menu"));
    }

    #[tokio::test]
    async fn test_same_language_is_rejected() {
        let store = MemoryStore::new();
        let engine = DiffEngine::new(&store, 10);
        let mut batcher = Batcher::new(&store, ProviderKind::Gct, "en", 100);
        let result = engine.run(&request("en"), &mut batcher).await;
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
