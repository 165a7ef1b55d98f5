//! Push pipeline
//!
//! Materializes ready queue items as target-language entries. The entry id
//! is derived from the target language, the namespace and the translated
//! text, so pushing the same result twice lands on the same entry.
//!
//! Per page, entries are written before their queue items are marked
//! completed. A crash in between leaves the items ready, and the next push
//! rewrites the same entries.
//!
//! A ready item without a result text goes back to pending, and a completed
//! project holding it is reopened so the next `add` translates it again.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::identity::entry_id;
use crate::model::{ProjectStatus, QueueStatus, TranslationEntry};
use crate::store::{CorpusStore, QueueFilter};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    /// Queue items moved to completed
    pub pushed: usize,
    /// Target entries written for the first time
    pub created: usize,
    /// Target entries that already existed and were refreshed
    pub refreshed: usize,
    /// Ready items without a result text, sent back to pending
    pub requeued: usize,
}

pub struct PushPipeline<'a> {
    store: &'a dyn CorpusStore,
    page_size: usize,
}

impl<'a> PushPipeline<'a> {
    pub fn new(store: &'a dyn CorpusStore, page_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
        }
    }

    pub async fn run(&self) -> Result<PushReport> {
        let filter = QueueFilter::Status(QueueStatus::Ready);
        let mut report = PushReport::default();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .store
                .scan_queue_items(&filter, cursor.as_deref(), self.page_size)
                .await?;

            let mut entries: BTreeMap<String, TranslationEntry> = BTreeMap::new();
            let mut completed = Vec::with_capacity(page.items.len());
            let mut requeued = Vec::new();
            for mut item in page.items {
                let Some(text) = item.target_text.clone() else {
                    warn!("Queue item {} is ready without a result, requeueing", item.id);
                    item.mark_pending();
                    requeued.push(item);
                    continue;
                };

                let id = entry_id(&item.target_language, item.namespace.as_deref(), &text);
                if !entries.contains_key(&id) {
                    let entry = match self.store.get_entry(&id).await? {
                        Some(mut existing) => {
                            existing.text = text;
                            existing.touch();
                            report.refreshed += 1;
                            existing
                        }
                        None => {
                            report.created += 1;
                            TranslationEntry::new(
                                &item.target_language,
                                item.namespace.as_deref(),
                                &text,
                            )
                        }
                    };
                    entries.insert(id.clone(), entry);
                }
                debug!("Target ID: [{}] pushed for {}", id, item.id);

                item.mark_completed();
                completed.push(item);
            }

            let entries: Vec<TranslationEntry> = entries.into_values().collect();
            if !entries.is_empty() {
                self.store.batch_put_entries(&entries).await?;
            }
            if !completed.is_empty() {
                self.store.batch_put_queue_items(&completed).await?;
            }
            report.pushed += completed.len();

            if !requeued.is_empty() {
                self.store.batch_put_queue_items(&requeued).await?;
                let projects: BTreeSet<&str> =
                    requeued.iter().map(|item| item.project_id.as_str()).collect();
                for project_id in projects {
                    self.reopen(project_id).await?;
                }
                report.requeued += requeued.len();
            }

            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!(
            "Pushed {} items: {} entries created, {} refreshed",
            report.pushed, report.created, report.refreshed
        );
        Ok(report)
    }

    async fn reopen(&self, project_id: &str) -> Result<()> {
        match self.store.get_project(project_id).await? {
            Some(mut project) if project.status == ProjectStatus::Completed => {
                info!("Project {} reopened for requeued items", project.id);
                project.set_status(ProjectStatus::Pending);
                self.store.put_project(&project).await?;
            }
            Some(_) => {}
            None => warn!("Requeued items belong to unknown project {}", project_id),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Project, ProviderKind, QueueItem, QueueItemKey};
    use crate::store::MemoryStore;

    fn ready_item(source: &str, namespace: Option<&str>, text: &str) -> QueueItem {
        let mut item = QueueItem::new(
            &QueueItemKey::new(source, "fr", ProviderKind::Gct),
            "p1",
            namespace,
        );
        item.mark_ready(text);
        item
    }

    #[tokio::test]
    async fn test_push_creates_entries_and_completes_items() {
        let store = MemoryStore::new();
        store
            .batch_put_queue_items(&[
                ready_item("s1", Some("ui"), "Bonjour"),
                ready_item("s2", None, "Au revoir"),
            ])
            .await
            .unwrap();

        let report = PushPipeline::new(&store, 1).run().await.unwrap();
        assert_eq!(report.pushed, 2);
        assert_eq!(report.created, 2);

        let entry = store
            .get_entry(&entry_id("fr", Some("ui"), "Bonjour"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.language, "fr");
        assert_eq!(entry.namespace.as_deref(), Some("ui"));
        assert!(
            store
                .queue_items()
                .await
                .iter()
                .all(|i| i.status == QueueStatus::Completed)
        );
    }

    #[tokio::test]
    async fn test_existing_entry_is_refreshed() {
        let store = MemoryStore::new();
        let existing = TranslationEntry::new("fr", None, "Bonjour");
        store.put_entry(&existing).await.unwrap();
        store
            .put_queue_item(&ready_item("s1", None, "Bonjour"))
            .await
            .unwrap();

        let report = PushPipeline::new(&store, 10).run().await.unwrap();
        assert_eq!(report.refreshed, 1);
        assert_eq!(report.created, 0);

        let entry = store.get_entry(&existing.id).await.unwrap().unwrap();
        assert_eq!(entry.created_at, existing.created_at);
        assert!(entry.modified_at >= existing.modified_at);
        assert_eq!(store.entries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_identical_results_share_an_entry() {
        let store = MemoryStore::new();
        store
            .batch_put_queue_items(&[
                ready_item("s1", None, "OK"),
                ready_item("s2", None, "OK"),
            ])
            .await
            .unwrap();

        let report = PushPipeline::new(&store, 10).run().await.unwrap();
        assert_eq!(report.pushed, 2);
        assert_eq!(report.created, 1);
        assert_eq!(store.entries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_second_push_is_a_no_op() {
        let store = MemoryStore::new();
        store
            .put_queue_item(&ready_item("s1", None, "Oui"))
            .await
            .unwrap();

        PushPipeline::new(&store, 10).run().await.unwrap();
        let report = PushPipeline::new(&store, 10).run().await.unwrap();
        assert_eq!(report, PushReport::default());
    }

    #[tokio::test]
    async fn test_pending_items_are_not_pushed() {
        let store = MemoryStore::new();
        let pending = QueueItem::new(&QueueItemKey::new("s1", "fr", ProviderKind::Gct), "p1", None);
        store.put_queue_item(&pending).await.unwrap();

        let report = PushPipeline::new(&store, 10).run().await.unwrap();
        assert_eq!(report.pushed, 0);
        assert!(store.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_ready_item_without_result_is_requeued() {
        let store = MemoryStore::new();
        let mut project = Project::new(ProviderKind::Gct, "fr");
        project.set_status(ProjectStatus::Completed);
        store.put_project(&project).await.unwrap();

        let mut broken = QueueItem::new(
            &QueueItemKey::new("s1", "fr", ProviderKind::Gct),
            &project.id,
            None,
        );
        broken.status = QueueStatus::Ready;
        store.put_queue_item(&broken).await.unwrap();

        let report = PushPipeline::new(&store, 10).run().await.unwrap();
        assert_eq!(report.requeued, 1);
        assert_eq!(report.pushed, 0);

        let item = store.get_queue_item(&broken.id).await.unwrap().unwrap();
        assert!(item.is_pending());
        let stored = store.get_project(&project.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ProjectStatus::Pending);

        let again = PushPipeline::new(&store, 10).run().await.unwrap();
        assert_eq!(again, PushReport::default());
    }
}
