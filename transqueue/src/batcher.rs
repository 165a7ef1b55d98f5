//! Batcher
//!
//! Groups missing work into projects of at most `limit` queue items, all for
//! one provider and one target language. A project is written only once it
//! is closed with at least one item, so an empty trailing project never
//! reaches the store.
//!
//! The project record is written before its queue items. If a run dies in
//! between, the store holds an empty pending project, which `add` closes,
//! and the next `diff` queues the items again.

use tracing::{debug, info};

use crate::diff::MissingItem;
use crate::error::{Error, Result};
use crate::model::{Project, ProviderKind, QueueItem};
use crate::store::CorpusStore;

/// A project created by one batching run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchedProject {
    pub project_id: String,
    pub items: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub projects: Vec<BatchedProject>,
}

impl BatchSummary {
    pub fn item_count(&self) -> usize {
        self.projects.iter().map(|p| p.items).sum()
    }
}

struct OpenProject {
    project: Project,
    items: Vec<QueueItem>,
}

pub struct Batcher<'a> {
    store: &'a dyn CorpusStore,
    provider: ProviderKind,
    target_language: String,
    limit: usize,
    open: Option<OpenProject>,
    summary: BatchSummary,
}

impl<'a> Batcher<'a> {
    pub fn new(
        store: &'a dyn CorpusStore,
        provider: ProviderKind,
        target_language: &str,
        limit: usize,
    ) -> Self {
        Self {
            store,
            provider,
            target_language: target_language.to_string(),
            limit: limit.max(1),
            open: None,
            summary: BatchSummary::default(),
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    /// Queue one missing item, closing the open project once it is full
    pub async fn accept(&mut self, missing: MissingItem) -> Result<()> {
        if missing.key.provider != self.provider
            || missing.key.target_language != self.target_language
        {
            return Err(Error::StateConflict(format!(
                "queue item {} does not belong to a {} project for '{}'",
                missing.key, self.provider, self.target_language
            )));
        }

        let (provider, target_language) = (self.provider, self.target_language.as_str());
        let open = self.open.get_or_insert_with(|| OpenProject {
            project: Project::new(provider, target_language),
            items: Vec::new(),
        });

        debug!(
            "Queueing {} into project {}",
            missing.key, open.project.id
        );
        open.items.push(QueueItem::new(
            &missing.key,
            &open.project.id,
            missing.namespace.as_deref(),
        ));

        if open.items.len() >= self.limit {
            self.close().await?;
        }
        Ok(())
    }

    /// Close the trailing project, if it holds anything, and report
    pub async fn finish(mut self) -> Result<BatchSummary> {
        self.close().await?;
        Ok(self.summary)
    }

    async fn close(&mut self) -> Result<()> {
        let Some(open) = self.open.take() else {
            return Ok(());
        };
        if open.items.is_empty() {
            return Ok(());
        }

        self.store.put_project(&open.project).await?;
        self.store.batch_put_queue_items(&open.items).await?;

        info!(
            "Project [{}] created by using [{}] with {} items. Target language: [{}]",
            open.project.id,
            self.provider,
            open.items.len(),
            self.target_language
        );
        self.summary.projects.push(BatchedProject {
            project_id: open.project.id,
            items: open.items.len(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProjectStatus, QueueItemKey, QueueStatus};
    use crate::store::MemoryStore;

    fn missing(i: usize) -> MissingItem {
        MissingItem {
            key: QueueItemKey::new(&format!("src{i:03}"), "fr", ProviderKind::Gct),
            namespace: None,
        }
    }

    #[tokio::test]
    async fn test_batches_are_bounded() {
        let store = MemoryStore::new();
        let mut batcher = Batcher::new(&store, ProviderKind::Gct, "fr", 4);
        for i in 0..10 {
            batcher.accept(missing(i)).await.unwrap();
        }
        let summary = batcher.finish().await.unwrap();

        let sizes: Vec<usize> = summary.projects.iter().map(|p| p.items).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(summary.item_count(), 10);

        let projects = store.projects().await;
        assert_eq!(projects.len(), 3);
        assert!(projects.iter().all(|p| p.status == ProjectStatus::Pending));
        assert!(projects.iter().all(|p| p.target_language == "fr"));

        let items = store.queue_items().await;
        assert_eq!(items.len(), 10);
        assert!(items.iter().all(|i| i.status == QueueStatus::Pending));
        for project in &projects {
            let members = items.iter().filter(|i| i.project_id == project.id).count();
            assert!(members > 0 && members <= 4);
        }
    }

    #[tokio::test]
    async fn test_exact_multiple_leaves_no_empty_project() {
        let store = MemoryStore::new();
        let mut batcher = Batcher::new(&store, ProviderKind::Gct, "fr", 5);
        for i in 0..10 {
            batcher.accept(missing(i)).await.unwrap();
        }
        let summary = batcher.finish().await.unwrap();
        assert_eq!(summary.projects.len(), 2);
        assert_eq!(store.projects().await.len(), 2);
    }

    #[tokio::test]
    async fn test_nothing_accepted_writes_nothing() {
        let store = MemoryStore::new();
        let batcher = Batcher::new(&store, ProviderKind::Oht, "de", 100);
        let summary = batcher.finish().await.unwrap();
        assert!(summary.projects.is_empty());
        assert!(store.projects().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_foreign_items() {
        let store = MemoryStore::new();
        let mut batcher = Batcher::new(&store, ProviderKind::Oht, "fr", 10);
        let result = batcher.accept(missing(0)).await;
        assert!(matches!(result, Err(Error::StateConflict(_))));
    }

    #[tokio::test]
    async fn test_requeue_is_an_upsert() {
        let store = MemoryStore::new();
        for _ in 0..2 {
            let mut batcher = Batcher::new(&store, ProviderKind::Gct, "fr", 10);
            batcher.accept(missing(1)).await.unwrap();
            batcher.finish().await.unwrap();
        }
        assert_eq!(store.queue_items().await.len(), 1);
    }
}
