//! In-memory corpus store
//!
//! Backs the engine in tests and in throwaway runs, and is the state holder
//! behind [`super::JsonFileStore`].

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{CorpusStore, DEFAULT_BATCH_LIMIT, Page, QueueFilter};
use crate::error::StoreResult;
use crate::model::{Project, ProjectStatus, QueueItem, TranslationEntry};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Collections {
    pub(crate) entries: BTreeMap<String, TranslationEntry>,
    pub(crate) queue: BTreeMap<String, QueueItem>,
    pub(crate) projects: BTreeMap<String, Project>,
}

pub struct MemoryStore {
    collections: RwLock<Collections>,
    batch_limit: usize,
    batch_writes: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_batch_limit(DEFAULT_BATCH_LIMIT)
    }

    pub fn with_batch_limit(batch_limit: usize) -> Self {
        Self {
            collections: RwLock::new(Collections::default()),
            batch_limit: batch_limit.max(1),
            batch_writes: AtomicUsize::new(0),
        }
    }

    pub(crate) fn from_collections(collections: Collections) -> Self {
        Self {
            collections: RwLock::new(collections),
            batch_limit: DEFAULT_BATCH_LIMIT,
            batch_writes: AtomicUsize::new(0),
        }
    }

    pub(crate) async fn snapshot(&self) -> Collections {
        self.collections.read().await.clone()
    }

    /// Number of batch writes issued so far, each carrying at most the batch limit
    pub fn batch_writes(&self) -> usize {
        self.batch_writes.load(Ordering::Relaxed)
    }

    pub async fn entries(&self) -> Vec<TranslationEntry> {
        self.collections.read().await.entries.values().cloned().collect()
    }

    pub async fn queue_items(&self) -> Vec<QueueItem> {
        self.collections.read().await.queue.values().cloned().collect()
    }

    pub async fn projects(&self) -> Vec<Project> {
        self.collections.read().await.projects.values().cloned().collect()
    }
}

fn scan_page<T: Clone>(
    records: &BTreeMap<String, T>,
    start_after: Option<&str>,
    limit: usize,
    keep: impl Fn(&T) -> bool,
) -> Page<T> {
    let lower = match start_after {
        Some(key) => Bound::Excluded(key),
        None => Bound::Unbounded,
    };
    let mut matching = records
        .range::<str, _>((lower, Bound::Unbounded))
        .filter(|(_, record)| keep(*record));

    let taken: Vec<(&String, &T)> = matching.by_ref().take(limit.max(1)).collect();
    let next = match matching.next() {
        Some(_) => taken.last().map(|(key, _)| (*key).clone()),
        None => None,
    };

    Page {
        items: taken.into_iter().map(|(_, record)| record.clone()).collect(),
        next,
    }
}

#[async_trait]
impl CorpusStore for MemoryStore {
    async fn get_entry(&self, id: &str) -> StoreResult<Option<TranslationEntry>> {
        Ok(self.collections.read().await.entries.get(id).cloned())
    }

    async fn put_entry(&self, entry: &TranslationEntry) -> StoreResult<()> {
        self.collections
            .write()
            .await
            .entries
            .insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    async fn batch_put_entries(&self, entries: &[TranslationEntry]) -> StoreResult<()> {
        for chunk in entries.chunks(self.batch_limit) {
            let mut collections = self.collections.write().await;
            for entry in chunk {
                collections.entries.insert(entry.id.clone(), entry.clone());
            }
            self.batch_writes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn scan_entries(
        &self,
        language: &str,
        namespace: Option<&str>,
        start_after: Option<&str>,
        limit: usize,
    ) -> StoreResult<Page<TranslationEntry>> {
        let collections = self.collections.read().await;
        Ok(scan_page(&collections.entries, start_after, limit, |entry| {
            entry.language == language
                && namespace.is_none_or(|ns| entry.namespace.as_deref() == Some(ns))
        }))
    }

    async fn get_queue_item(&self, id: &str) -> StoreResult<Option<QueueItem>> {
        Ok(self.collections.read().await.queue.get(id).cloned())
    }

    async fn put_queue_item(&self, item: &QueueItem) -> StoreResult<()> {
        self.collections
            .write()
            .await
            .queue
            .insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn batch_put_queue_items(&self, items: &[QueueItem]) -> StoreResult<()> {
        for chunk in items.chunks(self.batch_limit) {
            let mut collections = self.collections.write().await;
            for item in chunk {
                collections.queue.insert(item.id.clone(), item.clone());
            }
            self.batch_writes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn scan_queue_items(
        &self,
        filter: &QueueFilter,
        start_after: Option<&str>,
        limit: usize,
    ) -> StoreResult<Page<QueueItem>> {
        let collections = self.collections.read().await;
        Ok(scan_page(&collections.queue, start_after, limit, |item| {
            filter.matches(item)
        }))
    }

    async fn get_project(&self, id: &str) -> StoreResult<Option<Project>> {
        Ok(self.collections.read().await.projects.get(id).cloned())
    }

    async fn put_project(&self, project: &Project) -> StoreResult<()> {
        self.collections
            .write()
            .await
            .projects
            .insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn scan_projects(
        &self,
        statuses: &[ProjectStatus],
        start_after: Option<&str>,
        limit: usize,
    ) -> StoreResult<Page<Project>> {
        let collections = self.collections.read().await;
        Ok(scan_page(&collections.projects, start_after, limit, |project| {
            statuses.contains(&project.status)
        }))
    }
}
