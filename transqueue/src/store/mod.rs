//! Corpus store port
//!
//! The engine never talks to a database directly. It reads and writes the
//! three collections through [`CorpusStore`], whose operations mirror what a
//! key-value store with secondary indexes offers: get by id, put (upsert),
//! bounded batch put and paged scans on one attribute.
//!
//! Scans are paged with an exclusive start key: pass the `next` of the
//! previous [`Page`] to continue. Records are returned in id order.

pub mod json_file;
pub mod memory;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::model::{Project, ProjectStatus, QueueItem, QueueStatus, TranslationEntry};

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

/// Maximum number of records a single batch write may carry
pub const DEFAULT_BATCH_LIMIT: usize = 25;

/// One page of a scan
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Start key for the next page, `None` once the scan is exhausted
    pub next: Option<String>,
}

/// Attribute a queue item scan is keyed on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueFilter {
    Status(QueueStatus),
    Project(String),
}

impl QueueFilter {
    pub fn matches(&self, item: &QueueItem) -> bool {
        match self {
            QueueFilter::Status(status) => item.status == *status,
            QueueFilter::Project(project_id) => item.project_id == *project_id,
        }
    }
}

#[async_trait]
pub trait CorpusStore: Send + Sync {
    async fn get_entry(&self, id: &str) -> StoreResult<Option<TranslationEntry>>;

    async fn put_entry(&self, entry: &TranslationEntry) -> StoreResult<()>;

    /// Upsert many entries, split internally into writes of at most the
    /// store's batch limit
    async fn batch_put_entries(&self, entries: &[TranslationEntry]) -> StoreResult<()>;

    /// Scan entries of one language, optionally restricted to one namespace
    async fn scan_entries(
        &self,
        language: &str,
        namespace: Option<&str>,
        start_after: Option<&str>,
        limit: usize,
    ) -> StoreResult<Page<TranslationEntry>>;

    async fn get_queue_item(&self, id: &str) -> StoreResult<Option<QueueItem>>;

    async fn put_queue_item(&self, item: &QueueItem) -> StoreResult<()>;

    async fn batch_put_queue_items(&self, items: &[QueueItem]) -> StoreResult<()>;

    async fn scan_queue_items(
        &self,
        filter: &QueueFilter,
        start_after: Option<&str>,
        limit: usize,
    ) -> StoreResult<Page<QueueItem>>;

    async fn get_project(&self, id: &str) -> StoreResult<Option<Project>>;

    async fn put_project(&self, project: &Project) -> StoreResult<()>;

    /// Scan projects whose status is any of `statuses`
    async fn scan_projects(
        &self,
        statuses: &[ProjectStatus],
        start_after: Option<&str>,
        limit: usize,
    ) -> StoreResult<Page<Project>>;
}

/// Drain every page of a queue item scan
pub async fn all_queue_items(
    store: &dyn CorpusStore,
    filter: &QueueFilter,
    page_size: usize,
) -> StoreResult<Vec<QueueItem>> {
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = store
            .scan_queue_items(filter, cursor.as_deref(), page_size)
            .await?;
        items.extend(page.items);
        match page.next {
            Some(next) => cursor = Some(next),
            None => return Ok(items),
        }
    }
}

/// Drain every page of a project scan
pub async fn all_projects(
    store: &dyn CorpusStore,
    statuses: &[ProjectStatus],
    page_size: usize,
) -> StoreResult<Vec<Project>> {
    let mut projects = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = store
            .scan_projects(statuses, cursor.as_deref(), page_size)
            .await?;
        projects.extend(page.items);
        match page.next {
            Some(next) => cursor = Some(next),
            None => return Ok(projects),
        }
    }
}
