//! Corpus store persisted as JSON files in a directory
//!
//! The directory holds one file per collection:
//!
//! - `translations.json`
//! - `queue.json`
//! - `projects.json`
//!
//! Every write updates the in-memory state and rewrites the affected file
//! (write to a temporary file, then rename), so an interrupted run never
//! leaves a half-written collection behind.
//!
//! The whole collection is serialized on each write, so a pass issuing one
//! write per item or page costs I/O quadratic in the collection size. This
//! store suits corpora of a few thousand entries; larger ones belong behind a
//! database-backed [`CorpusStore`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::memory::{Collections, MemoryStore};
use super::{CorpusStore, Page, QueueFilter};
use crate::error::StoreResult;
use crate::model::{Project, ProjectStatus, QueueItem, TranslationEntry};

const ENTRIES_FILE: &str = "translations.json";
const QUEUE_FILE: &str = "queue.json";
const PROJECTS_FILE: &str = "projects.json";

#[derive(Debug, Clone, Copy)]
enum Collection {
    Entries,
    Queue,
    Projects,
}

impl Collection {
    fn file_name(self) -> &'static str {
        match self {
            Collection::Entries => ENTRIES_FILE,
            Collection::Queue => QUEUE_FILE,
            Collection::Projects => PROJECTS_FILE,
        }
    }
}

pub struct JsonFileStore {
    dir: PathBuf,
    inner: MemoryStore,
}

impl JsonFileStore {
    /// Open the store in `dir`, creating the directory if needed
    ///
    /// Missing collection files are treated as empty collections.
    pub async fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let entries: Vec<TranslationEntry> = read_collection(&dir.join(ENTRIES_FILE)).await?;
        let queue: Vec<QueueItem> = read_collection(&dir.join(QUEUE_FILE)).await?;
        let projects: Vec<Project> = read_collection(&dir.join(PROJECTS_FILE)).await?;

        debug!(
            "Opened JSON store at {}: {} entries, {} queue items, {} projects",
            dir.display(),
            entries.len(),
            queue.len(),
            projects.len()
        );

        let collections = Collections {
            entries: entries.into_iter().map(|e| (e.id.clone(), e)).collect(),
            queue: queue.into_iter().map(|q| (q.id.clone(), q)).collect(),
            projects: projects.into_iter().map(|p| (p.id.clone(), p)).collect(),
        };

        Ok(Self {
            dir,
            inner: MemoryStore::from_collections(collections),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn flush(&self, collection: Collection) -> StoreResult<()> {
        let snapshot = self.inner.snapshot().await;
        let path = self.dir.join(collection.file_name());
        match collection {
            Collection::Entries => write_collection(&path, snapshot.entries.values()).await,
            Collection::Queue => write_collection(&path, snapshot.queue.values()).await,
            Collection::Projects => write_collection(&path, snapshot.projects.values()).await,
        }
    }
}

async fn read_collection<T: DeserializeOwned>(path: &Path) -> StoreResult<Vec<T>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

async fn write_collection<'a, T, I>(path: &Path, records: I) -> StoreResult<()>
where
    T: Serialize + 'a,
    I: Iterator<Item = &'a T>,
{
    let records: Vec<&T> = records.collect();
    let json = serde_json::to_string_pretty(&records)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl CorpusStore for JsonFileStore {
    async fn get_entry(&self, id: &str) -> StoreResult<Option<TranslationEntry>> {
        self.inner.get_entry(id).await
    }

    async fn put_entry(&self, entry: &TranslationEntry) -> StoreResult<()> {
        self.inner.put_entry(entry).await?;
        self.flush(Collection::Entries).await
    }

    async fn batch_put_entries(&self, entries: &[TranslationEntry]) -> StoreResult<()> {
        self.inner.batch_put_entries(entries).await?;
        self.flush(Collection::Entries).await
    }

    async fn scan_entries(
        &self,
        language: &str,
        namespace: Option<&str>,
        start_after: Option<&str>,
        limit: usize,
    ) -> StoreResult<Page<TranslationEntry>> {
        self.inner
            .scan_entries(language, namespace, start_after, limit)
            .await
    }

    async fn get_queue_item(&self, id: &str) -> StoreResult<Option<QueueItem>> {
        self.inner.get_queue_item(id).await
    }

    async fn put_queue_item(&self, item: &QueueItem) -> StoreResult<()> {
        self.inner.put_queue_item(item).await?;
        self.flush(Collection::Queue).await
    }

    async fn batch_put_queue_items(&self, items: &[QueueItem]) -> StoreResult<()> {
        self.inner.batch_put_queue_items(items).await?;
        self.flush(Collection::Queue).await
    }

    async fn scan_queue_items(
        &self,
        filter: &QueueFilter,
        start_after: Option<&str>,
        limit: usize,
    ) -> StoreResult<Page<QueueItem>> {
        self.inner.scan_queue_items(filter, start_after, limit).await
    }

    async fn get_project(&self, id: &str) -> StoreResult<Option<Project>> {
        self.inner.get_project(id).await
    }

    async fn put_project(&self, project: &Project) -> StoreResult<()> {
        self.inner.put_project(project).await?;
        self.flush(Collection::Projects).await
    }

    async fn scan_projects(
        &self,
        statuses: &[ProjectStatus],
        start_after: Option<&str>,
        limit: usize,
    ) -> StoreResult<Page<Project>> {
        self.inner.scan_projects(statuses, start_after, limit).await
    }
}
