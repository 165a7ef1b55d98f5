//! Engine settings
//!
//! All settings are passed explicitly into [`crate::Reconciler::new`]; no
//! component reads process-wide state.

/// Default number of queue items per project
pub const DEFAULT_PROJECT_LIMIT: usize = 100;

/// Default number of texts per synchronous provider call
pub const DEFAULT_SYNC_CHUNK_SIZE: usize = 10;

/// Default number of records requested per store scan page
pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Language of the authored corpus
    pub source_language: String,
    /// Maximum queue items per project
    pub project_limit: usize,
    /// Maximum texts per synchronous provider call; a failed call only
    /// leaves its own chunk pending
    pub sync_chunk_size: usize,
    pub page_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            source_language: "en".to_string(),
            project_limit: DEFAULT_PROJECT_LIMIT,
            sync_chunk_size: DEFAULT_SYNC_CHUNK_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl EngineConfig {
    pub fn with_source_language(mut self, language: &str) -> Self {
        self.source_language = language.to_string();
        self
    }

    /// Limits of 0 or 1 are not useful batch sizes and fall back to the default
    pub fn with_project_limit(mut self, limit: usize) -> Self {
        self.project_limit = effective_limit(Some(limit), DEFAULT_PROJECT_LIMIT);
        self
    }

    pub fn with_sync_chunk_size(mut self, size: usize) -> Self {
        self.sync_chunk_size = size.max(1);
        self
    }

    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size.max(1);
        self
    }

    /// The project limit for one run, honouring a per-run override
    pub fn project_limit_for(&self, requested: Option<usize>) -> usize {
        effective_limit(requested, self.project_limit)
    }
}

fn effective_limit(requested: Option<usize>, fallback: usize) -> usize {
    match requested {
        Some(limit) if limit > 1 => limit,
        _ => fallback,
    }
}
