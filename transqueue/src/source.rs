//! Source message loading
//!
//! Message files are flat JSON objects mapping a message key to its text:
//!
//! ```json
//! {
//!     "@metadata": { "authors": ["..."] },
//!     "save-button": "Save",
//!     "cancel-button": "Cancel"
//! }
//! ```
//!
//! Keys starting with `@` are metadata and ignored. The corpus is keyed by
//! content, so message keys only matter for diagnostics.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::TranslationEntry;
use crate::store::CorpusStore;

/// Load `key → text` pairs from one message file
pub fn load_messages(path: &Path) -> Result<BTreeMap<String, String>> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Source(format!("failed to read '{}': {}", path.display(), e)))?;
    parse_messages(&content)
        .map_err(|e| Error::Source(format!("'{}': {}", path.display(), e)))
}

/// Parse a message file already in memory
pub fn parse_messages(content: &str) -> std::result::Result<BTreeMap<String, String>, String> {
    let json: Value =
        serde_json::from_str(content).map_err(|e| format!("invalid JSON: {}", e))?;
    let obj = json
        .as_object()
        .ok_or_else(|| "root must be an object".to_string())?;

    let mut messages = BTreeMap::new();
    for (key, value) in obj {
        if key.starts_with('@') {
            continue;
        }
        match value.as_str() {
            Some(text) => {
                messages.insert(key.clone(), text.to_string());
            }
            None => warn!("Message '{}' is not a string, skipping", key),
        }
    }
    Ok(messages)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub created: usize,
    pub unchanged: usize,
}

/// Store every distinct, non-blank message text as a source entry
///
/// Existing entries are left untouched, so their creation time survives
/// repeated imports.
pub async fn import_messages(
    store: &dyn CorpusStore,
    language: &str,
    namespace: Option<&str>,
    messages: &BTreeMap<String, String>,
) -> Result<ImportReport> {
    let mut report = ImportReport::default();
    let mut fresh: BTreeMap<String, TranslationEntry> = BTreeMap::new();

    for (key, text) in messages {
        if text.trim().is_empty() {
            debug!("Message '{}' is blank, skipping", key);
            continue;
        }
        let entry = TranslationEntry::new(language, namespace, text);
        if fresh.contains_key(&entry.id) || store.get_entry(&entry.id).await?.is_some() {
            report.unchanged += 1;
            continue;
        }
        fresh.insert(entry.id.clone(), entry);
    }

    let entries: Vec<TranslationEntry> = fresh.into_values().collect();
    if !entries.is_empty() {
        store.batch_put_entries(&entries).await?;
    }
    report.created = entries.len();
    Ok(report)
}
