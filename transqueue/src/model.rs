//! Records persisted in the corpus store
//!
//! Three collections exist: translation entries (source and translated text),
//! queue items (one unit of translation work each) and projects (a batch of
//! queue items submitted together to one provider).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::{entry_id, new_project_id};

/// The translation providers the engine knows how to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderKind {
    /// OneHourTranslation: human translation, submit then poll then fetch
    #[serde(rename = "OHT")]
    Oht,
    /// Google Cloud Translation: machine translation, answers in the same call
    #[serde(rename = "GCT")]
    Gct,
}

impl ProviderKind {
    pub const fn code(self) -> &'static str {
        match self {
            ProviderKind::Oht => "OHT",
            ProviderKind::Gct => "GCT",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown translation provider '{0}', expected OHT or GCT")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OHT" => Ok(ProviderKind::Oht),
            "GCT" => Ok(ProviderKind::Gct),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

/// A piece of text in one language and namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationEntry {
    pub id: String,
    pub language: String,
    pub namespace: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl TranslationEntry {
    /// Create an entry whose id is derived from its content
    pub fn new(language: &str, namespace: Option<&str>, text: &str) -> Self {
        let now = Utc::now();
        Self {
            id: entry_id(language, namespace, text),
            language: language.to_string(),
            namespace: namespace.map(str::to_string),
            text: text.to_string(),
            created_at: now,
            modified_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }
}

/// Composite identity of a queue item: one per source text, target language
/// and provider. Rendered as `"{source_id}:{target_language}:{provider}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueItemKey {
    pub source_id: String,
    pub target_language: String,
    pub provider: ProviderKind,
}

impl QueueItemKey {
    pub fn new(source_id: &str, target_language: &str, provider: ProviderKind) -> Self {
        Self {
            source_id: source_id.to_string(),
            target_language: target_language.to_string(),
            provider,
        }
    }
}

impl fmt::Display for QueueItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.source_id, self.target_language, self.provider
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed queue item id '{0}'")]
pub struct MalformedQueueItemKey(pub String);

impl FromStr for QueueItemKey {
    type Err = MalformedQueueItemKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || MalformedQueueItemKey(s.to_string());
        let mut parts = s.split(':');
        let (Some(source_id), Some(target_language), Some(provider), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };
        if source_id.is_empty() || target_language.is_empty() {
            return Err(malformed());
        }
        let provider = provider.parse().map_err(|_| malformed())?;
        Ok(Self::new(source_id, target_language, provider))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// Waiting for a provider result
    Pending,
    /// Result staged on the item, not yet written to the corpus
    Ready,
    /// Result written to the corpus
    Completed,
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Ready => "ready",
            QueueStatus::Completed => "completed",
        })
    }
}

/// One unit of outstanding or completed translation work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub project_id: String,
    pub namespace: Option<String>,
    pub source_id: String,
    pub target_language: String,
    pub provider: ProviderKind,
    /// The translated text once a provider delivered it
    pub target_text: Option<String>,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn new(key: &QueueItemKey, project_id: &str, namespace: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            id: key.to_string(),
            project_id: project_id.to_string(),
            namespace: namespace.map(str::to_string),
            source_id: key.source_id.clone(),
            target_language: key.target_language.clone(),
            provider: key.provider,
            target_text: None,
            status: QueueStatus::Pending,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn key(&self) -> QueueItemKey {
        QueueItemKey::new(&self.source_id, &self.target_language, self.provider)
    }

    pub fn is_pending(&self) -> bool {
        self.status == QueueStatus::Pending
    }

    /// Stage a provider result on this item
    pub fn mark_ready(&mut self, text: &str) {
        self.target_text = Some(text.to_string());
        self.status = QueueStatus::Ready;
        self.modified_at = Utc::now();
    }

    pub fn mark_completed(&mut self) {
        self.status = QueueStatus::Completed;
        self.modified_at = Utc::now();
    }

    /// Drop any staged result and wait for the provider again
    pub fn mark_pending(&mut self) {
        self.target_text = None;
        self.status = QueueStatus::Pending;
        self.modified_at = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Pending,
    InProgress,
    Completed,
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProjectStatus::Pending => "pending",
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Completed => "completed",
        })
    }
}

/// Provider-side handle of a submitted project
///
/// Only `external_id` is interpreted by the engine; whatever else the
/// provider returns is kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProviderProjectData {
    pub external_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_ids: Vec<String>,
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A bounded batch of queue items sent to one provider for one target language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub provider: ProviderKind,
    pub target_language: String,
    pub status: ProjectStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_data: Option<ProviderProjectData>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Project {
    pub fn new(provider: ProviderKind, target_language: &str) -> Self {
        let now = Utc::now();
        Self {
            id: new_project_id(),
            provider,
            target_language: target_language.to_string(),
            status: ProjectStatus::Pending,
            provider_data: None,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn set_status(&mut self, status: ProjectStatus) {
        self.status = status;
        self.modified_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("OHT".parse::<ProviderKind>(), Ok(ProviderKind::Oht));
        assert_eq!("gct".parse::<ProviderKind>(), Ok(ProviderKind::Gct));
        assert!("DeepL".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_provider_kind_serde_uses_wire_names() {
        assert_eq!(serde_json::to_string(&ProviderKind::Gct).unwrap(), "\"GCT\"");
        let kind: ProviderKind = serde_json::from_str("\"OHT\"").unwrap();
        assert_eq!(kind, ProviderKind::Oht);
    }

    #[test]
    fn test_queue_item_key_round_trip() {
        let key = QueueItemKey::new("abc123", "fr", ProviderKind::Gct);
        assert_eq!(key.to_string(), "abc123:fr:GCT");
        assert_eq!("abc123:fr:GCT".parse::<QueueItemKey>(), Ok(key));
    }

    #[test]
    fn test_queue_item_key_rejects_malformed() {
        assert!("abc123:fr".parse::<QueueItemKey>().is_err());
        assert!("abc123:fr:GCT:extra".parse::<QueueItemKey>().is_err());
        assert!("abc123:fr:XYZ".parse::<QueueItemKey>().is_err());
        assert!(":fr:GCT".parse::<QueueItemKey>().is_err());
    }

    #[test]
    fn test_entry_id_matches_identity() {
        let entry = TranslationEntry::new("en", Some("menu"), "Save");
        assert_eq!(entry.id, entry_id("en", Some("menu"), "Save"));
    }

    #[test]
    fn test_queue_item_transitions() {
        let key = QueueItemKey::new("src", "de", ProviderKind::Oht);
        let mut item = QueueItem::new(&key, "p1", None);
        assert!(item.is_pending());
        assert_eq!(item.id, "src:de:OHT");
        assert_eq!(item.key(), key);

        item.mark_ready("Hallo");
        assert_eq!(item.status, QueueStatus::Ready);
        assert_eq!(item.target_text.as_deref(), Some("Hallo"));

        item.mark_completed();
        assert_eq!(item.status, QueueStatus::Completed);
    }

    #[test]
    fn test_project_status_serde() {
        let mut project = Project::new(ProviderKind::Oht, "ja");
        project.set_status(ProjectStatus::InProgress);
        let json = serde_json::to_value(&project).unwrap();
        assert_eq!(json["status"], "in_progress");
        assert_eq!(json["provider"], "OHT");
        assert!(json.get("provider_data").is_none());
    }

    #[test]
    fn test_provider_data_keeps_unknown_fields() {
        let data: ProviderProjectData = serde_json::from_str(
            r#"{"external_id":"991","cost":12.5,"wordcount":40}"#,
        )
        .unwrap();
        assert_eq!(data.external_id, "991");
        assert_eq!(data.cost, Some(12.5));
        assert_eq!(data.extra["wordcount"], 40);
    }
}
