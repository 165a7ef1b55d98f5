//! Mock providers for testing
//!
//! Deterministic, API-free stand-ins for both provider capabilities, so the
//! whole reconciliation pipeline can be exercised without credentials or
//! network access.
//!
//! # Example
//!
//! ```ignore
//! use transqueue::provider::{MockSyncProvider, MockMode, SyncBatchProvider};
//!
//! #[tokio::test]
//! async fn test_translation() {
//!     let mock = MockSyncProvider::new(MockMode::Suffix);
//!     let texts = [("1".to_string(), "hello".to_string())].into();
//!     let result = mock.translate_batch(&texts, "en", "fr").await.unwrap();
//!     assert_eq!(result["1"], "hello_fr");
//! }
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::payload::{PayloadUnit, SubmissionDocument, build_document, parse_units};
use super::{
    AsyncProjectProvider, ProjectRequest, RemoteProgress, RemoteStatus, ResourcePayload,
    SyncBatchProvider,
};
use crate::error::{ProviderError, ProviderResult};
use crate::model::ProviderProjectData;

/// Mock translation modes for testing different scenarios
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Append target language suffix: "hello" → "hello_fr"
    Suffix,

    /// Use predefined mappings, falling back to the suffix
    /// (text, target_language) → translation
    Mappings(HashMap<(String, String), String>),

    /// Every call fails with this message
    Error(String),

    /// Return input unchanged
    NoOp,
}

/// Synchronous mock provider
///
/// Besides the translation mode, individual calls can be made to fail
/// (1-based call numbers) and individual ids can be silently omitted from
/// the result, which is how a real provider masks a failed sub-request.
#[derive(Debug)]
pub struct MockSyncProvider {
    mode: MockMode,
    failing_calls: HashSet<usize>,
    omitted_ids: HashSet<String>,
    calls: AtomicUsize,
}

impl MockSyncProvider {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            failing_calls: HashSet::new(),
            omitted_ids: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail the given calls (counted from 1) with a transient error
    pub fn failing_on_calls(mut self, calls: impl IntoIterator<Item = usize>) -> Self {
        self.failing_calls.extend(calls);
        self
    }

    /// Leave these ids out of every result
    pub fn omitting<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.omitted_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Number of `translate_batch` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn apply_translation(&self, text: &str, target: &str) -> ProviderResult<String> {
        match &self.mode {
            MockMode::Suffix => Ok(format!("{}_{}", text, target)),
            MockMode::Mappings(map) => {
                let key = (text.to_string(), target.to_string());
                Ok(map
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| format!("{}_{}", text, target)))
            }
            MockMode::Error(msg) => Err(ProviderError::Translation(msg.clone())),
            MockMode::NoOp => Ok(text.to_string()),
        }
    }
}

#[async_trait]
impl SyncBatchProvider for MockSyncProvider {
    async fn translate_batch(
        &self,
        texts: &BTreeMap<String, String>,
        _source_language: &str,
        target_language: &str,
    ) -> ProviderResult<BTreeMap<String, String>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_calls.contains(&call) {
            return Err(ProviderError::Network(format!(
                "simulated failure on call {}",
                call
            )));
        }

        let mut results = BTreeMap::new();
        for (id, text) in texts {
            if self.omitted_ids.contains(id) {
                continue;
            }
            results.insert(id.clone(), self.apply_translation(text, target_language)?);
        }
        Ok(results)
    }

    fn provider_name(&self) -> &str {
        "Mock Sync Provider"
    }
}

/// How the asynchronous mock rewrites the result document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultMode {
    /// Echo every unit id faithfully
    Echo,
    /// Echo every id, but in reverse document order
    Reverse,
    /// Lose the last unit
    DropLast,
    /// Replace the first unit's id with one we never submitted
    ForeignId,
}

/// Id the `ForeignId` result mode substitutes
pub const FOREIGN_UNIT_ID: &str = "foreign:xx:OHT";

#[derive(Debug)]
struct SubmittedProject {
    resource_id: String,
    target_language: String,
}

#[derive(Debug)]
struct AsyncState {
    uploads: Vec<ResourcePayload>,
    projects: HashMap<String, SubmittedProject>,
    status_code: String,
    submission_failure: Option<String>,
}

/// Asynchronous mock provider
///
/// Uploaded documents are kept; once the scripted status code maps to
/// [`RemoteProgress::ReadyToCommit`], downloading the project's translation
/// returns the uploaded units with `_{target}` appended, rewritten according
/// to the [`ResultMode`].
#[derive(Debug)]
pub struct MockAsyncProvider {
    state: Mutex<AsyncState>,
    result_mode: ResultMode,
}

impl Default for MockAsyncProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAsyncProvider {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(AsyncState {
                uploads: Vec::new(),
                projects: HashMap::new(),
                status_code: "pending".to_string(),
                submission_failure: None,
            }),
            result_mode: ResultMode::Echo,
        }
    }

    pub fn with_result_mode(mut self, mode: ResultMode) -> Self {
        self.result_mode = mode;
        self
    }

    /// Make every upload fail with a network error
    pub fn failing_submission(self, msg: &str) -> Self {
        self.state().submission_failure = Some(msg.to_string());
        self
    }

    /// Script the status code every project reports from now on
    pub fn set_status(&self, code: &str) {
        self.state().status_code = code.to_string();
    }

    pub fn uploads(&self) -> Vec<ResourcePayload> {
        self.state().uploads.clone()
    }

    pub fn created_projects(&self) -> usize {
        self.state().projects.len()
    }

    fn state(&self) -> MutexGuard<'_, AsyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn rewrite(&self, mut units: Vec<PayloadUnit>) -> Vec<PayloadUnit> {
        match self.result_mode {
            ResultMode::Echo => {}
            ResultMode::Reverse => units.reverse(),
            ResultMode::DropLast => {
                units.pop();
            }
            ResultMode::ForeignId => {
                if let Some(first) = units.first_mut() {
                    first.id = FOREIGN_UNIT_ID.to_string();
                }
            }
        }
        units
    }
}

#[async_trait]
impl AsyncProjectProvider for MockAsyncProvider {
    async fn upload_resource(&self, payload: &ResourcePayload) -> ProviderResult<String> {
        let mut state = self.state();
        if let Some(msg) = &state.submission_failure {
            return Err(ProviderError::Network(msg.clone()));
        }
        state.uploads.push(payload.clone());
        Ok(format!("res-{}", state.uploads.len()))
    }

    async fn create_project(&self, request: &ProjectRequest) -> ProviderResult<ProviderProjectData> {
        let resource_id = request
            .resource_ids
            .first()
            .cloned()
            .ok_or_else(|| ProviderError::Translation("project without resources".to_string()))?;

        let mut state = self.state();
        let external_id = format!("mock-{}", state.projects.len() + 1);
        state.projects.insert(
            external_id.clone(),
            SubmittedProject {
                resource_id,
                target_language: request.target_language.clone(),
            },
        );

        Ok(ProviderProjectData {
            external_id,
            cost: Some(request.word_count as f64 * 0.1),
            resource_ids: request.resource_ids.clone(),
            ..Default::default()
        })
    }

    async fn project_status(&self, external_id: &str) -> ProviderResult<RemoteStatus> {
        let state = self.state();
        let project = state.projects.get(external_id).ok_or_else(|| {
            ProviderError::Translation(format!("unknown project {}", external_id))
        })?;

        let translations = if self.progress(&state.status_code) == RemoteProgress::ReadyToCommit {
            vec![format!("{}-translated", project.resource_id)]
        } else {
            Vec::new()
        };

        Ok(RemoteStatus {
            code: state.status_code.clone(),
            label: None,
            translations,
        })
    }

    async fn download_resource(
        &self,
        resource_id: &str,
        external_id: &str,
    ) -> ProviderResult<String> {
        let (source, target_language) = {
            let state = self.state();
            let project = state.projects.get(external_id).ok_or_else(|| {
                ProviderError::Translation(format!("unknown project {}", external_id))
            })?;
            if resource_id != format!("{}-translated", project.resource_id) {
                return Err(ProviderError::Translation(format!(
                    "unknown resource {}",
                    resource_id
                )));
            }
            let index: usize = project
                .resource_id
                .trim_start_matches("res-")
                .parse()
                .map_err(|_| ProviderError::InvalidResponse(project.resource_id.clone()))?;
            let upload = index
                .checked_sub(1)
                .and_then(|i| state.uploads.get(i))
                .ok_or_else(|| ProviderError::InvalidResponse(project.resource_id.clone()))?;
            (upload.content.clone(), project.target_language.clone())
        };

        let units = parse_units(&source)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?
            .into_iter()
            .map(|unit| PayloadUnit {
                text: format!("{}_{}", unit.text, target_language),
                id: unit.id,
            })
            .collect();

        build_document(&SubmissionDocument {
            project_id: external_id.to_string(),
            source_language: String::new(),
            target_language,
            units: self.rewrite(units),
        })
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    fn progress(&self, status_code: &str) -> RemoteProgress {
        match status_code {
            "pending" => RemoteProgress::WaitingForTranslator,
            "in_progress" => RemoteProgress::InProgress,
            "completed" => RemoteProgress::ReadyToCommit,
            _ => RemoteProgress::Unknown,
        }
    }

    fn provider_name(&self) -> &str {
        "Mock Async Provider"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(id, text)| (id.to_string(), text.to_string()))
            .collect()
    }

    // ========== Sync Mock Tests ==========

    #[tokio::test]
    async fn test_suffix_batch() {
        let mock = MockSyncProvider::new(MockMode::Suffix);
        let result = mock
            .translate_batch(&texts(&[("1", "hello"), ("2", "world")]), "en", "fr")
            .await
            .unwrap();
        assert_eq!(result, texts(&[("1", "hello_fr"), ("2", "world_fr")]));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_mappings_fall_back_to_suffix() {
        let mut map = HashMap::new();
        map.insert(("hello".to_string(), "fr".to_string()), "bonjour".to_string());
        let mock = MockSyncProvider::new(MockMode::Mappings(map));
        let result = mock
            .translate_batch(&texts(&[("1", "hello"), ("2", "bye")]), "en", "fr")
            .await
            .unwrap();
        assert_eq!(result["1"], "bonjour");
        assert_eq!(result["2"], "bye_fr");
    }

    #[tokio::test]
    async fn test_failing_call_numbers() {
        let mock = MockSyncProvider::new(MockMode::Suffix).failing_on_calls([2]);
        let batch = texts(&[("1", "a")]);
        assert!(mock.translate_batch(&batch, "en", "fr").await.is_ok());
        let err = mock.translate_batch(&batch, "en", "fr").await.unwrap_err();
        assert!(err.is_transient());
        assert!(mock.translate_batch(&batch, "en", "fr").await.is_ok());
    }

    #[tokio::test]
    async fn test_omitted_ids_are_missing_from_result() {
        let mock = MockSyncProvider::new(MockMode::NoOp).omitting(["2"]);
        let result = mock
            .translate_batch(&texts(&[("1", "a"), ("2", "b")]), "en", "fr")
            .await
            .unwrap();
        assert_eq!(result, texts(&[("1", "a")]));
    }

    #[tokio::test]
    async fn test_error_mode() {
        let mock = MockSyncProvider::new(MockMode::Error("API unavailable".to_string()));
        let result = mock.translate_batch(&texts(&[("1", "a")]), "en", "fr").await;
        assert_eq!(
            result,
            Err(ProviderError::Translation("API unavailable".to_string()))
        );
    }

    // ========== Async Mock Tests ==========

    async fn submit(mock: &MockAsyncProvider) -> String {
        let xml = build_document(&SubmissionDocument {
            project_id: "p-1".to_string(),
            source_language: "en".to_string(),
            target_language: "fr".to_string(),
            units: vec![PayloadUnit::new("a", "one"), PayloadUnit::new("b", "two")],
        })
        .unwrap();
        let resource = mock
            .upload_resource(&ResourcePayload {
                file_name: "p-1.xml".to_string(),
                content: xml,
            })
            .await
            .unwrap();
        mock.create_project(&ProjectRequest {
            project_id: "p-1".to_string(),
            source_language: "en".to_string(),
            target_language: "fr".to_string(),
            resource_ids: vec![resource],
            word_count: 2,
        })
        .await
        .unwrap()
        .external_id
    }

    #[tokio::test]
    async fn test_async_lifecycle() {
        let mock = MockAsyncProvider::new();
        let external = submit(&mock).await;

        let status = mock.project_status(&external).await.unwrap();
        assert_eq!(mock.progress(&status.code), RemoteProgress::WaitingForTranslator);
        assert!(status.translations.is_empty());

        mock.set_status("completed");
        let status = mock.project_status(&external).await.unwrap();
        assert_eq!(status.translations.len(), 1);

        let xml = mock
            .download_resource(&status.translations[0], &external)
            .await
            .unwrap();
        assert_eq!(
            parse_units(&xml).unwrap(),
            vec![PayloadUnit::new("a", "one_fr"), PayloadUnit::new("b", "two_fr")]
        );
    }

    #[tokio::test]
    async fn test_result_modes() {
        let mock = MockAsyncProvider::new().with_result_mode(ResultMode::DropLast);
        let external = submit(&mock).await;
        mock.set_status("completed");
        let status = mock.project_status(&external).await.unwrap();
        let xml = mock
            .download_resource(&status.translations[0], &external)
            .await
            .unwrap();
        assert_eq!(parse_units(&xml).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_submission() {
        let mock = MockAsyncProvider::new().failing_submission("connection reset");
        let result = mock
            .upload_resource(&ResourcePayload {
                file_name: "x.xml".to_string(),
                content: String::new(),
            })
            .await;
        assert!(matches!(result, Err(ProviderError::Network(_))));
        assert!(mock.uploads().is_empty());
    }
}
