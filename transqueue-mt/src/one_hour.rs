//! OneHourTranslation API v2 provider
//!
//! Implements [`AsyncProjectProvider`]. A project is opened over an uploaded
//! XML resource and worked on by human translators; its status is polled and
//! the translated resource downloaded once the project is signed off.
//!
//! Every API answer except downloads is wrapped in an envelope:
//!
//! ```json
//! { "status": { "code": 0, "msg": "ok" }, "results": { ... }, "errors": [] }
//! ```
//!
//! A non-zero status code is a failed call even when HTTP says 200.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};
use transqueue::provider::{
    AsyncProjectProvider, ProjectRequest, RemoteProgress, RemoteStatus, ResourcePayload,
    normalize_language,
};
use transqueue::{ProviderError, ProviderProjectData, ProviderResult};

use crate::http_error::classify;

const PRODUCTION_URL: &str = "https://www.onehourtranslation.com/api/2";
const SANDBOX_URL: &str = "https://sandbox.onehourtranslation.com/api/2";

/// Instruction sent with every project unless overridden
pub const DEFAULT_NOTE: &str = "DO NOT TRANSLATE any texts enclosed with 'curly brackets {}', '%s' notations and xml/html attributes.";

#[derive(Clone, PartialEq, Eq)]
pub struct OhtConfig {
    pub public_key: String,
    pub secret_key: String,
    /// Talk to the sandbox instead of production
    pub sandbox: bool,
    /// Instructions for the translators
    pub note: String,
    pub expertise: Option<String>,
    /// Tag applied to every created project
    pub tag: Option<String>,
    pub callback_url: Option<String>,
}

impl OhtConfig {
    pub fn new(public_key: &str, secret_key: &str) -> Self {
        Self {
            public_key: public_key.to_string(),
            secret_key: secret_key.to_string(),
            sandbox: false,
            note: DEFAULT_NOTE.to_string(),
            expertise: None,
            tag: None,
            callback_url: None,
        }
    }

    pub fn with_sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = note.to_string();
        self
    }

    pub fn with_expertise(mut self, expertise: Option<String>) -> Self {
        self.expertise = expertise;
        self
    }

    pub fn with_tag(mut self, tag: Option<String>) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_callback_url(mut self, callback_url: Option<String>) -> Self {
        self.callback_url = callback_url;
        self
    }
}

impl std::fmt::Debug for OhtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OhtConfig")
            .field("public_key", &self.public_key)
            .field("secret_key", &"***")
            .field("sandbox", &self.sandbox)
            .field("expertise", &self.expertise)
            .field("tag", &self.tag)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct EnvelopeStatus {
    code: i64,
    #[serde(default)]
    msg: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: EnvelopeStatus,
    results: Option<T>,
    #[serde(default)]
    errors: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CreatedProject {
    project_id: Value,
    #[serde(default)]
    credits: Option<Value>,
    #[serde(default)]
    wordcount: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectResources {
    #[serde(default)]
    translations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ProjectDetails {
    project_status_code: String,
    #[serde(default)]
    project_status: Option<String>,
    #[serde(default)]
    resources: ProjectResources,
}

/// Unwrap an API envelope, turning a non-zero status into an error
fn parse_envelope<T: DeserializeOwned>(body: &str) -> ProviderResult<T> {
    let envelope: Envelope<T> = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse API response: {}", e)))?;

    if envelope.status.code != 0 {
        let details: Vec<String> = envelope.errors.iter().map(Value::to_string).collect();
        return Err(ProviderError::Translation(format!(
            "API error {} ({}): {}",
            envelope.status.code,
            envelope.status.msg,
            details.join(", ")
        )));
    }

    envelope
        .results
        .ok_or_else(|| ProviderError::InvalidResponse("missing 'results'".to_string()))
}

/// Render a JSON scalar the API sends as either number or string
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn scalar_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Map a status code onto the progress vocabulary
pub fn progress_of(status_code: &str) -> RemoteProgress {
    match status_code.to_lowercase().as_str() {
        "pending" => RemoteProgress::WaitingForTranslator,
        "in_progress" | "submitted" => RemoteProgress::InProgress,
        "signed" | "completed" => RemoteProgress::ReadyToCommit,
        _ => RemoteProgress::Unknown,
    }
}

/// Convert an ISO-like code into the locale codes the API expects
///
/// - `en` → `en-us`
/// - `fr` → `fr-fr`
/// - `pt-BR` → `pt-br`
pub fn oht_language_code(language: &str) -> String {
    let lower = language.to_lowercase().replace('_', "-");
    match lower.as_str() {
        "zh" | "zh-cn" | "zh-hans" => return "zh-cn-cmn-s".to_string(),
        "zh-tw" | "zh-hant" => return "zh-tw-cmn-t".to_string(),
        _ => {}
    }
    if lower.contains('-') {
        return lower;
    }

    let region = match normalize_language(&lower).as_str() {
        "en" => "us",
        "ar" => "sa",
        "cs" => "cz",
        "da" => "dk",
        "el" => "gr",
        "he" => "il",
        "ja" => "jp",
        "ko" => "kr",
        "sv" => "se",
        "uk" => "ua",
        "vi" => "vn",
        "hi" => "in",
        _ => lower.as_str(),
    };
    format!("{}-{}", lower, region)
}

/// OneHourTranslation API v2 provider
#[derive(Clone)]
pub struct OneHourTranslationProvider {
    config: OhtConfig,
    client: reqwest::Client,
    base_url: String,
}

impl OneHourTranslationProvider {
    pub fn new(config: OhtConfig) -> ProviderResult<Self> {
        if config.public_key.trim().is_empty() || config.secret_key.trim().is_empty() {
            return Err(ProviderError::Config(
                "Unable to use OneHourTranslation without public and secret keys".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = if config.sandbox { SANDBOX_URL } else { PRODUCTION_URL }.to_string();
        Ok(Self {
            config,
            client,
            base_url,
        })
    }

    /// Create a provider from `OHT_PUBLIC_KEY` and `OHT_SECRET_KEY`
    pub fn from_env() -> ProviderResult<Self> {
        let key = |name: &str| {
            std::env::var(name).map_err(|_| {
                ProviderError::Config(format!("{} environment variable not set", name))
            })
        };
        Self::new(OhtConfig::new(&key("OHT_PUBLIC_KEY")?, &key("OHT_SECRET_KEY")?))
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> ProviderResult<reqwest::Url> {
        let mut query = vec![
            ("public_key", self.config.public_key.as_str()),
            ("secret_key", self.config.secret_key.as_str()),
        ];
        query.extend_from_slice(params);
        reqwest::Url::parse_with_params(&format!("{}/{}", self.base_url, path), &query)
            .map_err(|e| ProviderError::Config(format!("Invalid API URL: {}", e)))
    }

    fn credentials(&self) -> Form {
        Form::new()
            .text("public_key", self.config.public_key.clone())
            .text("secret_key", self.config.secret_key.clone())
    }

    async fn read_body(response: reqwest::Response) -> ProviderResult<String> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(classify(status, &body));
        }
        Ok(body)
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, form: Form) -> ProviderResult<T> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        parse_envelope(&Self::read_body(response).await?)
    }

    async fn get(&self, url: reqwest::Url) -> ProviderResult<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        Self::read_body(response).await
    }

    async fn tag_project(&self, external_id: &str, tag: &str) -> ProviderResult<()> {
        let form = self.credentials().text("tag_name", tag.to_string());
        let _: Value = self
            .post(&format!("project/{}/tag", external_id), form)
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for OneHourTranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OneHourTranslationProvider")
            .field("config", &self.config)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl AsyncProjectProvider for OneHourTranslationProvider {
    async fn upload_resource(&self, payload: &ResourcePayload) -> ProviderResult<String> {
        let part = Part::text(payload.content.clone())
            .file_name(payload.file_name.clone())
            .mime_str("application/xml")
            .map_err(|e| ProviderError::Config(e.to_string()))?;
        let form = self.credentials().part("upload", part);

        let ids: Vec<String> = self.post("resources/file", form).await?;
        let id = ids.into_iter().next().ok_or_else(|| {
            ProviderError::InvalidResponse("upload returned no resource id".to_string())
        })?;
        debug!("Uploaded {} as resource {}", payload.file_name, id);
        Ok(id)
    }

    async fn create_project(&self, request: &ProjectRequest) -> ProviderResult<ProviderProjectData> {
        let mut form = self
            .credentials()
            .text("name", request.project_id.clone())
            .text("source_language", request.source_language.clone())
            .text("target_language", request.target_language.clone())
            .text("sources", request.resource_ids.join(","))
            .text("wordCount", request.word_count.to_string())
            .text("notes", self.config.note.clone());
        if let Some(expertise) = &self.config.expertise {
            form = form.text("expertise", expertise.clone());
        }
        if let Some(callback) = &self.config.callback_url {
            form = form.text("callbackUrl", callback.clone());
        }

        let created: CreatedProject = self.post("project/translation", form).await?;
        let external_id = scalar_to_string(&created.project_id).ok_or_else(|| {
            ProviderError::InvalidResponse("project_id is not a scalar".to_string())
        })?;

        let mut data = ProviderProjectData {
            external_id: external_id.clone(),
            cost: created.credits.as_ref().and_then(scalar_to_f64),
            resource_ids: request.resource_ids.clone(),
            ..Default::default()
        };
        if let Some(wordcount) = created.wordcount {
            data.extra.insert("wordcount".to_string(), wordcount);
        }

        if let Some(tag) = &self.config.tag {
            // tagging is best effort once the project exists
            match self.tag_project(&external_id, tag).await {
                Ok(()) => {
                    data.extra.insert("tag".to_string(), Value::String(tag.clone()));
                }
                Err(e) => warn!("Failed to tag project {} with '{}': {}", external_id, tag, e),
            }
        }

        info!(
            "OneHourTranslation project {} created, credits: {:?}",
            external_id, data.cost
        );
        Ok(data)
    }

    async fn project_status(&self, external_id: &str) -> ProviderResult<RemoteStatus> {
        let url = self.url(&format!("project/{}", external_id), &[])?;
        let details: ProjectDetails = parse_envelope(&self.get(url).await?)?;
        Ok(RemoteStatus {
            code: details.project_status_code,
            label: details.project_status,
            translations: details.resources.translations,
        })
    }

    async fn download_resource(
        &self,
        resource_id: &str,
        external_id: &str,
    ) -> ProviderResult<String> {
        let url = self.url(
            &format!("resources/{}/download", resource_id),
            &[("project_id", external_id)],
        )?;
        self.get(url).await
    }

    fn progress(&self, status_code: &str) -> RemoteProgress {
        progress_of(status_code)
    }

    fn language_code(&self, language: &str) -> String {
        oht_language_code(language)
    }

    fn provider_name(&self) -> &str {
        "OneHourTranslation"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_error::fake_server::respond_once;

    fn provider() -> OneHourTranslationProvider {
        OneHourTranslationProvider::new(OhtConfig::new("pub", "secret")).unwrap()
    }

    #[test]
    fn test_missing_keys_are_config_errors() {
        let result = OneHourTranslationProvider::new(OhtConfig::new("", "secret"));
        assert!(matches!(result, Err(ProviderError::Config(_))));
        let result = OneHourTranslationProvider::new(OhtConfig::new("pub", " "));
        assert!(matches!(result, Err(ProviderError::Config(_))));
    }

    #[test]
    fn test_defaults_and_sandbox() {
        let config = OhtConfig::new("pub", "secret");
        assert_eq!(config.note, DEFAULT_NOTE);
        assert!(!config.sandbox);

        assert_eq!(provider().base_url, PRODUCTION_URL);
        let sandboxed =
            OneHourTranslationProvider::new(OhtConfig::new("pub", "secret").with_sandbox(true))
                .unwrap();
        assert_eq!(sandboxed.base_url, SANDBOX_URL);
    }

    #[test]
    fn test_debug_masks_secret() {
        let debug = format!("{:?}", provider());
        assert!(debug.contains("***"));
        assert!(!debug.contains("\"secret\""));
    }

    #[test]
    fn test_language_codes() {
        assert_eq!(oht_language_code("en"), "en-us");
        assert_eq!(oht_language_code("fr"), "fr-fr");
        assert_eq!(oht_language_code("de"), "de-de");
        assert_eq!(oht_language_code("ja"), "ja-jp");
        assert_eq!(oht_language_code("pt-BR"), "pt-br");
        assert_eq!(oht_language_code("zh"), "zh-cn-cmn-s");
        assert_eq!(provider().language_code("sv"), "sv-se");
    }

    #[test]
    fn test_progress_mapping() {
        assert_eq!(progress_of("pending"), RemoteProgress::WaitingForTranslator);
        assert_eq!(progress_of("in_progress"), RemoteProgress::InProgress);
        assert_eq!(progress_of("submitted"), RemoteProgress::InProgress);
        assert_eq!(progress_of("signed"), RemoteProgress::ReadyToCommit);
        assert_eq!(progress_of("Completed"), RemoteProgress::ReadyToCommit);
        assert_eq!(progress_of("canceled"), RemoteProgress::Unknown);
    }

    #[test]
    fn test_envelope_success() {
        let body = r#"{"status":{"code":0,"msg":"ok"},"results":["rsc-5a1b"],"errors":[]}"#;
        let ids: Vec<String> = parse_envelope(body).unwrap();
        assert_eq!(ids, vec!["rsc-5a1b".to_string()]);
    }

    #[test]
    fn test_envelope_error_code() {
        let body = r#"{"status":{"code":102,"msg":"Forbidden"},"results":[],"errors":["bad key"]}"#;
        match parse_envelope::<Vec<String>>(body) {
            Err(ProviderError::Translation(msg)) => {
                assert!(msg.contains("102"));
                assert!(msg.contains("bad key"));
            }
            other => panic!("Expected Translation error, got {:?}", other),
        }
    }

    #[test]
    fn test_envelope_garbage() {
        assert!(matches!(
            parse_envelope::<Value>("<html>"),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_project_details() {
        let body = r#"{
            "status": {"code": 0, "msg": "ok"},
            "results": {
                "project_id": 1234,
                "project_status": "Signed",
                "project_status_code": "signed",
                "resources": {"sources": ["rsc-1"], "translations": ["rsc-2"]}
            }
        }"#;
        let details: ProjectDetails = parse_envelope(body).unwrap();
        assert_eq!(details.project_status_code, "signed");
        assert_eq!(details.project_status.as_deref(), Some("Signed"));
        assert_eq!(details.resources.translations, vec!["rsc-2".to_string()]);
    }

    #[test]
    fn test_created_project_scalars() {
        let body = r#"{"status":{"code":0},"results":{"project_id":987,"credits":"12.5","wordcount":40}}"#;
        let created: CreatedProject = parse_envelope(body).unwrap();
        assert_eq!(scalar_to_string(&created.project_id).as_deref(), Some("987"));
        assert_eq!(created.credits.as_ref().and_then(scalar_to_f64), Some(12.5));
    }

    #[test]
    fn test_urls_carry_credentials() {
        let url = provider()
            .url("resources/rsc-1/download", &[("project_id", "42")])
            .unwrap();
        assert!(url.as_str().starts_with(PRODUCTION_URL));
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("public_key".to_string(), "pub".to_string())));
        assert!(query.contains(&("project_id".to_string(), "42".to_string())));
    }

    #[tokio::test]
    async fn test_throttled_status_call_is_transient() {
        let base_url = respond_once("429 Too Many Requests", "{}").await;
        let provider = provider().with_base_url(&base_url);

        let err = provider.project_status("42").await.unwrap_err();
        assert!(err.is_transient(), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_rejected_keys_are_config_errors() {
        let base_url = respond_once("401 Unauthorized", r#"{"status":{"code":101}}"#).await;
        let provider = provider().with_base_url(&base_url);

        let err = provider.project_status("42").await.unwrap_err();
        assert!(matches!(err, ProviderError::Config(_)), "got {:?}", err);
    }

    #[tokio::test]
    #[ignore] // Requires OHT_PUBLIC_KEY and OHT_SECRET_KEY, talks to the sandbox
    async fn test_sandbox_upload() {
        let provider = OneHourTranslationProvider::new(
            OhtConfig::new(
                &std::env::var("OHT_PUBLIC_KEY").unwrap(),
                &std::env::var("OHT_SECRET_KEY").unwrap(),
            )
            .with_sandbox(true),
        )
        .unwrap();
        let id = provider
            .upload_resource(&ResourcePayload {
                file_name: "probe.xml".to_string(),
                content: "<translations/>".to_string(),
            })
            .await
            .unwrap();
        assert!(!id.is_empty());
    }
}
