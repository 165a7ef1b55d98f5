//! Google Cloud Translation API v2 provider
//!
//! Implements [`SyncBatchProvider`]: a batch of texts goes out in one request
//! and comes back translated in the same call.
//!
//! # Authentication
//!
//! The provider loads the API key from the `GOOGLE_TRANSLATE_API_KEY`
//! environment variable, or takes it explicitly. Obtain a key from:
//! https://console.cloud.google.com/
//!
//! # Placeholders
//!
//! Texts are sent in HTML format with every `{...}` placeholder wrapped in
//! `<span class="notranslate">`, which the API leaves untouched. The spans
//! are removed and HTML entities decoded before results are returned.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use tracing::debug;
use transqueue::provider::payload::decode_entities;
use transqueue::provider::{SyncBatchProvider, normalize_language, validate_language};
use transqueue::{ProviderError, ProviderResult};

use crate::http_error::classify;

/// Target languages supported by the NMT model, in Google's own codes
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "en", "af", "ar", "bg", "zh-CN", "zh-TW", "hr", "cs", "da", "nl", "fr", "de", "el", "iw",
    "hi", "is", "id", "it", "ja", "ko", "no", "pl", "pt", "ro", "ru", "sk", "es", "sv", "th",
    "tr", "vi", "fi",
];

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}]*\}").expect("placeholder pattern is valid"));

static PROTECTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<span class="notranslate">(\{[^{}]*\})</span>"#)
        .expect("protected pattern is valid")
});

/// Map a language code onto the code Google expects
///
/// Returns `None` when the NMT model does not support the language.
pub fn google_language_code(language: &str) -> Option<&'static str> {
    if let Some(code) = SUPPORTED_LANGUAGES
        .iter()
        .find(|code| code.eq_ignore_ascii_case(language))
        .copied()
    {
        return Some(code);
    }

    let lower = language.to_lowercase().replace('_', "-");
    match lower.as_str() {
        "zh" | "zh-hans" | "zh-cn" | "zh-sg" => return Some("zh-CN"),
        "zh-hant" | "zh-tw" | "zh-hk" => return Some("zh-TW"),
        _ => {}
    }

    match normalize_language(language).as_str() {
        "he" => Some("iw"),
        "nb" | "nn" => Some("no"),
        base => SUPPORTED_LANGUAGES.iter().find(|code| **code == base).copied(),
    }
}

/// Wrap every `{...}` placeholder so the API leaves it alone
pub fn protect_placeholders(text: &str) -> String {
    PLACEHOLDER
        .replace_all(text, r#"<span class="notranslate">$0</span>"#)
        .into_owned()
}

/// Undo [`protect_placeholders`] and decode HTML entities
pub fn restore_placeholders(text: &str) -> String {
    let unwrapped = PROTECTED.replace_all(text, "$1");
    decode_entities(&unwrapped).into_owned()
}

/// Google Cloud Translation v2 provider
#[derive(Clone)]
pub struct GoogleTranslateProvider {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl GoogleTranslateProvider {
    /// Google Translate v2 API accepts up to 128 texts per request
    const MAX_BATCH_SIZE: usize = 128;

    /// Maximum characters per string (30KB per Google Translate API limits)
    const MAX_CHARS_PER_STRING: usize = 30_000;

    /// Create a provider with an explicit API key
    ///
    /// # Example
    ///
    /// ```ignore
    /// let provider = GoogleTranslateProvider::new("your-api-key".to_string())?;
    /// ```
    pub fn new(api_key: String) -> ProviderResult<Self> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::Config("API key cannot be empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            client,
            base_url: "https://translation.googleapis.com/language/translate/v2".to_string(),
        })
    }

    /// Create a provider from the `GOOGLE_TRANSLATE_API_KEY` environment variable
    pub fn from_env() -> ProviderResult<Self> {
        let api_key = std::env::var("GOOGLE_TRANSLATE_API_KEY").map_err(|_| {
            ProviderError::Config(
                "GOOGLE_TRANSLATE_API_KEY environment variable not set".to_string(),
            )
        })?;

        Self::new(api_key)
    }

    /// Point the provider at another endpoint, e.g. a local fake
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Translate one chunk of already protected texts
    async fn translate_chunk(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
    ) -> ProviderResult<Vec<String>> {
        let url = format!("{}?key={}", self.base_url, self.api_key);
        let body = json!({
            "q": texts,
            "source": source,
            "target": target,
            "format": "html",
            "model": "nmt"
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            return Err(classify(status, &error_text));
        }

        let json: serde_json::Value = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse API response: {}", e))
        })?;

        parse_translations(&json, texts.len())
    }
}

/// Pull `data.translations[].translatedText` out of an API response
fn parse_translations(json: &serde_json::Value, expected: usize) -> ProviderResult<Vec<String>> {
    let translations = json["data"]["translations"].as_array().ok_or_else(|| {
        ProviderError::InvalidResponse("missing 'data.translations' array".to_string())
    })?;

    if translations.len() != expected {
        return Err(ProviderError::InvalidResponse(format!(
            "expected {} translations, got {}",
            expected,
            translations.len()
        )));
    }

    translations
        .iter()
        .map(|t| {
            t["translatedText"]
                .as_str()
                .map(restore_placeholders)
                .ok_or_else(|| {
                    ProviderError::InvalidResponse("missing 'translatedText' field".to_string())
                })
        })
        .collect()
}

impl std::fmt::Debug for GoogleTranslateProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleTranslateProvider")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl SyncBatchProvider for GoogleTranslateProvider {
    async fn translate_batch(
        &self,
        texts: &BTreeMap<String, String>,
        source_language: &str,
        target_language: &str,
    ) -> ProviderResult<BTreeMap<String, String>> {
        validate_language(source_language)?;
        validate_language(target_language)?;

        let target = google_language_code(target_language).ok_or_else(|| {
            ProviderError::Config(format!(
                "target language '{}' is not supported by Google NMT",
                target_language
            ))
        })?;
        let source = google_language_code(source_language).unwrap_or(source_language);

        if texts.is_empty() {
            return Ok(BTreeMap::new());
        }

        for (id, text) in texts {
            if text.len() > Self::MAX_CHARS_PER_STRING {
                return Err(ProviderError::Translation(format!(
                    "Text {} exceeds maximum length of {} characters",
                    id,
                    Self::MAX_CHARS_PER_STRING
                )));
            }
        }

        let ids: Vec<&String> = texts.keys().collect();
        let protected: Vec<String> = texts.values().map(|t| protect_placeholders(t)).collect();

        let mut results = BTreeMap::new();
        for (id_chunk, text_chunk) in ids
            .chunks(Self::MAX_BATCH_SIZE)
            .zip(protected.chunks(Self::MAX_BATCH_SIZE))
        {
            let translated = self.translate_chunk(text_chunk, source, target).await?;
            debug!("Translated {} texts into {}", translated.len(), target);
            results.extend(
                id_chunk
                    .iter()
                    .map(|id| (*id).clone())
                    .zip(translated),
            );
        }

        Ok(results)
    }

    fn provider_name(&self) -> &str {
        "Google Translate"
    }
}
