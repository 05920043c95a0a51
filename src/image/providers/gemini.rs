//! Gemini (Google) image editing provider.

use crate::error::{parse_retry_after, sanitize_error_message, ClearViewError, Result};
use crate::image::provider::{EditorKind, ImageEditor};
use crate::image::types::{EditRequest, EditResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Environment variables consulted for the API key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["API_KEY", "GOOGLE_API_KEY"];

/// Gemini image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Nano Banana - Gemini 2.5 Flash Image (fast, economical).
    #[default]
    NanoBanana,
    /// Nano Banana Pro - Gemini 3 Pro Image (highest quality).
    NanoBananaPro,
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NanoBanana => "gemini-2.5-flash-image",
            Self::NanoBananaPro => "gemini-3-pro-image-preview",
        }
    }
}

impl std::str::FromStr for GeminiModel {
    type Err = ClearViewError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gemini-2.5-flash-image" | "nano-banana" => Ok(Self::NanoBanana),
            "gemini-3-pro-image-preview" | "nano-banana-pro" => Ok(Self::NanoBananaPro),
            other => Err(ClearViewError::InvalidRequest(format!(
                "unknown Gemini model: {other}"
            ))),
        }
    }
}

/// Builder for GeminiEditor.
#[derive(Debug, Clone, Default)]
pub struct GeminiEditorBuilder {
    api_key: Option<String>,
    model: GeminiModel,
    base_url: Option<String>,
    client: Option<reqwest::Client>,
}

impl GeminiEditorBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `API_KEY`, then `GOOGLE_API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the Gemini model variant.
    pub fn model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    /// Overrides the API endpoint.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Uses a preconfigured HTTP client (proxies, timeouts).
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Builds the editor, resolving the API key.
    ///
    /// A missing key is not fatal here: it is logged, and every call made
    /// with the editor fails with [`ClearViewError::Auth`].
    pub fn build(self) -> Result<GeminiEditor> {
        let api_key = self
            .api_key
            .or_else(|| {
                API_KEY_ENV_VARS
                    .iter()
                    .find_map(|var| std::env::var(var).ok())
            })
            .filter(|key| !key.trim().is_empty());

        if api_key.is_none() {
            tracing::error!("Missing API_KEY in environment variables.");
        }

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let client = match self.client {
            Some(client) => client,
            None => reqwest::Client::builder().build()?,
        };

        Ok(GeminiEditor {
            client,
            api_key,
            model: self.model,
            base_url,
        })
    }
}

/// Gemini image editing provider.
pub struct GeminiEditor {
    client: reqwest::Client,
    api_key: Option<String>,
    model: GeminiModel,
    base_url: String,
}

impl GeminiEditor {
    /// Creates a new `GeminiEditorBuilder`.
    pub fn builder() -> GeminiEditorBuilder {
        GeminiEditorBuilder::new()
    }

    /// The model this editor calls.
    pub fn model(&self) -> GeminiModel {
        self.model
    }

    /// Whether an API key was resolved.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ClearViewError::Auth("API_KEY is not configured".into()))
    }

    fn model_url(&self) -> String {
        format!("{}/v1beta/models/{}", self.base_url, self.model.as_str())
    }

    async fn edit_impl(&self, request: &EditRequest) -> Result<EditResult> {
        let api_key = self.api_key()?;
        let start = Instant::now();

        let url = format!("{}:generateContent", self.model_url());
        let body = GeminiRequest::from_edit_request(request);

        tracing::debug!(
            model = self.model.as_str(),
            mime_type = %request.mime_type,
            payload_len = request.image_base64.len(),
            "sending Gemini edit request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text, &headers));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let result = extract_result(gemini_response)?;

        tracing::debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            "Gemini edit complete"
        );
        Ok(result)
    }
}

/// Maps a non-success HTTP response to an error.
fn parse_error(status: u16, text: &str, headers: &reqwest::header::HeaderMap) -> ClearViewError {
    let message = GeminiErrorEnvelope::message_from(text)
        .map(|m| sanitize_error_message(&m))
        .unwrap_or_else(|| sanitize_error_message(text));

    if status == 404 {
        return ClearViewError::Api {
            status,
            message: "Model not found. Verify the model name is correct.".into(),
        };
    }
    if status == 429 {
        let retry_after = parse_retry_after(headers).map(std::time::Duration::from_secs);
        return ClearViewError::RateLimited { retry_after };
    }
    if status == 401 || status == 403 {
        return ClearViewError::Auth(message);
    }
    if status == 400 && message.contains("API key not valid") {
        return ClearViewError::Auth(message);
    }
    // A 400 is rejected input, whatever the body says.
    if status == 400 {
        return ClearViewError::Api { status, message };
    }
    let lower = message.to_lowercase();
    if lower.contains("safety") || lower.contains("blocked") || lower.contains("prohibited") {
        return ClearViewError::ContentBlocked(message);
    }
    ClearViewError::Api { status, message }
}

/// Pulls the first inline image out of a successful response.
fn extract_result(response: GeminiResponse) -> Result<EditResult> {
    // Blocks are reported with HTTP 200.
    if let Some(ref feedback) = response.prompt_feedback {
        if let Some(ref reason) = feedback.block_reason {
            let msg = feedback
                .block_reason_message
                .clone()
                .unwrap_or_else(|| format!("Prompt blocked: {}", reason));
            return Err(ClearViewError::ContentBlocked(msg));
        }
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(ClearViewError::NoImageInResponse);
    };

    if let Some(inline_data) = candidate
        .content
        .into_iter()
        .flat_map(|c| c.parts)
        .find_map(|p| p.inline_data)
    {
        return Ok(EditResult::from_base64(&inline_data.data));
    }

    match candidate.finish_reason.as_deref() {
        Some(
            reason @ ("SAFETY"
            | "IMAGE_SAFETY"
            | "IMAGE_PROHIBITED_CONTENT"
            | "IMAGE_RECITATION"
            | "RECITATION"
            | "PROHIBITED_CONTENT"
            | "BLOCKLIST"),
        ) => Err(ClearViewError::ContentBlocked(format!(
            "Content blocked by Gemini safety filter: {reason}"
        ))),
        _ => Err(ClearViewError::NoImageInResponse),
    }
}

#[async_trait]
impl ImageEditor for GeminiEditor {
    async fn edit(&self, request: &EditRequest) -> Result<EditResult> {
        self.edit_impl(request).await
    }

    fn kind(&self) -> EditorKind {
        EditorKind::Gemini
    }

    async fn health_check(&self) -> Result<()> {
        let api_key = self.api_key()?;

        let response = self
            .client
            .get(self.model_url())
            .header("x-goog-api-key", api_key)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let headers = response.headers().clone();
        let text = response.text().await.unwrap_or_default();
        Err(parse_error(status.as_u16(), &text, &headers))
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - either inline image data or text.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

impl GeminiRequest {
    fn from_edit_request(req: &EditRequest) -> Self {
        let parts = vec![
            GeminiRequestPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: req.mime_type.clone(),
                    data: req.image_base64.clone(),
                },
            },
            GeminiRequestPart::Text {
                text: req.instruction.clone(),
            },
        ];

        Self {
            contents: vec![GeminiContent { parts }],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    data: String,
}

/// Google API error body: `{"error": {"code": 400, "message": "...", "status": "..."}}`.
#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

impl GeminiErrorEnvelope {
    fn message_from(text: &str) -> Option<String> {
        serde_json::from_str::<Self>(text)
            .ok()
            .map(|envelope| envelope.error.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn local_editor(base_url: String) -> GeminiEditor {
        GeminiEditor::builder()
            .api_key("secret")
            .base_url(base_url)
            .client(reqwest::Client::builder().no_proxy().build().unwrap())
            .build()
            .unwrap()
    }

    fn parse(json: &str) -> Result<EditResult> {
        extract_result(serde_json::from_str(json).unwrap())
    }

    /// Serves one canned HTTP response and hands back the raw request.
    async fn serve_once(
        status: u16,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let (k, v) = l.split_once(':')?;
                            k.eq_ignore_ascii_case("content-length")
                                .then(|| v.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if buf.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {status} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&buf).into_owned()
        });

        (format!("http://{addr}"), handle)
    }

    #[test]
    fn test_gemini_model_as_str() {
        assert_eq!(GeminiModel::NanoBanana.as_str(), "gemini-2.5-flash-image");
        assert_eq!(
            GeminiModel::NanoBananaPro.as_str(),
            "gemini-3-pro-image-preview"
        );
        assert_eq!(GeminiModel::default(), GeminiModel::NanoBanana);
    }

    #[test]
    fn test_gemini_model_from_str() {
        assert_eq!(
            "nano-banana-pro".parse::<GeminiModel>().unwrap(),
            GeminiModel::NanoBananaPro
        );
        assert_eq!(
            "gemini-2.5-flash-image".parse::<GeminiModel>().unwrap(),
            GeminiModel::NanoBanana
        );
        assert!("dall-e".parse::<GeminiModel>().is_err());
    }

    #[test]
    fn test_builder_with_explicit_key() {
        let editor = GeminiEditorBuilder::new()
            .api_key("test-key")
            .model(GeminiModel::NanoBananaPro)
            .base_url("http://localhost:1234/")
            .build()
            .unwrap();
        assert!(editor.has_api_key());
        assert_eq!(editor.model(), GeminiModel::NanoBananaPro);
        assert_eq!(
            editor.model_url(),
            "http://localhost:1234/v1beta/models/gemini-3-pro-image-preview"
        );
    }

    #[tokio::test]
    async fn test_blank_key_fails_every_call() {
        let editor = GeminiEditorBuilder::new().api_key("  ").build().unwrap();
        assert!(!editor.has_api_key());

        let err = editor
            .edit(&EditRequest::new("AAAA", "image/png", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClearViewError::Auth(ref m) if m.contains("API_KEY")));
        assert!(matches!(
            editor.health_check().await,
            Err(ClearViewError::Auth(_))
        ));
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_MUTEX: std::sync::OnceLock<std::sync::Mutex<()>> = std::sync::OnceLock::new();
        ENV_MUTEX
            .get_or_init(|| std::sync::Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Clears the key variables for the life of the guard, then restores them.
    struct UnsetKeys {
        saved: Vec<(&'static str, Option<String>)>,
    }

    impl UnsetKeys {
        fn new() -> Self {
            let saved = API_KEY_ENV_VARS
                .iter()
                .map(|&var| (var, std::env::var(var).ok()))
                .collect();
            for var in API_KEY_ENV_VARS {
                std::env::remove_var(var);
            }
            Self { saved }
        }
    }

    impl Drop for UnsetKeys {
        fn drop(&mut self) {
            for (var, value) in &self.saved {
                if let Some(value) = value {
                    std::env::set_var(var, value);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_missing_env_key_fails_every_call() {
        let _lock = env_lock();
        let _unset = UnsetKeys::new();

        let editor = GeminiEditorBuilder::new().build().unwrap();
        assert!(!editor.has_api_key());

        let err = editor
            .edit(&EditRequest::new("AAAA", "image/png", "x"))
            .await
            .unwrap_err();
        assert_eq!(err.failure_kind(), crate::error::FailureKind::Configuration);
        assert!(matches!(
            editor.health_check().await,
            Err(ClearViewError::Auth(_))
        ));
    }

    #[test]
    fn test_key_read_from_env() {
        let _lock = env_lock();
        let _unset = UnsetKeys::new();
        std::env::set_var("GOOGLE_API_KEY", "from-env");

        let editor = GeminiEditorBuilder::new().build().unwrap();
        std::env::remove_var("GOOGLE_API_KEY");
        assert!(editor.has_api_key());
    }

    #[test]
    fn test_request_has_image_then_text() {
        let req = EditRequest::new("AAAA", "image/jpeg", "Remove the filter");
        let json = serde_json::to_value(GeminiRequest::from_edit_request(&req)).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "contents": [{
                    "parts": [
                        { "inlineData": { "mimeType": "image/jpeg", "data": "AAAA" } },
                        { "text": "Remove the filter" }
                    ]
                }]
            })
        );
    }

    #[test]
    fn test_extract_first_inline_part() {
        let result = parse(
            r#"{
                "candidates": [{
                    "content": {
                        "parts": [
                            { "text": "Here is your image" },
                            { "inlineData": { "mimeType": "image/jpeg", "data": "AAAA" } },
                            { "inlineData": { "mimeType": "image/png", "data": "BBBB" } }
                        ]
                    },
                    "finishReason": "STOP"
                }]
            }"#,
        )
        .unwrap();
        // Output is always labelled PNG.
        assert_eq!(result.data_uri(), "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_extract_no_image_parts() {
        let err = parse(
            r#"{ "candidates": [{ "content": { "parts": [{ "text": "I can't do that" }] } }] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ClearViewError::NoImageInResponse));

        assert!(matches!(
            parse(r#"{ "candidates": [] }"#),
            Err(ClearViewError::NoImageInResponse)
        ));
        assert!(matches!(
            parse(r#"{ "candidates": [{ "finishReason": "STOP" }] }"#),
            Err(ClearViewError::NoImageInResponse)
        ));
    }

    #[test]
    fn test_extract_only_first_candidate() {
        let err = parse(
            r#"{
                "candidates": [
                    { "content": { "parts": [{ "text": "no" }] } },
                    { "content": { "parts": [{ "inlineData": { "mimeType": "image/png", "data": "AAAA" } }] } }
                ]
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ClearViewError::NoImageInResponse));
    }

    #[test]
    fn test_extract_prompt_feedback_block() {
        let err = parse(
            r#"{
                "candidates": [],
                "promptFeedback": {
                    "blockReason": "SAFETY",
                    "blockReasonMessage": "Prompt was blocked due to safety"
                }
            }"#,
        )
        .unwrap_err();
        assert!(
            matches!(err, ClearViewError::ContentBlocked(ref m) if m == "Prompt was blocked due to safety")
        );
    }

    #[test]
    fn test_extract_safety_finish_reason() {
        let err = parse(r#"{ "candidates": [{ "finishReason": "IMAGE_SAFETY" }] }"#).unwrap_err();
        assert!(matches!(err, ClearViewError::ContentBlocked(ref m) if m.contains("IMAGE_SAFETY")));
    }

    #[test]
    fn test_parse_error_mapping() {
        let headers = reqwest::header::HeaderMap::new();
        let body = r#"{"error":{"code":400,"message":"Unable to process input image.","status":"INVALID_ARGUMENT"}}"#;
        assert!(matches!(
            parse_error(400, body, &headers),
            ClearViewError::Api { status: 400, ref message } if message == "Unable to process input image."
        ));

        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        assert!(matches!(
            parse_error(400, body, &headers),
            ClearViewError::Auth(_)
        ));

        assert!(matches!(
            parse_error(403, "forbidden", &headers),
            ClearViewError::Auth(_)
        ));
        assert!(matches!(
            parse_error(404, "", &headers),
            ClearViewError::Api { status: 404, .. }
        ));
        assert!(matches!(
            parse_error(500, "<html>oops</html>", &headers),
            ClearViewError::Api { status: 500, .. }
        ));
    }

    #[test]
    fn test_parse_error_400_is_unsupported_even_when_blocked() {
        let headers = reqwest::header::HeaderMap::new();
        let body = r#"{"error":{"code":400,"message":"Request blocked: input image not supported","status":"INVALID_ARGUMENT"}}"#;
        let err = parse_error(400, body, &headers);
        assert!(matches!(err, ClearViewError::Api { status: 400, .. }));
        assert_eq!(
            err.failure_kind(),
            crate::error::FailureKind::UnsupportedInput
        );

        assert!(matches!(
            parse_error(500, "Response blocked by safety filter", &headers),
            ClearViewError::ContentBlocked(_)
        ));
    }

    #[test]
    fn test_parse_error_rate_limited() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, "12".parse().unwrap());
        assert!(matches!(
            parse_error(429, "quota", &headers),
            ClearViewError::RateLimited { retry_after: Some(d) } if d.as_secs() == 12
        ));
    }

    #[tokio::test]
    async fn test_edit_round_trip_over_http() {
        let (base_url, server) = serve_once(
            200,
            r#"{"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"image/png","data":"AAAA"}}]},"finishReason":"STOP"}]}"#,
        )
        .await;

        let editor = local_editor(base_url);
        let result = editor
            .edit(&EditRequest::new("/9j/4A==", "image/jpeg", "Remove the glow"))
            .await
            .unwrap();
        assert_eq!(result.data_uri(), "data:image/png;base64,AAAA");

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /v1beta/models/gemini-2.5-flash-image:generateContent"));
        assert!(raw.to_lowercase().contains("x-goog-api-key: secret"));
        assert!(raw.contains(r#""inlineData":{"mimeType":"image/jpeg","data":"/9j/4A=="}"#));
        assert!(raw.contains(r#""text":"Remove the glow""#));
    }

    #[tokio::test]
    async fn test_edit_http_400_surfaces_status() {
        let (base_url, _server) = serve_once(
            400,
            r#"{"error":{"code":400,"message":"Image too complex","status":"INVALID_ARGUMENT"}}"#,
        )
        .await;

        let editor = local_editor(base_url);
        let err = editor
            .edit(&EditRequest::new("AAAA", "image/png", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClearViewError::Api { status: 400, .. }));
        assert_eq!(err.failure_kind(), crate::error::FailureKind::UnsupportedInput);
    }

    #[tokio::test]
    async fn test_health_check_maps_errors_like_edit() {
        let (base_url, server) = serve_once(
            404,
            r#"{"error":{"code":404,"message":"models/x is not found","status":"NOT_FOUND"}}"#,
        )
        .await;

        let err = local_editor(base_url).health_check().await.unwrap_err();
        assert!(matches!(err, ClearViewError::Api { status: 404, .. }));

        let raw = server.await.unwrap();
        assert!(raw.starts_with("GET /v1beta/models/gemini-2.5-flash-image "));
    }

    #[tokio::test]
    async fn test_health_check_ok() {
        let (base_url, _server) = serve_once(200, r#"{"name":"models/gemini-2.5-flash-image"}"#).await;
        assert!(local_editor(base_url).health_check().await.is_ok());
    }
}
