//! Gemini (Google) scene provider.

use crate::error::{sanitize_error_message, Result, SceneCraftError};
use crate::image::data_url::DataUrl;
use crate::image::provider::SceneProvider;
use crate::image::types::ProviderKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variables consulted for the API key, in order.
const API_KEY_ENV_VARS: [&str; 2] = ["GOOGLE_API_KEY", "API_KEY"];

/// Instruction sent after the two images.
///
/// The first image is the spatial and stylistic anchor.
pub const SCENE_INSTRUCTION: &str = "Create a new image that places the character from the \
first image in a natural interaction with the product from the second image. The character \
should be holding, using, or otherwise engaging with the product. Keep the exact aspect ratio \
and the art style of the first image, and render the product so it blends into that style.";

/// Gemini image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Gemini 2.5 Flash Image, preview channel.
    #[default]
    FlashImagePreview,
    /// Gemini 2.5 Flash Image, stable channel.
    FlashImage,
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FlashImagePreview => "gemini-2.5-flash-image-preview",
            Self::FlashImage => "gemini-2.5-flash-image",
        }
    }
}

/// Builder for GeminiProvider.
#[derive(Debug, Clone, Default)]
pub struct GeminiProviderBuilder {
    api_key: Option<String>,
    model: GeminiModel,
    base_url: Option<String>,
}

impl GeminiProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GOOGLE_API_KEY`, then `API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the Gemini model variant.
    pub fn model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    /// Overrides the API base URL (defaults to the public v1beta endpoint).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<GeminiProvider> {
        let api_key = resolve_api_key(self.api_key, |name| std::env::var(name).ok())?;
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(GeminiProvider {
            client: reqwest::Client::new(),
            api_key,
            model: self.model,
            base_url,
        })
    }
}

fn resolve_api_key(
    explicit: Option<String>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String> {
    explicit
        .into_iter()
        .chain(API_KEY_ENV_VARS.iter().filter_map(|name| lookup(name)))
        .find(|key| !key.trim().is_empty())
        .ok_or_else(|| {
            SceneCraftError::MissingCredential(format!(
                "{} not set and no API key provided",
                API_KEY_ENV_VARS.join(" / ")
            ))
        })
}

/// Gemini scene provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: GeminiModel,
    base_url: String,
}

impl GeminiProvider {
    /// Creates a new `GeminiProviderBuilder`.
    pub fn builder() -> GeminiProviderBuilder {
        GeminiProviderBuilder::new()
    }

    /// Returns the model this provider calls.
    pub fn model(&self) -> GeminiModel {
        self.model
    }

    async fn generate_impl(
        &self,
        character_image: &str,
        product_image: &str,
    ) -> Result<Option<String>> {
        // Both inputs are validated before anything goes over the wire.
        let character = DataUrl::parse(character_image)?;
        let product = DataUrl::parse(product_image)?;

        let start = Instant::now();
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url,
            self.model.as_str(),
        );
        let body = GeminiRequest::compose(character, product);

        tracing::debug!(model = self.model.as_str(), "sending scene composition request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let scene = gemini_response.into_scene()?;

        tracing::debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            produced_image = scene.is_some(),
            "scene composition complete"
        );

        Ok(scene)
    }
}

fn parse_error(status: u16, text: &str) -> SceneCraftError {
    let text = sanitize_error_message(text);
    match status {
        401 | 403 => SceneCraftError::Auth(text),
        404 => SceneCraftError::InvalidRequest(
            "Model not found. Verify the model name is correct.".into(),
        ),
        _ => SceneCraftError::Api {
            status,
            message: text,
        },
    }
}

#[async_trait]
impl SceneProvider for GeminiProvider {
    async fn generate(
        &self,
        character_image: &str,
        product_image: &str,
    ) -> Result<Option<String>> {
        self.generate_impl(character_image, product_image).await
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/models/{}", self.base_url, self.model.as_str());

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;

        match response.status().as_u16() {
            401 | 403 => Err(SceneCraftError::Auth("Invalid API key".into())),
            404 => Err(SceneCraftError::InvalidRequest(
                "Model not found. Verify the model name is correct.".into(),
            )),
            s if !(200..300).contains(&s) => Err(SceneCraftError::Api {
                status: s,
                message: "Health check failed".into(),
            }),
            _ => Ok(()),
        }
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - can be text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

impl From<DataUrl> for GeminiRequestPart {
    fn from(url: DataUrl) -> Self {
        let (mime_type, data) = url.into_parts();
        Self::InlineData {
            inline_data: GeminiInlineData { mime_type, data },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
}

impl GeminiRequest {
    /// Character first, product second, instruction last.
    fn compose(character: DataUrl, product: DataUrl) -> Self {
        let parts = vec![
            character.into(),
            product.into(),
            GeminiRequestPart::Text {
                text: SCENE_INSTRUCTION.to_string(),
            },
        ];

        Self {
            contents: vec![GeminiContent { parts }],
            generation_config: GeminiConfig {
                response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
            },
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
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    data: String,
}

impl GeminiResponse {
    fn parts(&self) -> &[GeminiPartResponse] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or_default()
    }

    /// Concatenated text parts of the first candidate.
    fn text(&self) -> String {
        self.parts()
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect()
    }

    fn log_diagnostics(&self) {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            tracing::warn!(block_reason = reason, "prompt blocked by Gemini");
        }
        if let Some(reason) = self
            .candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .filter(|r| *r != "STOP")
        {
            tracing::warn!(finish_reason = reason, "unusual finish reason");
        }
    }

    /// First inline image wins; otherwise text is a refusal; otherwise nothing.
    fn into_scene(self) -> Result<Option<String>> {
        if let Some(inline) = self.parts().iter().find_map(|p| p.inline_data.as_ref()) {
            if let Some(mime) = inline.mime_type.as_deref() {
                tracing::debug!(mime_type = mime, "found inline image part");
            }
            return Ok(Some(inline.data.clone()));
        }

        self.log_diagnostics();

        let text = self.text();
        let text = text.trim();
        if !text.is_empty() {
            return Err(SceneCraftError::Refusal(text.to_string()));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Nothing listens here, so any request fails at the transport.
    const UNREACHABLE: &str = "http://127.0.0.1:9";

    fn png_url() -> String {
        DataUrl::encode("image/png", &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A])
            .unwrap()
            .to_string()
    }

    fn jpeg_url() -> String {
        DataUrl::encode("image/jpeg", &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10])
            .unwrap()
            .to_string()
    }

    fn offline_provider() -> GeminiProvider {
        GeminiProvider::builder()
            .api_key("test-key")
            .base_url(UNREACHABLE)
            .build()
            .unwrap()
    }

    fn scene_from(json: &str) -> Result<Option<String>> {
        serde_json::from_str::<GeminiResponse>(json).unwrap().into_scene()
    }

    #[test]
    fn test_gemini_model_as_str() {
        assert_eq!(GeminiModel::FlashImage.as_str(), "gemini-2.5-flash-image");
        assert_eq!(
            GeminiModel::default().as_str(),
            "gemini-2.5-flash-image-preview"
        );
    }

    #[test]
    fn test_builder_with_explicit_key() {
        let provider = GeminiProviderBuilder::new()
            .api_key("test-key")
            .model(GeminiModel::FlashImage)
            .build()
            .unwrap();
        assert_eq!(provider.model(), GeminiModel::FlashImage);
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_builder_trims_base_url() {
        let provider = GeminiProvider::builder()
            .api_key("k")
            .base_url("http://localhost:8080/v1beta/")
            .build()
            .unwrap();
        assert_eq!(provider.base_url, "http://localhost:8080/v1beta");
    }

    #[test]
    fn test_resolve_api_key_prefers_explicit() {
        let key = resolve_api_key(Some("explicit".into()), |_| Some("env".into())).unwrap();
        assert_eq!(key, "explicit");
    }

    #[test]
    fn test_resolve_api_key_env_order() {
        let key = resolve_api_key(None, |name| match name {
            "API_KEY" => Some("fallback".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(key, "fallback");

        let key = resolve_api_key(None, |name| Some(format!("{name}-value"))).unwrap();
        assert_eq!(key, "GOOGLE_API_KEY-value");
    }

    #[test]
    fn test_resolve_api_key_missing() {
        let err = resolve_api_key(None, |_| None).unwrap_err();
        assert!(matches!(err, SceneCraftError::MissingCredential(_)));

        let err = resolve_api_key(Some("  ".into()), |_| Some(String::new())).unwrap_err();
        assert!(matches!(err, SceneCraftError::MissingCredential(_)));
    }

    /// PNG signature plus an IHDR chunk declaring the given size.
    fn png_with_size(width: u32, height: u32) -> Vec<u8> {
        let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
        png.extend_from_slice(&13u32.to_be_bytes());
        png.extend_from_slice(b"IHDR");
        png.extend_from_slice(&width.to_be_bytes());
        png.extend_from_slice(&height.to_be_bytes());
        // 8-bit RGBA, default compression/filter/interlace, CRC left zeroed
        png.extend_from_slice(&[8, 6, 0, 0, 0, 0, 0, 0, 0]);
        png
    }

    /// JPEG start-of-image plus a baseline SOF0 segment declaring the given size.
    fn jpeg_with_size(width: u16, height: u16) -> Vec<u8> {
        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xC0, 0x00, 0x11, 0x08];
        jpeg.extend_from_slice(&height.to_be_bytes());
        jpeg.extend_from_slice(&width.to_be_bytes());
        jpeg.extend_from_slice(&[3, 1, 0x22, 0, 2, 0x11, 1, 3, 0x11, 1]);
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        jpeg
    }

    #[test]
    fn test_square_png_character_and_jpeg_product_keep_order() {
        let character_bytes = png_with_size(512, 512);
        let product_bytes = jpeg_with_size(300, 300);
        let character = DataUrl::encode("image/png", &character_bytes).unwrap();
        let product = DataUrl::encode("image/jpeg", &product_bytes).unwrap();

        let req = GeminiRequest::compose(character.clone(), product.clone());
        let json = serde_json::to_value(&req).unwrap();
        let parts = json["contents"][0]["parts"].as_array().unwrap();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[0]["inlineData"]["data"], character.data());
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[1]["inlineData"]["data"], product.data());
        assert_eq!(parts[2]["text"], SCENE_INSTRUCTION);

        // The anchor image is the 512x512 one.
        let sent = DataUrl::parse(&format!(
            "data:image/png;base64,{}",
            parts[0]["inlineData"]["data"].as_str().unwrap()
        ))
        .unwrap()
        .decode()
        .unwrap();
        assert_eq!(sent, character_bytes);
        assert_eq!(&sent[16..20], &512u32.to_be_bytes());
        assert_eq!(&sent[20..24], &512u32.to_be_bytes());
    }

    #[test]
    fn test_request_modalities() {
        let req = GeminiRequest::compose(
            DataUrl::parse(&png_url()).unwrap(),
            DataUrl::parse(&jpeg_url()).unwrap(),
        );
        let json = serde_json::to_value(&req).unwrap();

        assert!(json.get("generation_config").is_none());
        assert_eq!(
            json["generationConfig"]["responseModalities"],
            serde_json::json!(["IMAGE", "TEXT"])
        );
    }

    #[test]
    fn test_first_inline_image_wins() {
        let scene = scene_from(
            r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "Here is your scene."},
                        {"inlineData": {"mimeType": "image/png", "data": "FIRST"}},
                        {"inlineData": {"mimeType": "image/png", "data": "SECOND"}}
                    ]
                },
                "finishReason": "STOP"
            }]
        }"#,
        )
        .unwrap();
        assert_eq!(scene.as_deref(), Some("FIRST"));
    }

    #[test]
    fn test_text_only_is_refusal() {
        let err = scene_from(
            r#"{
            "candidates": [{
                "content": {"parts": [{"text": "  Cannot comply \n"}]}
            }]
        }"#,
        )
        .unwrap_err();
        assert!(matches!(err, SceneCraftError::Refusal(_)));
        assert!(err.to_string().contains("Cannot comply"));
    }

    #[test]
    fn test_refusal_joins_text_parts() {
        let err = scene_from(
            r#"{
            "candidates": [{
                "content": {"parts": [{"text": "I can't "}, {"text": "do that."}]}
            }]
        }"#,
        )
        .unwrap_err();
        match err {
            SceneCraftError::Refusal(text) => assert_eq!(text, "I can't do that."),
            other => panic!("expected refusal, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_response_is_none() {
        assert_eq!(scene_from(r#"{"candidates": []}"#).unwrap(), None);
        assert_eq!(scene_from("{}").unwrap(), None);
        assert_eq!(
            scene_from(r#"{"candidates": [{"content": {"parts": [{"text": "   "}]}}]}"#).unwrap(),
            None
        );
    }

    #[test]
    fn test_blocked_prompt_without_text_is_none() {
        let scene = scene_from(
            r#"{
            "candidates": [],
            "promptFeedback": {"blockReason": "SAFETY"}
        }"#,
        )
        .unwrap();
        assert_eq!(scene, None);
    }

    #[test]
    fn test_parse_error_mapping() {
        assert!(matches!(parse_error(401, "denied"), SceneCraftError::Auth(_)));
        assert!(matches!(parse_error(403, "denied"), SceneCraftError::Auth(_)));
        assert!(matches!(
            parse_error(404, ""),
            SceneCraftError::InvalidRequest(_)
        ));
        match parse_error(500, "{\n \"error\": \"boom\"\n}") {
            SceneCraftError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "{ \"error\": \"boom\" }");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_character_fails_before_network() {
        let err = offline_provider()
            .generate("data:image/pngbase64", &jpeg_url())
            .await
            .unwrap_err();
        assert!(matches!(err, SceneCraftError::MalformedInput(_)));
    }

    #[tokio::test]
    async fn test_malformed_product_fails_before_network() {
        let err = offline_provider()
            .generate(&png_url(), "data:;base64,AAAA")
            .await
            .unwrap_err();
        assert!(matches!(err, SceneCraftError::MalformedInput(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_is_network_error() {
        let err = offline_provider()
            .generate(&png_url(), &jpeg_url())
            .await
            .unwrap_err();
        assert!(matches!(err, SceneCraftError::Network(_)));
        assert!(err.to_string().starts_with("network error"));
    }
}
