// src/genai.rs
use std::num::NonZeroU32;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::Client;
use serde::Deserialize;

use crate::types::SourceRef;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, thiserror::Error)]
pub enum GenAiError {
    #[error("generate call failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("generate call returned no candidates")]
    EmptyResponse,
}

/// Inline image payload for a multimodal call.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// One text/multimodal completion request. `grounded` enables the provider's
/// web-search tool, which is what attaches citation metadata to the response.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub text: String,
    pub image: Option<InlineImage>,
    pub system_instruction: Option<String>,
    pub grounded: bool,
    pub max_output_tokens: Option<u32>,
}

impl GenerateRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        GenerateRequest { text: prompt.into(), ..Default::default() }
    }

    pub fn with_image(mut self, image: InlineImage) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_system(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn grounded(mut self) -> Self {
        self.grounded = true;
        self
    }

    pub fn with_max_tokens(mut self, cap: u32) -> Self {
        self.max_output_tokens = Some(cap);
        self
    }
}

/// A completed generation: the concatenated text parts plus any web
/// citations the grounding tool attached.
#[derive(Debug, Clone)]
pub struct Generated {
    pub text: String,
    pub citations: Vec<SourceRef>,
}

#[async_trait::async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, req: GenerateRequest) -> Result<Generated, GenAiError>;
}

#[derive(Debug, Deserialize, Default)]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    #[serde(default)]
    content: WireContent,
    #[serde(default)]
    grounding_metadata: Option<WireGroundingMetadata>,
}

#[derive(Debug, Deserialize, Default)]
struct WireContent {
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Deserialize, Default)]
struct WirePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireGroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<WireChunk>,
}

#[derive(Debug, Deserialize)]
struct WireChunk {
    #[serde(default)]
    web: Option<WireWeb>,
}

#[derive(Debug, Deserialize)]
struct WireWeb {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

impl WireCandidate {
    fn into_generated(self) -> Generated {
        let text = self
            .content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect::<String>();
        // Chunks without a web entry or a usable uri are skipped, not errors.
        let citations = self
            .grounding_metadata
            .map(|m| m.grounding_chunks)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|c| c.web)
            .filter_map(|w| w.uri.map(|uri| SourceRef { uri, title: w.title }))
            .collect();
        Generated { text, citations }
    }
}

/// Production client for the `generateContent` REST endpoint, with a
/// per-call timeout and a QPS cap shared across all stages.
pub struct GenAiClient {
    http: Client,
    key: String,
    model: String,
    base_url: String,
    limiter: DefaultDirectRateLimiter,
}

impl GenAiClient {
    pub fn new(key: String, model: String, qps: u32, timeout_ms: u64) -> Result<Self, GenAiError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;
        let qps = NonZeroU32::new(qps).unwrap_or(nonzero!(1u32));
        Ok(GenAiClient {
            http,
            key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
            limiter: RateLimiter::direct(Quota::per_second(qps)),
        })
    }

    fn request_body(req: &GenerateRequest) -> serde_json::Value {
        let mut parts = vec![serde_json::json!({ "text": req.text })];
        if let Some(img) = &req.image {
            parts.push(serde_json::json!({
                "inlineData": { "mimeType": img.mime_type, "data": B64.encode(&img.data) }
            }));
        }
        let mut body = serde_json::json!({ "contents": [{ "parts": parts }] });
        if let Some(sys) = &req.system_instruction {
            body["systemInstruction"] = serde_json::json!({ "parts": [{ "text": sys }] });
        }
        if req.grounded {
            body["tools"] = serde_json::json!([{ "googleSearch": {} }]);
        }
        if let Some(cap) = req.max_output_tokens {
            body["generationConfig"] = serde_json::json!({ "maxOutputTokens": cap });
        }
        body
    }
}

#[async_trait::async_trait]
impl Generator for GenAiClient {
    async fn generate(&self, req: GenerateRequest) -> Result<Generated, GenAiError> {
        self.limiter.until_ready().await;
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.key)
            .json(&Self::request_body(&req))
            .send()
            .await?
            .error_for_status()?
            .json::<WireResponse>()
            .await?;
        let cand = resp
            .candidates
            .into_iter()
            .next()
            .ok_or(GenAiError::EmptyResponse)?;
        Ok(cand.into_generated())
    }
}
