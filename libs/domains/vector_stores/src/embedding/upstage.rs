use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use core_config::{env_or_default, env_required};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::EmbeddingProvider;
use crate::error::{StoreResult, VectorStoreError};

const DEFAULT_DP_URL: &str = "https://api.upstage.ai/v1/document-digitization";
const DEFAULT_EMBED_URL: &str = "https://api.upstage.ai/v1/solar/embeddings";
const DEFAULT_PASSAGE_MODEL: &str = "solar-embedding-1-large-passage";
const DEFAULT_QUERY_MODEL: &str = "solar-embedding-1-large-query";
const DEFAULT_DIMENSION: u32 = 4096;

/// Upstage provider configuration
#[derive(Debug, Clone)]
pub struct UpstageConfig {
    pub api_key: String,
    pub digitize_url: String,
    pub embed_url: String,
    pub passage_model: String,
    pub query_model: String,
    pub dimension: u32,
    pub timeout_secs: u64,
}

impl UpstageConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            digitize_url: DEFAULT_DP_URL.to_string(),
            embed_url: DEFAULT_EMBED_URL.to_string(),
            passage_model: DEFAULT_PASSAGE_MODEL.to_string(),
            query_model: DEFAULT_QUERY_MODEL.to_string(),
            dimension: DEFAULT_DIMENSION,
            timeout_secs: 300,
        }
    }

    pub fn from_env() -> StoreResult<Self> {
        let api_key = env_required("UPSTAGE_API_KEY")
            .map_err(|e| VectorStoreError::Config(e.to_string()))?;

        let dimension = std::env::var("UPSTAGE_EMBED_DIMENSION")
            .ok()
            .map(|s| {
                s.parse().map_err(|_| {
                    VectorStoreError::Config(format!("Invalid UPSTAGE_EMBED_DIMENSION: {}", s))
                })
            })
            .transpose()?
            .unwrap_or(DEFAULT_DIMENSION);

        let timeout_secs = std::env::var("UPSTAGE_TIMEOUT_SECS")
            .ok()
            .map(|s| {
                s.parse().map_err(|_| {
                    VectorStoreError::Config(format!("Invalid UPSTAGE_TIMEOUT_SECS: {}", s))
                })
            })
            .transpose()?
            .unwrap_or(300);

        Ok(Self {
            api_key,
            digitize_url: env_or_default("UPSTAGE_DP_URL", DEFAULT_DP_URL),
            embed_url: env_or_default("UPSTAGE_EMBED_URL", DEFAULT_EMBED_URL),
            passage_model: env_or_default("UPSTAGE_EMBED_MODEL_PASSAGE", DEFAULT_PASSAGE_MODEL),
            query_model: env_or_default("UPSTAGE_EMBED_MODEL_QUERY", DEFAULT_QUERY_MODEL),
            dimension,
            timeout_secs,
        })
    }
}

/// Upstage document-digitization + Solar embeddings provider
pub struct UpstageProvider {
    client: Client,
    config: UpstageConfig,
}

impl UpstageProvider {
    pub fn new(config: UpstageConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VectorStoreError::Config(format!("Failed to build client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn from_env() -> StoreResult<Self> {
        Self::new(UpstageConfig::from_env()?)
    }

    async fn embed_with_model(
        &self,
        model: &str,
        texts: &[String],
    ) -> StoreResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let request = EmbeddingRequest {
            model: model.to_string(),
            input: texts.to_vec(),
        };

        let response = self
            .client
            .post(&self.config.embed_url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| VectorStoreError::Embedding(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(VectorStoreError::Embedding(format!(
                "Upstage API error ({}): {}",
                status, error_text
            )));
        }

        let embedding_response: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| VectorStoreError::Embedding(format!("malformed response: {}", e)))?;

        if embedding_response.data.len() != texts.len() {
            return Err(VectorStoreError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embedding_response.data.len()
            )));
        }

        // Sort by index to maintain input order
        let mut data = embedding_response.data;
        data.sort_by_key(|d| d.index);

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct DigitizeResponse {
    #[serde(default)]
    elements: Option<Vec<DigitizedElement>>,
    #[serde(default)]
    content: Option<DigitizedContent>,
}

#[derive(Debug, Deserialize)]
struct DigitizedElement {
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default)]
    content: Option<ElementContent>,
}

fn default_page() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct ElementContent {
    #[serde(default)]
    html: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DigitizedContent {
    #[serde(default)]
    html: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// Classify a failed digitization response. Only statuses saying the
/// document itself was rejected count as a parse failure; auth and
/// rate-limit rejections are provider failures like any 5xx.
fn digitize_failure(status: StatusCode, detail: &str) -> VectorStoreError {
    match status {
        StatusCode::BAD_REQUEST
        | StatusCode::UNSUPPORTED_MEDIA_TYPE
        | StatusCode::UNPROCESSABLE_ENTITY => VectorStoreError::Parse(format!(
            "digitization rejected the file ({}): {}",
            status, detail
        )),
        _ => VectorStoreError::Upstream(format!("digitization failed ({}): {}", status, detail)),
    }
}

/// Assemble ordered page texts from a digitization response.
///
/// Elements are grouped by their page number and joined in page order.
/// When the provider returns no elements the top-level content block is
/// used as a single page.
fn pages_from_response(response: DigitizeResponse) -> Vec<String> {
    if let Some(elements) = response.elements.filter(|e| !e.is_empty()) {
        let mut pages_map: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        for element in elements {
            let html = element.content.and_then(|c| c.html).unwrap_or_default();
            if !html.is_empty() {
                pages_map.entry(element.page).or_default().push(html);
            }
        }
        return pages_map.into_values().map(|parts| parts.join("\n")).collect();
    }

    let single = response
        .content
        .and_then(|c| c.html.filter(|h| !h.is_empty()).or(c.text))
        .unwrap_or_default();

    if single.is_empty() {
        vec![]
    } else {
        vec![single]
    }
}

#[async_trait]
impl EmbeddingProvider for UpstageProvider {
    fn dimension(&self) -> u32 {
        self.config.dimension
    }

    async fn embed_query(&self, text: &str) -> StoreResult<Vec<f32>> {
        let results = self
            .embed_with_model(&self.config.query_model, &[text.to_string()])
            .await?;

        results
            .into_iter()
            .next()
            .ok_or_else(|| VectorStoreError::Embedding("No embedding returned".to_string()))
    }

    async fn embed_passages(&self, texts: &[String]) -> StoreResult<Vec<Vec<f32>>> {
        self.embed_with_model(&self.config.passage_model, texts)
            .await
    }

    async fn digitize(&self, file_bytes: Vec<u8>, filename: &str) -> StoreResult<Vec<String>> {
        let form = Form::new()
            .part(
                "document",
                Part::bytes(file_bytes).file_name(filename.to_string()),
            )
            .text("ocr", "force")
            .text("model", "document-parse");

        let response = self
            .client
            .post(&self.config.digitize_url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| VectorStoreError::Upstream(format!("digitization request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(digitize_failure(status, &error_text));
        }

        let digitize_response: DigitizeResponse = response
            .json()
            .await
            .map_err(|e| VectorStoreError::Upstream(format!("malformed response: {}", e)))?;

        let pages = pages_from_response(digitize_response);
        if pages.is_empty() {
            return Err(VectorStoreError::Parse(
                "no pages extracted from document".to_string(),
            ));
        }

        Ok(pages)
    }
}
