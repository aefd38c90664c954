// Embedding client
//
// OpenAI-compatible embeddings endpoint. Transport and status failures are
// typed provider errors (the retry executor may try again); a well-formed
// response that simply carries no vector comes back as `Ok(None)`, which the
// coordinator records as a per-item failure without touching the batch.

use crate::error::{EnrichError, EnrichResult, ProviderError};
use crate::providers::{status_error, transport_error, EmbeddingProvider};
use crate::types::EmbeddingKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SERVICE: &str = "embeddings";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    #[serde(default)]
    embedding: Vec<f32>,
}

pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpEmbeddingProvider {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> EnrichResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EnrichError::Config(format!("embedding client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(
        &self,
        kind: EmbeddingKind,
        text: &str,
    ) -> Result<Option<Vec<f32>>, ProviderError> {
        if text.trim().is_empty() {
            tracing::warn!(kind = kind.as_str(), "Refusing to embed empty text");
            return Ok(None);
        }

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(SERVICE, status));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("{}: {}", SERVICE, e)))?;

        let vector = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|v| !v.is_empty());

        if vector.is_none() {
            tracing::warn!(kind = kind.as_str(), "Embedding response carried no vector");
        }
        Ok(vector)
    }
}
