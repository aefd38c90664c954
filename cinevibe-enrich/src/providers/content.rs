// Long-form content source client (tier 1)
//
// Talks to a catalog content service exposing a title lookup endpoint that
// returns long-form descriptive text (editorial summary and/or full plot
// description) as JSON. Absence of an article is a normal outcome and comes
// back as an empty document.

use crate::error::{EnrichError, EnrichResult, ProviderError};
use crate::providers::{status_error, transport_error, ContentDocument, ContentProvider};
use crate::types::ItemKind;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const SERVICE: &str = "content";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = concat!("cinevibe-enrich/", env!("CARGO_PKG_VERSION"));

/// Wire shape of one lookup response
#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    plot: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

pub struct HttpContentProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpContentProvider {
    pub fn new(base_url: &str, api_key: Option<&str>) -> EnrichResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EnrichError::Config(format!("content client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(str::to_string),
        })
    }
}

#[async_trait]
impl ContentProvider for HttpContentProvider {
    async fn fetch(
        &self,
        title: &str,
        year: Option<i32>,
        kind: ItemKind,
    ) -> Result<ContentDocument, ProviderError> {
        let url = format!("{}/lookup", self.base_url);
        let mut request = self
            .client
            .get(&url)
            .query(&[("title", title), ("kind", kind.as_str())]);
        if let Some(year) = year {
            request = request.query(&[("year", year.to_string())]);
        }
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        tracing::debug!(title, year, kind = kind.as_str(), "Content lookup");

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            // No article for this title: empty document, not an error
            tracing::debug!(title, "No content article found");
            return Ok(ContentDocument::default());
        }
        if !status.is_success() {
            return Err(status_error(SERVICE, status));
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("{}: {}", SERVICE, e)))?;

        Ok(ContentDocument {
            summary: body.summary,
            plot: body.plot,
            canonical_title: body.title,
            source_url: body.url,
        })
    }
}
