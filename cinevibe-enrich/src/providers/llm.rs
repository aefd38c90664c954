// LLM extraction client (tiers 1–3)
//
// One client, two prompts against an OpenAI-compatible chat completions
// endpoint. The free-text prompt distils sourced text or an overview into the
// metadata bundle; the inference prompt works from categorical facts alone
// and is explicitly instructed to compose compound descriptors instead of
// echoing bare genre labels.
//
// The model is asked for a single JSON object; anything that does not parse
// into the expected payload is a Parse error, which the retry executor treats
// as non-retryable.

use crate::error::{EnrichError, EnrichResult, ProviderError};
use crate::providers::{status_error, transport_error, FreeTextExtractor, StructuredInferenceExtractor};
use crate::types::{EnrichedMetadata, ItemFacts, NarrativeSlots};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

const SERVICE: &str = "llm";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Cap on text sent to the extraction prompt; sources occasionally return
/// whole multi-page articles
const MAX_PROMPT_CHARS: usize = 8_000;

const SYSTEM_PROMPT: &str = "You are a film and television metadata analyst. \
Respond with a single JSON object and nothing else.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// JSON object the prompts ask the model to produce
#[derive(Debug, Default, Deserialize)]
struct MetadataPayload {
    #[serde(default)]
    setting_place: Option<String>,
    #[serde(default)]
    setting_time: Option<String>,
    #[serde(default)]
    protagonist: Option<String>,
    #[serde(default)]
    goal: Option<String>,
    #[serde(default)]
    obstacle: Option<String>,
    #[serde(default)]
    stakes: Option<String>,
    #[serde(default)]
    themes: Vec<String>,
    #[serde(default)]
    vibes: Vec<String>,
    #[serde(default)]
    tone: String,
    #[serde(default)]
    pacing: String,
    #[serde(default)]
    profile: Option<String>,
}

impl From<MetadataPayload> for EnrichedMetadata {
    fn from(p: MetadataPayload) -> Self {
        EnrichedMetadata {
            slots: NarrativeSlots {
                setting_place: p.setting_place,
                setting_time: p.setting_time,
                protagonist: p.protagonist,
                goal: p.goal,
                obstacle: p.obstacle,
                stakes: p.stakes,
            },
            themes: p.themes,
            vibes: p.vibes,
            tone: p.tone,
            pacing: p.pacing,
            profile: p.profile,
            source_url: None,
        }
    }
}

pub struct LlmExtractor {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl LlmExtractor {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> EnrichResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EnrichError::Config(format!("llm client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    async fn complete(&self, user_prompt: String) -> Result<EnrichedMetadata, ProviderError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: 0.3,
            response_format: json!({"type": "json_object"}),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(SERVICE, status));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("{}: {}", SERVICE, e)))?;

        let content = body
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| ProviderError::Parse(format!("{}: empty choices", SERVICE)))?;

        parse_payload(content).map(EnrichedMetadata::from)
    }

    fn facts_block(facts: &ItemFacts) -> String {
        let year = facts
            .release_year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        format!(
            "Title: {}\nKind: {}\nYear: {}\nGenres: {}\nKeywords: {}\nCast: {}",
            facts.title,
            facts.kind.as_str(),
            year,
            facts.genres.join(", "),
            facts.keywords.join(", "),
            facts.cast_names.join(", "),
        )
    }

    fn extraction_prompt(text: &str, facts: &ItemFacts) -> String {
        let text = truncate_chars(text, MAX_PROMPT_CHARS);
        format!(
            "Analyze the following description of a {kind} and extract structured \
metadata.\n\n{facts}\n\nDescription:\n{text}\n\nReturn a JSON object with these keys: \
setting_place, setting_time, protagonist, goal, obstacle, stakes (each a short phrase \
or null if the text does not support it); themes (array of thematic phrases); vibes \
(array of at least 3 evocative atmosphere descriptors, never bare genre labels); tone \
(one or two words); pacing (one or two words); profile (a single-sentence logline).",
            kind = facts.kind.as_str(),
            facts = Self::facts_block(facts),
            text = text,
        )
    }

    fn inference_prompt(facts: &ItemFacts) -> String {
        format!(
            "No plot description is available for this {kind}. Infer its likely \
character from the categorical facts below.\n\n{facts}\n\nOverview (may be empty): \
{overview}\n\nReturn a JSON object with these keys: setting_place, setting_time, \
protagonist, goal, obstacle, stakes (each a short phrase, or null unless you can \
reasonably infer it); themes (array); vibes (array of at least 3 descriptors; \
combine the facts into compound descriptors such as \"dark comedy\" or \"slow-burn \
frontier revenge\", never a bare genre name); tone (one or two words); pacing (one or \
two words); profile (a single cautious sentence, or null).",
            kind = facts.kind.as_str(),
            facts = Self::facts_block(facts),
            overview = facts.overview,
        )
    }
}

#[async_trait]
impl FreeTextExtractor for LlmExtractor {
    async fn extract(
        &self,
        text: &str,
        facts: &ItemFacts,
    ) -> Result<EnrichedMetadata, ProviderError> {
        self.complete(Self::extraction_prompt(text, facts)).await
    }
}

#[async_trait]
impl StructuredInferenceExtractor for LlmExtractor {
    async fn infer(&self, facts: &ItemFacts) -> Result<EnrichedMetadata, ProviderError> {
        self.complete(Self::inference_prompt(facts)).await
    }
}

/// Parse the model's reply, tolerating a fenced code block around the JSON
fn parse_payload(content: &str) -> Result<MetadataPayload, ProviderError> {
    let trimmed = content.trim();
    let stripped = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(stripped)
        .map_err(|e| ProviderError::Parse(format!("{}: {} in model reply", SERVICE, e)))
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemKind;

    fn facts() -> ItemFacts {
        ItemFacts {
            title: "Dust and Echoes".to_string(),
            kind: ItemKind::Movie,
            release_year: Some(1971),
            genres: vec!["Western".to_string()],
            keywords: vec!["revenge".to_string()],
            cast_names: vec!["J. Doe".to_string()],
            overview: String::new(),
        }
    }

    #[test]
    fn test_parse_plain_json_payload() {
        let payload = parse_payload(
            r#"{"protagonist": "a weary bounty hunter", "themes": ["pursuit"],
                "vibes": ["dusty plains", "sun-bleached menace", "slow-burn revenge"],
                "tone": "rugged", "pacing": "contemplative",
                "profile": "A hunter chases a ghost."}"#,
        )
        .unwrap();
        let metadata = EnrichedMetadata::from(payload);
        assert_eq!(metadata.slots.protagonist.as_deref(), Some("a weary bounty hunter"));
        assert_eq!(metadata.vibes.len(), 3);
        assert_eq!(metadata.tone, "rugged");
        // Unset slots stay empty
        assert!(metadata.slots.goal.is_none());
    }

    #[test]
    fn test_parse_fenced_payload() {
        let payload =
            parse_payload("```json\n{\"vibes\": [\"x\"], \"tone\": \"t\", \"pacing\": \"p\"}\n```")
                .unwrap();
        assert_eq!(payload.vibes, vec!["x"]);
    }

    #[test]
    fn test_parse_garbage_is_parse_error() {
        let err = parse_payload("I'm sorry, I cannot help with that.").unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_inference_prompt_forbids_bare_genres() {
        let prompt = LlmExtractor::inference_prompt(&facts());
        assert!(prompt.contains("never a bare genre name"));
        assert!(prompt.contains("Genres: Western"));
    }

    #[test]
    fn test_extraction_prompt_truncates_long_text() {
        let long = "x".repeat(MAX_PROMPT_CHARS * 2);
        let prompt = LlmExtractor::extraction_prompt(&long, &facts());
        assert!(prompt.len() < MAX_PROMPT_CHARS + 2_000);
    }
}
