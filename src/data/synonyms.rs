//! Condition synonym expansion via an OpenAI-compatible chat API.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{
    config::Settings,
    error::{SearchError, SearchResult},
};

const SYSTEM_PROMPT: &str = "You are a clinical terminology expert. Generate approximate synonyms \
for diseases, including common names, abbreviations, and other clinically relevant terms. The \
synonyms should be semantically similar to the input disease name, specifically as used in \
clinical trial condition listings. Respond with a JSON object of the form \
{\"synonyms\": [\"...\"]} containing up to 10 synonyms.";

/// Expands a condition name into clinically equivalent terms.
///
/// The returned list is at most `max_synonyms` long and always starts with the
/// verbatim input, so the literal term is searched even when expansion fails.
#[async_trait]
pub trait SynonymExpander: Send + Sync {
    async fn expand(&self, condition: &str) -> SearchResult<Vec<String>>;
}

/// Chat-completions backed expander. Without an API key it degrades to the
/// verbatim-only list instead of calling out.
pub struct OpenAiSynonymExpander {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_synonyms: usize,
    retry_attempts: u32,
    retry_backoff: Duration,
}

impl OpenAiSynonymExpander {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .user_agent("trial-scout/0.1")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.synonym_api_url.trim_end_matches('/').to_string(),
            api_key: settings.synonym_api_key.clone(),
            model: settings.synonym_model.clone(),
            max_synonyms: settings.max_synonyms,
            retry_attempts: settings.retry_attempts,
            retry_backoff: Duration::from_millis(settings.retry_backoff_ms),
        })
    }

    async fn request_synonyms(&self, condition: &str, key: &str) -> Result<Vec<String>> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": format!("Generate up to 10 clinically relevant synonyms for: {condition}"),
                },
            ],
            "response_format": { "type": "json_object" },
            "temperature": 1.0,
        });
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("synonym API returned {status}"));
        }
        let payload: ChatResponse = resp.json().await.context("decode chat response")?;
        let content = payload
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| anyhow!("chat response had no choices"))?;
        let parsed: SynonymPayload =
            serde_json::from_str(content).context("decode synonym payload")?;
        Ok(parsed.synonyms)
    }
}

#[async_trait]
impl SynonymExpander for OpenAiSynonymExpander {
    async fn expand(&self, condition: &str) -> SearchResult<Vec<String>> {
        let Some(key) = self.api_key.clone() else {
            warn!("no synonym API key configured; searching the verbatim term only");
            return Ok(vec![condition.to_string()]);
        };

        let mut last_err = None;
        for attempt in 1..=self.retry_attempts {
            match self.request_synonyms(condition, &key).await {
                Ok(generated) => {
                    let synonyms = assemble_synonyms(condition, generated, self.max_synonyms);
                    debug!(?synonyms, "expanded condition");
                    return Ok(synonyms);
                }
                Err(err) => {
                    warn!(attempt, %err, "synonym expansion failed");
                    last_err = Some(err);
                    if attempt < self.retry_attempts {
                        sleep(self.retry_backoff * attempt).await;
                    }
                }
            }
        }
        Err(SearchError::Unavailable {
            service: "synonym expander",
            attempts: self.retry_attempts,
            source: last_err.unwrap_or_else(|| anyhow!("no attempt recorded")),
        })
    }
}

/// Prepend the verbatim condition, drop case-insensitive duplicates, cap length.
pub fn assemble_synonyms(condition: &str, generated: Vec<String>, cap: usize) -> Vec<String> {
    let mut seen = vec![condition.trim().to_lowercase()];
    let mut out = vec![condition.trim().to_string()];
    for term in generated {
        let trimmed = term.trim();
        if trimmed.is_empty() {
            continue;
        }
        let key = trimmed.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(trimmed.to_string());
        if out.len() == cap {
            break;
        }
    }
    out
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct SynonymPayload {
    #[serde(default)]
    synonyms: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbatim_term_leads_and_duplicates_drop() {
        let out = assemble_synonyms(
            "Breast Cancer",
            vec![
                "breast cancer".into(),
                "Mammary Carcinoma".into(),
                " Breast Neoplasm ".into(),
            ],
            11,
        );
        assert_eq!(
            out,
            vec!["Breast Cancer", "Mammary Carcinoma", "Breast Neoplasm"]
        );
    }

    #[test]
    fn list_is_capped_at_eleven() {
        let generated: Vec<String> = (0..20).map(|i| format!("synonym {i}")).collect();
        let out = assemble_synonyms("MS", generated, 11);
        assert_eq!(out.len(), 11);
        assert_eq!(out[0], "MS");
    }
}
