//! Chat-completion assistant prompted for structured facts
//!
//! Lowest-trust source: answers are generated text. Every prompt asks for a
//! single JSON object, and the reply is parsed as such; anything else is
//! treated as a malformed response.

use crate::providers::{http_client, status_error, Capabilities, LookupProvider};
use crate::types::{
    CompanyCandidate, CompanyQuery, ProfileField, ProviderError, ProviderResult, RawValue,
    NOT_LISTED_SENTINEL,
};
use async_trait::async_trait;
use crqm_common::config::{resolve_api_key, AssistantConfig, ASSISTANT_KEY_ENV_VARS};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub const ASSISTANT_SOURCE: &str = "assistant";

const SYSTEM_PROMPT: &str = "You are a corporate research assistant. Answer with a single JSON \
object and nothing else. Use null for anything you do not know. Never invent figures.";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompanyAnswer {
    name: Option<String>,
    /// Ticker, domain, or `NOT_LISTED`
    handle: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidatesAnswer {
    #[serde(default)]
    companies: Vec<CompanyAnswer>,
}

pub struct AssistantClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    priority: u8,
}

impl AssistantClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        priority: u8,
        timeout: Duration,
    ) -> crqm_common::Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            priority,
        })
    }

    /// Build from config, failing with `MissingCredential` when no key is set
    pub fn from_config(config: &AssistantConfig, timeout: Duration) -> crqm_common::Result<Self> {
        let api_key = resolve_api_key("Assistant", ASSISTANT_KEY_ENV_VARS, config.api_key.as_deref())?;
        Self::new(&config.base_url, api_key, &config.model, config.priority, timeout)
    }

    /// Send one prompt and parse the reply as a JSON object
    async fn ask(&self, prompt: String) -> Result<Value, ProviderError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.0,
            response_format: json!({ "type": "json_object" }),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Malformed("assistant returned no content".to_string()))?;

        parse_json_reply(&content)
    }

    fn to_candidates(&self, answer: CandidatesAnswer, parent: Option<&str>) -> Vec<CompanyCandidate> {
        answer
            .companies
            .into_iter()
            .filter_map(|c| {
                let name = c.name.filter(|n| !n.trim().is_empty())?;
                let candidate = CompanyCandidate::new(name, ASSISTANT_SOURCE).with_handle(c.handle.as_deref());
                Some(match parent {
                    Some(p) => candidate.with_parent(p),
                    None => candidate,
                })
            })
            .collect()
    }

    /// Map a profile answer to a provider result
    pub fn profile_from_answer(&self, answer: &Value) -> ProviderResult {
        let mut result = ProviderResult::empty(ASSISTANT_SOURCE, self.priority);
        for field in ProfileField::ALL {
            match answer.get(field.as_str()).and_then(RawValue::from_json) {
                // Unit unknown: read it the way free text is read
                Some(RawValue::Number(n)) if field == ProfileField::Revenue => {
                    result.set(field, RawValue::Text(n.to_string()))
                }
                Some(value) => result.set(field, value),
                None => {}
            }
        }
        result
    }
}

/// Parse a reply that should be a JSON object, tolerating a Markdown code fence
pub fn parse_json_reply(content: &str) -> Result<Value, ProviderError> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let value: Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::Malformed(format!("assistant reply is not JSON: {}", e)))?;

    if value.is_object() {
        Ok(value)
    } else {
        Err(ProviderError::Malformed("assistant reply is not a JSON object".to_string()))
    }
}

#[async_trait]
impl LookupProvider for AssistantClient {
    fn name(&self) -> &str {
        ASSISTANT_SOURCE
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            suggest: true,
            affiliates: true,
            profile: true,
        }
    }

    async fn try_suggest(&self, query: &CompanyQuery) -> Result<Vec<CompanyCandidate>, ProviderError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = format!(
            "Which companies could \"{}\" refer to? Reply as {{\"companies\": [{{\"name\": ..., \
             \"handle\": ...}}]}}, most likely first, at most 5. The handle is the primary stock \
             ticker with exchange suffix (e.g. SBIN.NS), or the web domain if unlisted but a \
             single company, or \"{}\" for a group that is not itself listed.",
            query.raw().trim(),
            NOT_LISTED_SENTINEL
        );
        debug!("Asking assistant for candidates: {}", query.search_key());

        let answer: CandidatesAnswer = serde_json::from_value(self.ask(prompt).await?)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        Ok(self.to_candidates(answer, None))
    }

    async fn try_affiliates(
        &self,
        parent: &CompanyCandidate,
    ) -> Result<Vec<CompanyCandidate>, ProviderError> {
        let prompt = format!(
            "\"{}\" is not independently listed. List its publicly listed subsidiaries or \
             affiliates as {{\"companies\": [{{\"name\": ..., \"handle\": ...}}]}} where handle \
             is the stock ticker with exchange suffix.",
            parent.display_name
        );

        let answer: CandidatesAnswer = serde_json::from_value(self.ask(prompt).await?)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        Ok(self.to_candidates(answer, Some(&parent.display_name)))
    }

    async fn try_fetch(&self, candidate: &CompanyCandidate) -> Result<ProviderResult, ProviderError> {
        let handle = candidate
            .handle
            .as_ref()
            .map(|h| format!(" ({})", h))
            .unwrap_or_default();
        let prompt = format!(
            "Give the company profile of \"{}\"{} as {{\"name\": string, \"region\": country of \
             headquarters, \"industry\": string, \"sector\": string, \"revenue\": latest annual \
             revenue as text with currency and unit (e.g. \"$57.2 billion\"), \"employees\": \
             integer}}.",
            candidate.display_name, handle
        );

        let answer = self.ask(prompt).await?;
        Ok(self.profile_from_answer(&answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AssistantClient {
        AssistantClient::new("http://localhost", "key", "model", 40, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_parse_json_reply_strips_fence() {
        let reply = "```json\n{\"sector\": \"Banking\"}\n```";
        assert_eq!(parse_json_reply(reply).unwrap()["sector"], "Banking");
        assert!(parse_json_reply("{\"a\": 1}").is_ok());
        assert!(matches!(parse_json_reply("I think it is a bank"), Err(ProviderError::Malformed(_))));
        assert!(matches!(parse_json_reply("[1, 2]"), Err(ProviderError::Malformed(_))));
    }

    #[test]
    fn test_profile_from_answer_skips_nulls() {
        let answer = json!({
            "name": "Hindalco Industries",
            "region": "India",
            "industry": null,
            "revenue": "2,23,202 crore",
            "employees": 66000
        });
        let result = client().profile_from_answer(&answer);
        assert_eq!(result.fields.len(), 4);
        assert!(result.get(ProfileField::Industry).is_none());
        assert_eq!(result.get(ProfileField::Employees), Some(&RawValue::Number(66000.0)));
    }

    #[test]
    fn test_numeric_revenue_read_as_text() {
        let result = client().profile_from_answer(&json!({ "revenue": 2500000000u64 }));
        assert_eq!(result.get(ProfileField::Revenue), Some(&RawValue::from("2500000000")));
    }

    #[test]
    fn test_candidates_keep_sentinel_and_parent() {
        let answer = CandidatesAnswer {
            companies: vec![
                CompanyAnswer {
                    name: Some("Grasim Industries".into()),
                    handle: Some("GRASIM.NS".into()),
                },
                CompanyAnswer {
                    name: Some("Tata Group".into()),
                    handle: Some("NOT_LISTED".into()),
                },
                CompanyAnswer {
                    name: None,
                    handle: Some("X".into()),
                },
            ],
        };
        let candidates = client().to_candidates(answer, Some("Parent"));
        assert_eq!(candidates.len(), 2);
        assert!(candidates[1].not_listed);
        assert!(candidates.iter().all(|c| c.parent.as_deref() == Some("Parent")));
    }
}
