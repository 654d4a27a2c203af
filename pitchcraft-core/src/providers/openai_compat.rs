//! OpenAI-compatible validation and generation model.
//!
//! Works against OpenAI, Azure OpenAI, Ollama, vLLM, LM Studio, and any
//! endpoint that follows the chat completions API format. Scoring asks for a
//! bare number and clamps whatever comes back into [0, 1].

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::{Value, json};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

use super::LanguageModel;
use crate::config::ModelConfig;
use crate::error::{ConfigError, ModelError};
use crate::types::Tone;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("number regex is valid"));

const SCORING_SYSTEM_PROMPT: &str = "You grade research evidence for a business proposal. \
Given a research question and a candidate source, rate how relevant and factually plausible \
the source is for answering the question. Reply with a single number between 0 and 1 \
and nothing else.";

pub struct OpenAiCompatibleModel {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiCompatibleModel {
    /// Create a model client from configuration.
    ///
    /// Reads the API key from the environment variable named in
    /// `config.api_key_env`. Local endpoints do not need one.
    pub fn new(config: &ModelConfig) -> Result<Self, ConfigError> {
        let is_local = config
            .base_url
            .as_ref()
            .is_some_and(|u| u.contains("localhost") || u.contains("127.0.0.1"));

        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                if is_local {
                    debug!("No API key set for local model endpoint; using a placeholder token");
                    Some("local".to_string())
                } else {
                    None
                }
            })
            .ok_or_else(|| ConfigError::EnvVarMissing {
                var: config.api_key_env.clone(),
            })?;

        Self::new_with_key(config, api_key)
    }

    /// Create a model client with an explicitly provided API key.
    pub fn new_with_key(config: &ModelConfig, api_key: String) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ConfigError::Invalid {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    async fn chat(&self, system: &str, user: &str, temperature: f32) -> Result<String, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": temperature,
            "stream": false,
        });

        debug!(url = %url, model = %self.model, "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Unavailable {
                message: format!("request failed: {e}"),
            })?;

        let status = response.status();
        let response_body = response.text().await.map_err(|e| ModelError::Unavailable {
            message: format!("failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            return Err(map_http_error(status, &response_body));
        }

        let json: Value =
            serde_json::from_str(&response_body).map_err(|e| ModelError::InvalidResponse {
                message: format!("invalid JSON: {e}"),
            })?;
        extract_content(&json)
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatibleModel {
    fn id(&self) -> &str {
        &self.model
    }

    async fn score(&self, question: &str, candidate: &str) -> Result<f64, ModelError> {
        let user = format!("Question: {question}\n\nCandidate source:\n{candidate}");
        let reply = self.chat(SCORING_SYSTEM_PROMPT, &user, 0.0).await?;
        parse_score(&reply)
    }

    async fn generate(
        &self,
        prompt: &str,
        tone: Tone,
        keywords: &[String],
    ) -> Result<String, ModelError> {
        let system = generation_system_prompt(tone, keywords);
        let text = self.chat(&system, prompt, self.temperature).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ModelError::InvalidResponse {
                message: "empty completion".into(),
            });
        }
        Ok(text.to_string())
    }
}

fn generation_system_prompt(tone: Tone, keywords: &[String]) -> String {
    let mut system = format!(
        "You write slide copy for a consulting proposal. Tone: {tone}. {} \
Use only facts present in the material you are given. Keep it concise; no headings, \
no bullet markers.",
        tone.guidance()
    );
    if !keywords.is_empty() {
        system.push_str(&format!(
            " Where it fits naturally, emphasise: {}.",
            keywords.join(", ")
        ));
    }
    system
}

fn extract_content(json: &Value) -> Result<String, ModelError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ModelError::InvalidResponse {
            message: "response has no choices[0].message.content".into(),
        })
}

/// First number in the reply, clamped into [0, 1]. Percentages are rescaled.
fn parse_score(reply: &str) -> Result<f64, ModelError> {
    let m = NUMBER_RE
        .find(reply)
        .ok_or_else(|| ModelError::InvalidResponse {
            message: format!("no score in reply: {}", crate::text::truncate_chars(reply, 80)),
        })?;
    let mut value: f64 = m.as_str().parse().map_err(|_| ModelError::InvalidResponse {
        message: format!("unparseable score '{}'", m.as_str()),
    })?;
    if value > 1.0 && value <= 100.0 {
        value /= 100.0;
    }
    Ok(value.clamp(0.0, 1.0))
}

fn map_http_error(status: reqwest::StatusCode, body: &str) -> ModelError {
    match status.as_u16() {
        401 | 403 => {
            debug!(body = %body, "Authentication failed ({status})");
            ModelError::AuthFailed {
                message: format!("HTTP {status}"),
            }
        }
        429 => {
            // "Rate limit reached ... Please try again in 20s."
            let retry_after_secs = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| Some(v.get("error")?.get("message")?.as_str()?.to_string()))
                .and_then(|msg| {
                    let tail = msg.split("in ").last()?;
                    tail.trim()
                        .trim_end_matches('.')
                        .trim_end_matches('s')
                        .parse::<u64>()
                        .ok()
                })
                .unwrap_or(5);
            ModelError::RateLimited { retry_after_secs }
        }
        s if s >= 500 => ModelError::Unavailable {
            message: format!("server error ({status}): {}", crate::text::truncate_chars(body, 200)),
        },
        _ => ModelError::InvalidResponse {
            message: format!("HTTP {status}: {}", crate::text::truncate_chars(body, 200)),
        },
    }
}
