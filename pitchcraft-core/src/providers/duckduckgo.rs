//! DuckDuckGo instant-answer search provider.
//!
//! Uses the keyless `api.duckduckgo.com` JSON endpoint. The abstract (when
//! present) becomes the first hit, followed by `Results` and `RelatedTopics`
//! entries. Nested topic groups are flattened.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{SearchHit, SearchProvider, http_client, map_search_status, map_transport_error};
use crate::config::SearchProviderConfig;
use crate::error::{ConfigError, ProviderError};
use crate::text;

const DEFAULT_BASE_URL: &str = "https://api.duckduckgo.com/";
const PROVIDER_ID: &str = "duckduckgo";

pub struct DuckDuckGoProvider {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl DuckDuckGoProvider {
    pub fn new(config: &SearchProviderConfig, timeout: Duration) -> Result<Self, ConfigError> {
        Ok(Self {
            client: http_client(&config.user_agent, timeout)?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout,
        })
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        let url = format!(
            "{}?q={}&format=json&no_html=1&skip_disambig=1",
            self.base_url,
            urlencoding::encode(query)
        );
        debug!(provider = PROVIDER_ID, query, "Searching");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| map_transport_error(PROVIDER_ID, self.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(map_search_status(PROVIDER_ID, status, &headers, &body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse {
                provider: PROVIDER_ID.to_string(),
                message: format!("failed to parse search response: {e}"),
            })?;

        Ok(parse_response(&body, max_results))
    }
}

/// Turn an instant-answer payload into hits.
pub(crate) fn parse_response(body: &Value, max_results: usize) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    let abstract_text = str_field(body, "AbstractText");
    let abstract_url = str_field(body, "AbstractURL");
    if !abstract_text.is_empty() && !abstract_url.is_empty() {
        let title = match str_field(body, "Heading") {
            "" => str_field(body, "AbstractSource"),
            heading => heading,
        };
        hits.push(SearchHit::new(abstract_url, title, text::squash_whitespace(abstract_text)));
    }

    let mut topics = Vec::new();
    for key in ["Results", "RelatedTopics"] {
        if let Some(entries) = body.get(key).and_then(Value::as_array) {
            flatten_topics(entries, &mut topics);
        }
    }

    for topic in topics {
        if hits.len() >= max_results {
            break;
        }
        let text_value = str_field(topic, "Text");
        let url = str_field(topic, "FirstURL");
        if text_value.is_empty() || url.is_empty() || hits.iter().any(|h| h.url == url) {
            continue;
        }
        // Topic text reads "Title - description"; the leading part is the title.
        let title = text_value
            .split_once(" - ")
            .map_or(text_value, |(head, _)| head);
        hits.push(SearchHit::new(url, title, text::squash_whitespace(text_value)));
    }

    hits.truncate(max_results);
    hits
}

fn flatten_topics<'a>(entries: &'a [Value], out: &mut Vec<&'a Value>) {
    for entry in entries {
        match entry.get("Topics").and_then(Value::as_array) {
            Some(nested) => flatten_topics(nested, out),
            None => out.push(entry),
        }
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}
