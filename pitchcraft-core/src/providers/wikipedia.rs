//! Wikipedia full-text search provider (MediaWiki `list=search`).
//!
//! Snippets arrive with `<span class="searchmatch">` highlighting, which is
//! stripped. The article's last-edit timestamp becomes `published_at`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{SearchHit, SearchProvider, http_client, map_search_status, map_transport_error};
use crate::config::SearchProviderConfig;
use crate::error::{ConfigError, ProviderError};
use crate::text;

const DEFAULT_BASE_URL: &str = "https://en.wikipedia.org";
const PROVIDER_ID: &str = "wikipedia";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<QueryBlock>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct QueryBlock {
    #[serde(default)]
    search: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    info: String,
}

pub struct WikipediaProvider {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl WikipediaProvider {
    pub fn new(config: &SearchProviderConfig, timeout: Duration) -> Result<Self, ConfigError> {
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            client: http_client(&config.user_agent, timeout)?,
            base_url,
            timeout,
        })
    }

    fn article_url(&self, title: &str) -> String {
        format!(
            "{}/wiki/{}",
            self.base_url,
            urlencoding::encode(&title.replace(' ', "_"))
        )
    }
}

#[async_trait]
impl SearchProvider for WikipediaProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        if max_results == 0 {
            return Ok(Vec::new());
        }
        let url = format!(
            "{}/w/api.php?action=query&list=search&format=json\
             &srprop=snippet%7Ctimestamp&srlimit={}&srsearch={}",
            self.base_url,
            max_results.min(50),
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

        let body: SearchResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    provider: PROVIDER_ID.to_string(),
                    message: format!("failed to parse search response: {e}"),
                })?;

        self.parse_response(body, max_results)
    }
}

impl WikipediaProvider {
    fn parse_response(
        &self,
        body: SearchResponse,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        if let Some(err) = body.error {
            return Err(if err.code == "ratelimited" {
                ProviderError::QuotaExceeded {
                    provider: PROVIDER_ID.to_string(),
                    retry_after_secs: 60,
                }
            } else {
                ProviderError::InvalidResponse {
                    provider: PROVIDER_ID.to_string(),
                    message: format!("{}: {}", err.code, err.info),
                }
            });
        }

        let entries = body.query.map(|q| q.search).unwrap_or_default();
        Ok(entries
            .into_iter()
            .take(max_results)
            .map(|entry| {
                let hit = SearchHit::new(
                    self.article_url(&entry.title),
                    entry.title,
                    text::strip_markup(&entry.snippet),
                );
                match entry.timestamp {
                    Some(at) => hit.with_published_at(at),
                    None => hit,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchProviderKind;

    fn provider() -> WikipediaProvider {
        WikipediaProvider::new(
            &SearchProviderConfig::new(SearchProviderKind::Wikipedia),
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_search_results() {
        let body: SearchResponse = serde_json::from_str(
            r#"{
                "batchcomplete": "",
                "query": {
                    "searchinfo": {"totalhits": 2},
                    "search": [
                        {
                            "ns": 0,
                            "title": "Cloud computing",
                            "pageid": 19541494,
                            "snippet": "<span class=\"searchmatch\">Cloud</span> computing is the on-demand availability &amp; more",
                            "timestamp": "2024-05-01T12:00:00Z"
                        },
                        {
                            "ns": 0,
                            "title": "Multicloud",
                            "pageid": 1,
                            "snippet": "Using several <span class=\"searchmatch\">cloud</span> providers"
                        }
                    ]
                }
            }"#,
        )
        .unwrap();

        let hits = provider().parse_response(body, 5).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://en.wikipedia.org/wiki/Cloud_computing");
        assert_eq!(
            hits[0].snippet,
            "Cloud computing is the on-demand availability & more"
        );
        assert!(hits[0].published_at.is_some());
        assert!(hits[1].published_at.is_none());
    }

    #[test]
    fn test_parse_api_error() {
        let body: SearchResponse = serde_json::from_str(
            r#"{"error": {"code": "ratelimited", "info": "You've exceeded your rate limit."}}"#,
        )
        .unwrap();
        let err = provider().parse_response(body, 5).unwrap_err();
        assert!(matches!(err, ProviderError::QuotaExceeded { .. }));
    }

    #[test]
    fn test_article_url_encodes_title() {
        assert_eq!(
            provider().article_url("General Data Protection Regulation"),
            "https://en.wikipedia.org/wiki/General_Data_Protection_Regulation"
        );
        assert_eq!(
            provider().article_url("C++"),
            "https://en.wikipedia.org/wiki/C%2B%2B"
        );
    }
}
