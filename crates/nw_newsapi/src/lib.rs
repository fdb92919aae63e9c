//! Client for the NewsAPI `/v2/everything` endpoint.
//! https://newsapi.org/docs/endpoints/everything

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, SecondsFormat};
use nw_core::{Article, Error, NewsProvider, NewsQuery, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const NEWSAPI_BASE_URL: &str = "https://newsapi.org/v2/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    status: String,
    #[serde(default)]
    articles: Vec<Article>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Clone)]
pub struct NewsApiConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl fmt::Debug for NewsApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewsApiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl NewsApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: NEWSAPI_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Full url of the `everything` endpoint under `base_url`
    fn endpoint(&self) -> Result<Url> {
        // A trailing slash keeps the last path segment when joining
        let base = if self.base_url.ends_with('/') {
            self.base_url.clone()
        } else {
            format!("{}/", self.base_url)
        };
        Url::parse(&base)
            .and_then(|url| url.join("everything"))
            .map_err(|e| Error::Validation(format!("Invalid news provider url {}: {}", self.base_url, e)))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct NewsApiClient {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl NewsApiClient {
    pub fn new(config: NewsApiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Validation("NewsAPI key is required".to_string()));
        }
        let endpoint = config.endpoint()?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::ProviderUnavailable(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key,
        })
    }

    fn query_params(query: &NewsQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("q", query.keyword.clone()),
            ("sortBy", "publishedAt".to_string()),
        ];

        // NewsAPI treats `from` as inclusive with second precision
        let from = match query.newer_than {
            Some(ts) => Some((ts + ChronoDuration::seconds(1)).to_rfc3339_opts(SecondsFormat::Secs, true)),
            None => query.filters.published_after.clone(),
        };
        if let Some(from) = from {
            params.push(("from", from));
        }
        if let Some(ref sources) = query.filters.source_name {
            params.push(("sources", sources.clone()));
        }
        if let Some(ref language) = query.filters.language {
            params.push(("language", language.clone()));
        }
        if let Some(ref category) = query.filters.source_category {
            params.push(("category", category.clone()));
        }
        params
    }

    fn unavailable(err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::ProviderUnavailable("NewsAPI request timed out".to_string())
        } else {
            Error::ProviderUnavailable(format!("NewsAPI request failed: {}", err))
        }
    }
}

#[async_trait]
impl NewsProvider for NewsApiClient {
    fn name(&self) -> &str {
        "NewsAPI"
    }

    async fn fetch(&self, query: &NewsQuery) -> Result<Vec<Article>> {
        let params = Self::query_params(query);
        debug!(keyword = %query.keyword, ?params, "querying NewsAPI");

        let response = self
            .client
            .get(self.endpoint.clone())
            .header("X-Api-Key", &self.api_key)
            .query(&params)
            .send()
            .await
            .map_err(Self::unavailable)?;

        let status = response.status();
        let body = response.text().await.map_err(Self::unavailable)?;
        let parsed: std::result::Result<NewsApiResponse, _> = serde_json::from_str(&body);

        match parsed {
            Ok(payload) if status == StatusCode::OK && payload.status == "ok" => {
                debug!(keyword = %query.keyword, count = payload.articles.len(), "NewsAPI answered");
                Ok(payload.articles)
            }
            Ok(payload) => {
                let code = payload.code.unwrap_or_else(|| status.as_u16().to_string());
                let message = payload.message.unwrap_or_else(|| "Unknown error".to_string());
                warn!(%status, %code, "NewsAPI returned an error");
                Err(Error::ProviderUnavailable(format!("NewsAPI error {}: {}", code, message)))
            }
            Err(e) => {
                warn!(%status, error = %e, "undecodable NewsAPI response");
                Err(Error::ProviderUnavailable(format!(
                    "NewsAPI returned an unreadable response (HTTP {})",
                    status.as_u16()
                )))
            }
        }
    }
}
