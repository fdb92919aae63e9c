use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single article exactly as the news provider returned it.
pub type Article = Map<String, Value>;

pub type UserId = i64;

/// Field the provider uses for the publication timestamp of an article.
pub const PUBLISHED_AT_FIELD: &str = "publishedAt";

/// Reads the publication time of an article, if it carries a parseable one.
pub fn published_at(article: &Article) -> Option<DateTime<Utc>> {
    article
        .get(PUBLISHED_AT_FIELD)
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRecord {
    pub id: i64,
    pub user_id: UserId,
    pub keyword: String,
    pub last_searched: DateTime<Utc>,
    pub latest_published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleBatch {
    pub keyword_id: i64,
    pub articles: Vec<Article>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Only articles published on or after this date (provider date format, e.g. `2024-05-01`).
    pub published_after: Option<String>,
    pub source_name: Option<String>,
    pub source_category: Option<String>,
    pub language: Option<String>,
}

/// A request to the news provider. Results always come back newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewsQuery {
    pub keyword: String,
    pub filters: SearchFilters,
    /// Strict lower bound on publication time, used when refreshing a keyword.
    pub newer_than: Option<DateTime<Utc>>,
}

impl NewsQuery {
    pub fn keyword(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            ..Default::default()
        }
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn newer_than(mut self, ts: DateTime<Utc>) -> Self {
        self.newer_than = Some(ts);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub token: String,
    pub blocked: bool,
    pub created_at: DateTime<Utc>,
}
