use chrono::Duration;
use nw_core::{
    published_at, Article, ArticleStore, Clock, Error, NewsProvider, NewsQuery, Result,
    SearchFilters, UserId,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::locks::KeywordLocks;

/// Repeated searches for the same keyword inside this window are answered from cache.
pub const FRESHNESS_WINDOW_MINUTES: i64 = 15;

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Served from the stored batch, no provider call was made
    Cached(Vec<Article>),
    /// Fetched from the provider and stored
    Fresh(Vec<Article>),
}

impl SearchOutcome {
    pub fn articles(&self) -> &[Article] {
        match self {
            SearchOutcome::Cached(articles) | SearchOutcome::Fresh(articles) => articles,
        }
    }

    pub fn into_articles(self) -> Vec<Article> {
        match self {
            SearchOutcome::Cached(articles) | SearchOutcome::Fresh(articles) => articles,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, SearchOutcome::Cached(_))
    }
}

pub(crate) fn require_keyword(keyword: &str) -> Result<&str> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(Error::Validation("Keyword is required.".to_string()));
    }
    Ok(keyword)
}

pub struct SearchService {
    store: Arc<dyn ArticleStore>,
    provider: Arc<dyn NewsProvider>,
    clock: Arc<dyn Clock>,
    locks: KeywordLocks,
    freshness_window: Duration,
}

impl SearchService {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        provider: Arc<dyn NewsProvider>,
        clock: Arc<dyn Clock>,
        locks: KeywordLocks,
    ) -> Self {
        Self {
            store,
            provider,
            clock,
            locks,
            freshness_window: Duration::minutes(FRESHNESS_WINDOW_MINUTES),
        }
    }

    pub async fn search(&self, user: UserId, keyword: &str, filters: SearchFilters) -> Result<SearchOutcome> {
        let keyword = require_keyword(keyword)?;
        let _guard = self.locks.acquire(user, keyword).await;

        let now = self.clock.now();
        let (mut record, created) = self.store.create_or_get_keyword(user, keyword, now).await?;

        if !created && record.last_searched >= now - self.freshness_window {
            return match self.store.get_article_batch(&record).await? {
                Some(batch) => {
                    debug!(user, keyword, count = batch.articles.len(), "serving cached articles");
                    Ok(SearchOutcome::Cached(batch.articles))
                }
                None => Err(Error::RateLimited(format!(
                    "You can only search for this keyword after {} minutes, and no cached results are available.",
                    FRESHNESS_WINDOW_MINUTES
                ))),
            };
        }

        let query = NewsQuery::keyword(keyword).with_filters(filters);
        let articles = self.provider.fetch(&query).await?;

        record.last_searched = self.clock.now();
        if let Some(first) = articles.first() {
            match published_at(first) {
                Some(ts) => record.latest_published_at = Some(ts),
                None => warn!(user, keyword, "newest article has no usable publishedAt"),
            }
        }
        self.store.save_fetch(&record, &articles).await?;

        info!(user, keyword, count = articles.len(), provider = self.provider.name(), "search refreshed from provider");
        Ok(SearchOutcome::Fresh(articles))
    }
}
