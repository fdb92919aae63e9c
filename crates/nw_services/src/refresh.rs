use nw_core::{published_at, Article, ArticleStore, Clock, Error, NewsProvider, NewsQuery, Result, UserId};
use std::sync::Arc;
use tracing::info;

use crate::locks::KeywordLocks;
use crate::search::require_keyword;

pub struct RefreshService {
    store: Arc<dyn ArticleStore>,
    provider: Arc<dyn NewsProvider>,
    clock: Arc<dyn Clock>,
    locks: KeywordLocks,
}

impl RefreshService {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        provider: Arc<dyn NewsProvider>,
        clock: Arc<dyn Clock>,
        locks: KeywordLocks,
    ) -> Self {
        Self { store, provider, clock, locks }
    }

    /// Replace the cached batch with articles published after the newest one seen so far.
    pub async fn refresh(&self, user: UserId, keyword: &str) -> Result<Vec<Article>> {
        let keyword = require_keyword(keyword)?;
        let _guard = self.locks.acquire(user, keyword).await;

        let mut record = self
            .store
            .get_keyword(user, keyword)
            .await?
            .ok_or_else(|| Error::NotFound("Keyword not found.".to_string()))?;
        let since = record
            .latest_published_at
            .ok_or_else(|| Error::NotFound("No previous search data found to refresh.".to_string()))?;

        let articles = self.provider.fetch(&NewsQuery::keyword(keyword).newer_than(since)).await?;

        match articles.first() {
            Some(first) => {
                if let Some(ts) = published_at(first) {
                    record.latest_published_at = Some(ts);
                }
                record.last_searched = self.clock.now();
                self.store.save_fetch(&record, &articles).await?;
            }
            // Nothing newer: the empty batch replaces the old one, timestamps stay
            None => self.store.replace_article_batch(&record, &articles).await?,
        }

        info!(user, keyword, %since, count = articles.len(), "keyword refreshed");
        Ok(articles)
    }
}
