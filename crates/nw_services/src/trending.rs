use nw_core::{Article, ArticleStore, Error, NewsProvider, NewsQuery, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trending {
    pub keyword: String,
    /// How many users have this keyword saved
    pub searches: u64,
    pub articles: Vec<Article>,
}

/// Keyword with the highest count. Ties go to the lexicographically smallest keyword.
pub fn pick_trending(counts: &BTreeMap<String, u64>) -> Option<(&str, u64)> {
    let max = counts.values().copied().max()?;
    counts
        .iter()
        .find(|(_, &count)| count == max)
        .map(|(keyword, &count)| (keyword.as_str(), count))
}

/// Finds the most searched keyword across all users and reports its latest articles.
/// Nothing is written back to the article store.
pub struct TrendingSelector {
    store: Arc<dyn ArticleStore>,
    provider: Arc<dyn NewsProvider>,
}

impl TrendingSelector {
    pub fn new(store: Arc<dyn ArticleStore>, provider: Arc<dyn NewsProvider>) -> Self {
        Self { store, provider }
    }

    pub async fn trending_keyword(&self) -> Result<(String, u64)> {
        let counts = self.store.count_keywords_by_text().await?;
        pick_trending(&counts)
            .map(|(keyword, count)| (keyword.to_string(), count))
            .ok_or(Error::NoTrendingKeyword)
    }

    pub async fn select_trending(&self) -> Result<Trending> {
        let (keyword, searches) = self.trending_keyword().await?;
        let articles = self.provider.fetch(&NewsQuery::keyword(keyword.as_str())).await?;
        info!(keyword = %keyword, searches, count = articles.len(), "📈 trending keyword selected");
        Ok(Trending { keyword, searches, articles })
    }
}
