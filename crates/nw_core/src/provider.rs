use async_trait::async_trait;
use crate::types::{Article, NewsQuery};
use crate::Result;

#[async_trait]
pub trait NewsProvider: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Fetch the articles matching `query`, newest first.
    /// Transport failures, timeouts and upstream errors map to `Error::ProviderUnavailable`;
    /// an empty vector always means the provider answered with zero articles.
    async fn fetch(&self, query: &NewsQuery) -> Result<Vec<Article>>;
}
