pub mod accounts;
pub mod job;
pub mod locks;
pub mod refresh;
pub mod search;
pub mod test_utils;
pub mod trending;

use nw_core::{ArticleStore, Clock, NewsProvider, SystemClock, UserStore};
use std::sync::Arc;

pub use accounts::{AccountService, Invitation};
pub use job::{spawn_trending_job, JobHandle};
pub use locks::KeywordLocks;
pub use refresh::RefreshService;
pub use search::{SearchOutcome, SearchService, FRESHNESS_WINDOW_MINUTES};
pub use trending::{pick_trending, Trending, TrendingSelector};

/// Every service the HTTP surface and the CLI need, wired to one store and provider.
/// Search and refresh share one set of keyword locks.
#[derive(Clone)]
pub struct NewsServices {
    pub search: Arc<SearchService>,
    pub refresh: Arc<RefreshService>,
    pub trending: Arc<TrendingSelector>,
    pub accounts: Arc<AccountService>,
}

impl NewsServices {
    pub fn new(
        articles: Arc<dyn ArticleStore>,
        users: Arc<dyn UserStore>,
        provider: Arc<dyn NewsProvider>,
    ) -> Self {
        Self::with_clock(articles, users, provider, Arc::new(SystemClock))
    }

    pub fn with_clock(
        articles: Arc<dyn ArticleStore>,
        users: Arc<dyn UserStore>,
        provider: Arc<dyn NewsProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let locks = KeywordLocks::new();
        Self {
            search: Arc::new(SearchService::new(articles.clone(), provider.clone(), clock.clone(), locks.clone())),
            refresh: Arc::new(RefreshService::new(articles.clone(), provider.clone(), clock, locks)),
            trending: Arc::new(TrendingSelector::new(articles, provider)),
            accounts: Arc::new(AccountService::new(users)),
        }
    }
}

pub mod prelude {
    pub use super::{NewsServices, SearchOutcome, Trending};
    pub use nw_core::{Article, Error, Result, SearchFilters};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{article, FakeProvider, ManualClock};
    use chrono::Duration;
    use nw_core::SearchFilters;
    use nw_storage::InMemoryStorage;

    #[tokio::test]
    async fn test_concurrent_searches_fetch_once() {
        let store = Arc::new(InMemoryStorage::new());
        let provider = Arc::new(FakeProvider::new());
        provider.respond_with(vec![article("Only once", "2024-10-21T06:00:00Z")]);
        let services = NewsServices::with_clock(
            store.clone(),
            store,
            provider.clone(),
            Arc::new(ManualClock::at_epoch()),
        );

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let search = services.search.clone();
                tokio::spawn(async move { search.search(1, "rust", SearchFilters::default()).await })
            })
            .collect();

        let mut fresh = 0;
        for task in tasks {
            let outcome = task.await.unwrap().unwrap();
            assert_eq!(outcome.articles().len(), 1);
            if !outcome.is_cached() {
                fresh += 1;
            }
        }
        assert_eq!(fresh, 1);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_search_then_refresh_then_trending() {
        let store = Arc::new(InMemoryStorage::new());
        let provider = Arc::new(FakeProvider::new());
        let clock = Arc::new(ManualClock::at_epoch());
        provider
            .respond_with(vec![article("First", "2024-10-21T06:00:00Z")])
            .respond_with(vec![article("Second", "2024-10-21T06:30:00Z")])
            .respond_with(vec![article("Trend", "2024-10-21T06:45:00Z")]);
        let services = NewsServices::with_clock(store.clone(), store, provider.clone(), clock.clone());

        services.search.search(1, "rust", SearchFilters::default()).await.unwrap();
        clock.advance(Duration::minutes(1));
        let refreshed = services.refresh.refresh(1, "rust").await.unwrap();
        assert_eq!(refreshed[0]["title"], "Second");

        let trending = services.trending.select_trending().await.unwrap();
        assert_eq!(trending.keyword, "rust");
        assert_eq!(trending.searches, 1);
        assert_eq!(provider.calls(), 3);
    }
}
