use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use nw_core::{Article, Clock, Error, NewsProvider, NewsQuery, Result};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Build an article the way the provider would return it
pub fn article(title: &str, published_at: &str) -> Article {
    let value = json!({
        "title": title,
        "source": {"id": null, "name": "Test Source"},
        "url": format!("https://example.com/{}", title.to_lowercase().replace(' ', "-")),
        "publishedAt": published_at,
    });
    match value {
        serde_json::Value::Object(map) => map,
        _ => Article::new(),
    }
}

/// A clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    /// 2024-10-21 07:00:00 UTC
    pub fn at_epoch() -> Self {
        Self::new(Utc.with_ymd_and_hms(2024, 10, 21, 7, 0, 0).unwrap())
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

enum Scripted {
    Articles(Vec<Article>),
    Unavailable(String),
}

/// News provider answering from a script and recording every query it receives.
/// Once the script runs out it answers with no articles.
#[derive(Default)]
pub struct FakeProvider {
    script: Mutex<VecDeque<Scripted>>,
    queries: Mutex<Vec<NewsQuery>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_with(&self, articles: Vec<Article>) -> &Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Scripted::Articles(articles));
        self
    }

    pub fn fail_with(&self, message: &str) -> &Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Scripted::Unavailable(message.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn queries(&self) -> Vec<NewsQuery> {
        self.queries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl NewsProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn fetch(&self, query: &NewsQuery) -> Result<Vec<Article>> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(query.clone());
        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(Scripted::Articles(articles)) => Ok(articles),
            Some(Scripted::Unavailable(message)) => Err(Error::ProviderUnavailable(message)),
            None => Ok(Vec::new()),
        }
    }
}
