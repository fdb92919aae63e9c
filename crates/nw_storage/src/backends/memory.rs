use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nw_core::{
    Article, ArticleBatch, ArticleStore, Error, KeywordRecord, Result, User, UserId, UserStore,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use crate::StorageBackend;

#[derive(Default)]
pub struct MemoryStore {
    last_keyword_id: i64,
    last_user_id: i64,
    keywords: BTreeMap<i64, KeywordRecord>,
    batches: HashMap<i64, ArticleBatch>,
    users: BTreeMap<UserId, User>,
}

impl MemoryStore {
    fn find_keyword(&self, user: UserId, keyword: &str) -> Option<&KeywordRecord> {
        self.keywords
            .values()
            .find(|k| k.user_id == user && k.keyword == keyword)
    }

    fn create_or_get_keyword(&mut self, user: UserId, keyword: &str, now: DateTime<Utc>) -> (KeywordRecord, bool) {
        if let Some(existing) = self.find_keyword(user, keyword) {
            return (existing.clone(), false);
        }
        self.last_keyword_id += 1;
        let record = KeywordRecord {
            id: self.last_keyword_id,
            user_id: user,
            keyword: keyword.to_string(),
            last_searched: now,
            latest_published_at: None,
        };
        self.keywords.insert(record.id, record.clone());
        (record, true)
    }

    fn update_keyword(&mut self, record: &KeywordRecord) -> Result<()> {
        match self.keywords.get_mut(&record.id) {
            Some(existing) => {
                existing.last_searched = record.last_searched;
                existing.latest_published_at = record.latest_published_at;
                Ok(())
            }
            None => Err(Error::NotFound(format!("Keyword record {} does not exist", record.id))),
        }
    }

    fn replace_article_batch(&mut self, record: &KeywordRecord, articles: &[Article]) -> Result<()> {
        if !self.keywords.contains_key(&record.id) {
            return Err(Error::NotFound(format!("Keyword record {} does not exist", record.id)));
        }
        self.batches.insert(
            record.id,
            ArticleBatch {
                keyword_id: record.id,
                articles: articles.to_vec(),
                fetched_at: Utc::now(),
            },
        );
        Ok(())
    }

    fn count_keywords_by_text(&self) -> BTreeMap<String, u64> {
        let mut counts = BTreeMap::new();
        for record in self.keywords.values() {
            *counts.entry(record.keyword.clone()).or_insert(0) += 1;
        }
        counts
    }

    fn create_user(&mut self, username: &str, email: Option<&str>) -> Result<User> {
        if self.users.values().any(|u| u.username == username) {
            return Err(Error::Validation(format!("Username {} is already taken", username)));
        }
        if let Some(email) = email {
            if self.users.values().any(|u| u.email.as_deref() == Some(email)) {
                return Err(Error::Validation(format!("Email {} is already registered", email)));
            }
        }
        self.last_user_id += 1;
        let user = User {
            id: self.last_user_id,
            username: username.to_string(),
            email: email.map(str::to_string),
            token: crate::new_token(),
            blocked: false,
            created_at: Utc::now(),
        };
        self.users.insert(user.id, user.clone());
        Ok(user)
    }
}

pub struct InMemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(MemoryStore::default())),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    fn get_error_message() -> &'static str {
        "Memory storage should be available"
    }

    async fn connect(_url: Option<&str>) -> Result<Self> {
        Ok(Self::new())
    }
}

#[async_trait]
impl ArticleStore for InMemoryStorage {
    async fn get_keyword(&self, user: UserId, keyword: &str) -> Result<Option<KeywordRecord>> {
        let store = self.store.read().await;
        Ok(store.find_keyword(user, keyword).cloned())
    }

    async fn create_or_get_keyword(&self, user: UserId, keyword: &str, now: DateTime<Utc>) -> Result<(KeywordRecord, bool)> {
        let mut store = self.store.write().await;
        Ok(store.create_or_get_keyword(user, keyword, now))
    }

    async fn update_keyword(&self, record: &KeywordRecord) -> Result<()> {
        let mut store = self.store.write().await;
        store.update_keyword(record)
    }

    async fn replace_article_batch(&self, record: &KeywordRecord, articles: &[Article]) -> Result<()> {
        let mut store = self.store.write().await;
        store.replace_article_batch(record, articles)
    }

    async fn get_article_batch(&self, record: &KeywordRecord) -> Result<Option<ArticleBatch>> {
        let store = self.store.read().await;
        Ok(store.batches.get(&record.id).cloned())
    }

    async fn count_keywords_by_text(&self) -> Result<BTreeMap<String, u64>> {
        let store = self.store.read().await;
        Ok(store.count_keywords_by_text())
    }

    async fn list_keywords(&self, user: UserId) -> Result<Vec<KeywordRecord>> {
        let store = self.store.read().await;
        let mut records: Vec<_> = store
            .keywords
            .values()
            .filter(|k| k.user_id == user)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.last_searched.cmp(&a.last_searched));
        Ok(records)
    }

    async fn delete_keyword(&self, record: &KeywordRecord) -> Result<()> {
        let mut store = self.store.write().await;
        store.keywords.remove(&record.id);
        store.batches.remove(&record.id);
        Ok(())
    }

    async fn save_fetch(&self, record: &KeywordRecord, articles: &[Article]) -> Result<()> {
        // One write guard for both halves
        let mut store = self.store.write().await;
        store.replace_article_batch(record, articles)?;
        store.update_keyword(record)
    }
}

#[async_trait]
impl UserStore for InMemoryStorage {
    async fn create_user(&self, username: &str, email: Option<&str>) -> Result<User> {
        let mut store = self.store.write().await;
        store.create_user(username, email)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<User>> {
        let store = self.store.read().await;
        Ok(store.users.values().find(|u| u.token == token).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let store = self.store.read().await;
        Ok(store
            .users
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn set_blocked(&self, email: &str, blocked: bool) -> Result<bool> {
        let mut store = self.store.write().await;
        match store.users.values_mut().find(|u| u.email.as_deref() == Some(email)) {
            Some(user) => {
                user.blocked = blocked;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let store = self.store.read().await;
        Ok(store.users.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn article(title: &str) -> Article {
        json!({"title": title, "publishedAt": "2024-10-21T07:28:00Z"})
            .as_object()
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_or_get_keyword_is_unique_per_user() {
        let storage = InMemoryStorage::new();
        let now = Utc::now();

        let (first, created) = storage.create_or_get_keyword(1, "rust", now).await.unwrap();
        assert!(created);
        assert_eq!(first.last_searched, now);
        assert!(first.latest_published_at.is_none());

        let (again, created) = storage.create_or_get_keyword(1, "rust", now + Duration::minutes(5)).await.unwrap();
        assert!(!created);
        assert_eq!(again, first);

        let (other_user, created) = storage.create_or_get_keyword(2, "rust", now).await.unwrap();
        assert!(created);
        assert_ne!(other_user.id, first.id);
    }

    #[tokio::test]
    async fn test_replace_article_batch_replaces() {
        let storage = InMemoryStorage::new();
        let (record, _) = storage.create_or_get_keyword(1, "rust", Utc::now()).await.unwrap();

        storage.replace_article_batch(&record, &[article("a"), article("b")]).await.unwrap();
        storage.replace_article_batch(&record, &[article("c")]).await.unwrap();

        let batch = storage.get_article_batch(&record).await.unwrap().unwrap();
        assert_eq!(batch.keyword_id, record.id);
        assert_eq!(batch.articles, vec![article("c")]);
    }

    #[tokio::test]
    async fn test_save_fetch_updates_record_and_batch() {
        let storage = InMemoryStorage::new();
        let now = Utc::now();
        let (mut record, _) = storage.create_or_get_keyword(1, "rust", now).await.unwrap();

        record.last_searched = now + Duration::minutes(20);
        record.latest_published_at = Some(now);
        storage.save_fetch(&record, &[article("a")]).await.unwrap();

        let stored = storage.get_keyword(1, "rust").await.unwrap().unwrap();
        assert_eq!(stored, record);
        assert_eq!(storage.get_article_batch(&record).await.unwrap().unwrap().articles.len(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_keyword_fails() {
        let storage = InMemoryStorage::new();
        let record = KeywordRecord {
            id: 42,
            user_id: 1,
            keyword: "ghost".to_string(),
            last_searched: Utc::now(),
            latest_published_at: None,
        };
        assert!(matches!(storage.update_keyword(&record).await, Err(Error::NotFound(_))));
        assert!(matches!(storage.replace_article_batch(&record, &[]).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_keyword_drops_batch() {
        let storage = InMemoryStorage::new();
        let (record, _) = storage.create_or_get_keyword(1, "rust", Utc::now()).await.unwrap();
        storage.replace_article_batch(&record, &[article("a")]).await.unwrap();

        storage.delete_keyword(&record).await.unwrap();
        assert!(storage.get_keyword(1, "rust").await.unwrap().is_none());
        assert!(storage.get_article_batch(&record).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_count_and_list_keywords() {
        let storage = InMemoryStorage::new();
        let now = Utc::now();
        storage.create_or_get_keyword(1, "ai", now).await.unwrap();
        storage.create_or_get_keyword(2, "ai", now).await.unwrap();
        storage.create_or_get_keyword(1, "go", now + Duration::minutes(1)).await.unwrap();

        let counts = storage.count_keywords_by_text().await.unwrap();
        assert_eq!(counts.get("ai"), Some(&2));
        assert_eq!(counts.get("go"), Some(&1));

        let listed: Vec<_> = storage
            .list_keywords(1)
            .await
            .unwrap()
            .into_iter()
            .map(|k| k.keyword)
            .collect();
        assert_eq!(listed, vec!["go", "ai"]);
    }

    #[tokio::test]
    async fn test_user_lifecycle() {
        let storage = InMemoryStorage::new();
        let user = storage.create_user("alice", Some("alice@example.com")).await.unwrap();
        assert!(!user.blocked);

        let found = storage.find_by_token(&user.token).await.unwrap().unwrap();
        assert_eq!(found.id, user.id);

        assert!(storage.set_blocked("alice@example.com", true).await.unwrap());
        assert!(storage.find_by_email("alice@example.com").await.unwrap().unwrap().blocked);
        assert!(!storage.set_blocked("nobody@example.com", true).await.unwrap());

        assert!(storage.create_user("alice", None).await.is_err());
        assert!(storage.create_user("bob", Some("alice@example.com")).await.is_err());
    }
}
