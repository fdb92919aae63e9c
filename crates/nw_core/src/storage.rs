use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{Article, ArticleBatch, KeywordRecord, User, UserId};
use crate::Result;

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Look up the keyword record a user owns for `keyword`
    async fn get_keyword(&self, user: UserId, keyword: &str) -> Result<Option<KeywordRecord>>;

    /// Fetch the record for (user, keyword), creating it with `last_searched = now` if missing.
    /// The flag is true when this call created the record.
    async fn create_or_get_keyword(
        &self,
        user: UserId,
        keyword: &str,
        now: DateTime<Utc>,
    ) -> Result<(KeywordRecord, bool)>;

    /// Persist the timestamps of an existing record
    async fn update_keyword(&self, record: &KeywordRecord) -> Result<()>;

    /// Drop whatever batch the keyword had and store `articles` in its place
    async fn replace_article_batch(&self, record: &KeywordRecord, articles: &[Article]) -> Result<()>;

    async fn get_article_batch(&self, record: &KeywordRecord) -> Result<Option<ArticleBatch>>;

    /// Number of keyword records per keyword text, across all users
    async fn count_keywords_by_text(&self) -> Result<BTreeMap<String, u64>>;

    /// All keyword records of a user, most recently searched first
    async fn list_keywords(&self, user: UserId) -> Result<Vec<KeywordRecord>>;

    /// Remove a keyword record together with its batch
    async fn delete_keyword(&self, record: &KeywordRecord) -> Result<()>;

    /// Store the outcome of a provider fetch: new batch plus updated record.
    /// Backends with transactions override this to make it a single unit.
    async fn save_fetch(&self, record: &KeywordRecord, articles: &[Article]) -> Result<()> {
        self.replace_article_batch(record, articles).await?;
        self.update_keyword(record).await
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create a user with a freshly issued API token
    async fn create_user(&self, username: &str, email: Option<&str>) -> Result<User>;

    async fn find_by_token(&self, token: &str) -> Result<Option<User>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Returns false when no user has this email
    async fn set_blocked(&self, email: &str, blocked: bool) -> Result<bool>;

    async fn list_users(&self) -> Result<Vec<User>>;
}
