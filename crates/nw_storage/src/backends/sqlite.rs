use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use nw_core::{
    Article, ArticleBatch, ArticleStore, Error, KeywordRecord, Result, User, UserId, UserStore,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;
use crate::StorageBackend;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://newswatch.db";

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        email TEXT UNIQUE,
        token TEXT NOT NULL UNIQUE,
        blocked INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS keywords (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        keyword TEXT NOT NULL,
        last_searched TEXT NOT NULL,
        latest_published_at TEXT,
        UNIQUE (user_id, keyword)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS article_batches (
        keyword_id INTEGER PRIMARY KEY REFERENCES keywords(id) ON DELETE CASCADE,
        articles TEXT NOT NULL,
        fetched_at TEXT NOT NULL
    )
    "#,
    // Add future migrations here
];

// Fixed-width UTC timestamps sort the same as text and as time.
fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::Database(format!("Failed to parse timestamp {}: {}", raw, e)))
}

fn db_err(context: &str) -> impl Fn(sqlx::Error) -> Error + '_ {
    move |e| Error::Database(format!("{}: {}", context, e))
}

fn keyword_from_row(row: &SqliteRow) -> Result<KeywordRecord> {
    let latest: Option<String> = row.get("latest_published_at");
    Ok(KeywordRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        keyword: row.get("keyword"),
        last_searched: parse_ts(&row.get::<String, _>("last_searched"))?,
        latest_published_at: latest.as_deref().map(parse_ts).transpose()?,
    })
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        token: row.get("token"),
        blocked: row.get::<i64, _>("blocked") != 0,
        created_at: parse_ts(&row.get::<String, _>("created_at"))?,
    })
}

pub struct SQLiteStorage {
    pool: Arc<SqlitePool>,
}

#[async_trait]
impl StorageBackend for SQLiteStorage {
    fn get_error_message() -> &'static str {
        "SQLite database should be reachable (check --database-url)"
    }

    async fn connect(url: Option<&str>) -> Result<Self> {
        Self::new_with_url(url.unwrap_or(DEFAULT_DATABASE_URL)).await
    }
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::new_with_url(&format!("sqlite://{}", db_path.display())).await
    }

    pub async fn new_with_url(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(db_err("Invalid database url"))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(db_err("Failed to connect to database"))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Database(format!("Failed to run migration {}: {}", i, e)))?;
        }
        debug!(url, "sqlite migrations applied");

        Ok(Self { pool: Arc::new(pool) })
    }

    async fn write_batch(tx: &mut Transaction<'_, Sqlite>, record: &KeywordRecord, articles: &[Article]) -> Result<()> {
        let exists = sqlx::query("SELECT 1 FROM keywords WHERE id = ?")
            .bind(record.id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_err("Failed to look up keyword"))?;
        if exists.is_none() {
            return Err(Error::NotFound(format!("Keyword record {} does not exist", record.id)));
        }

        let blob = serde_json::to_string(articles)?;

        sqlx::query("DELETE FROM article_batches WHERE keyword_id = ?")
            .bind(record.id)
            .execute(&mut **tx)
            .await
            .map_err(db_err("Failed to delete article batch"))?;

        sqlx::query("INSERT INTO article_batches (keyword_id, articles, fetched_at) VALUES (?, ?, ?)")
            .bind(record.id)
            .bind(blob)
            .bind(fmt_ts(&Utc::now()))
            .execute(&mut **tx)
            .await
            .map_err(db_err("Failed to store article batch"))?;
        Ok(())
    }

    async fn write_keyword(tx: &mut Transaction<'_, Sqlite>, record: &KeywordRecord) -> Result<()> {
        let updated = sqlx::query(
            "UPDATE keywords SET last_searched = ?, latest_published_at = ? WHERE id = ?",
        )
        .bind(fmt_ts(&record.last_searched))
        .bind(record.latest_published_at.as_ref().map(fmt_ts))
        .bind(record.id)
        .execute(&mut **tx)
        .await
        .map_err(db_err("Failed to update keyword"))?;

        if updated.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Keyword record {} does not exist", record.id)));
        }
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool.begin().await.map_err(db_err("Failed to begin transaction"))
    }
}

#[async_trait]
impl ArticleStore for SQLiteStorage {
    async fn get_keyword(&self, user: UserId, keyword: &str) -> Result<Option<KeywordRecord>> {
        let row = sqlx::query("SELECT * FROM keywords WHERE user_id = ? AND keyword = ?")
            .bind(user)
            .bind(keyword)
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_err("Failed to load keyword"))?;
        row.as_ref().map(keyword_from_row).transpose()
    }

    async fn create_or_get_keyword(&self, user: UserId, keyword: &str, now: DateTime<Utc>) -> Result<(KeywordRecord, bool)> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO keywords (user_id, keyword, last_searched)
            VALUES (?, ?, ?)
            ON CONFLICT (user_id, keyword) DO NOTHING
            "#,
        )
        .bind(user)
        .bind(keyword)
        .bind(fmt_ts(&now))
        .execute(&*self.pool)
        .await
        .map_err(db_err("Failed to create keyword"))?;

        let record = self
            .get_keyword(user, keyword)
            .await?
            .ok_or_else(|| Error::Database(format!("Keyword {} vanished after insert", keyword)))?;
        Ok((record, inserted.rows_affected() == 1))
    }

    async fn update_keyword(&self, record: &KeywordRecord) -> Result<()> {
        let mut tx = self.begin().await?;
        Self::write_keyword(&mut tx, record).await?;
        tx.commit().await.map_err(db_err("Failed to commit keyword update"))
    }

    async fn replace_article_batch(&self, record: &KeywordRecord, articles: &[Article]) -> Result<()> {
        let mut tx = self.begin().await?;
        Self::write_batch(&mut tx, record, articles).await?;
        tx.commit().await.map_err(db_err("Failed to commit article batch"))
    }

    async fn get_article_batch(&self, record: &KeywordRecord) -> Result<Option<ArticleBatch>> {
        let row = sqlx::query("SELECT * FROM article_batches WHERE keyword_id = ?")
            .bind(record.id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_err("Failed to load article batch"))?;

        match row {
            Some(row) => {
                let articles: Vec<Article> = serde_json::from_str(&row.get::<String, _>("articles"))?;
                Ok(Some(ArticleBatch {
                    keyword_id: row.get("keyword_id"),
                    articles,
                    fetched_at: parse_ts(&row.get::<String, _>("fetched_at"))?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn count_keywords_by_text(&self) -> Result<BTreeMap<String, u64>> {
        let rows = sqlx::query("SELECT keyword, COUNT(*) AS searches FROM keywords GROUP BY keyword")
            .fetch_all(&*self.pool)
            .await
            .map_err(db_err("Failed to count keywords"))?;

        Ok(rows
            .iter()
            .map(|row| (row.get::<String, _>("keyword"), row.get::<i64, _>("searches") as u64))
            .collect())
    }

    async fn list_keywords(&self, user: UserId) -> Result<Vec<KeywordRecord>> {
        let rows = sqlx::query("SELECT * FROM keywords WHERE user_id = ? ORDER BY last_searched DESC")
            .bind(user)
            .fetch_all(&*self.pool)
            .await
            .map_err(db_err("Failed to list keywords"))?;
        rows.iter().map(keyword_from_row).collect()
    }

    async fn delete_keyword(&self, record: &KeywordRecord) -> Result<()> {
        sqlx::query("DELETE FROM keywords WHERE id = ?")
            .bind(record.id)
            .execute(&*self.pool)
            .await
            .map_err(db_err("Failed to delete keyword"))?;
        Ok(())
    }

    async fn save_fetch(&self, record: &KeywordRecord, articles: &[Article]) -> Result<()> {
        let mut tx = self.begin().await?;
        Self::write_batch(&mut tx, record, articles).await?;
        Self::write_keyword(&mut tx, record).await?;
        tx.commit().await.map_err(db_err("Failed to commit fetch"))
    }
}

#[async_trait]
impl UserStore for SQLiteStorage {
    async fn create_user(&self, username: &str, email: Option<&str>) -> Result<User> {
        let taken = sqlx::query("SELECT id FROM users WHERE username = ? OR (email IS NOT NULL AND email = ?)")
            .bind(username)
            .bind(email)
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_err("Failed to check existing users"))?;
        if taken.is_some() {
            return Err(Error::Validation(format!("User {} already exists", email.unwrap_or(username))));
        }

        let token = crate::new_token();
        let created_at = Utc::now();
        let result = sqlx::query("INSERT INTO users (username, email, token, blocked, created_at) VALUES (?, ?, ?, 0, ?)")
            .bind(username)
            .bind(email)
            .bind(&token)
            .bind(fmt_ts(&created_at))
            .execute(&*self.pool)
            .await
            .map_err(db_err("Failed to create user"))?;

        Ok(User {
            id: result.last_insert_rowid(),
            username: username.to_string(),
            email: email.map(str::to_string),
            token,
            blocked: false,
            created_at,
        })
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE token = ?")
            .bind(token)
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_err("Failed to look up token"))?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_err("Failed to look up email"))?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn set_blocked(&self, email: &str, blocked: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET blocked = ? WHERE email = ?")
            .bind(blocked as i64)
            .bind(email)
            .execute(&*self.pool)
            .await
            .map_err(db_err("Failed to update user"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY id")
            .fetch_all(&*self.pool)
            .await
            .map_err(db_err("Failed to list users"))?;
        rows.iter().map(user_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;
    use tempfile::tempdir;

    fn article(title: &str, published: &str) -> Article {
        json!({"title": title, "source": {"name": "Test"}, "publishedAt": published})
            .as_object()
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_keyword_and_batch() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let storage = SQLiteStorage::new_with_path(&db_path).await.unwrap();
        let now = Utc::now();

        let (mut record, created) = storage.create_or_get_keyword(7, "rust", now).await.unwrap();
        assert!(created);
        assert_eq!(record.last_searched, now);
        let (_, created) = storage.create_or_get_keyword(7, "rust", now).await.unwrap();
        assert!(!created);

        let articles = vec![
            article("newer", "2024-10-21T08:00:00Z"),
            article("older", "2024-10-21T07:28:00Z"),
        ];
        record.latest_published_at = nw_core::published_at(&articles[0]);
        record.last_searched = now + Duration::minutes(20);
        storage.save_fetch(&record, &articles).await.unwrap();

        let stored = storage.get_keyword(7, "rust").await.unwrap().unwrap();
        assert_eq!(stored, record);
        let batch = storage.get_article_batch(&record).await.unwrap().unwrap();
        assert_eq!(batch.articles, articles);

        storage.replace_article_batch(&record, &[]).await.unwrap();
        let batch = storage.get_article_batch(&record).await.unwrap().unwrap();
        assert!(batch.articles.is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_delete_cascades_to_batch() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("test.db")).await.unwrap();

        let (record, _) = storage.create_or_get_keyword(1, "go", Utc::now()).await.unwrap();
        storage.replace_article_batch(&record, &[article("a", "2024-10-21T08:00:00Z")]).await.unwrap();
        storage.delete_keyword(&record).await.unwrap();

        assert!(storage.get_keyword(1, "go").await.unwrap().is_none());
        assert!(storage.get_article_batch(&record).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_counts_and_listing() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("test.db")).await.unwrap();
        let now = Utc::now();

        for user in 1..=3 {
            storage.create_or_get_keyword(user, "ai", now).await.unwrap();
        }
        storage.create_or_get_keyword(1, "ml", now + Duration::seconds(5)).await.unwrap();

        let counts = storage.count_keywords_by_text().await.unwrap();
        assert_eq!(counts.get("ai"), Some(&3));
        assert_eq!(counts.get("ml"), Some(&1));

        let listed: Vec<_> = storage.list_keywords(1).await.unwrap().into_iter().map(|k| k.keyword).collect();
        assert_eq!(listed, vec!["ml", "ai"]);
    }

    #[tokio::test]
    async fn test_sqlite_writes_for_missing_keyword() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("test.db")).await.unwrap();
        let record = KeywordRecord {
            id: 99,
            user_id: 1,
            keyword: "ghost".into(),
            last_searched: Utc::now(),
            latest_published_at: None,
        };
        assert!(matches!(storage.update_keyword(&record).await, Err(Error::NotFound(_))));
        assert!(matches!(storage.replace_article_batch(&record, &[]).await, Err(Error::NotFound(_))));
        assert!(matches!(
            storage.save_fetch(&record, &[article("a", "2024-10-21T08:00:00Z")]).await,
            Err(Error::NotFound(_))
        ));
        assert!(storage.get_article_batch(&record).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_users() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("test.db")).await.unwrap();

        let user = storage.create_user("carol", Some("carol@example.com")).await.unwrap();
        assert_eq!(storage.find_by_token(&user.token).await.unwrap().unwrap().username, "carol");
        assert!(storage.create_user("carol2", Some("carol@example.com")).await.is_err());

        assert!(storage.set_blocked("carol@example.com", true).await.unwrap());
        assert!(storage.find_by_email("carol@example.com").await.unwrap().unwrap().blocked);
        assert!(!storage.set_blocked("missing@example.com", true).await.unwrap());
        assert_eq!(storage.list_users().await.unwrap().len(), 1);
    }
}
