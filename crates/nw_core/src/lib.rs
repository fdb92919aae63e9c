pub mod clock;
pub mod error;
pub mod provider;
pub mod storage;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use error::{Error, Result};
pub use provider::NewsProvider;
pub use storage::{ArticleStore, UserStore};
pub use types::{
    published_at, Article, ArticleBatch, KeywordRecord, NewsQuery, SearchFilters, User, UserId,
    PUBLISHED_AT_FIELD,
};
