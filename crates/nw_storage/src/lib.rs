use async_trait::async_trait;
use nw_core::{ArticleStore, Error, Result, UserStore};
use std::sync::Arc;
use tracing::info;

pub mod backends;

pub use backends::*;

#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn get_error_message() -> &'static str;
    async fn connect(url: Option<&str>) -> Result<Self> where Self: Sized;
}

/// Both halves of a backend, shared behind trait objects.
#[derive(Clone)]
pub struct Storage {
    pub articles: Arc<dyn ArticleStore>,
    pub users: Arc<dyn UserStore>,
}

impl Storage {
    pub fn from_backend<T: ArticleStore + UserStore + 'static>(backend: T) -> Self {
        let backend = Arc::new(backend);
        Self {
            articles: backend.clone(),
            users: backend,
        }
    }
}

async fn open<T: StorageBackend + ArticleStore + UserStore + 'static>(url: Option<&str>) -> Result<Storage> {
    let backend = T::connect(url)
        .await
        .map_err(|e| Error::Storage(format!("{}: {}", T::get_error_message(), e)))?;
    Ok(Storage::from_backend(backend))
}

/// Open the backend named `kind` ("memory" or "sqlite").
pub async fn create_storage(kind: &str, url: Option<&str>) -> Result<Storage> {
    let storage = match kind {
        "memory" => open::<InMemoryStorage>(url).await?,
        #[cfg(feature = "sqlite")]
        "sqlite" => open::<SQLiteStorage>(url).await?,
        other => {
            return Err(Error::Storage(format!(
                "Unknown storage backend: {} (available: {})",
                other,
                available_backends().join(", ")
            )))
        }
    };
    info!(backend = kind, "storage opened");
    Ok(storage)
}

pub fn available_backends() -> Vec<&'static str> {
    let mut names = vec!["memory"];
    if cfg!(feature = "sqlite") {
        names.push("sqlite");
    }
    names
}

/// New opaque API token for a user
pub fn new_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_storage, Storage, StorageBackend};
}
