use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("News provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("No trending keywords found")]
    NoTrendingKeyword,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl Error {
    /// Whether the caller may retry the same request later and expect a different outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ProviderUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_provider_errors_are_retryable() {
        assert!(Error::ProviderUnavailable("timeout".into()).is_retryable());
        assert!(!Error::RateLimited("wait".into()).is_retryable());
        assert!(!Error::NoTrendingKeyword.is_retryable());
        assert!(!Error::Storage("disk".into()).is_retryable());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Error::Validation("Keyword is required.".into()).to_string(),
            "Validation error: Keyword is required."
        );
        assert_eq!(Error::NoTrendingKeyword.to_string(), "No trending keywords found");
    }
}
