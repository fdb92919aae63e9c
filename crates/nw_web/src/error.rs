use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use nw_core::Error;
use serde_json::json;
use tracing::error;

/// An error ready to be sent as `{"error": message}`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(msg) => Self::new(StatusCode::BAD_REQUEST, msg),
            Error::RateLimited(msg) => Self::new(StatusCode::TOO_MANY_REQUESTS, msg),
            Error::NotFound(msg) => Self::new(StatusCode::NOT_FOUND, msg),
            Error::ProviderUnavailable(msg) => Self::new(StatusCode::SERVICE_UNAVAILABLE, msg),
            Error::NoTrendingKeyword => Self::new(StatusCode::NOT_FOUND, "No trending keywords found."),
            Error::Unauthorized(msg) => Self::new(StatusCode::UNAUTHORIZED, msg),
            Error::Forbidden(msg) => Self::new(StatusCode::FORBIDDEN, msg),
            other => {
                error!(error = %other, "request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::Validation("x".into()), StatusCode::BAD_REQUEST),
            (Error::RateLimited("x".into()), StatusCode::TOO_MANY_REQUESTS),
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (Error::ProviderUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (Error::NoTrendingKeyword, StatusCode::NOT_FOUND),
            (Error::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (Error::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (Error::Database("disk full".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let api = ApiError::from(Error::Database("secret path /var/db".into()));
        assert_eq!(api.message, "Internal server error.");
    }
}
