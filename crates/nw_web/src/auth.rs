use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use nw_core::{Error, User};
use std::sync::Arc;

use crate::error::ApiError;
use crate::AppState;

/// The caller, resolved from `Authorization: Token <key>` (or `Bearer <key>`)
pub struct AuthUser(pub User);

fn parse_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    match scheme {
        s if s.eq_ignore_ascii_case("token") || s.eq_ignore_ascii_case("bearer") => Some(token),
        _ => None,
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| Error::Unauthorized("Authentication credentials were not provided.".to_string()))?;
        let token = parse_token(header)
            .ok_or_else(|| Error::Unauthorized("Malformed authorization header.".to_string()))?;

        let user = state.services.accounts.authenticate(token).await?;
        Ok(AuthUser(user))
    }
}
