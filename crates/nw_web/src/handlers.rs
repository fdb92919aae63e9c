use axum::{
    extract::State,
    http::{HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use nw_core::{Article, Error, SearchFilters};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::AppState;

pub const CACHE_HEADER: HeaderName = HeaderName::from_static("x-cache");

#[derive(Debug, Default, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub keyword: Option<String>,
    pub date_published: Option<String>,
    pub source_name: Option<String>,
    pub source_category: Option<String>,
    pub article_language: Option<String>,
}

impl SearchRequest {
    fn filters(&self) -> SearchFilters {
        SearchFilters {
            published_after: self.date_published.clone(),
            source_name: self.source_name.clone(),
            source_category: self.source_category.clone(),
            language: self.article_language.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub keyword: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TrendingResponse {
    pub trending_keyword: String,
    pub searches: u64,
    pub articles: Vec<Article>,
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<SearchRequest>,
) -> Result<Response, ApiError> {
    let keyword = request.keyword.as_deref().unwrap_or_default();
    let outcome = state
        .services
        .search
        .search(user.id, keyword, request.filters())
        .await?;

    let cache = if outcome.is_cached() { "HIT" } else { "MISS" };
    Ok(([(CACHE_HEADER, cache)], Json(outcome.into_articles())).into_response())
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<Vec<Article>>, ApiError> {
    let keyword = request.keyword.as_deref().unwrap_or_default();
    let articles = state.services.refresh.refresh(user.id, keyword).await?;
    Ok(Json(articles))
}

pub async fn background_search(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<TrendingResponse>, ApiError> {
    info!(user = user.id, "trending refresh requested");
    match state.services.trending.select_trending().await {
        Ok(trending) => Ok(Json(TrendingResponse {
            trending_keyword: trending.keyword,
            searches: trending.searches,
            articles: trending.articles,
        })),
        Err(err @ Error::ProviderUnavailable(_)) => Err(ApiError::from(err).with_status(StatusCode::NOT_FOUND)),
        Err(err) => Err(err.into()),
    }
}

pub async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "Not found.")
}
