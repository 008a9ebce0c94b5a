//! Route handlers. Each one is a thin adapter over an [`App`] method.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Path, Query, Request, State},
    http::StatusCode,
    Json,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;

use super::error::ApiError;
use crate::app::{App, Board, RefreshReport};
use crate::feed::{AggregatedArticle, ParsedFeed};
use crate::insight::{Analysis, Briefing, BriefingArticle, Summary, SummaryRequest};
use crate::storage::Subscription;

/// JSON body extractor whose rejections use the API error shape.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e)))?;
        Ok(ApiJson(value))
    }
}

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeBody {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BriefingBody {
    pub articles: Option<Vec<BriefingArticle>>,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeBody {
    pub url: Option<String>,
}

/// GET /api/feed?url=
pub async fn lookup_feed(
    State(app): State<Arc<App>>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<ParsedFeed>, ApiError> {
    let url = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("URL is required"))?;

    let feed = app.lookup_feed(url.trim(), &app.cancel_token()).await?;
    Ok(Json(feed))
}

/// POST /api/analyze
pub async fn analyze(
    State(app): State<Arc<App>>,
    ApiJson(body): ApiJson<AnalyzeBody>,
) -> Result<Json<Analysis>, ApiError> {
    let content = body
        .content
        .ok_or_else(|| ApiError::bad_request("Content is required"))?;

    let analysis = app.analyze(&content, &app.cancel_token()).await?;
    Ok(Json(analysis))
}

/// POST /api/summarize
pub async fn summarize(
    State(app): State<Arc<App>>,
    ApiJson(request): ApiJson<SummaryRequest>,
) -> Result<Json<Summary>, ApiError> {
    let summary = app.summarize(&request, &app.cancel_token()).await?;
    Ok(Json(summary))
}

/// POST /api/briefing
pub async fn briefing(
    State(app): State<Arc<App>>,
    ApiJson(body): ApiJson<BriefingBody>,
) -> Result<Json<Briefing>, ApiError> {
    let articles = body
        .articles
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ApiError::bad_request("No articles provided"))?;

    app.briefing(&articles, &app.cancel_token())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::bad_request("No articles provided"))
}

/// GET /api/subscriptions
pub async fn list_subscriptions(State(app): State<Arc<App>>) -> Json<Vec<Subscription>> {
    Json(app.subscriptions().await)
}

/// POST /api/subscriptions
pub async fn add_subscription(
    State(app): State<Arc<App>>,
    ApiJson(body): ApiJson<SubscribeBody>,
) -> Result<(StatusCode, Json<Subscription>), ApiError> {
    let url = body
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("URL is required"))?;

    let subscription = app.subscribe(&url, &app.cancel_token()).await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

/// DELETE /api/subscriptions/:id
///
/// Unknown ids succeed as well.
pub async fn remove_subscription(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    app.unsubscribe(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/refresh
pub async fn refresh(State(app): State<Arc<App>>) -> Json<RefreshReport> {
    Json(app.refresh(&app.cancel_token()).await)
}

/// GET /api/articles
pub async fn articles(State(app): State<Arc<App>>) -> Json<Vec<AggregatedArticle>> {
    let Board { articles, .. } = app.board().await;
    Json(articles)
}
