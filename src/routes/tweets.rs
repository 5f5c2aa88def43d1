use axum::{
    Router,
    extract::{Path, Query, State},
    routing::{get, patch, post},
};
use std::sync::Arc;

use super::auth::AuthUser;
use super::{ContentBody, EmptyData, JsonBody};
use crate::AppState;
use crate::domain::models::{Tweet, WithOwner};
use crate::domain::pagination::Page;
use crate::domain::query::PageRequest;
use crate::domain::tweets;
use crate::services::error::ApiError;
use crate::services::response::ApiResponse;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tweets", post(create_tweet))
        .route("/tweets/user/{user_id}", get(user_tweets))
        .route("/tweets/{tweet_id}", patch(update_tweet).delete(delete_tweet))
}

/// POST /tweets
async fn create_tweet(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    JsonBody(body): JsonBody<ContentBody>,
) -> Result<ApiResponse<Tweet>, ApiError> {
    let tweet = tweets::create(state.store.as_ref(), &principal, &body.content).await?;
    Ok(ApiResponse::created(tweet, "Tweet created successfully"))
}

/// GET /tweets/user/{user_id} - an empty page when the user has no tweets
async fn user_tweets(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(req): Query<PageRequest>,
) -> Result<ApiResponse<Page<WithOwner<Tweet>>>, ApiError> {
    let page = tweets::list_for_user(state.store.as_ref(), &user_id, &req, state.max_page_size).await?;
    Ok(ApiResponse::ok(page, "Tweets fetched successfully"))
}

/// PATCH /tweets/{tweet_id}
async fn update_tweet(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(tweet_id): Path<String>,
    JsonBody(body): JsonBody<ContentBody>,
) -> Result<ApiResponse<Tweet>, ApiError> {
    let tweet = tweets::update_owned(state.store.as_ref(), &tweet_id, &principal, &body.content).await?;
    Ok(ApiResponse::ok(tweet, "Tweet updated successfully"))
}

/// DELETE /tweets/{tweet_id}
async fn delete_tweet(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(tweet_id): Path<String>,
) -> Result<ApiResponse<EmptyData>, ApiError> {
    tweets::delete_owned(state.store.as_ref(), &tweet_id, &principal).await?;
    Ok(ApiResponse::ok(EmptyData {}, "Tweet deleted successfully"))
}
