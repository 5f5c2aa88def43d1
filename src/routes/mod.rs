pub mod auth;
pub mod comments;
pub mod health;
pub mod media;
pub mod tweets;
pub mod videos;

use axum::{Router, extract::DefaultBodyLimit, extract::FromRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;
use crate::constants::JSON_BODY_LIMIT;
use crate::services::error::ApiError;

/// `Json` whose rejections use the error envelope
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// `{ "content": "..." }`, shared by comments and tweets
#[derive(Debug, Deserialize)]
pub struct ContentBody {
    #[serde(default)]
    pub content: String,
}

/// Serializes as `{}`
#[derive(Debug, Serialize)]
pub struct EmptyData {}

/// Build all routes for the API
pub fn build_routes() -> Router<Arc<AppState>> {
    let api = Router::new()
        .merge(health::routes())
        .merge(videos::routes())
        .merge(comments::routes())
        .merge(tweets::routes())
        .merge(media::routes())
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT));

    Router::new().nest("/api/v1", api)
}
