use axum::{
    Router,
    extract::{Path, Query, State},
    routing::get,
};
use std::sync::Arc;

use super::auth::{AuthUser, MaybeUser};
use super::{ContentBody, EmptyData, JsonBody};
use crate::AppState;
use crate::domain::comments;
use crate::domain::models::{Comment, WithOwner};
use crate::domain::pagination::Page;
use crate::domain::query::PageRequest;
use crate::services::error::ApiError;
use crate::services::response::ApiResponse;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/comments/{video_id}", get(list_comments).post(add_comment))
        .route("/comments/c/{comment_id}", axum::routing::patch(update_comment).delete(delete_comment))
}

/// GET /comments/{video_id}
async fn list_comments(
    State(state): State<Arc<AppState>>,
    MaybeUser(viewer): MaybeUser,
    Path(video_id): Path<String>,
    Query(req): Query<PageRequest>,
) -> Result<ApiResponse<Page<WithOwner<Comment>>>, ApiError> {
    let page = comments::list_for_video(
        state.store.as_ref(),
        &video_id,
        viewer.as_ref(),
        &req,
        state.max_page_size,
    )
    .await?;
    Ok(ApiResponse::ok(page, "Comments fetched successfully"))
}

/// POST /comments/{video_id}
async fn add_comment(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(video_id): Path<String>,
    JsonBody(body): JsonBody<ContentBody>,
) -> Result<ApiResponse<Comment>, ApiError> {
    let comment = comments::add(state.store.as_ref(), &video_id, &principal, &body.content).await?;
    Ok(ApiResponse::created(comment, "Comment added successfully"))
}

/// PATCH /comments/c/{comment_id}
async fn update_comment(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(comment_id): Path<String>,
    JsonBody(body): JsonBody<ContentBody>,
) -> Result<ApiResponse<Comment>, ApiError> {
    let comment = comments::update_owned(state.store.as_ref(), &comment_id, &principal, &body.content).await?;
    Ok(ApiResponse::ok(comment, "Comment updated successfully"))
}

/// DELETE /comments/c/{comment_id}
async fn delete_comment(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(comment_id): Path<String>,
) -> Result<ApiResponse<EmptyData>, ApiError> {
    comments::delete_owned(state.store.as_ref(), &comment_id, &principal).await?;
    Ok(ApiResponse::ok(EmptyData {}, "Comment deleted successfully"))
}
