//! Serves uploads kept on local disk. Bucket-backed uploads are fetched
//! from their public URL instead, so this route 404s for them.

use axum::{
    Router,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
};
use std::sync::Arc;

use crate::AppState;
use crate::services::error::ApiError;
use crate::services::media::content_type_for;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/media/{*path}", get(serve_file))
}

async fn serve_file(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // Path traversal protection
    if path.contains("..") || path.contains('\0') || path.starts_with('/') {
        return Err(ApiError::Forbidden);
    }

    let not_found = || ApiError::NotFound("File not found".to_string());
    let root = state.media.local_root().ok_or_else(not_found)?;

    let canonical = root.join(&path).canonicalize().map_err(|_| not_found())?;
    let root_canonical = root.canonicalize().map_err(|_| not_found())?;
    if !canonical.starts_with(&root_canonical) {
        return Err(ApiError::Forbidden);
    }

    let bytes = tokio::fs::read(&canonical).await.map_err(|_| not_found())?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&path))], bytes))
}
