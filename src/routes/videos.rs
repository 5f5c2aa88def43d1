//! Video endpoints. Publish and update take multipart forms.

use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State, multipart::Field},
    routing::{get, patch},
};
use std::sync::Arc;

use super::EmptyData;
use super::auth::{AuthUser, MaybeUser};
use crate::AppState;
use crate::constants::MAX_UPLOAD_SIZE;
use crate::domain::id::parse_id;
use crate::domain::models::{Video, WithOwner};
use crate::domain::pagination::Page;
use crate::domain::query::PageRequest;
use crate::domain::videos::{self, StoredMedia, VideoDetails};
use crate::domain::{Error, Principal, Resource};
use crate::services::error::{ApiError, LogErr};
use crate::services::media::{self, MediaKind, StoredObject};
use crate::services::response::ApiResponse;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/videos",
            get(list_videos)
                .post(publish_video)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE)),
        )
        .route(
            "/videos/{video_id}",
            get(get_video)
                .patch(update_video)
                .delete(delete_video)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE)),
        )
        .route("/videos/toggle/publish/{video_id}", patch(toggle_publish))
}

/// A file part of a multipart form
struct Upload {
    content_type: String,
    data: Bytes,
}

impl Upload {
    async fn read(field: Field<'_>) -> Result<Self, ApiError> {
        let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
        let data = field.bytes().await?;
        Ok(Self { content_type, data })
    }

    fn check(&self, kind: MediaKind) -> Result<(), Error> {
        if !kind.accepts(&self.content_type) {
            let message = match kind {
                MediaKind::Video => "Video file must be a video",
                MediaKind::Thumbnail => "Thumbnail must be an image",
            };
            return Err(Error::validation(message));
        }
        if self.data.is_empty() {
            return Err(Error::validation("Uploaded file is empty"));
        }
        Ok(())
    }
}

#[derive(Default)]
struct VideoForm {
    title: Option<String>,
    description: Option<String>,
    video_file: Option<Upload>,
    thumbnail: Option<Upload>,
}

impl VideoForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = VideoForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "title" => form.title = Some(field.text().await?),
                "description" => form.description = Some(field.text().await?),
                "videoFile" => form.video_file = Some(Upload::read(field).await?),
                "thumbnail" => form.thumbnail = Some(Upload::read(field).await?),
                other => tracing::debug!(field = other, "ignoring unknown form field"),
            }
        }
        Ok(form)
    }
}

async fn store_upload(
    state: &AppState,
    kind: MediaKind,
    principal: &Principal,
    upload: Upload,
) -> Result<StoredObject, ApiError> {
    state
        .media
        .put(kind, principal.user_id, &upload.content_type, upload.data)
        .await
        .log_500("storing upload failed")
}

/// Remove uploads that no saved video references. Failures are only logged.
async fn discard_uploads(state: &AppState, objects: &[&StoredObject]) {
    for object in objects {
        if let Err(e) = state.media.remove(object).await {
            tracing::error!(error = %e, url = %object.url, "failed to remove orphaned upload");
        }
    }
}

/// GET /videos - visible videos, newest first by default
async fn list_videos(
    State(state): State<Arc<AppState>>,
    MaybeUser(viewer): MaybeUser,
    Query(req): Query<PageRequest>,
) -> Result<ApiResponse<Page<WithOwner<Video>>>, ApiError> {
    let page = videos::list(state.store.as_ref(), &req, viewer.as_ref(), state.max_page_size).await?;
    Ok(ApiResponse::ok(page, "Videos fetched successfully"))
}

/// POST /videos - publish a new (private) video
async fn publish_video(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    multipart: Multipart,
) -> Result<ApiResponse<Video>, ApiError> {
    let form = VideoForm::read(multipart).await?;

    let details = VideoDetails::new(
        form.title.as_deref().unwrap_or_default(),
        form.description.as_deref().unwrap_or_default(),
    )?;
    let video_file = form
        .video_file
        .ok_or_else(|| Error::validation("Video file is required"))?;
    let thumbnail = form
        .thumbnail
        .ok_or_else(|| Error::validation("Thumbnail is required"))?;
    video_file.check(MediaKind::Video)?;
    thumbnail.check(MediaKind::Thumbnail)?;

    let duration = media::read_duration(&video_file.data, &video_file.content_type).await;
    let video_object = store_upload(&state, MediaKind::Video, &principal, video_file).await?;
    let thumbnail_object = match store_upload(&state, MediaKind::Thumbnail, &principal, thumbnail).await {
        Ok(object) => object,
        Err(e) => {
            discard_uploads(&state, &[&video_object]).await;
            return Err(e);
        }
    };

    let media = StoredMedia {
        video_file: video_object.url.clone(),
        thumbnail: thumbnail_object.url.clone(),
        duration,
    };
    match videos::create(state.store.as_ref(), &principal, details, media).await {
        Ok(video) => Ok(ApiResponse::created(video, "Video published successfully")),
        Err(e) => {
            discard_uploads(&state, &[&video_object, &thumbnail_object]).await;
            Err(e.into())
        }
    }
}

/// GET /videos/{video_id}
async fn get_video(
    State(state): State<Arc<AppState>>,
    MaybeUser(viewer): MaybeUser,
    Path(video_id): Path<String>,
) -> Result<ApiResponse<WithOwner<Video>>, ApiError> {
    let video = videos::find_by_id(state.store.as_ref(), &video_id, viewer.as_ref()).await?;
    Ok(ApiResponse::ok(video, "Video fetched successfully"))
}

/// PATCH /videos/{video_id} - title, description and/or a new thumbnail
async fn update_video(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(video_id): Path<String>,
    multipart: Multipart,
) -> Result<ApiResponse<Video>, ApiError> {
    // Reject a bad id before anything is uploaded
    parse_id(&video_id, Resource::Video)?;
    let form = VideoForm::read(multipart).await?;

    let thumbnail = match form.thumbnail {
        Some(upload) => {
            upload.check(MediaKind::Thumbnail)?;
            videos::ensure_owned(state.store.as_ref(), &video_id, &principal).await?;
            Some(store_upload(&state, MediaKind::Thumbnail, &principal, upload).await?)
        }
        None => None,
    };

    let patch = videos::patch(
        form.title.as_deref(),
        form.description.as_deref(),
        thumbnail.as_ref().map(|object| object.url.clone()),
    );
    match videos::update_owned(state.store.as_ref(), &video_id, &principal, patch).await {
        Ok(video) => Ok(ApiResponse::ok(video, "Video updated successfully")),
        Err(e) => {
            if let Some(object) = &thumbnail {
                discard_uploads(&state, &[object]).await;
            }
            Err(e.into())
        }
    }
}

/// DELETE /videos/{video_id}
async fn delete_video(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(video_id): Path<String>,
) -> Result<ApiResponse<EmptyData>, ApiError> {
    videos::delete_owned(state.store.as_ref(), &video_id, &principal).await?;
    Ok(ApiResponse::ok(EmptyData {}, "Video deleted successfully"))
}

/// PATCH /videos/toggle/publish/{video_id} - returns the video in its new state
async fn toggle_publish(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(video_id): Path<String>,
) -> Result<ApiResponse<Video>, ApiError> {
    let video = videos::toggle_public(state.store.as_ref(), &video_id, &principal).await?;
    Ok(ApiResponse::ok(video, "Publish status toggled successfully"))
}
