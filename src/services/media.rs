//! Media storage for uploaded videos and thumbnails.
//!
//! Two backends:
//! - **Local disk**: files under a root directory, served back by the
//!   `/media/{*path}` route
//! - **GCS**: objects in a bucket, addressed by their public URL

use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::Utc;
use google_cloud_storage::client::{Storage, StorageControl};
use thiserror::Error;
use tokio::process::Command;
use uuid::Uuid;

/// URL prefix under which local uploads are served
pub const LOCAL_MEDIA_URL_PREFIX: &str = "/api/v1/media";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bucket request failed: {0}")]
    Upload(String),

    #[error("duration unreadable: {0}")]
    Duration(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Thumbnail,
}

impl MediaKind {
    fn dir(self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Thumbnail => "thumbnail",
        }
    }

    pub fn accepts(self, content_type: &str) -> bool {
        match self {
            MediaKind::Video => content_type.starts_with("video/"),
            MediaKind::Thumbnail => content_type.starts_with("image/"),
        }
    }
}

pub fn get_extension(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "video/x-matroska" => "mkv",
        _ => "bin",
    }
}

pub fn content_type_for(path: &str) -> &'static str {
    match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Path: video/{owner}/2025-12-06/{uuid}.mp4
fn object_path(kind: MediaKind, owner_id: Uuid, content_type: &str) -> String {
    format!(
        "{}/{}/{}/{}.{}",
        kind.dir(),
        owner_id,
        Utc::now().format("%Y-%m-%d"),
        Uuid::new_v4(),
        get_extension(content_type)
    )
}

/// An upload that has been written to storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    path: String,
    pub url: String,
}

#[derive(Clone)]
pub enum MediaStorage {
    Local { root: PathBuf },
    Gcs { client: Storage, control: StorageControl, bucket: String },
}

impl std::fmt::Debug for MediaStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaStorage::Local { root } => f.debug_struct("Local").field("root", root).finish(),
            MediaStorage::Gcs { bucket, .. } => f.debug_struct("Gcs").field("bucket", bucket).finish(),
        }
    }
}

impl MediaStorage {
    pub fn local(root: impl Into<PathBuf>) -> Self {
        MediaStorage::Local { root: root.into() }
    }

    /// Root directory when files are kept on local disk
    pub fn local_root(&self) -> Option<&Path> {
        match self {
            MediaStorage::Local { root } => Some(root),
            MediaStorage::Gcs { .. } => None,
        }
    }

    /// Store an upload. The returned object carries the URL it can be
    /// fetched from.
    pub async fn put(
        &self,
        kind: MediaKind,
        owner_id: Uuid,
        content_type: &str,
        data: Bytes,
    ) -> Result<StoredObject, MediaError> {
        let path = object_path(kind, owner_id, content_type);
        match self {
            MediaStorage::Local { root } => {
                let full_path = root.join(&path);
                if let Some(parent) = full_path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&full_path, &data).await?;
                tracing::debug!(path = %full_path.display(), bytes = data.len(), "stored upload on disk");
                Ok(StoredObject {
                    url: format!("{}/{}", LOCAL_MEDIA_URL_PREFIX, path),
                    path,
                })
            }
            MediaStorage::Gcs { client, bucket, .. } => {
                client
                    .write_object(bucket_path(bucket), &path, data)
                    .send_buffered()
                    .await
                    .map_err(|e| MediaError::Upload(e.to_string()))?;
                Ok(StoredObject {
                    url: format!("https://storage.googleapis.com/{}/{}", bucket, path),
                    path,
                })
            }
        }
    }

    /// Remove an object stored by `put`, when whatever referenced it was never saved.
    pub async fn remove(&self, object: &StoredObject) -> Result<(), MediaError> {
        match self {
            MediaStorage::Local { root } => {
                tokio::fs::remove_file(root.join(&object.path)).await?;
            }
            MediaStorage::Gcs { control, bucket, .. } => {
                control
                    .delete_object()
                    .set_bucket(bucket_path(bucket))
                    .set_object(&object.path)
                    .send()
                    .await
                    .map_err(|e| MediaError::Upload(e.to_string()))?;
            }
        }
        tracing::debug!(path = %object.path, "removed stored upload");
        Ok(())
    }
}

fn bucket_path(bucket: &str) -> String {
    format!("projects/_/buckets/{}", bucket)
}

/// Duration in seconds, read from the container with ffprobe. Falls back
/// to 0 when ffprobe is missing or cannot make sense of the upload.
pub async fn read_duration(data: &[u8], content_type: &str) -> f64 {
    let tmp = std::env::temp_dir().join(format!(
        "vidshare-duration-{}.{}",
        Uuid::new_v4(),
        get_extension(content_type)
    ));

    let result = match tokio::fs::write(&tmp, data).await {
        Ok(()) => container_duration(&tmp).await,
        Err(e) => Err(e.into()),
    };
    if let Err(e) = tokio::fs::remove_file(&tmp).await {
        tracing::debug!(error = %e, path = %tmp.display(), "could not remove duration scratch file");
    }

    match result {
        Ok(duration) => duration,
        Err(e) => {
            tracing::warn!(error = %e, "reading duration failed, recording 0");
            0.0
        }
    }
}

async fn container_duration(path: &Path) -> Result<f64, MediaError> {
    let output = Command::new("ffprobe")
        .args(["-v", "error", "-show_entries", "format=duration", "-of", "default=noprint_wrappers=1:nokey=1"])
        .arg(path)
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::Duration(String::from_utf8_lossy(&output.stderr).trim().to_string()));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_duration(&stdout).ok_or_else(|| MediaError::Duration(format!("unexpected output {:?}", stdout.trim())))
}

fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .find_map(|line| line.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
}
