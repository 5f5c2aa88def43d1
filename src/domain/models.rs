//! Resource models shared by the store, the domain and the routes

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgRow;
use uuid::Uuid;

/// An uploaded video. New videos start private.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    /// Seconds, read from the uploaded file
    pub duration: f64,
    pub owner_id: Uuid,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub content: String,
    pub video_id: Uuid,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A short text post
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tweet {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub content: String,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full user record. Never serialized; responses only ever see [`Owner`].
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub password: String,
    pub refresh_token: Option<String>,
    pub watch_history: Vec<Uuid>,
}

/// Redacted owner projection joined into list and detail responses.
///
/// Reads the `owner_*` columns produced by the owner join.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Owner {
    #[serde(rename = "_id")]
    #[sqlx(rename = "owner_id")]
    pub id: Uuid,
    #[sqlx(rename = "owner_username")]
    pub username: String,
    #[sqlx(rename = "owner_avatar")]
    pub avatar: Option<String>,
}

impl From<&User> for Owner {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

/// A resource with its owner joined in
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithOwner<T> {
    #[serde(flatten)]
    pub item: T,
    pub owner: Owner,
}

impl<'r, T> sqlx::FromRow<'r, PgRow> for WithOwner<T>
where
    T: sqlx::FromRow<'r, PgRow>,
{
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            item: T::from_row(row)?,
            owner: Owner::from_row(row)?,
        })
    }
}

/// Fields of a video about to be inserted
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub title: String,
    pub description: String,
    pub video_file: String,
    pub thumbnail: String,
    pub duration: f64,
}

/// Partial update of a video; `None` leaves the field untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
}

impl VideoPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.thumbnail.is_none()
    }

    pub fn apply(&self, video: &mut Video) {
        if let Some(title) = &self.title {
            video.title = title.clone();
        }
        if let Some(description) = &self.description {
            video.description = description.clone();
        }
        if let Some(thumbnail) = &self.thumbnail {
            video.thumbnail = thumbnail.clone();
        }
    }
}
