//! Storage seam. Every ownership-scoped mutation is a single conditional
//! operation keyed on both the resource id and the owner id, so there is
//! no read-then-write window between the check and the change.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[cfg(test)]
pub(crate) use memory::tests::user as test_user;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::{Comment, NewVideo, Tweet, Video, VideoPatch, WithOwner};
use crate::domain::query::{CommentFilter, Scope, Sort, TweetFilter, VideoFilter};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// One page of joined rows plus the total number of matches
pub type Listing<T> = (Vec<WithOwner<T>>, u64);

#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap round trip used by the health check
    async fn ping(&self) -> Result<(), StoreError>;

    // videos
    async fn insert_video(&self, owner_id: Uuid, video: NewVideo) -> Result<Video, StoreError>;
    async fn find_video(&self, id: Uuid, scope: Scope) -> Result<Option<WithOwner<Video>>, StoreError>;
    async fn list_videos(
        &self,
        filter: &VideoFilter,
        sort: Sort,
        offset: u64,
        limit: u64,
    ) -> Result<Listing<Video>, StoreError>;
    async fn update_video_owned(
        &self,
        id: Uuid,
        owner_id: Uuid,
        patch: &VideoPatch,
    ) -> Result<Option<Video>, StoreError>;
    async fn delete_video_owned(&self, id: Uuid, owner_id: Uuid) -> Result<bool, StoreError>;
    /// Flip `is_public` in one atomic read-modify-write.
    async fn toggle_video_public(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Video>, StoreError>;

    // comments
    /// Insert only if the video exists and `scope` can see it, in one statement.
    async fn insert_comment(
        &self,
        video_id: Uuid,
        scope: Scope,
        owner_id: Uuid,
        content: &str,
    ) -> Result<Option<Comment>, StoreError>;
    async fn list_comments(
        &self,
        filter: &CommentFilter,
        sort: Sort,
        offset: u64,
        limit: u64,
    ) -> Result<Listing<Comment>, StoreError>;
    async fn update_comment_owned(
        &self,
        id: Uuid,
        owner_id: Uuid,
        content: &str,
    ) -> Result<Option<Comment>, StoreError>;
    async fn delete_comment_owned(&self, id: Uuid, owner_id: Uuid) -> Result<bool, StoreError>;

    // tweets
    async fn insert_tweet(&self, owner_id: Uuid, content: &str) -> Result<Tweet, StoreError>;
    async fn list_tweets(
        &self,
        filter: &TweetFilter,
        sort: Sort,
        offset: u64,
        limit: u64,
    ) -> Result<Listing<Tweet>, StoreError>;
    async fn update_tweet_owned(&self, id: Uuid, owner_id: Uuid, content: &str) -> Result<Option<Tweet>, StoreError>;
    async fn delete_tweet_owned(&self, id: Uuid, owner_id: Uuid) -> Result<bool, StoreError>;
}
