//! In-memory store for local development and tests.
//!
//! Evaluates the same filters and sorts as the Postgres store. All state
//! sits behind one mutex, so each conditional mutation is atomic.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Listing, Store, StoreError};
use crate::domain::models::{Comment, NewVideo, Owner, Tweet, User, Video, VideoPatch, WithOwner};
use crate::domain::query::{CommentFilter, Direction, Scope, Sort, SortField, TweetFilter, VideoFilter};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    videos: HashMap<Uuid, Video>,
    comments: HashMap<Uuid, Comment>,
    tweets: HashMap<Uuid, Tweet>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    calls: AtomicUsize,
}

/// Common accessors for sorting and joining stored rows
trait Row: Clone {
    fn id(&self) -> Uuid;
    fn owner_id(&self) -> Uuid;
    fn created_at(&self) -> DateTime<Utc>;
    fn updated_at(&self) -> DateTime<Utc>;

    fn compare(&self, other: &Self, field: SortField) -> Ordering {
        match field {
            SortField::UpdatedAt => self.updated_at().cmp(&other.updated_at()),
            _ => self.created_at().cmp(&other.created_at()),
        }
    }
}

impl Row for Video {
    fn id(&self) -> Uuid {
        self.id
    }
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn compare(&self, other: &Self, field: SortField) -> Ordering {
        match field {
            SortField::Title => self
                .title
                .to_lowercase()
                .cmp(&other.title.to_lowercase())
                .then_with(|| self.title.cmp(&other.title)),
            SortField::Duration => self.duration.total_cmp(&other.duration),
            SortField::UpdatedAt => self.updated_at.cmp(&other.updated_at),
            SortField::CreatedAt => self.created_at.cmp(&other.created_at),
        }
    }
}

impl Row for Comment {
    fn id(&self) -> Uuid {
        self.id
    }
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Row for Tweet {
    fn id(&self) -> Uuid {
        self.id
    }
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Inner-join `row` with its owner; rows whose owner is gone drop out.
fn join<T: Row>(users: &HashMap<Uuid, User>, row: &T) -> Option<WithOwner<T>> {
    users.get(&row.owner_id()).map(|user| WithOwner {
        item: row.clone(),
        owner: Owner::from(user),
    })
}

/// Filter, join, sort (with the id tie-break) and slice.
fn select<'a, T: Row + 'a>(
    users: &HashMap<Uuid, User>,
    rows: impl Iterator<Item = &'a T>,
    keep: impl Fn(&T) -> bool,
    sort: Sort,
    offset: u64,
    limit: u64,
) -> Listing<T> {
    let mut matched: Vec<WithOwner<T>> = rows.filter(|r| keep(*r)).filter_map(|r| join(users, r)).collect();
    matched.sort_by(|a, b| {
        let ordering = a
            .item
            .compare(&b.item, sort.field)
            .then_with(|| a.item.id().cmp(&b.item.id()));
        match sort.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    });

    let total = matched.len() as u64;
    let items = matched
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();
    (items, total)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Users are owned by an external service; this stands in for it.
    pub fn seed_user(&self, user: User) {
        self.tables().users.insert(user.id, user);
    }

    #[cfg(test)]
    pub fn remove_user(&self, id: Uuid) {
        self.tables().users.remove(&id);
    }

    /// Number of storage operations served so far
    pub fn calls(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn track(&self) -> MutexGuard<'_, Tables> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.tables()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_video(&self, owner_id: Uuid, video: NewVideo) -> Result<Video, StoreError> {
        let mut tables = self.track();
        let now = Utc::now();
        let video = Video {
            id: Uuid::new_v4(),
            video_file: video.video_file,
            thumbnail: video.thumbnail,
            title: video.title,
            description: video.description,
            duration: video.duration,
            owner_id,
            is_public: false,
            created_at: now,
            updated_at: now,
        };
        tables.videos.insert(video.id, video.clone());
        Ok(video)
    }

    async fn find_video(&self, id: Uuid, scope: Scope) -> Result<Option<WithOwner<Video>>, StoreError> {
        let tables = self.track();
        Ok(tables
            .videos
            .get(&id)
            .filter(|video| scope.admits(video))
            .and_then(|video| join(&tables.users, video)))
    }

    async fn list_videos(
        &self,
        filter: &VideoFilter,
        sort: Sort,
        offset: u64,
        limit: u64,
    ) -> Result<Listing<Video>, StoreError> {
        let tables = self.track();
        Ok(select(
            &tables.users,
            tables.videos.values(),
            |video| filter.matches(video),
            sort,
            offset,
            limit,
        ))
    }

    async fn update_video_owned(
        &self,
        id: Uuid,
        owner_id: Uuid,
        patch: &VideoPatch,
    ) -> Result<Option<Video>, StoreError> {
        let mut tables = self.track();
        Ok(tables
            .videos
            .get_mut(&id)
            .filter(|video| video.owner_id == owner_id)
            .map(|video| {
                patch.apply(video);
                video.updated_at = Utc::now();
                video.clone()
            }))
    }

    async fn delete_video_owned(&self, id: Uuid, owner_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.track();
        let owned = tables.videos.get(&id).is_some_and(|video| video.owner_id == owner_id);
        if !owned {
            return Ok(false);
        }
        tables.videos.remove(&id);
        tables.comments.retain(|_, comment| comment.video_id != id);
        Ok(true)
    }

    async fn toggle_video_public(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Video>, StoreError> {
        let mut tables = self.track();
        Ok(tables
            .videos
            .get_mut(&id)
            .filter(|video| video.owner_id == owner_id)
            .map(|video| {
                video.is_public = !video.is_public;
                video.updated_at = Utc::now();
                video.clone()
            }))
    }

    async fn insert_comment(
        &self,
        video_id: Uuid,
        scope: Scope,
        owner_id: Uuid,
        content: &str,
    ) -> Result<Option<Comment>, StoreError> {
        let mut tables = self.track();
        let visible = tables
            .videos
            .get(&video_id)
            .is_some_and(|video| scope.admits(video) && tables.users.contains_key(&video.owner_id));
        if !visible {
            return Ok(None);
        }

        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            content: content.to_string(),
            video_id,
            owner_id,
            created_at: now,
            updated_at: now,
        };
        tables.comments.insert(comment.id, comment.clone());
        Ok(Some(comment))
    }

    async fn list_comments(
        &self,
        filter: &CommentFilter,
        sort: Sort,
        offset: u64,
        limit: u64,
    ) -> Result<Listing<Comment>, StoreError> {
        let tables = self.track();
        Ok(select(
            &tables.users,
            tables.comments.values(),
            |comment| comment.video_id == filter.video_id,
            sort,
            offset,
            limit,
        ))
    }

    async fn update_comment_owned(
        &self,
        id: Uuid,
        owner_id: Uuid,
        content: &str,
    ) -> Result<Option<Comment>, StoreError> {
        let mut tables = self.track();
        Ok(tables
            .comments
            .get_mut(&id)
            .filter(|comment| comment.owner_id == owner_id)
            .map(|comment| {
                comment.content = content.to_string();
                comment.updated_at = Utc::now();
                comment.clone()
            }))
    }

    async fn delete_comment_owned(&self, id: Uuid, owner_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.track();
        let owned = tables.comments.get(&id).is_some_and(|c| c.owner_id == owner_id);
        if owned {
            tables.comments.remove(&id);
        }
        Ok(owned)
    }

    async fn insert_tweet(&self, owner_id: Uuid, content: &str) -> Result<Tweet, StoreError> {
        let mut tables = self.track();
        let now = Utc::now();
        let tweet = Tweet {
            id: Uuid::new_v4(),
            content: content.to_string(),
            owner_id,
            created_at: now,
            updated_at: now,
        };
        tables.tweets.insert(tweet.id, tweet.clone());
        Ok(tweet)
    }

    async fn list_tweets(
        &self,
        filter: &TweetFilter,
        sort: Sort,
        offset: u64,
        limit: u64,
    ) -> Result<Listing<Tweet>, StoreError> {
        let tables = self.track();
        Ok(select(
            &tables.users,
            tables.tweets.values(),
            |tweet| tweet.owner_id == filter.owner_id,
            sort,
            offset,
            limit,
        ))
    }

    async fn update_tweet_owned(&self, id: Uuid, owner_id: Uuid, content: &str) -> Result<Option<Tweet>, StoreError> {
        let mut tables = self.track();
        Ok(tables
            .tweets
            .get_mut(&id)
            .filter(|tweet| tweet.owner_id == owner_id)
            .map(|tweet| {
                tweet.content = content.to_string();
                tweet.updated_at = Utc::now();
                tweet.clone()
            }))
    }

    async fn delete_tweet_owned(&self, id: Uuid, owner_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.track();
        let owned = tables.tweets.get(&id).is_some_and(|t| t.owner_id == owner_id);
        if owned {
            tables.tweets.remove(&id);
        }
        Ok(owned)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn user(username: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{}@example.com", username),
            full_name: format!("{} Fullname", username),
            avatar: None,
            cover_image: Some(format!("https://cdn/{}-cover.png", username)),
            password: "$2b$10$secret-hash".to_string(),
            refresh_token: Some("refresh-token-value".to_string()),
            watch_history: vec![],
        }
    }

    fn new_video(title: &str) -> NewVideo {
        NewVideo {
            title: title.to_string(),
            description: "desc".to_string(),
            video_file: "/media/v.mp4".to_string(),
            thumbnail: "/media/t.png".to_string(),
            duration: 12.0,
        }
    }

    #[tokio::test]
    async fn test_sort_ties_break_on_id() {
        let store = MemoryStore::new();
        let owner = user("ada");
        store.seed_user(owner.clone());

        let mut ids = Vec::new();
        for _ in 0..6 {
            let video = store.insert_video(owner.id, new_video("same")).await.unwrap();
            store.toggle_video_public(video.id, owner.id).await.unwrap();
            ids.push(video.id);
        }

        let filter = VideoFilter {
            scope: Scope::PublicOnly,
            text: None,
            owner: None,
        };
        let sort = Sort {
            field: SortField::Title,
            direction: Direction::Asc,
        };
        let (first, total) = store.list_videos(&filter, sort, 0, 6).await.unwrap();
        let (again, _) = store.list_videos(&filter, sort, 0, 6).await.unwrap();
        assert_eq!(total, 6);
        assert_eq!(first, again);

        ids.sort();
        let listed: Vec<Uuid> = first.iter().map(|v| v.item.id).collect();
        assert_eq!(listed, ids);
    }

    #[tokio::test]
    async fn test_title_sort_ignores_case() {
        let store = MemoryStore::new();
        let owner = user("ken");
        store.seed_user(owner.clone());
        for title in ["b", "A", "C", "a"] {
            let video = store.insert_video(owner.id, new_video(title)).await.unwrap();
            store.toggle_video_public(video.id, owner.id).await.unwrap();
        }

        let filter = VideoFilter {
            scope: Scope::PublicOnly,
            text: None,
            owner: None,
        };
        let sort = Sort {
            field: SortField::Title,
            direction: Direction::Asc,
        };
        let (items, _) = store.list_videos(&filter, sort, 0, 10).await.unwrap();
        let titles: Vec<&str> = items.iter().map(|v| v.item.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "a", "b", "C"]);
    }

    #[tokio::test]
    async fn test_orphaned_rows_drop_out_of_joins() {
        let store = MemoryStore::new();
        let owner = user("grace");
        store.seed_user(owner.clone());
        let tweet = store.insert_tweet(owner.id, "hi").await.unwrap();

        let filter = TweetFilter { owner_id: owner.id };
        let (items, total) = store.list_tweets(&filter, Sort::default(), 0, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].owner.username, "grace");

        store.remove_user(owner.id);
        let (items, total) = store.list_tweets(&filter, Sort::default(), 0, 10).await.unwrap();
        assert_eq!(total, 0);
        assert!(items.is_empty());
        // the tweet itself is not cascaded away
        assert!(store.delete_tweet_owned(tweet.id, owner.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_deleting_video_removes_its_comments() {
        let store = MemoryStore::new();
        let owner = user("linus");
        store.seed_user(owner.clone());
        let video = store.insert_video(owner.id, new_video("v")).await.unwrap();
        let scope = Scope::PublicOrOwnedBy(owner.id);
        assert!(store.insert_comment(video.id, scope, owner.id, "first").await.unwrap().is_some());

        assert!(store.delete_video_owned(video.id, owner.id).await.unwrap());
        let filter = CommentFilter { video_id: video.id };
        let (_, total) = store.list_comments(&filter, Sort::default(), 0, 10).await.unwrap();
        assert_eq!(total, 0);

        let late = store.insert_comment(video.id, scope, owner.id, "too late").await.unwrap();
        assert!(late.is_none());
    }

    #[tokio::test]
    async fn test_calls_are_counted() {
        let store = MemoryStore::new();
        assert_eq!(store.calls(), 0);
        store.insert_tweet(Uuid::new_v4(), "x").await.unwrap();
        store.delete_tweet_owned(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();
        assert_eq!(store.calls(), 2);
    }
}
