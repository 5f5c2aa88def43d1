//! Video repository

use super::id::parse_id;
use super::models::{NewVideo, Video, VideoPatch, WithOwner};
use super::pagination::{Page, paginate};
use super::query::{self, PageRequest, Scope};
use super::{Error, Principal, Resource, Result, optional_text, required_text};
use crate::store::Store;

/// Title and description, trimmed and known to be non-empty
#[derive(Debug, Clone, PartialEq)]
pub struct VideoDetails {
    title: String,
    description: String,
}

impl VideoDetails {
    pub fn new(title: &str, description: &str) -> Result<Self> {
        let message = "Title and description are required";
        Ok(Self {
            title: required_text(title, message)?,
            description: required_text(description, message)?,
        })
    }
}

/// Where the uploaded files ended up, and what probing found
#[derive(Debug, Clone)]
pub struct StoredMedia {
    pub video_file: String,
    pub thumbnail: String,
    pub duration: f64,
}

/// Create a private video owned by `principal`.
pub async fn create(
    store: &dyn Store,
    principal: &Principal,
    details: VideoDetails,
    media: StoredMedia,
) -> Result<Video> {
    let video = store
        .insert_video(
            principal.user_id,
            NewVideo {
                title: details.title,
                description: details.description,
                video_file: media.video_file,
                thumbnail: media.thumbnail,
                duration: media.duration,
            },
        )
        .await?;
    tracing::info!(video_id = %video.id, owner_id = %principal.user_id, "video published");
    Ok(video)
}

/// Public videos are visible to anyone, private ones only to their owner.
pub async fn find_by_id(store: &dyn Store, id: &str, viewer: Option<&Principal>) -> Result<WithOwner<Video>> {
    let id = parse_id(id, Resource::Video)?;
    store
        .find_video(id, Scope::for_viewer(viewer))
        .await?
        .ok_or(Error::NotFound(Resource::Video))
}

pub async fn list(
    store: &dyn Store,
    req: &PageRequest,
    viewer: Option<&Principal>,
    max_limit: u64,
) -> Result<Page<WithOwner<Video>>> {
    let plan = query::video_list(req, viewer, max_limit)?;
    let page = paginate(plan.window, |offset, limit| {
        store.list_videos(&plan.filter, plan.sort, offset, limit)
    })
    .await?;
    Ok(page)
}

/// Build a patch from optional form fields; blanks are ignored.
pub fn patch(title: Option<&str>, description: Option<&str>, thumbnail: Option<String>) -> VideoPatch {
    VideoPatch {
        title: optional_text(title),
        description: optional_text(description),
        thumbnail,
    }
}

/// Fails unless `principal` owns the video. Lets callers refuse before doing
/// side work such as storing a new thumbnail; the owner-scoped write that
/// follows still decides.
pub async fn ensure_owned(store: &dyn Store, id: &str, principal: &Principal) -> Result<()> {
    let id = parse_id(id, Resource::Video)?;
    match store.find_video(id, Scope::PublicOrOwnedBy(principal.user_id)).await? {
        Some(found) if found.item.owner_id == principal.user_id => Ok(()),
        _ => Err(Error::NotFoundOrUnauthorized(Resource::Video)),
    }
}

pub async fn update_owned(store: &dyn Store, id: &str, principal: &Principal, patch: VideoPatch) -> Result<Video> {
    let id = parse_id(id, Resource::Video)?;
    if patch.is_empty() {
        return Err(Error::validation("Nothing to update"));
    }
    store
        .update_video_owned(id, principal.user_id, &patch)
        .await?
        .ok_or(Error::NotFoundOrUnauthorized(Resource::Video))
}

pub async fn delete_owned(store: &dyn Store, id: &str, principal: &Principal) -> Result<()> {
    let id = parse_id(id, Resource::Video)?;
    if !store.delete_video_owned(id, principal.user_id).await? {
        return Err(Error::NotFoundOrUnauthorized(Resource::Video));
    }
    tracing::info!(video_id = %id, "video deleted");
    Ok(())
}

/// Flip visibility and return the video in its new state.
pub async fn toggle_public(store: &dyn Store, id: &str, principal: &Principal) -> Result<Video> {
    let id = parse_id(id, Resource::Video)?;
    store
        .toggle_video_public(id, principal.user_id)
        .await?
        .ok_or(Error::NotFoundOrUnauthorized(Resource::Video))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, test_user};

    fn media() -> StoredMedia {
        StoredMedia {
            video_file: "/media/video/a.mp4".to_string(),
            thumbnail: "/media/thumbnail/a.png".to_string(),
            duration: 42.5,
        }
    }

    async fn setup() -> (MemoryStore, Principal, Video) {
        let store = MemoryStore::new();
        let user = test_user("u1");
        store.seed_user(user.clone());
        let owner = Principal::new(user.id);
        let video = create(&store, &owner, VideoDetails::new("A", "B").unwrap(), media())
            .await
            .unwrap();
        (store, owner, video)
    }

    fn stranger(store: &MemoryStore) -> Principal {
        let user = test_user("u2");
        store.seed_user(user.clone());
        Principal::new(user.id)
    }

    #[test]
    fn test_details_require_text() {
        assert!(VideoDetails::new("  ", "desc").is_err());
        assert!(VideoDetails::new("title", "\n").is_err());
        let details = VideoDetails::new(" A ", " B ").unwrap();
        assert_eq!(details.title, "A");
        assert_eq!(details.description, "B");
    }

    #[tokio::test]
    async fn test_new_video_is_private_and_listed_only_for_owner() {
        let (store, owner, video) = setup().await;
        assert!(!video.is_public);
        assert_eq!(video.title, "A");
        assert_eq!(video.duration, 42.5);

        let req = PageRequest::default();
        let anonymous = list(&store, &req, None, 50).await.unwrap();
        assert!(anonymous.items.is_empty());
        assert_eq!(anonymous.total_items, 0);

        let mine = list(&store, &req, Some(&owner), 50).await.unwrap();
        assert_eq!(mine.items.len(), 1);
        assert_eq!(mine.items[0].item.id, video.id);
        assert_eq!(mine.items[0].owner.username, "u1");

        let other = stranger(&store);
        assert!(list(&store, &req, Some(&other), 50).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn test_find_by_id_respects_visibility() {
        let (store, owner, video) = setup().await;
        let id = video.id.to_string();

        assert!(matches!(
            find_by_id(&store, &id, None).await,
            Err(Error::NotFound(Resource::Video))
        ));
        assert_eq!(find_by_id(&store, &id, Some(&owner)).await.unwrap().item.id, video.id);

        toggle_public(&store, &id, &owner).await.unwrap();
        assert!(find_by_id(&store, &id, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_visibility() {
        let (store, owner, video) = setup().await;
        let id = video.id.to_string();

        let toggled = toggle_public(&store, &id, &owner).await.unwrap();
        assert!(toggled.is_public);
        let back = toggle_public(&store, &id, &owner).await.unwrap();
        assert_eq!(back.is_public, video.is_public);
    }

    #[tokio::test]
    async fn test_non_owner_gets_collapsed_error() {
        let (store, _owner, video) = setup().await;
        let other = stranger(&store);
        let id = video.id.to_string();
        let missing = uuid::Uuid::new_v4().to_string();

        for target in [&id, &missing] {
            let update = update_owned(&store, target, &other, patch(Some("x"), None, None)).await;
            assert!(matches!(update, Err(Error::NotFoundOrUnauthorized(Resource::Video))));
            let delete = delete_owned(&store, target, &other).await;
            assert!(matches!(delete, Err(Error::NotFoundOrUnauthorized(Resource::Video))));
            let toggle = toggle_public(&store, target, &other).await;
            assert!(matches!(toggle, Err(Error::NotFoundOrUnauthorized(Resource::Video))));
        }
    }

    #[tokio::test]
    async fn test_ensure_owned_matches_owner_scoped_writes() {
        let (store, owner, video) = setup().await;
        let id = video.id.to_string();
        ensure_owned(&store, &id, &owner).await.unwrap();

        // Public but someone else's
        toggle_public(&store, &id, &owner).await.unwrap();
        let other = stranger(&store);
        assert!(matches!(
            ensure_owned(&store, &id, &other).await,
            Err(Error::NotFoundOrUnauthorized(Resource::Video))
        ));
        let missing = uuid::Uuid::new_v4().to_string();
        assert!(matches!(
            ensure_owned(&store, &missing, &owner).await,
            Err(Error::NotFoundOrUnauthorized(Resource::Video))
        ));
    }

    #[tokio::test]
    async fn test_malformed_ids_never_reach_storage() {
        let (store, owner, _video) = setup().await;
        let before = store.calls();

        for bad in ["", "abc", "65f1c0ffee0000000000abcd", "../etc/passwd"] {
            assert!(matches!(find_by_id(&store, bad, Some(&owner)).await, Err(Error::Validation(_))));
            assert!(matches!(
                update_owned(&store, bad, &owner, patch(Some("t"), None, None)).await,
                Err(Error::Validation(_))
            ));
            assert!(matches!(delete_owned(&store, bad, &owner).await, Err(Error::Validation(_))));
            assert!(matches!(toggle_public(&store, bad, &owner).await, Err(Error::Validation(_))));
        }

        let mut req = PageRequest::default();
        req.user_id = Some("not-a-user".to_string());
        assert!(matches!(list(&store, &req, None, 50).await, Err(Error::Validation(_))));

        assert_eq!(store.calls(), before);
    }

    #[tokio::test]
    async fn test_update_applies_trimmed_fields_only() {
        let (store, owner, video) = setup().await;
        let id = video.id.to_string();

        let nothing = update_owned(&store, &id, &owner, patch(Some("  "), None, None)).await;
        assert!(matches!(nothing, Err(Error::Validation(msg)) if msg == "Nothing to update"));

        let updated = update_owned(&store, &id, &owner, patch(Some(" New "), Some(""), None))
            .await
            .unwrap();
        assert_eq!(updated.title, "New");
        assert_eq!(updated.description, "B");
    }

    #[tokio::test]
    async fn test_owner_can_delete() {
        let (store, owner, video) = setup().await;
        let id = video.id.to_string();
        delete_owned(&store, &id, &owner).await.unwrap();
        assert!(matches!(
            find_by_id(&store, &id, Some(&owner)).await,
            Err(Error::NotFound(Resource::Video))
        ));
    }

    #[tokio::test]
    async fn test_pagination_over_25_videos() {
        let store = MemoryStore::new();
        let user = test_user("bulk");
        store.seed_user(user.clone());
        let owner = Principal::new(user.id);
        for i in 0..25 {
            let details = VideoDetails::new(&format!("video {}", i), "d").unwrap();
            let video = create(&store, &owner, details, media()).await.unwrap();
            toggle_public(&store, &video.id.to_string(), &owner).await.unwrap();
        }

        let req = PageRequest {
            page: Some("1".to_string()),
            limit: Some("10".to_string()),
            ..Default::default()
        };
        let page = list(&store, &req, None, 50).await.unwrap();
        assert_eq!(page.total_items, 25);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page, 1);
        assert_eq!(page.items.len(), 10);

        let req = PageRequest {
            page: Some("3".to_string()),
            limit: Some("10".to_string()),
            ..Default::default()
        };
        assert_eq!(list(&store, &req, None, 50).await.unwrap().items.len(), 5);

        let req = PageRequest {
            limit: Some("500".to_string()),
            ..Default::default()
        };
        let capped = list(&store, &req, None, 20).await.unwrap();
        assert_eq!(capped.limit, 20);
        assert_eq!(capped.items.len(), 20);
    }

    #[tokio::test]
    async fn test_page_far_past_the_end_is_empty() {
        let (store, owner, _video) = setup().await;
        let req = PageRequest {
            page: Some(i64::MAX.to_string()),
            ..Default::default()
        };
        let page = list(&store, &req, Some(&owner), 50).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total_items, 1);
        assert!(!page.has_next_page);
    }

    #[tokio::test]
    async fn test_text_search_matches_title_or_description() {
        let (store, owner, video) = setup().await;
        toggle_public(&store, &video.id.to_string(), &owner).await.unwrap();
        let details = VideoDetails::new("Cooking", "pasta night").unwrap();
        let second = create(&store, &owner, details, media()).await.unwrap();
        toggle_public(&store, &second.id.to_string(), &owner).await.unwrap();

        let req = PageRequest {
            query: Some("PASTA".to_string()),
            ..Default::default()
        };
        let page = list(&store, &req, None, 50).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].item.id, second.id);
    }
}
