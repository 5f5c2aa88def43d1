//! Comment repository. Comments hang off videos the caller can see.

use uuid::Uuid;

use super::id::parse_id;
use super::models::{Comment, WithOwner};
use super::pagination::{Page, paginate};
use super::query::{self, PageRequest, Scope};
use super::{Error, Principal, Resource, Result, required_text};
use crate::store::Store;

const EMPTY_COMMENT: &str = "Comment should not be empty";

async fn ensure_video_visible(store: &dyn Store, video_id: Uuid, viewer: Option<&Principal>) -> Result<()> {
    store
        .find_video(video_id, Scope::for_viewer(viewer))
        .await?
        .map(|_| ())
        .ok_or(Error::NotFound(Resource::Video))
}

pub async fn list_for_video(
    store: &dyn Store,
    video_id: &str,
    viewer: Option<&Principal>,
    req: &PageRequest,
    max_limit: u64,
) -> Result<Page<WithOwner<Comment>>> {
    let video_id = parse_id(video_id, Resource::Video)?;
    let plan = query::comment_list(req, video_id, max_limit)?;
    ensure_video_visible(store, video_id, viewer).await?;

    let page = paginate(plan.window, |offset, limit| {
        store.list_comments(&plan.filter, plan.sort, offset, limit)
    })
    .await?;
    Ok(page)
}

pub async fn add(store: &dyn Store, video_id: &str, principal: &Principal, content: &str) -> Result<Comment> {
    let video_id = parse_id(video_id, Resource::Video)?;
    let content = required_text(content, EMPTY_COMMENT)?;

    // Visibility check and insert are one storage operation
    let comment = store
        .insert_comment(video_id, Scope::for_viewer(Some(principal)), principal.user_id, &content)
        .await?
        .ok_or(Error::NotFound(Resource::Video))?;
    tracing::debug!(comment_id = %comment.id, video_id = %video_id, "comment added");
    Ok(comment)
}

pub async fn update_owned(store: &dyn Store, id: &str, principal: &Principal, content: &str) -> Result<Comment> {
    let id = parse_id(id, Resource::Comment)?;
    let content = required_text(content, EMPTY_COMMENT)?;
    store
        .update_comment_owned(id, principal.user_id, &content)
        .await?
        .ok_or(Error::NotFoundOrUnauthorized(Resource::Comment))
}

pub async fn delete_owned(store: &dyn Store, id: &str, principal: &Principal) -> Result<()> {
    let id = parse_id(id, Resource::Comment)?;
    if !store.delete_comment_owned(id, principal.user_id).await? {
        return Err(Error::NotFoundOrUnauthorized(Resource::Comment));
    }
    Ok(())
}
