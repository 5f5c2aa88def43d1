//! Tweet repository

use super::id::parse_id;
use super::models::{Tweet, WithOwner};
use super::pagination::{Page, paginate};
use super::query::{self, PageRequest};
use super::{Error, Principal, Resource, Result, required_text};
use crate::store::Store;

const EMPTY_TWEET: &str = "Content is required";

pub async fn create(store: &dyn Store, principal: &Principal, content: &str) -> Result<Tweet> {
    let content = required_text(content, EMPTY_TWEET)?;
    Ok(store.insert_tweet(principal.user_id, &content).await?)
}

/// Tweets of one user, newest first by default. No tweets is an empty page.
pub async fn list_for_user(
    store: &dyn Store,
    user_id: &str,
    req: &PageRequest,
    max_limit: u64,
) -> Result<Page<WithOwner<Tweet>>> {
    let user_id = parse_id(user_id, Resource::User)?;
    let plan = query::tweet_list(req, user_id, max_limit)?;
    let page = paginate(plan.window, |offset, limit| {
        store.list_tweets(&plan.filter, plan.sort, offset, limit)
    })
    .await?;
    Ok(page)
}

pub async fn update_owned(store: &dyn Store, id: &str, principal: &Principal, content: &str) -> Result<Tweet> {
    let id = parse_id(id, Resource::Tweet)?;
    let content = required_text(content, EMPTY_TWEET)?;
    store
        .update_tweet_owned(id, principal.user_id, &content)
        .await?
        .ok_or(Error::NotFoundOrUnauthorized(Resource::Tweet))
}

pub async fn delete_owned(store: &dyn Store, id: &str, principal: &Principal) -> Result<()> {
    let id = parse_id(id, Resource::Tweet)?;
    if !store.delete_tweet_owned(id, principal.user_id).await? {
        return Err(Error::NotFoundOrUnauthorized(Resource::Tweet));
    }
    Ok(())
}
