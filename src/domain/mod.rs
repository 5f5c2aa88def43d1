//! Domain layer: validation, query building, pagination and the
//! per-resource repositories. Handlers call into here with an explicit
//! [`Principal`]; nothing in this layer knows about HTTP.

pub mod comments;
pub mod id;
pub mod models;
pub mod pagination;
pub mod query;
pub mod tweets;
pub mod videos;

use std::fmt;

use thiserror::Error;

use crate::store::StoreError;

pub use id::Principal;

/// Resource kinds, used to word error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Video,
    Comment,
    Tweet,
    User,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Video => "Video",
            Resource::Comment => "Comment",
            Resource::Tweet => "Tweet",
            Resource::User => "User",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(Resource),

    /// Missing and not-owned are deliberately the same signal.
    #[error("{0} not found or unauthorized")]
    NotFoundOrUnauthorized(Resource),

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("media failure: {0}")]
    Media(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Trim `raw` and reject it when nothing is left.
pub fn required_text(raw: &str, message: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(message));
    }
    Ok(trimmed.to_string())
}

/// Trim `raw`, treating blank input as absent.
pub fn optional_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_text_trims() {
        assert_eq!(required_text("  hi  ", "empty").unwrap(), "hi");
        assert!(matches!(
            required_text(" \t\n ", "Content is required"),
            Err(Error::Validation(msg)) if msg == "Content is required"
        ));
    }

    #[test]
    fn test_optional_text_drops_blank() {
        assert_eq!(optional_text(Some("  x ")), Some("x".to_string()));
        assert_eq!(optional_text(Some("   ")), None);
        assert_eq!(optional_text(None), None);
    }

    #[test]
    fn test_collapsed_error_message() {
        let err = Error::NotFoundOrUnauthorized(Resource::Video);
        assert_eq!(err.to_string(), "Video not found or unauthorized");
    }
}
