//! Identity parsing and the authenticated principal

use uuid::Uuid;

use super::{Error, Resource, Result};

/// The authenticated caller, passed explicitly into every domain call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
}

impl Principal {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

/// Validate a raw identity before it goes anywhere near storage.
pub fn parse_id(raw: &str, resource: Resource) -> Result<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| Error::validation(format!("Invalid {} id", resource.to_string().to_lowercase())))
}

/// Like [`parse_id`], but blank input means "not given".
pub fn parse_optional_id(raw: Option<&str>, resource: Resource) -> Result<Option<Uuid>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => parse_id(raw, resource).map(Some),
        None => Ok(None),
    }
}
