//! Pagination engine: page/limit clamping and the page envelope

use std::future::Future;

use serde::Serialize;

use super::{Error, Result};
use crate::constants::DEFAULT_PAGE_SIZE;

/// A clamped page window; `page` is 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u64,
    pub limit: u64,
}

impl PageWindow {
    /// Clamp `page` to at least 1 and `limit` into `1..=max_limit`.
    pub fn new(page: Option<i64>, limit: Option<i64>, max_limit: u64) -> Self {
        let max_limit = max_limit.max(1);
        let page = page.unwrap_or(1).max(1) as u64;
        let limit = limit
            .map(|l| l.max(1) as u64)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(max_limit);
        Self { page, limit }
    }

    /// Parse raw query-string values. Blank means default; anything that is
    /// not an integer is a validation error.
    pub fn parse(page: Option<&str>, limit: Option<&str>, max_limit: u64) -> Result<Self> {
        let page = parse_number(page, "page")?;
        let limit = parse_number(limit, "limit")?;
        Ok(Self::new(page, limit, max_limit))
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

fn parse_number(raw: Option<&str>, name: &str) -> Result<Option<i64>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| Error::validation(format!("{} must be a positive integer", name))),
        None => Ok(None),
    }
}

/// Page envelope returned by every list endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_items: u64,
    pub limit: u64,
    pub page: u64,
    pub total_pages: u64,
    pub has_prev_page: bool,
    pub has_next_page: bool,
    pub prev_page: Option<u64>,
    pub next_page: Option<u64>,
}

impl<T> Page<T> {
    pub fn new(mut items: Vec<T>, total_items: u64, window: PageWindow) -> Self {
        items.truncate(window.limit as usize);
        let total_pages = total_items.div_ceil(window.limit);
        let has_prev_page = window.page > 1;
        let has_next_page = window.page < total_pages;

        Self {
            items,
            total_items,
            limit: window.limit,
            page: window.page,
            total_pages,
            has_prev_page,
            has_next_page,
            prev_page: has_prev_page.then(|| window.page - 1),
            next_page: has_next_page.then(|| window.page + 1),
        }
    }
}

/// Run `fetch(offset, limit)` for the window and wrap the result.
///
/// `fetch` returns the sorted slice and the total number of matches.
/// Errors propagate untouched; a failed fetch never becomes an empty page.
pub async fn paginate<T, E, F, Fut>(window: PageWindow, fetch: F) -> std::result::Result<Page<T>, E>
where
    F: FnOnce(u64, u64) -> Fut,
    Fut: Future<Output = std::result::Result<(Vec<T>, u64), E>>,
{
    let (items, total) = fetch(window.offset(), window.limit).await?;
    Ok(Page::new(items, total, window))
}
