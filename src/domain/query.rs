//! Query builder: turns a raw page request into a typed filter, sort and
//! page window. The store implementations evaluate the result; nothing
//! here touches storage.

use serde::Deserialize;
use uuid::Uuid;

use super::id::parse_optional_id;
use super::models::Video;
use super::pagination::PageWindow;
use super::{Error, Principal, Resource, Result};

/// Raw list parameters as they arrive in the query string
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub query: Option<String>,
    pub sort_by: Option<String>,
    pub sort_type: Option<String>,
    #[serde(alias = "ownerId")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn parse(raw: Option<&str>) -> Result<Self> {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("desc") | Some("descending") | Some("-1") => Ok(Direction::Desc),
            Some("asc") | Some("ascending") | Some("1") => Ok(Direction::Asc),
            Some(_) => Err(Error::validation("sortType must be asc or desc")),
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Sortable fields. Each resource only accepts a subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Title,
    Duration,
}

pub const VIDEO_SORT_FIELDS: &[SortField] = &[
    SortField::CreatedAt,
    SortField::UpdatedAt,
    SortField::Title,
    SortField::Duration,
];

pub const TIMESTAMP_SORT_FIELDS: &[SortField] = &[SortField::CreatedAt, SortField::UpdatedAt];

impl SortField {
    fn name(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "createdAt",
            SortField::UpdatedAt => "updatedAt",
            SortField::Title => "title",
            SortField::Duration => "duration",
        }
    }

    /// Column name; only ever one of these literals reaches SQL.
    pub fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::Title => "title",
            SortField::Duration => "duration",
        }
    }

    fn parse(raw: Option<&str>, allowed: &[SortField]) -> Result<Self> {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(SortField::CreatedAt);
        };
        allowed
            .iter()
            .copied()
            .find(|field| field.name() == raw || field.column() == raw)
            .ok_or_else(|| Error::validation(format!("Cannot sort by {}", raw)))
    }
}

/// Primary sort; ties are always broken by id in the same direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub field: SortField,
    pub direction: Direction,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            direction: Direction::Desc,
        }
    }
}

impl Sort {
    fn parse(req: &PageRequest, allowed: &[SortField]) -> Result<Self> {
        Ok(Self {
            field: SortField::parse(req.sort_by.as_deref(), allowed)?,
            direction: Direction::parse(req.sort_type.as_deref())?,
        })
    }
}

/// Which videos a caller may see in a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    PublicOnly,
    PublicOrOwnedBy(Uuid),
}

impl Scope {
    pub fn for_viewer(viewer: Option<&Principal>) -> Self {
        match viewer {
            Some(principal) => Scope::PublicOrOwnedBy(principal.user_id),
            None => Scope::PublicOnly,
        }
    }

    pub fn admits(&self, video: &Video) -> bool {
        match self {
            Scope::PublicOnly => video.is_public,
            Scope::PublicOrOwnedBy(viewer) => video.is_public || video.owner_id == *viewer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFilter {
    pub scope: Scope,
    /// Trimmed, non-empty search text matched against title OR description
    pub text: Option<String>,
    pub owner: Option<Uuid>,
}

impl VideoFilter {
    pub fn matches(&self, video: &Video) -> bool {
        if !self.scope.admits(video) {
            return false;
        }
        if let Some(owner) = self.owner {
            if video.owner_id != owner {
                return false;
            }
        }
        match &self.text {
            Some(text) => {
                let needle = text.to_lowercase();
                video.title.to_lowercase().contains(&needle)
                    || video.description.to_lowercase().contains(&needle)
            }
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentFilter {
    pub video_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TweetFilter {
    pub owner_id: Uuid,
}

/// Everything a store needs to run one paginated listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSpec<F> {
    pub filter: F,
    pub sort: Sort,
    pub window: PageWindow,
}

/// Build the video listing for `viewer`. Anonymous callers only see
/// public videos; a signed-in caller also sees their own private ones.
pub fn video_list(
    req: &PageRequest,
    viewer: Option<&Principal>,
    max_limit: u64,
) -> Result<ListSpec<VideoFilter>> {
    let window = PageWindow::parse(req.page.as_deref(), req.limit.as_deref(), max_limit)?;
    let owner = parse_optional_id(req.user_id.as_deref(), Resource::User)?;
    let text = req
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string);

    Ok(ListSpec {
        filter: VideoFilter {
            scope: Scope::for_viewer(viewer),
            text,
            owner,
        },
        sort: Sort::parse(req, VIDEO_SORT_FIELDS)?,
        window,
    })
}

pub fn comment_list(req: &PageRequest, video_id: Uuid, max_limit: u64) -> Result<ListSpec<CommentFilter>> {
    Ok(ListSpec {
        filter: CommentFilter { video_id },
        sort: Sort::parse(req, TIMESTAMP_SORT_FIELDS)?,
        window: PageWindow::parse(req.page.as_deref(), req.limit.as_deref(), max_limit)?,
    })
}

pub fn tweet_list(req: &PageRequest, owner_id: Uuid, max_limit: u64) -> Result<ListSpec<TweetFilter>> {
    Ok(ListSpec {
        filter: TweetFilter { owner_id },
        sort: Sort::parse(req, TIMESTAMP_SORT_FIELDS)?,
        window: PageWindow::parse(req.page.as_deref(), req.limit.as_deref(), max_limit)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn request() -> PageRequest {
        PageRequest::default()
    }

    fn video(owner: Uuid, is_public: bool) -> Video {
        Video {
            id: Uuid::new_v4(),
            video_file: "v.mp4".to_string(),
            thumbnail: "t.png".to_string(),
            title: "Rust Ownership".to_string(),
            description: "Borrowing explained".to_string(),
            duration: 60.0,
            owner_id: owner,
            is_public,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_defaults() {
        let plan = video_list(&request(), None, 50).unwrap();
        assert_eq!(plan.filter.scope, Scope::PublicOnly);
        assert_eq!(plan.filter.text, None);
        assert_eq!(plan.filter.owner, None);
        assert_eq!(plan.sort, Sort::default());
        assert_eq!(plan.window, PageWindow { page: 1, limit: 10 });
    }

    #[test]
    fn test_viewer_scope() {
        let me = Principal::new(Uuid::new_v4());
        let plan = video_list(&request(), Some(&me), 50).unwrap();
        assert_eq!(plan.filter.scope, Scope::PublicOrOwnedBy(me.user_id));

        let other = Uuid::new_v4();
        assert!(plan.filter.matches(&video(me.user_id, false)));
        assert!(!plan.filter.matches(&video(other, false)));
        assert!(plan.filter.matches(&video(other, true)));
    }

    #[test]
    fn test_blank_query_is_ignored_and_text_is_case_insensitive() {
        let mut req = request();
        req.query = Some("   ".to_string());
        assert_eq!(video_list(&req, None, 50).unwrap().filter.text, None);

        req.query = Some("  BORROWING ".to_string());
        let plan = video_list(&req, None, 50).unwrap();
        assert_eq!(plan.filter.text.as_deref(), Some("BORROWING"));
        assert!(plan.filter.matches(&video(Uuid::new_v4(), true)));

        req.query = Some("lifetimes".to_string());
        let plan = video_list(&req, None, 50).unwrap();
        assert!(!plan.filter.matches(&video(Uuid::new_v4(), true)));
    }

    #[test]
    fn test_owner_filter() {
        let owner = Uuid::new_v4();
        let mut req = request();
        req.user_id = Some(owner.to_string());
        let plan = video_list(&req, None, 50).unwrap();
        assert_eq!(plan.filter.owner, Some(owner));
        assert!(plan.filter.matches(&video(owner, true)));
        assert!(!plan.filter.matches(&video(Uuid::new_v4(), true)));
    }

    #[test]
    fn test_malformed_owner_is_rejected_not_ignored() {
        let mut req = request();
        req.user_id = Some("12345".to_string());
        assert!(matches!(video_list(&req, None, 50), Err(Error::Validation(msg)) if msg == "Invalid user id"));
    }

    #[test]
    fn test_sort_parsing() {
        let mut req = request();
        req.sort_by = Some("title".to_string());
        req.sort_type = Some("asc".to_string());
        let plan = video_list(&req, None, 50).unwrap();
        assert_eq!(
            plan.sort,
            Sort {
                field: SortField::Title,
                direction: Direction::Asc
            }
        );

        req.sort_type = Some("sideways".to_string());
        assert!(video_list(&req, None, 50).is_err());

        req.sort_type = None;
        req.sort_by = Some("password".to_string());
        assert!(video_list(&req, None, 50).is_err());

        // comments and tweets only sort by timestamps
        req.sort_by = Some("title".to_string());
        assert!(comment_list(&req, Uuid::new_v4(), 50).is_err());
        req.sort_by = Some("updatedAt".to_string());
        assert_eq!(
            tweet_list(&req, Uuid::new_v4(), 50).unwrap().sort.field,
            SortField::UpdatedAt
        );
    }
}
