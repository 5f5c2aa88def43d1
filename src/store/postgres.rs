//! Postgres store. Listings join the owner with an INNER JOIN and select
//! only the redacted owner columns; nothing sensitive is ever read.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{Listing, Store, StoreError};
use crate::domain::models::{Comment, NewVideo, Tweet, Video, VideoPatch, WithOwner};
use crate::domain::query::{CommentFilter, Scope, Sort, SortField, TweetFilter, VideoFilter};

const VIDEO_COLUMNS: &str = "id, video_file, thumbnail, title, description, duration, owner_id, is_public, created_at, updated_at";
const JOINED_VIDEO_COLUMNS: &str = "v.id, v.video_file, v.thumbnail, v.title, v.description, v.duration, v.owner_id, v.is_public, v.created_at, v.updated_at, u.username AS owner_username, u.avatar AS owner_avatar";

const COMMENT_COLUMNS: &str = "id, content, video_id, owner_id, created_at, updated_at";
const JOINED_COMMENT_COLUMNS: &str = "c.id, c.content, c.video_id, c.owner_id, c.created_at, c.updated_at, u.username AS owner_username, u.avatar AS owner_avatar";

const TWEET_COLUMNS: &str = "id, content, owner_id, created_at, updated_at";
const JOINED_TWEET_COLUMNS: &str = "t.id, t.content, t.owner_id, t.created_at, t.updated_at, u.username AS owner_username, u.avatar AS owner_avatar";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Escape LIKE metacharacters so search text matches literally.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_scope(qb: &mut QueryBuilder<'static, Postgres>, scope: Scope) {
    match scope {
        Scope::PublicOnly => {
            qb.push("v.is_public = TRUE");
        }
        Scope::PublicOrOwnedBy(viewer) => {
            qb.push("(v.is_public = TRUE OR v.owner_id = ");
            qb.push_bind(viewer);
            qb.push(")");
        }
    }
}

fn push_video_filter(qb: &mut QueryBuilder<'static, Postgres>, filter: &VideoFilter) {
    qb.push(" WHERE ");
    push_scope(qb, filter.scope);

    if let Some(owner) = filter.owner {
        qb.push(" AND v.owner_id = ");
        qb.push_bind(owner);
    }

    if let Some(text) = &filter.text {
        let pattern = format!("%{}%", escape_like(text));
        qb.push(" AND (v.title ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR v.description ILIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
}

/// ORDER BY the sort column with the id tie-break, then LIMIT/OFFSET.
///
/// Titles order case-insensitively, then byte-wise, independent of the
/// database collation. `MemoryStore` orders them the same way.
fn push_window(qb: &mut QueryBuilder<'static, Postgres>, alias: &str, sort: Sort, offset: u64, limit: u64) {
    let direction = sort.direction.sql();
    let keys = match sort.field {
        SortField::Title => format!(
            "lower({alias}.title) COLLATE \"C\" {direction}, {alias}.title COLLATE \"C\" {direction}"
        ),
        field => format!("{alias}.{} {direction}", field.column()),
    };
    qb.push(format!(" ORDER BY {keys}, {alias}.id {direction}"));
    qb.push(" LIMIT ");
    qb.push_bind(sql_count(limit));
    qb.push(" OFFSET ");
    qb.push_bind(sql_count(offset));
}

/// LIMIT/OFFSET are BIGINT; saturate instead of wrapping negative.
fn sql_count(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn video_count_query(filter: &VideoFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM videos v JOIN users u ON u.id = v.owner_id");
    push_video_filter(&mut qb, filter);
    qb
}

fn video_list_query(filter: &VideoFilter, sort: Sort, offset: u64, limit: u64) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT {} FROM videos v JOIN users u ON u.id = v.owner_id",
        JOINED_VIDEO_COLUMNS
    ));
    push_video_filter(&mut qb, filter);
    push_window(&mut qb, "v", sort, offset, limit);
    qb
}

fn video_detail_query(id: Uuid, scope: Scope) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT {} FROM videos v JOIN users u ON u.id = v.owner_id WHERE v.id = ",
        JOINED_VIDEO_COLUMNS
    ));
    qb.push_bind(id);
    qb.push(" AND ");
    push_scope(&mut qb, scope);
    qb
}

/// INSERT ... SELECT from the visible video, so a hidden or deleted video
/// inserts nothing instead of tripping the foreign key.
fn comment_insert_query(video_id: Uuid, scope: Scope, owner_id: Uuid, content: &str) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("INSERT INTO comments (content, video_id, owner_id) SELECT ");
    qb.push_bind(content.to_string());
    qb.push(", v.id, ");
    qb.push_bind(owner_id);
    qb.push(" FROM videos v JOIN users u ON u.id = v.owner_id WHERE v.id = ");
    qb.push_bind(video_id);
    qb.push(" AND ");
    push_scope(&mut qb, scope);
    qb.push(format!(" RETURNING {}", COMMENT_COLUMNS));
    qb
}

fn comment_list_query(filter: &CommentFilter, sort: Sort, offset: u64, limit: u64) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT {} FROM comments c JOIN users u ON u.id = c.owner_id WHERE c.video_id = ",
        JOINED_COMMENT_COLUMNS
    ));
    qb.push_bind(filter.video_id);
    push_window(&mut qb, "c", sort, offset, limit);
    qb
}

fn tweet_list_query(filter: &TweetFilter, sort: Sort, offset: u64, limit: u64) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT {} FROM tweets t JOIN users u ON u.id = t.owner_id WHERE t.owner_id = ",
        JOINED_TWEET_COLUMNS
    ));
    qb.push_bind(filter.owner_id);
    push_window(&mut qb, "t", sort, offset, limit);
    qb
}

fn to_total(count: i64) -> u64 {
    count.max(0) as u64
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_video(&self, owner_id: Uuid, video: NewVideo) -> Result<Video, StoreError> {
        let video = sqlx::query_as(&format!(
            r#"
            INSERT INTO videos (video_file, thumbnail, title, description, duration, owner_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            VIDEO_COLUMNS
        ))
        .bind(&video.video_file)
        .bind(&video.thumbnail)
        .bind(&video.title)
        .bind(&video.description)
        .bind(video.duration)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(video)
    }

    async fn find_video(&self, id: Uuid, scope: Scope) -> Result<Option<WithOwner<Video>>, StoreError> {
        let video = video_detail_query(id, scope)
            .build_query_as()
            .fetch_optional(&self.pool)
            .await?;
        Ok(video)
    }

    async fn list_videos(
        &self,
        filter: &VideoFilter,
        sort: Sort,
        offset: u64,
        limit: u64,
    ) -> Result<Listing<Video>, StoreError> {
        let (count,): (i64,) = video_count_query(filter)
            .build_query_as()
            .fetch_one(&self.pool)
            .await?;
        let items = video_list_query(filter, sort, offset, limit)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        Ok((items, to_total(count)))
    }

    async fn update_video_owned(
        &self,
        id: Uuid,
        owner_id: Uuid,
        patch: &VideoPatch,
    ) -> Result<Option<Video>, StoreError> {
        let video = sqlx::query_as(&format!(
            r#"
            UPDATE videos
            SET title = COALESCE($3, title),
                description = COALESCE($4, description),
                thumbnail = COALESCE($5, thumbnail),
                updated_at = NOW()
            WHERE id = $1 AND owner_id = $2
            RETURNING {}
            "#,
            VIDEO_COLUMNS
        ))
        .bind(id)
        .bind(owner_id)
        .bind(patch.title.as_deref())
        .bind(patch.description.as_deref())
        .bind(patch.thumbnail.as_deref())
        .fetch_optional(&self.pool)
        .await?;

        Ok(video)
    }

    async fn delete_video_owned(&self, id: Uuid, owner_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM videos WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn toggle_video_public(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Video>, StoreError> {
        let video = sqlx::query_as(&format!(
            r#"
            UPDATE videos
            SET is_public = NOT is_public, updated_at = NOW()
            WHERE id = $1 AND owner_id = $2
            RETURNING {}
            "#,
            VIDEO_COLUMNS
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(video)
    }

    async fn insert_comment(
        &self,
        video_id: Uuid,
        scope: Scope,
        owner_id: Uuid,
        content: &str,
    ) -> Result<Option<Comment>, StoreError> {
        let comment = comment_insert_query(video_id, scope, owner_id, content)
            .build_query_as()
            .fetch_optional(&self.pool)
            .await?;
        Ok(comment)
    }

    async fn list_comments(
        &self,
        filter: &CommentFilter,
        sort: Sort,
        offset: u64,
        limit: u64,
    ) -> Result<Listing<Comment>, StoreError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM comments c JOIN users u ON u.id = c.owner_id WHERE c.video_id = $1",
        )
        .bind(filter.video_id)
        .fetch_one(&self.pool)
        .await?;
        let items = comment_list_query(filter, sort, offset, limit)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        Ok((items, to_total(count)))
    }

    async fn update_comment_owned(
        &self,
        id: Uuid,
        owner_id: Uuid,
        content: &str,
    ) -> Result<Option<Comment>, StoreError> {
        let comment = sqlx::query_as(&format!(
            r#"
            UPDATE comments SET content = $3, updated_at = NOW()
            WHERE id = $1 AND owner_id = $2
            RETURNING {}
            "#,
            COMMENT_COLUMNS
        ))
        .bind(id)
        .bind(owner_id)
        .bind(content)
        .fetch_optional(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn delete_comment_owned(&self, id: Uuid, owner_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_tweet(&self, owner_id: Uuid, content: &str) -> Result<Tweet, StoreError> {
        let tweet = sqlx::query_as(&format!(
            "INSERT INTO tweets (content, owner_id) VALUES ($1, $2) RETURNING {}",
            TWEET_COLUMNS
        ))
        .bind(content)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(tweet)
    }

    async fn list_tweets(
        &self,
        filter: &TweetFilter,
        sort: Sort,
        offset: u64,
        limit: u64,
    ) -> Result<Listing<Tweet>, StoreError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM tweets t JOIN users u ON u.id = t.owner_id WHERE t.owner_id = $1",
        )
        .bind(filter.owner_id)
        .fetch_one(&self.pool)
        .await?;
        let items = tweet_list_query(filter, sort, offset, limit)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        Ok((items, to_total(count)))
    }

    async fn update_tweet_owned(&self, id: Uuid, owner_id: Uuid, content: &str) -> Result<Option<Tweet>, StoreError> {
        let tweet = sqlx::query_as(&format!(
            r#"
            UPDATE tweets SET content = $3, updated_at = NOW()
            WHERE id = $1 AND owner_id = $2
            RETURNING {}
            "#,
            TWEET_COLUMNS
        ))
        .bind(id)
        .bind(owner_id)
        .bind(content)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tweet)
    }

    async fn delete_tweet_owned(&self, id: Uuid, owner_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM tweets WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::query::{Direction, SortField};

    fn filter(scope: Scope) -> VideoFilter {
        VideoFilter {
            scope,
            text: None,
            owner: None,
        }
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_huge_page_binds_non_negative_window() {
        use crate::domain::pagination::PageWindow;

        let window = PageWindow::parse(Some("9223372036854775807"), Some("10"), 50).unwrap();
        assert_eq!(window.offset(), u64::MAX);
        assert_eq!(sql_count(window.offset()), i64::MAX);
        assert_eq!(sql_count(window.limit), 10);
        assert_eq!(sql_count(0), 0);
    }

    #[test]
    fn test_comment_insert_is_conditioned_on_visible_video() {
        let viewer = Uuid::new_v4();
        let qb = comment_insert_query(Uuid::new_v4(), Scope::PublicOrOwnedBy(viewer), viewer, "hi");
        assert_eq!(
            qb.sql(),
            format!(
                "INSERT INTO comments (content, video_id, owner_id) SELECT $1, v.id, $2 \
                 FROM videos v JOIN users u ON u.id = v.owner_id WHERE v.id = $3 \
                 AND (v.is_public = TRUE OR v.owner_id = $4) RETURNING {}",
                COMMENT_COLUMNS
            )
        );
    }

    #[test]
    fn test_public_listing_sql() {
        let qb = video_list_query(&filter(Scope::PublicOnly), Sort::default(), 0, 10);
        let sql = qb.sql();
        assert!(sql.contains("JOIN users u ON u.id = v.owner_id"));
        assert!(sql.contains("WHERE v.is_public = TRUE"));
        assert!(sql.ends_with("ORDER BY v.created_at DESC, v.id DESC LIMIT $1 OFFSET $2"));
    }

    #[test]
    fn test_viewer_text_and_owner_sql() {
        let viewer = Uuid::new_v4();
        let video_filter = VideoFilter {
            scope: Scope::PublicOrOwnedBy(viewer),
            text: Some("rust".to_string()),
            owner: Some(Uuid::new_v4()),
        };
        let sort = Sort {
            field: SortField::Title,
            direction: Direction::Asc,
        };
        let qb = video_list_query(&video_filter, sort, 20, 10);
        assert_eq!(
            qb.sql(),
            format!(
                "SELECT {} FROM videos v JOIN users u ON u.id = v.owner_id \
                 WHERE (v.is_public = TRUE OR v.owner_id = $1) AND v.owner_id = $2 \
                 AND (v.title ILIKE $3 OR v.description ILIKE $4) \
                 ORDER BY lower(v.title) COLLATE \"C\" ASC, v.title COLLATE \"C\" ASC, v.id ASC \
                 LIMIT $5 OFFSET $6",
                JOINED_VIDEO_COLUMNS
            )
        );

        let count = video_count_query(&video_filter);
        assert!(count.sql().starts_with("SELECT COUNT(*) FROM videos v JOIN users u"));
        assert!(!count.sql().contains("LIMIT"));
    }

    #[test]
    fn test_owner_projection_never_selects_sensitive_columns() {
        for columns in [JOINED_VIDEO_COLUMNS, JOINED_COMMENT_COLUMNS, JOINED_TWEET_COLUMNS] {
            for secret in ["password", "email", "full_name", "refresh_token", "watch_history", "cover_image"] {
                assert!(!columns.contains(secret), "{} selects {}", columns, secret);
            }
        }
    }

    #[test]
    fn test_detail_and_child_listing_sql() {
        let id = Uuid::new_v4();
        let detail = video_detail_query(id, Scope::PublicOnly);
        assert!(detail.sql().ends_with("WHERE v.id = $1 AND v.is_public = TRUE"));

        let comments = comment_list_query(&CommentFilter { video_id: id }, Sort::default(), 0, 5);
        assert!(comments.sql().contains("WHERE c.video_id = $1 ORDER BY c.created_at DESC, c.id DESC"));

        let tweets = tweet_list_query(&TweetFilter { owner_id: id }, Sort::default(), 0, 5);
        assert!(tweets.sql().contains("WHERE t.owner_id = $1 ORDER BY t.created_at DESC, t.id DESC"));
    }
}
