//! Application constants

/// Default page size for paginated list endpoints
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Default ceiling for the page size (overridable with `MAX_PAGE_SIZE`)
pub const MAX_PAGE_SIZE: u64 = 50;

/// Body limit for JSON endpoints
pub const JSON_BODY_LIMIT: usize = 16 * 1024;

/// Body limit for video/thumbnail uploads (512 MB)
pub const MAX_UPLOAD_SIZE: usize = 512 * 1024 * 1024;

/// Name of the cookie carrying the access token
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
