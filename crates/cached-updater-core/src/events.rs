//! Event names reported through [`crate::EventCounter`].

// Refreshing cache
pub const REFRESH_SUCCESS: &str = "refresh_success";
pub const REFRESH_ERROR: &str = "refresh_error";
pub const REFRESH_PANIC: &str = "refresh_panic";
pub const GET_CACHED_RESPONSE: &str = "get_cached_response";
pub const GET_UNCACHED_RESPONSE: &str = "get_uncached_response";

// Dual-key cache
pub const CACHE_GET_USER_BY_ID: &str = "cache_get_user_by_id";
pub const CACHE_ERROR_GET_USER_BY_ID: &str = "cache_error_get_user_by_id";
pub const CACHE_GET_USER_BY_EMAIL: &str = "cache_get_user_by_email";
pub const CACHE_ERROR_GET_USER_BY_EMAIL: &str = "cache_error_get_user_by_email";

// Upstream calls made by the caching decorators
pub const GET_USER_BY_ID: &str = "get_user_by_id";
pub const ERROR_GET_USER_BY_ID: &str = "error_get_user_by_id";
pub const GET_USERS: &str = "get_users";
pub const ERROR_GET_USERS: &str = "error_get_users";
pub const VERIFY_TOKEN: &str = "verify_token";
pub const ERROR_VERIFY_TOKEN: &str = "error_verify_token";

/// Events produced by the refreshing cache, in a stable order.
pub const RESPONSE_CACHE_EVENTS: &[&str] = &[
    REFRESH_SUCCESS,
    REFRESH_ERROR,
    REFRESH_PANIC,
    GET_CACHED_RESPONSE,
    GET_UNCACHED_RESPONSE,
];

/// Events produced by the user cache and its decorator, in a stable order.
pub const USER_CACHE_EVENTS: &[&str] = &[
    CACHE_GET_USER_BY_ID,
    CACHE_ERROR_GET_USER_BY_ID,
    CACHE_GET_USER_BY_EMAIL,
    CACHE_ERROR_GET_USER_BY_EMAIL,
    GET_USER_BY_ID,
    ERROR_GET_USER_BY_ID,
    GET_USERS,
    ERROR_GET_USERS,
    VERIFY_TOKEN,
    ERROR_VERIFY_TOKEN,
];
