// === KV keys ===

pub const USERS_LIST_KEY: &str = "users_list";
pub const FEED_KEY: &str = "feed";
pub const AVATAR_FILES_KEY: &str = "avatar_files";

/// Reserved entry in the avatar listing that the purge job must never delete.
pub const AVATAR_SENTINEL: &str = ".meta";

pub fn user_key(id: &str) -> String {
    format!("user:{}", id)
}

pub fn post_key(id: &str) -> String {
    format!("post:{}", id)
}

pub fn followings_key(user_id: &str) -> String {
    format!("followings:{}", user_id)
}

pub fn likes_key(post_id: &str) -> String {
    format!("likes:{}", post_id)
}

pub fn message_key(id: &str) -> String {
    format!("message:{}", id)
}

pub fn inbox_key(user_id: &str) -> String {
    format!("inbox:{}", user_id)
}

pub fn outbox_key(user_id: &str) -> String {
    format!("outbox:{}", user_id)
}

pub fn notifications_key(user_id: &str) -> String {
    format!("notifications:{}", user_id)
}

pub fn avatar_key(filename: &str) -> String {
    format!("avatar:{}", filename)
}

// === Limits ===

pub const MAX_POST_LENGTH: usize = 5000;
pub const MAX_MESSAGE_LENGTH: usize = 5000;
pub const MAX_ABOUT_ME_LENGTH: usize = 140;
pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 50;

pub const UNREAD_MESSAGE_COUNT: &str = "unread_message_count";

// === Environment-backed settings ===

pub fn posts_per_page() -> usize {
    std::env::var("RIPPLE_POSTS_PER_PAGE")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(25)
}

/// Base URL of the external full-text index. Unset means search is disabled.
pub fn search_url() -> Option<String> {
    std::env::var("RIPPLE_SEARCH_URL").ok().filter(|v| !v.is_empty())
}

/// Base URL of the external translation service. Unset means translation is
/// disabled.
pub fn translate_url() -> Option<String> {
    std::env::var("RIPPLE_TRANSLATE_URL").ok().filter(|v| !v.is_empty())
}

/// Identicon service queried when a user has no stored avatar.
pub fn avatar_service_url() -> String {
    std::env::var("RIPPLE_AVATAR_SERVICE_URL")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "https://www.gravatar.com/avatar".to_string())
}

pub fn avatar_size() -> u32 {
    std::env::var("RIPPLE_AVATAR_SIZE")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(256)
}

/// Notifications older than this many days are removed by the maintenance
/// job.
pub fn notification_retention_days() -> i64 {
    std::env::var("RIPPLE_NOTIFICATION_RETENTION_DAYS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(90)
}
