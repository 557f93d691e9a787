use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub about_me: Option<String>,
    pub birthday: Option<String>,
    pub last_seen: String,
    /// Last time the user opened their inbox; messages newer than this are
    /// unread.
    pub last_message_read_time: Option<String>,
    pub avatar_filename: Option<String>,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct Post {
    pub id: String,
    /// None marks a stranded post: the owning user was deleted and the purge
    /// job will remove it.
    pub user_id: Option<String>,
    pub body: String,
    pub language: String,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub body: String,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct Notification {
    pub id: String,
    pub name: String,
    pub payload: serde_json::Value,
    /// Float epoch seconds; clients poll with the max timestamp they have
    /// seen.
    pub timestamp: f64,
}
