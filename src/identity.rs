use spin_sdk::http::Request;
use spin_sdk::key_value::Store;
use crate::config::user_key;
use crate::core::helpers::{now_iso, validate_uuid};
use crate::models::models::User;

/// Resolve the caller from the `X-User-Id` header stamped by the external
/// auth layer. Verifies the user still exists and touches `last_seen`.
pub fn current_user(store: &Store, req: &Request) -> Option<User> {
    let user_id = req.header("X-User-Id")?.as_str().unwrap_or_default();
    if user_id.is_empty() || !validate_uuid(user_id) {
        return None;
    }

    let key = user_key(user_id);
    let mut user = store.get_json::<User>(&key).ok()??;

    user.last_seen = now_iso();
    if let Err(e) = store.set_json(&key, &user) {
        log::warn!("identity: failed to touch last_seen for user {}: {}", user.id, e);
    }

    Some(user)
}
