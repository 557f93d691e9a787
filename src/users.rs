use spin_sdk::http::{Request, Response};
use spin_sdk::key_value::Store;
use uuid::Uuid;
use crate::avatars::ensure_avatar;
use crate::config::*;
use crate::core::errors::ApiError;
use crate::core::helpers::{now_iso, sanitize_text, store, validate_uuid};
use crate::follow::{get_followers, get_followings};
use crate::identity::current_user;
use crate::models::models::{Message, User};
use crate::posts::find_user_by_username;

fn build_user_json(store: &Store, user: &User) -> Result<serde_json::Value, ApiError> {
    let followers = get_followers(store, &user.id)?.len();
    let following = get_followings(store, &user.id)?.len();

    let feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();
    let mut post_count = 0;
    for id in feed.iter() {
        if let Some(p) = store.get_json::<crate::models::models::Post>(&post_key(id))? {
            if p.user_id.as_deref() == Some(user.id.as_str()) {
                post_count += 1;
            }
        }
    }

    Ok(serde_json::json!({
        "id": user.id,
        "username": user.username,
        "about_me": user.about_me.as_deref().unwrap_or(""),
        "birthday": user.birthday,
        "last_seen": user.last_seen,
        "avatar_filename": user.avatar_filename,
        "followers": followers,
        "following": following,
        "posts": post_count,
    }))
}

/// Registration entry point for the external auth subsystem.
pub fn create_user(req: Request) -> anyhow::Result<Response> {
    let store = store();

    let value: serde_json::Value = serde_json::from_slice(req.body())?;
    let username = value["username"].as_str().unwrap_or("");

    if username.is_empty() {
        return Ok(ApiError::BadRequest("Username is required".to_string()).into());
    }
    if username.len() < MIN_USERNAME_LENGTH || username.len() > MAX_USERNAME_LENGTH {
        return Ok(ApiError::BadRequest("Username must be 3-50 characters".to_string()).into());
    }

    let username = sanitize_text(username);

    if find_user_by_username(&store, &username)?.is_some() {
        return Ok(ApiError::Conflict("Username exists".to_string()).into());
    }

    let id = Uuid::new_v4().to_string();
    let user = User {
        id: id.clone(),
        username,
        about_me: None,
        birthday: value["birthday"].as_str().map(str::to_string),
        last_seen: now_iso(),
        last_message_read_time: None,
        avatar_filename: None,
    };

    store.set_json(&user_key(&id), &user)?;

    let mut users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    users.push(id);
    store.set_json(USERS_LIST_KEY, &users)?;

    Ok(Response::builder()
        .status(201)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&user)?)
        .build())
}

pub async fn get_user_details(req: Request) -> anyhow::Result<Response> {
    let user_id = req.path().trim_start_matches("/users/").to_string();

    if user_id.is_empty() || !validate_uuid(&user_id) {
        return Ok(ApiError::BadRequest("User ID required".to_string()).into());
    }

    let store = store();
    let mut user = match store.get_json::<User>(&user_key(&user_id))? {
        Some(u) => u,
        None => return Ok(ApiError::NotFound("User not found".to_string()).into()),
    };

    // Cosmetic: re-provision a missing avatar, never fail the lookup over it
    ensure_avatar(&store, &mut user).await;

    let payload = match build_user_json(&store, &user) {
        Ok(p) => p,
        Err(e) => return Ok(e.into()),
    };

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&payload)?)
        .build())
}

pub fn update_profile(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let mut user = match current_user(&store, &req) {
        Some(u) => u,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let value: serde_json::Value = serde_json::from_slice(req.body())?;

    if let Some(username) = value["username"].as_str() {
        if username.len() < MIN_USERNAME_LENGTH || username.len() > MAX_USERNAME_LENGTH {
            return Ok(
                ApiError::BadRequest("Username must be 3-50 characters".to_string()).into(),
            );
        }
        let username = sanitize_text(username);
        if username != user.username && find_user_by_username(&store, &username)?.is_some() {
            return Ok(ApiError::Conflict("Username exists".to_string()).into());
        }
        user.username = username;
    }

    if let Some(about_me) = value["about_me"].as_str() {
        if about_me.len() > MAX_ABOUT_ME_LENGTH {
            return Ok(
                ApiError::BadRequest("About me too long (max 140 chars)".to_string()).into(),
            );
        }
        let about_me = sanitize_text(about_me);
        user.about_me = if about_me.is_empty() { None } else { Some(about_me) };
    }

    if let Some(birthday) = value["birthday"].as_str() {
        user.birthday = if birthday.is_empty() { None } else { Some(birthday.to_string()) };
    }

    // Single write covers the whole edit
    store.set_json(&user_key(&user.id), &user)?;

    let payload = match build_user_json(&store, &user) {
        Ok(p) => p,
        Err(e) => return Ok(e.into()),
    };

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&payload)?)
        .build())
}

/// Self-deletion. Messages and edges go immediately; the user's posts are
/// stranded (owner reference cleared) and left for the purge job.
pub fn delete_profile(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let user = match current_user(&store, &req) {
        Some(u) => u,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    if let Err(e) = delete_user(&store, &user.id) {
        log::error!("users: deleting account {} failed: {}", user.id, e);
        return Ok(e.into());
    }

    Ok(Response::builder().status(204).build())
}

pub fn delete_user(store: &Store, user_id: &str) -> Result<(), ApiError> {
    // Strand the user's posts; the maintenance job deletes them later
    let feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();
    for id in feed.iter() {
        if let Some(mut p) = store.get_json::<crate::models::models::Post>(&post_key(id))? {
            match p.user_id.as_deref() {
                Some(owner) if owner == user_id => {
                    p.user_id = None;
                    store.set_json(&post_key(id), &p)?;
                }
                _ => {}
            }
        }
        // Drop the user's like edges as well
        let likes: Vec<String> = store.get_json(&likes_key(id))?.unwrap_or_default();
        if likes.iter().any(|l| l == user_id) {
            let remaining: Vec<String> =
                likes.into_iter().filter(|l| l != user_id).collect();
            store.set_json(&likes_key(id), &remaining)?;
        }
    }

    // Delete both sides of every conversation the user took part in
    for key in [inbox_key(user_id), outbox_key(user_id)] {
        let ids: Vec<String> = store.get_json(&key)?.unwrap_or_default();
        for id in ids {
            if let Some(m) = store.get_json::<Message>(&message_key(&id))? {
                let peer = if m.sender_id == user_id { &m.recipient_id } else { &m.sender_id };
                for peer_key in [inbox_key(peer), outbox_key(peer)] {
                    let peer_ids: Vec<String> =
                        store.get_json(&peer_key)?.unwrap_or_default();
                    if peer_ids.iter().any(|i| i == &id) {
                        let remaining: Vec<String> =
                            peer_ids.into_iter().filter(|i| i != &id).collect();
                        store.set_json(&peer_key, &remaining)?;
                    }
                }
            }
            store.delete(&message_key(&id))?;
        }
        store.delete(&key)?;
    }

    // Remove follow edges in both directions
    store.delete(&followings_key(user_id))?;
    let users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    for id in &users {
        let key = followings_key(id);
        let followings: Vec<String> = store.get_json(&key)?.unwrap_or_default();
        if followings.iter().any(|f| f == user_id) {
            let remaining: Vec<String> =
                followings.into_iter().filter(|f| f != user_id).collect();
            store.set_json(&key, &remaining)?;
        }
    }

    store.delete(&notifications_key(user_id))?;
    store.delete(&user_key(user_id))?;

    let remaining: Vec<String> = users.into_iter().filter(|id| id != user_id).collect();
    store.set_json(USERS_LIST_KEY, &remaining)?;

    Ok(())
}
