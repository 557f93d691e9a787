use spin_sdk::http::{Request, Response};
use spin_sdk::key_value::Store;
use crate::config::*;
use crate::core::errors::ApiError;
use crate::core::helpers::{store, validate_uuid};
use crate::identity::current_user;
use crate::models::models::Post;

/// Add `user_id` to the post's like set. Liking twice is a no-op.
pub fn like_post(store: &Store, user_id: &str, post_id: &str) -> Result<(), ApiError> {
    let key = likes_key(post_id);
    let mut likes: Vec<String> = store.get_json(&key)?.unwrap_or_default();

    if !likes.iter().any(|id| id == user_id) {
        likes.push(user_id.to_string());
        store.set_json(&key, &likes)?;
    }

    Ok(())
}

/// Remove `user_id` from the post's like set. Idempotent.
pub fn unlike_post(store: &Store, user_id: &str, post_id: &str) -> Result<(), ApiError> {
    let key = likes_key(post_id);
    let mut likes: Vec<String> = store.get_json(&key)?.unwrap_or_default();

    let before = likes.len();
    likes.retain(|id| id != user_id);
    if likes.len() != before {
        store.set_json(&key, &likes)?;
    }

    Ok(())
}

pub fn like_count(store: &Store, post_id: &str) -> Result<usize, ApiError> {
    Ok(liked_by(store, post_id)?.len())
}

pub fn liked_by(store: &Store, post_id: &str) -> Result<Vec<String>, ApiError> {
    let likes: Vec<String> = store.get_json(&likes_key(post_id))?.unwrap_or_default();
    Ok(likes)
}

pub fn has_liked(store: &Store, user_id: &str, post_id: &str) -> Result<bool, ApiError> {
    Ok(liked_by(store, post_id)?.iter().any(|id| id == user_id))
}

// === HTTP Handlers ===

fn resolve_post(store: &Store, path: &str) -> Result<Post, ApiError> {
    let post_id = path.trim_start_matches("/likes/");

    if post_id.is_empty() || !validate_uuid(post_id) {
        return Err(ApiError::BadRequest("Post ID required".to_string()));
    }

    store
        .get_json::<Post>(&post_key(post_id))?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))
}

pub fn handle_like(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let user = match current_user(&store, &req) {
        Some(u) => u,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let post = match resolve_post(&store, req.path()) {
        Ok(p) => p,
        Err(e) => return Ok(e.into()),
    };

    if let Err(e) = like_post(&store, &user.id, &post.id) {
        return Ok(e.into());
    }

    let count = like_count(&store, &post.id)?;
    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&serde_json::json!({"likes": count}))?)
        .build())
}

pub fn handle_unlike(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let user = match current_user(&store, &req) {
        Some(u) => u,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let post = match resolve_post(&store, req.path()) {
        Ok(p) => p,
        Err(e) => return Ok(e.into()),
    };

    if let Err(e) = unlike_post(&store, &user.id, &post.id) {
        return Ok(e.into());
    }

    let count = like_count(&store, &post.id)?;
    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&serde_json::json!({"likes": count}))?)
        .build())
}
