use spin_sdk::http::{Request, Response};
use spin_sdk::key_value::Store;
use crate::config::*;
use crate::core::errors::ApiError;
use crate::core::helpers::{store, validate_uuid};
use crate::core::pagination::{paginate, Page};
use crate::identity::current_user;
use crate::models::models::{Post, User};

/// Add the follow edge follower -> followed. Idempotent; self-follow is
/// rejected.
pub fn follow_user(store: &Store, follower_id: &str, followed_id: &str) -> Result<(), ApiError> {
    check_not_self(follower_id, followed_id)?;

    let key = followings_key(follower_id);
    let mut followings: Vec<String> = store.get_json(&key)?.unwrap_or_default();

    if insert_edge(&mut followings, followed_id) {
        store.set_json(&key, &followings)?;
    }

    Ok(())
}

/// Remove the follow edge follower -> followed. Idempotent.
pub fn unfollow_user(store: &Store, follower_id: &str, followed_id: &str) -> Result<(), ApiError> {
    check_not_self(follower_id, followed_id)?;

    let key = followings_key(follower_id);
    let mut followings: Vec<String> = store.get_json(&key)?.unwrap_or_default();

    let before = followings.len();
    followings.retain(|id| id != followed_id);
    if followings.len() != before {
        store.set_json(&key, &followings)?;
    }

    Ok(())
}

pub fn is_following(store: &Store, follower_id: &str, followed_id: &str) -> Result<bool, ApiError> {
    let followings: Vec<String> = store
        .get_json(&followings_key(follower_id))?
        .unwrap_or_default();
    Ok(followings.contains(&followed_id.to_string()))
}

pub fn followed_by(store: &Store, user_id: &str, follower_id: &str) -> Result<bool, ApiError> {
    is_following(store, follower_id, user_id)
}

/// The full set of users `user_id` follows. Unpaginated.
pub fn get_followings(store: &Store, user_id: &str) -> Result<Vec<String>, ApiError> {
    let followings: Vec<String> = store
        .get_json(&followings_key(user_id))?
        .unwrap_or_default();
    Ok(followings)
}

/// The full set of users following `user_id`. Unpaginated; scans the edge
/// lists of every user.
pub fn get_followers(store: &Store, user_id: &str) -> Result<Vec<String>, ApiError> {
    let users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    let mut followers = Vec::new();

    for id in users {
        let followings: Vec<String> = store
            .get_json(&followings_key(&id))?
            .unwrap_or_default();
        if followings.contains(&user_id.to_string()) {
            followers.push(id);
        }
    }

    Ok(followers)
}

/// Posts authored by users `user_id` follows, plus the user's own posts,
/// newest first. The union with own posts is part of the contract.
pub fn followed_posts(
    store: &Store,
    user_id: &str,
    page: usize,
    per_page: usize,
) -> Result<Page<Post>, ApiError> {
    let followings = get_followings(store, user_id)?;
    let feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();

    let mut posts = Vec::new();
    for post_id in feed.iter() {
        if let Some(p) = store.get_json::<Post>(&post_key(post_id))? {
            if feed_includes(&followings, user_id, &p) {
                posts.push(p);
            }
        }
    }

    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(paginate(posts, page, per_page))
}

fn check_not_self(follower_id: &str, followed_id: &str) -> Result<(), ApiError> {
    if follower_id == followed_id {
        return Err(ApiError::InvalidOperation(
            "You cannot follow or unfollow yourself".to_string(),
        ));
    }
    Ok(())
}

fn insert_edge(followings: &mut Vec<String>, followed_id: &str) -> bool {
    if followings.iter().any(|id| id == followed_id) {
        return false;
    }
    followings.push(followed_id.to_string());
    true
}

/// Whether a post belongs in `viewer`'s home feed. Stranded posts never do.
fn feed_includes(followings: &[String], viewer: &str, post: &Post) -> bool {
    match &post.user_id {
        Some(author) => author == viewer || followings.iter().any(|id| id == author),
        None => false,
    }
}

// === HTTP Handlers ===

pub fn handle_follow(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let user = match current_user(&store, &req) {
        Some(u) => u,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let value: serde_json::Value = serde_json::from_slice(req.body())?;
    let target_user_id = value["target_user_id"].as_str().unwrap_or_default();

    if target_user_id.is_empty() || !validate_uuid(target_user_id) {
        return Ok(ApiError::BadRequest("Invalid target user".to_string()).into());
    }

    // Verify target user exists
    if store.get_json::<User>(&user_key(target_user_id))?.is_none() {
        return Ok(ApiError::NotFound("Target user not found".to_string()).into());
    }

    if let Err(e) = follow_user(&store, &user.id, target_user_id) {
        return Ok(e.into());
    }

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&serde_json::json!({"status": "followed"}))?)
        .build())
}

pub fn handle_unfollow(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let user = match current_user(&store, &req) {
        Some(u) => u,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let value: serde_json::Value = serde_json::from_slice(req.body())?;
    let target_user_id = value["target_user_id"].as_str().unwrap_or_default();

    if target_user_id.is_empty() || !validate_uuid(target_user_id) {
        return Ok(ApiError::BadRequest("Invalid target user".to_string()).into());
    }

    if let Err(e) = unfollow_user(&store, &user.id, target_user_id) {
        return Ok(e.into());
    }

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&serde_json::json!({"status": "unfollowed"}))?)
        .build())
}

pub fn get_followings_list(path: &str) -> anyhow::Result<Response> {
    let user_id = path.trim_start_matches("/followings/");

    if user_id.is_empty() || !validate_uuid(user_id) {
        return Ok(ApiError::BadRequest("User ID required".to_string()).into());
    }

    let store = store();
    let followings = match get_followings(&store, user_id) {
        Ok(f) => f,
        Err(e) => return Ok(e.into()),
    };

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&followings)?)
        .build())
}

pub fn get_followers_list(path: &str) -> anyhow::Result<Response> {
    let user_id = path.trim_start_matches("/followers/");

    if user_id.is_empty() || !validate_uuid(user_id) {
        return Ok(ApiError::BadRequest("User ID required".to_string()).into());
    }

    let store = store();
    let followers = match get_followers(&store, user_id) {
        Ok(f) => f,
        Err(e) => return Ok(e.into()),
    };

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&followers)?)
        .build())
}

pub fn handle_feed(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let user = match current_user(&store, &req) {
        Some(u) => u,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let params = crate::core::query_params::parse_query_params(req.uri());
    let page = crate::core::query_params::get_int(&params, "page", 1);
    let per_page = crate::core::query_params::get_int(&params, "per_page", posts_per_page());

    let posts = match followed_posts(&store, &user.id, page, per_page) {
        Ok(p) => p,
        Err(e) => return Ok(e.into()),
    };

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&posts)?)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(author: Option<&str>) -> Post {
        Post {
            id: "p".to_string(),
            user_id: author.map(str::to_string),
            body: "hello".to_string(),
            language: "en".to_string(),
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn self_follow_is_rejected() {
        let err = check_not_self("a", "a").unwrap_err();
        assert!(matches!(err, ApiError::InvalidOperation(_)));
        assert!(check_not_self("a", "b").is_ok());
    }

    #[test]
    fn edge_insert_is_idempotent() {
        let mut edges = Vec::new();
        assert!(insert_edge(&mut edges, "b"));
        assert!(!insert_edge(&mut edges, "b"));
        assert_eq!(edges, vec!["b".to_string()]);
    }

    #[test]
    fn feed_includes_own_and_followed_posts() {
        let followings = vec!["b".to_string()];
        assert!(feed_includes(&followings, "a", &post(Some("a"))));
        assert!(feed_includes(&followings, "a", &post(Some("b"))));
        assert!(!feed_includes(&followings, "a", &post(Some("c"))));
    }

    #[test]
    fn stranded_posts_never_appear_in_feeds() {
        assert!(!feed_includes(&["b".to_string()], "a", &post(None)));
    }
}
