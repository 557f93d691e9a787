use spin_sdk::http::{Request, Response};
use spin_sdk::key_value::Store;
use uuid::Uuid;
use crate::config::*;
use crate::core::errors::ApiError;
use crate::core::helpers::{now_iso, sanitize_text, store, validate_uuid};
use crate::core::pagination::{paginate, Page};
use crate::core::query_params::{get_int, get_string, parse_query_params};
use crate::identity::current_user;
use crate::models::models::{Post, User};
use crate::search::SearchClient;

/// Tag a post body with a detected language code, empty when detection is
/// inconclusive.
pub fn detect_language(body: &str) -> String {
    whatlang::detect(body)
        .filter(|info| info.is_reliable())
        .map(|info| info.lang().code().to_string())
        .unwrap_or_default()
}

/// All posts, newest first. The explore feed.
pub fn all_posts(store: &Store, page: usize, per_page: usize) -> Result<Page<Post>, ApiError> {
    let feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();

    let mut posts = Vec::new();
    for id in feed.iter() {
        if let Some(p) = store.get_json::<Post>(&post_key(id))? {
            posts.push(p);
        }
    }
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(paginate(posts, page, per_page))
}

/// One author's posts, newest first.
pub fn user_posts(
    store: &Store,
    author_id: &str,
    page: usize,
    per_page: usize,
) -> Result<Page<Post>, ApiError> {
    let feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();

    let mut posts = Vec::new();
    for id in feed.iter() {
        if let Some(p) = store.get_json::<Post>(&post_key(id))? {
            if p.user_id.as_deref() == Some(author_id) {
                posts.push(p);
            }
        }
    }
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(paginate(posts, page, per_page))
}

pub fn find_user_by_username(store: &Store, username: &str) -> Result<Option<User>, ApiError> {
    let users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    for id in users {
        if let Some(u) = store.get_json::<User>(&user_key(&id))? {
            if u.username == username {
                return Ok(Some(u));
            }
        }
    }
    Ok(None)
}

// === HTTP Handlers ===

pub async fn create_post(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let user = match current_user(&store, &req) {
        Some(u) => u,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let value: serde_json::Value = serde_json::from_slice(req.body())?;
    let body = value["body"].as_str().unwrap_or_default();

    if body.is_empty() || body.len() > MAX_POST_LENGTH {
        return Ok(ApiError::BadRequest("Invalid post body".to_string()).into());
    }

    let body = sanitize_text(body);
    let id = Uuid::new_v4().to_string();
    let post = Post {
        id: id.clone(),
        user_id: Some(user.id.clone()),
        language: detect_language(&body),
        body,
        created_at: now_iso(),
    };

    store.set_json(&post_key(&id), &post)?;

    let mut feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();
    feed.insert(0, id.clone()); // prepend newest
    store.set_json(FEED_KEY, &feed)?;

    // Best effort; the index degrades to empty results when unavailable
    SearchClient::from_env().add_to_index(&post).await;

    Ok(Response::builder()
        .status(201)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&post)?)
        .build())
}

pub async fn delete_post(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let user = match current_user(&store, &req) {
        Some(u) => u,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let path = req.path();
    let post_id = path.split('/').last().unwrap_or("");

    if post_id.is_empty() || !validate_uuid(post_id) {
        return Ok(ApiError::BadRequest("Post ID required".to_string()).into());
    }

    let key = post_key(post_id);
    let post = match store.get_json::<Post>(&key)? {
        Some(p) => p,
        None => return Ok(ApiError::NotFound("Post not found".to_string()).into()),
    };

    if post.user_id.as_deref() != Some(user.id.as_str()) {
        return Ok(
            ApiError::InvalidOperation("You cannot delete somebody else's post".to_string())
                .into(),
        );
    }

    store.delete(&key)?;
    store.delete(&likes_key(post_id))?;

    let mut feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();
    feed.retain(|id| id != post_id);
    store.set_json(FEED_KEY, &feed)?;

    SearchClient::from_env().remove_from_index(post_id).await;

    Ok(Response::builder().status(204).build())
}

pub fn handle_explore(req: Request) -> anyhow::Result<Response> {
    let store = store();
    if current_user(&store, &req).is_none() {
        return Ok(ApiError::Unauthorized.into());
    }

    let params = parse_query_params(req.uri());
    let page = get_int(&params, "page", 1);
    let per_page = get_int(&params, "per_page", posts_per_page());

    let posts = match all_posts(&store, page, per_page) {
        Ok(p) => p,
        Err(e) => return Ok(e.into()),
    };

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&posts)?)
        .build())
}

/// `GET /posts?user={username}` — one user's posts, publicly readable.
pub fn handle_list_posts(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let params = parse_query_params(req.uri());
    let page = get_int(&params, "page", 1);
    let per_page = get_int(&params, "per_page", posts_per_page());

    let username = match get_string(&params, "user", None) {
        Some(u) => u,
        None => return Ok(ApiError::BadRequest("user parameter required".to_string()).into()),
    };

    let author = match find_user_by_username(&store, &username)? {
        Some(u) => u,
        None => return Ok(ApiError::NotFound("User not found".to_string()).into()),
    };

    let posts = match user_posts(&store, &author.id, page, per_page) {
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

    #[test]
    fn detects_plain_english() {
        let body = "the quick brown fox jumps over the lazy dog and then runs far away into the quiet green forest";
        assert_eq!(detect_language(body), "eng");
    }

    #[test]
    fn inconclusive_text_gets_no_tag() {
        assert_eq!(detect_language(""), "");
    }
}
