use spin_sdk::http::{Method, Request, Response};
use spin_sdk::key_value::Store;
use crate::config::*;
use crate::core::errors::ApiError;
use crate::core::helpers::store;
use crate::core::query_params::{get_int, get_string, parse_query_params};
use crate::identity::current_user;
use crate::models::models::Post;

/// Client for the external full-text index. When no index is configured
/// every operation is a no-op and queries return empty results; the degraded
/// mode never raises.
pub struct SearchClient {
    base_url: Option<String>,
}

impl SearchClient {
    pub fn from_env() -> Self {
        SearchClient { base_url: search_url() }
    }

    #[cfg(test)]
    fn disabled() -> Self {
        SearchClient { base_url: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.base_url.is_some()
    }

    pub async fn add_to_index(&self, post: &Post) {
        let Some(base) = &self.base_url else { return };

        let payload = serde_json::json!({
            "body": post.body,
            "language": post.language,
        });
        let url = format!("{}/posts/_doc/{}", base, post.id);
        let request = Request::builder()
            .method(Method::Put)
            .uri(&url)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&payload).unwrap_or_default())
            .build();

        match spin_sdk::http::send::<_, Response>(request).await {
            Ok(resp) if *resp.status() < 300 => {}
            Ok(resp) => {
                log::warn!("search: indexing post {} returned {}", post.id, resp.status());
            }
            Err(e) => log::warn!("search: indexing post {} failed: {}", post.id, e),
        }
    }

    pub async fn remove_from_index(&self, post_id: &str) {
        let Some(base) = &self.base_url else { return };

        let url = format!("{}/posts/_doc/{}", base, post_id);
        let request = Request::builder()
            .method(Method::Delete)
            .uri(&url)
            .build();

        if let Err(e) = spin_sdk::http::send::<_, Response>(request).await {
            log::warn!("search: removing post {} failed: {}", post_id, e);
        }
    }

    /// Ranked post ids plus the total hit count. Disabled or unreachable
    /// index yields `([], 0)`.
    pub async fn query_index(&self, query: &str, page: usize, per_page: usize) -> (Vec<String>, usize) {
        let Some(base) = &self.base_url else { return (Vec::new(), 0) };

        // An offset past usize range cannot match anything
        let Some(from) = (page.max(1) - 1).checked_mul(per_page) else {
            return (Vec::new(), 0);
        };

        let body = serde_json::json!({
            "query": {"multi_match": {"query": query, "lenient": true, "fields": ["*"]}},
            "from": from,
            "size": per_page,
        });
        let url = format!("{}/posts/_search", base);
        let request = Request::builder()
            .method(Method::Post)
            .uri(&url)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&body).unwrap_or_default())
            .build();

        let response = match spin_sdk::http::send::<_, Response>(request).await {
            Ok(r) => r,
            Err(e) => {
                log::warn!("search: query failed: {}", e);
                return (Vec::new(), 0);
            }
        };

        match parse_query_response(response.body()) {
            Some(result) => result,
            None => {
                log::warn!("search: malformed query response");
                (Vec::new(), 0)
            }
        }
    }
}

fn parse_query_response(body: &[u8]) -> Option<(Vec<String>, usize)> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let hits = value["hits"]["hits"].as_array()?;
    let ids = hits
        .iter()
        .filter_map(|h| h["_id"].as_str().map(str::to_string))
        .collect();
    let total = value["hits"]["total"]["value"].as_u64()? as usize;
    Some((ids, total))
}

/// Load the matched posts from the primary store, preserving the index's
/// relevance order rather than the store's natural order.
pub async fn search_posts(
    store: &Store,
    client: &SearchClient,
    query: &str,
    page: usize,
    per_page: usize,
) -> Result<(Vec<Post>, usize), ApiError> {
    let (ids, total) = client.query_index(query, page, per_page).await;

    let mut posts = Vec::new();
    for id in &ids {
        if let Some(p) = store.get_json::<Post>(&post_key(id))? {
            posts.push(p);
        }
    }

    Ok((order_by_relevance(posts, &ids), total))
}

fn order_by_relevance(mut posts: Vec<Post>, ids: &[String]) -> Vec<Post> {
    let rank = |id: &str| ids.iter().position(|i| i == id).unwrap_or(usize::MAX);
    posts.sort_by_key(|p| rank(&p.id));
    posts
}

/// Re-submit every persisted post to the index. Explicitly triggered via the
/// maintenance endpoint; nothing calls this on ordinary page loads.
pub async fn reindex_all(store: &Store, client: &SearchClient) -> Result<usize, ApiError> {
    if !client.is_enabled() {
        return Ok(0);
    }

    let feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();
    let mut count = 0;
    for id in feed.iter() {
        if let Some(post) = store.get_json::<Post>(&post_key(id))? {
            client.add_to_index(&post).await;
            count += 1;
        }
    }

    Ok(count)
}

// === HTTP Handlers ===

pub async fn handle_search(req: Request) -> anyhow::Result<Response> {
    let store = store();
    if current_user(&store, &req).is_none() {
        return Ok(ApiError::Unauthorized.into());
    }

    let params = parse_query_params(req.uri());
    let query = match get_string(&params, "q", None) {
        Some(q) if !q.is_empty() => q,
        _ => return Ok(ApiError::BadRequest("q parameter required".to_string()).into()),
    };
    let page = get_int(&params, "page", 1);
    let per_page = get_int(&params, "per_page", posts_per_page());

    let client = SearchClient::from_env();
    let (posts, total) = match search_posts(&store, &client, &query, page, per_page).await {
        Ok(r) => r,
        Err(e) => return Ok(e.into()),
    };

    let body = serde_json::json!({
        "items": posts,
        "total": total,
        "has_next": page.checked_mul(per_page).is_some_and(|seen| total > seen),
        "has_prev": page > 1,
    });

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&body)?)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: &str) -> Post {
        Post {
            id: id.to_string(),
            user_id: Some("u".to_string()),
            body: "hello".to_string(),
            language: "eng".to_string(),
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[tokio::test]
    async fn disabled_adapter_returns_empty_and_never_errors() {
        let client = SearchClient::disabled();
        assert_eq!(client.query_index("anything", 1, 10).await, (Vec::new(), 0));
        client.add_to_index(&post("a")).await;
        client.remove_from_index("a").await;
    }

    #[test]
    fn loaded_rows_follow_the_relevance_order() {
        let ids = vec!["c".to_string(), "a".to_string(), "b".to_string()];
        // Store load order differs from the ranking
        let posts = vec![post("a"), post("b"), post("c")];
        let ordered = order_by_relevance(posts, &ids);
        let got: Vec<&str> = ordered.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(got, vec!["c", "a", "b"]);
    }

    #[test]
    fn parses_an_opensearch_style_response() {
        let body = serde_json::json!({
            "hits": {
                "total": {"value": 7},
                "hits": [{"_id": "x"}, {"_id": "y"}],
            }
        });
        let (ids, total) = parse_query_response(&serde_json::to_vec(&body).unwrap()).unwrap();
        assert_eq!(ids, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(total, 7);
    }
}
