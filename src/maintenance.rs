use std::collections::HashSet;
use spin_sdk::http::{Request, Response};
use spin_sdk::key_value::Store;
use crate::config::*;
use crate::core::errors::ApiError;
use crate::core::helpers::{epoch_now, store};
use crate::models::models::{Post, User};
use crate::notifications::prune_older_than;
use crate::search::{reindex_all, SearchClient};

/// Delete every stranded post (owner reference gone) and return the purged
/// ids so the caller can evict them from the search index. Idempotent; the
/// feed is rewritten once per run rather than per row.
pub fn purge_stranded_posts(store: &Store) -> Result<Vec<String>, ApiError> {
    let feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();

    let mut posts = Vec::new();
    for id in feed.iter() {
        if let Some(p) = store.get_json::<Post>(&post_key(id))? {
            posts.push(p);
        }
    }
    let stranded = stranded_post_ids(&posts);

    if stranded.is_empty() {
        return Ok(stranded);
    }

    for id in &stranded {
        store.delete(&post_key(id))?;
        store.delete(&likes_key(id))?;
    }

    let remaining: Vec<String> = feed
        .into_iter()
        .filter(|id| !stranded.contains(id))
        .collect();
    store.set_json(FEED_KEY, &remaining)?;

    log::info!("maintenance: purged {} stranded posts", stranded.len());
    Ok(stranded)
}

fn stranded_post_ids(posts: &[Post]) -> Vec<String> {
    posts
        .iter()
        .filter(|p| p.user_id.is_none())
        .map(|p| p.id.clone())
        .collect()
}

fn referenced_avatar_files(store: &Store) -> Result<HashSet<String>, ApiError> {
    let users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    let mut referenced = HashSet::new();
    for id in users {
        if let Some(u) = store.get_json::<User>(&user_key(&id))? {
            if let Some(filename) = u.avatar_filename {
                referenced.insert(filename);
            }
        }
    }
    Ok(referenced)
}

fn removable(filename: &str, referenced: &HashSet<String>) -> bool {
    filename != AVATAR_SENTINEL && !referenced.contains(filename)
}

/// Delete stored avatar files no user references. The referenced set is
/// recomputed before each delete so a concurrent upload cannot lose its
/// file, and the listing is rewritten from its current state so an entry
/// appended mid-run keeps its place.
pub fn purge_unused_avatar_files(store: &Store) -> Result<usize, ApiError> {
    let snapshot: Vec<String> = store.get_json(AVATAR_FILES_KEY)?.unwrap_or_default();

    let mut purged = HashSet::new();
    for filename in &snapshot {
        let referenced = referenced_avatar_files(store)?;
        if removable(filename, &referenced) {
            store.delete(&avatar_key(filename))?;
            log::info!("maintenance: deleted unused avatar file {}", filename);
            purged.insert(filename.clone());
        }
    }

    if !purged.is_empty() {
        let current: Vec<String> = store.get_json(AVATAR_FILES_KEY)?.unwrap_or_default();
        store.set_json(AVATAR_FILES_KEY, &without_purged(current, &purged))?;
    }

    Ok(purged.len())
}

fn without_purged(listing: Vec<String>, purged: &HashSet<String>) -> Vec<String> {
    listing.into_iter().filter(|f| !purged.contains(f)).collect()
}

/// Drop notifications older than the configured retention window.
pub fn purge_stale_notifications(store: &Store) -> Result<usize, ApiError> {
    let cutoff = epoch_now() - (notification_retention_days() * 86_400) as f64;
    let users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();

    let mut purged = 0;
    for id in users {
        let key = notifications_key(&id);
        let mut notifications = match store.get_json(&key)? {
            Some(n) => n,
            None => continue,
        };
        let removed = prune_older_than(&mut notifications, cutoff);
        if removed > 0 {
            store.set_json(&key, &notifications)?;
            purged += removed;
        }
    }

    Ok(purged)
}

// === HTTP Handlers ===
// Maintenance is externally triggered (cron-style); these endpoints are safe
// to call while live traffic runs against the same store.

fn purged_response(purged: usize) -> anyhow::Result<Response> {
    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&serde_json::json!({"purged": purged}))?)
        .build())
}

pub async fn handle_purge_posts(_req: Request) -> anyhow::Result<Response> {
    let store = store();
    let purged = match purge_stranded_posts(&store) {
        Ok(ids) => ids,
        Err(e) => return Ok(e.into()),
    };

    // Best effort, like every other index call; a dead index only costs
    // freshness
    let client = SearchClient::from_env();
    for id in &purged {
        client.remove_from_index(id).await;
    }

    purged_response(purged.len())
}

pub fn handle_purge_avatars(_req: Request) -> anyhow::Result<Response> {
    let store = store();
    match purge_unused_avatar_files(&store) {
        Ok(n) => purged_response(n),
        Err(e) => Ok(e.into()),
    }
}

pub fn handle_purge_notifications(_req: Request) -> anyhow::Result<Response> {
    let store = store();
    match purge_stale_notifications(&store) {
        Ok(n) => purged_response(n),
        Err(e) => Ok(e.into()),
    }
}

pub async fn handle_reindex(_req: Request) -> anyhow::Result<Response> {
    let store = store();
    let client = SearchClient::from_env();
    match reindex_all(&store, &client).await {
        Ok(n) => Ok(Response::builder()
            .status(200)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&serde_json::json!({"indexed": n}))?)
            .build()),
        Err(e) => Ok(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: &str, owner: Option<&str>) -> Post {
        Post {
            id: id.to_string(),
            user_id: owner.map(str::to_string),
            body: "body".to_string(),
            language: String::new(),
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn only_stranded_posts_are_selected_for_purge() {
        let posts = vec![post("a", Some("u1")), post("b", None), post("c", None)];
        assert_eq!(stranded_post_ids(&posts), vec!["b".to_string(), "c".to_string()]);
        // Second pass over the surviving posts finds nothing
        assert!(stranded_post_ids(&[post("a", Some("u1"))]).is_empty());
    }

    #[test]
    fn sentinel_is_never_removable() {
        let referenced = HashSet::new();
        assert!(!removable(AVATAR_SENTINEL, &referenced));
    }

    #[test]
    fn referenced_files_are_kept() {
        let referenced: HashSet<String> = ["usera.png".to_string()].into_iter().collect();
        assert!(!removable("usera.png", &referenced));
        assert!(removable("userb.png", &referenced));
    }

    #[test]
    fn listing_rewrite_keeps_entries_added_mid_run() {
        let purged: HashSet<String> = ["stale.png".to_string()].into_iter().collect();
        // "fresh.png" landed in the listing after the run snapshotted it
        let current = vec![
            "stale.png".to_string(),
            "usera.png".to_string(),
            "fresh.png".to_string(),
        ];
        assert_eq!(
            without_purged(current, &purged),
            vec!["usera.png".to_string(), "fresh.png".to_string()]
        );
    }
}
