//! End-to-end flows against a running server (`cargo run`, port 3000).
//! The auth layer is external, so tests stamp `X-User-Id` directly.

use serde_json::json;
use std::sync::Mutex;

const BASE_URL: &str = "http://127.0.0.1:3000";
static TEST_LOCK: Mutex<()> = Mutex::new(());

fn lock_test() -> std::sync::MutexGuard<'static, ()> {
    TEST_LOCK.lock().unwrap()
}

async fn create_user(client: &reqwest::Client, username: &str) -> String {
    let resp = client
        .post(format!("{}/users", BASE_URL))
        .json(&json!({"username": username}))
        .send()
        .await
        .expect("Failed to create user");
    assert_eq!(resp.status(), 201);
    let user = resp.json::<serde_json::Value>().await.unwrap();
    user["id"].as_str().unwrap().to_string()
}

async fn create_post(client: &reqwest::Client, user_id: &str, body: &str) -> serde_json::Value {
    let resp = client
        .post(format!("{}/posts", BASE_URL))
        .header("X-User-Id", user_id)
        .json(&json!({"body": body}))
        .send()
        .await
        .expect("Failed to create post");
    assert_eq!(resp.status(), 201);
    resp.json::<serde_json::Value>().await.unwrap()
}

#[tokio::test]
#[ignore = "requires a running server"]
async fn test_follow_and_feed_flow() {
    let _lock = lock_test();
    let client = reqwest::Client::new();

    let suffix = uuid::Uuid::new_v4();
    let a_id = create_user(&client, &format!("alice_{}", suffix)).await;
    let b_id = create_user(&client, &format!("bob_{}", suffix)).await;

    let post = create_post(&client, &a_id, "hello").await;
    assert_eq!(post["user_id"], a_id);
    assert!(post["language"].is_string(), "language should be auto-detected");

    // B follows nobody and has no posts: empty feed
    let feed = client
        .get(format!("{}/feed", BASE_URL))
        .header("X-User-Id", &b_id)
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    assert_eq!(feed["items"].as_array().unwrap().len(), 0);

    // Self-follow is rejected
    let resp = client
        .post(format!("{}/follow", BASE_URL))
        .header("X-User-Id", &b_id)
        .json(&json!({"target_user_id": b_id}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // B follows A and sees A's post
    let resp = client
        .post(format!("{}/follow", BASE_URL))
        .header("X-User-Id", &b_id)
        .json(&json!({"target_user_id": a_id}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let feed = client
        .get(format!("{}/feed", BASE_URL))
        .header("X-User-Id", &b_id)
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    let items = feed["items"].as_array().unwrap();
    assert!(items.iter().any(|p| p["body"] == "hello"));

    // After unfollowing the feed is empty again
    let resp = client
        .post(format!("{}/unfollow", BASE_URL))
        .header("X-User-Id", &b_id)
        .json(&json!({"target_user_id": a_id}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let feed = client
        .get(format!("{}/feed", BASE_URL))
        .header("X-User-Id", &b_id)
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    assert_eq!(feed["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
#[ignore = "requires a running server"]
async fn test_own_posts_appear_in_feed() {
    let _lock = lock_test();
    let client = reqwest::Client::new();

    let user_id = create_user(&client, &format!("solo_{}", uuid::Uuid::new_v4())).await;
    create_post(&client, &user_id, "talking to myself").await;

    let feed = client
        .get(format!("{}/feed", BASE_URL))
        .header("X-User-Id", &user_id)
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    let items = feed["items"].as_array().unwrap();
    assert!(items.iter().any(|p| p["body"] == "talking to myself"));
}

#[tokio::test]
#[ignore = "requires a running server"]
async fn test_message_updates_unread_count() {
    let _lock = lock_test();
    let client = reqwest::Client::new();

    let suffix = uuid::Uuid::new_v4();
    let a_name = format!("sender_{}", suffix);
    let b_name = format!("recipient_{}", suffix);
    let a_id = create_user(&client, &a_name).await;
    let b_id = create_user(&client, &b_name).await;

    let resp = client
        .post(format!("{}/messages", BASE_URL))
        .header("X-User-Id", &a_id)
        .json(&json!({"to": b_name, "body": "hi there"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let notifications = client
        .get(format!("{}/notifications?since=0.0", BASE_URL))
        .header("X-User-Id", &b_id)
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    let unread = notifications
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["name"] == "unread_message_count")
        .expect("unread_message_count notification missing");
    assert_eq!(unread["data"], 1);

    // Opening the inbox resets the counter
    let resp = client
        .get(format!("{}/messages", BASE_URL))
        .header("X-User-Id", &b_id)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let notifications = client
        .get(format!("{}/notifications?since=0.0", BASE_URL))
        .header("X-User-Id", &b_id)
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    let unread = notifications
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["name"] == "unread_message_count")
        .unwrap();
    assert_eq!(unread["data"], 0);
}

#[tokio::test]
#[ignore = "requires a running server"]
async fn test_like_is_idempotent() {
    let _lock = lock_test();
    let client = reqwest::Client::new();

    let user_id = create_user(&client, &format!("liker_{}", uuid::Uuid::new_v4())).await;
    let post = create_post(&client, &user_id, "like me").await;
    let post_id = post["id"].as_str().unwrap();

    for _ in 0..2 {
        let resp = client
            .post(format!("{}/likes/{}", BASE_URL, post_id))
            .header("X-User-Id", &user_id)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body = resp.json::<serde_json::Value>().await.unwrap();
        assert_eq!(body["likes"], 1);
    }
}

#[tokio::test]
#[ignore = "requires a running server"]
async fn test_page_past_the_end_is_empty() {
    let _lock = lock_test();
    let client = reqwest::Client::new();

    let user_id = create_user(&client, &format!("pager_{}", uuid::Uuid::new_v4())).await;
    let resp = client
        .get(format!("{}/explore?page=100000", BASE_URL))
        .header("X-User-Id", &user_id)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 0);
    assert_eq!(body["has_next"], false);
}

#[tokio::test]
#[ignore = "requires a running server without RIPPLE_TRANSLATE_URL set"]
async fn test_translate_without_a_service_returns_503() {
    let _lock = lock_test();
    let client = reqwest::Client::new();

    let user_id = create_user(&client, &format!("polyglot_{}", uuid::Uuid::new_v4())).await;
    let resp = client
        .post(format!("{}/translate", BASE_URL))
        .header("X-User-Id", &user_id)
        .json(&json!({"text": "hola", "source_language": "spa", "dest_language": "eng"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
}

#[tokio::test]
#[ignore = "requires a running server"]
async fn test_purge_stranded_posts_is_idempotent() {
    let _lock = lock_test();
    let client = reqwest::Client::new();

    let user_id = create_user(&client, &format!("doomed_{}", uuid::Uuid::new_v4())).await;
    create_post(&client, &user_id, "soon to be stranded").await;

    // Deleting the account strands the post
    let resp = client
        .delete(format!("{}/profile", BASE_URL))
        .header("X-User-Id", &user_id)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let first = client
        .post(format!("{}/maintenance/purge-posts", BASE_URL))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    assert!(first["purged"].as_u64().unwrap() >= 1);

    let second = client
        .post(format!("{}/maintenance/purge-posts", BASE_URL))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    assert_eq!(second["purged"], 0);
}
