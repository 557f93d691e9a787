use spin_sdk::http::{Request, Response};
use spin_sdk::key_value::Store;
use uuid::Uuid;
use crate::config::*;
use crate::core::errors::ApiError;
use crate::core::helpers::{now_iso, sanitize_text, store};
use crate::core::pagination::{paginate, Page};
use crate::core::query_params::{get_int, parse_query_params};
use crate::identity::current_user;
use crate::models::models::{Message, User};
use crate::notifications::add_notification;
use crate::posts::find_user_by_username;

/// Messages received since the user's last read checkpoint.
pub fn new_messages(store: &Store, user: &User) -> Result<usize, ApiError> {
    let last_read = user.last_message_read_time.clone().unwrap_or_default();
    let inbox: Vec<String> = store.get_json(&inbox_key(&user.id))?.unwrap_or_default();

    let mut count = 0;
    for id in inbox.iter() {
        if let Some(m) = store.get_json::<Message>(&message_key(id))? {
            // RFC 3339 strings in a fixed format compare chronologically
            if m.created_at > last_read {
                count += 1;
            }
        }
    }
    Ok(count)
}

/// Append an immutable message and update the recipient's unread-count
/// notification in the same operation.
pub fn send_message(
    store: &Store,
    sender_id: &str,
    recipient: &User,
    body: &str,
) -> Result<Message, ApiError> {
    let message = Message {
        id: Uuid::new_v4().to_string(),
        sender_id: sender_id.to_string(),
        recipient_id: recipient.id.clone(),
        body: sanitize_text(body),
        created_at: now_iso(),
    };

    store.set_json(&message_key(&message.id), &message)?;

    let key = inbox_key(&recipient.id);
    let mut inbox: Vec<String> = store.get_json(&key)?.unwrap_or_default();
    inbox.insert(0, message.id.clone());
    store.set_json(&key, &inbox)?;

    let key = outbox_key(sender_id);
    let mut outbox: Vec<String> = store.get_json(&key)?.unwrap_or_default();
    outbox.insert(0, message.id.clone());
    store.set_json(&key, &outbox)?;

    let unread = new_messages(store, recipient)?;
    add_notification(store, &recipient.id, UNREAD_MESSAGE_COUNT, serde_json::json!(unread))?;

    Ok(message)
}

/// Move the user's read checkpoint to now and reset the unread-count
/// notification. Both effects belong to one logical transaction.
pub fn mark_messages_read(store: &Store, user: &mut User) -> Result<(), ApiError> {
    user.last_message_read_time = Some(now_iso());
    store.set_json(&user_key(&user.id), user)?;
    add_notification(store, &user.id, UNREAD_MESSAGE_COUNT, serde_json::json!(0))?;
    Ok(())
}

/// The user's inbox, newest first.
pub fn messages_received(
    store: &Store,
    user_id: &str,
    page: usize,
    per_page: usize,
) -> Result<Page<Message>, ApiError> {
    let inbox: Vec<String> = store.get_json(&inbox_key(user_id))?.unwrap_or_default();

    let mut messages = Vec::new();
    for id in inbox.iter() {
        if let Some(m) = store.get_json::<Message>(&message_key(id))? {
            messages.push(m);
        }
    }
    messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(paginate(messages, page, per_page))
}

/// Both directions of one conversation, newest first.
pub fn messages_with(
    store: &Store,
    user_id: &str,
    other_id: &str,
    page: usize,
    per_page: usize,
) -> Result<Page<Message>, ApiError> {
    let inbox: Vec<String> = store.get_json(&inbox_key(user_id))?.unwrap_or_default();
    let outbox: Vec<String> = store.get_json(&outbox_key(user_id))?.unwrap_or_default();

    let mut messages = Vec::new();
    for id in inbox.iter().chain(outbox.iter()) {
        if let Some(m) = store.get_json::<Message>(&message_key(id))? {
            if m.sender_id == other_id || m.recipient_id == other_id {
                messages.push(m);
            }
        }
    }
    messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(paginate(messages, page, per_page))
}

// === HTTP Handlers ===

pub fn handle_send_message(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let user = match current_user(&store, &req) {
        Some(u) => u,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let value: serde_json::Value = serde_json::from_slice(req.body())?;
    let to = value["to"].as_str().unwrap_or_default();
    let body = value["body"].as_str().unwrap_or_default();

    if body.is_empty() || body.len() > MAX_MESSAGE_LENGTH {
        return Ok(ApiError::BadRequest("Invalid message body".to_string()).into());
    }

    let recipient = match find_user_by_username(&store, to)? {
        Some(u) => u,
        None => return Ok(ApiError::NotFound("Recipient not found".to_string()).into()),
    };

    if recipient.id == user.id {
        return Ok(
            ApiError::InvalidOperation("You cannot message yourself".to_string()).into(),
        );
    }

    let message = match send_message(&store, &user.id, &recipient, body) {
        Ok(m) => m,
        Err(e) => {
            log::error!("messages: send from {} to {} failed: {}", user.id, recipient.id, e);
            return Ok(e.into());
        }
    };

    Ok(Response::builder()
        .status(201)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&message)?)
        .build())
}

/// `GET /messages` — the inbox. Opening it moves the read checkpoint.
pub fn handle_list_messages(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let mut user = match current_user(&store, &req) {
        Some(u) => u,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    if let Err(e) = mark_messages_read(&store, &mut user) {
        return Ok(e.into());
    }

    let params = parse_query_params(req.uri());
    let page = get_int(&params, "page", 1);
    let per_page = get_int(&params, "per_page", posts_per_page());

    let messages = match messages_received(&store, &user.id, page, per_page) {
        Ok(m) => m,
        Err(e) => return Ok(e.into()),
    };

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&messages)?)
        .build())
}

/// `GET /messages/{username}` — one conversation.
pub fn handle_conversation(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let user = match current_user(&store, &req) {
        Some(u) => u,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let username = req.path().trim_start_matches("/messages/").to_string();
    if username.is_empty() {
        return Ok(ApiError::BadRequest("Username required".to_string()).into());
    }

    let other = match find_user_by_username(&store, &username)? {
        Some(u) => u,
        None => return Ok(ApiError::NotFound("User not found".to_string()).into()),
    };

    let params = parse_query_params(req.uri());
    let page = get_int(&params, "page", 1);
    let per_page = get_int(&params, "per_page", posts_per_page());

    let messages = match messages_with(&store, &user.id, &other.id, page, per_page) {
        Ok(m) => m,
        Err(e) => return Ok(e.into()),
    };

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&messages)?)
        .build())
}
