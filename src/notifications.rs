use spin_sdk::http::{Request, Response};
use spin_sdk::key_value::Store;
use uuid::Uuid;
use crate::config::*;
use crate::core::errors::ApiError;
use crate::core::helpers::{epoch_now, store};
use crate::core::query_params::{get_float, parse_query_params};
use crate::identity::current_user;
use crate::models::models::Notification;

/// Record a notification for the user. Any previous notification with the
/// same name is replaced, so the latest payload for a name is authoritative
/// when the UI polls.
pub fn add_notification(
    store: &Store,
    user_id: &str,
    name: &str,
    payload: serde_json::Value,
) -> Result<Notification, ApiError> {
    let key = notifications_key(user_id);
    let mut notifications: Vec<Notification> = store.get_json(&key)?.unwrap_or_default();

    let notification = Notification {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        payload,
        timestamp: epoch_now(),
    };
    upsert(&mut notifications, notification.clone());

    store.set_json(&key, &notifications)?;
    Ok(notification)
}

/// Notifications newer than `since`, ascending. The polling contract: the
/// client passes back the max timestamp it has seen.
pub fn notifications_since(
    store: &Store,
    user_id: &str,
    since: f64,
) -> Result<Vec<Notification>, ApiError> {
    let notifications: Vec<Notification> = store
        .get_json(&notifications_key(user_id))?
        .unwrap_or_default();

    Ok(newer_than(notifications, since))
}

/// Strictly newer than `since`, ascending. The cursor itself is excluded so
/// a client replaying its max seen timestamp gets no duplicates.
fn newer_than(mut notifications: Vec<Notification>, since: f64) -> Vec<Notification> {
    notifications.retain(|n| n.timestamp > since);
    notifications.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    notifications
}

fn upsert(notifications: &mut Vec<Notification>, notification: Notification) {
    notifications.retain(|n| n.name != notification.name);
    notifications.push(notification);
}

/// Drop notifications at or before the cutoff. Used by the retention job.
pub fn prune_older_than(notifications: &mut Vec<Notification>, cutoff: f64) -> usize {
    let before = notifications.len();
    notifications.retain(|n| n.timestamp > cutoff);
    before - notifications.len()
}

// === HTTP Handlers ===

pub fn handle_notifications(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let user = match current_user(&store, &req) {
        Some(u) => u,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let params = parse_query_params(req.uri());
    let since = get_float(&params, "since", 0.0);

    let notifications = match notifications_since(&store, &user.id, since) {
        Ok(n) => n,
        Err(e) => return Ok(e.into()),
    };

    let body: Vec<serde_json::Value> = notifications
        .iter()
        .map(|n| {
            serde_json::json!({
                "name": n.name,
                "data": n.payload,
                "timestamp": n.timestamp,
            })
        })
        .collect();

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&body)?)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(name: &str, payload: i64, timestamp: f64) -> Notification {
        Notification {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            payload: serde_json::json!(payload),
            timestamp,
        }
    }

    #[test]
    fn upsert_replaces_same_name() {
        let mut list = Vec::new();
        upsert(&mut list, notification("unread_message_count", 1, 1.0));
        upsert(&mut list, notification("unread_message_count", 2, 2.0));
        upsert(&mut list, notification("task_progress", 50, 3.0));

        assert_eq!(list.len(), 2);
        let unread = list.iter().find(|n| n.name == "unread_message_count").unwrap();
        assert_eq!(unread.payload, serde_json::json!(2));
    }

    #[test]
    fn polling_excludes_the_cursor_and_sorts_ascending() {
        let list = vec![
            notification("c", 0, 30.0),
            notification("a", 0, 10.0),
            notification("b", 0, 20.0),
        ];

        let got = newer_than(list, 10.0);
        let names: Vec<&str> = got.iter().map(|n| n.name.as_str()).collect();
        // 10.0 is the caller's max seen timestamp: excluded, remainder ascending
        assert_eq!(names, vec!["b", "c"]);
        assert!(got[0].timestamp < got[1].timestamp);
    }

    #[test]
    fn prune_keeps_recent_entries() {
        let mut list = vec![
            notification("a", 0, 10.0),
            notification("b", 0, 20.0),
            notification("c", 0, 30.0),
        ];
        let removed = prune_older_than(&mut list, 20.0);
        assert_eq!(removed, 2);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "c");
    }
}
