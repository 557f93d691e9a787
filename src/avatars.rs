use mime_guess::from_path;
use sha2::{Digest, Sha256};
use spin_sdk::http::{Method, Request, Response};
use spin_sdk::key_value::Store;
use crate::config::*;
use crate::core::errors::ApiError;
use crate::core::helpers::store;
use crate::identity::current_user;
use crate::models::models::User;

/// The storage name an avatar for this user goes under.
pub fn avatar_filename(user_id: &str, extension: &str) -> String {
    format!("user{}.{}", user_id, extension)
}

/// Deterministic identicon URL derived from a hash of the user's identity.
pub fn identicon_url(user_id: &str) -> String {
    let digest = Sha256::digest(user_id.to_lowercase().as_bytes());
    format!(
        "{}/{:x}?d=identicon&s={}",
        avatar_service_url(),
        digest,
        avatar_size()
    )
}

pub fn avatar_exists(store: &Store, filename: &str) -> Result<bool, ApiError> {
    Ok(store.exists(&avatar_key(filename))?)
}

/// Store avatar bytes and register the filename in the storage listing.
/// Bytes land before any user record points at them.
pub fn store_avatar(store: &Store, filename: &str, bytes: &[u8]) -> Result<(), ApiError> {
    store.set(&avatar_key(filename), bytes)?;

    let mut files: Vec<String> = store.get_json(AVATAR_FILES_KEY)?.unwrap_or_default();
    if !files.iter().any(|f| f == filename) {
        files.push(filename.to_string());
        store.set_json(AVATAR_FILES_KEY, &files)?;
    }

    Ok(())
}

/// Make sure the user has a displayable avatar. When the recorded file is
/// missing, fetch a deterministic identicon from the external service. Fails
/// soft: a fetch failure logs and leaves the user without an avatar, it never
/// fails the enclosing request.
pub async fn ensure_avatar(store: &Store, user: &mut User) {
    if let Some(filename) = &user.avatar_filename {
        match avatar_exists(store, filename) {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => {
                log::warn!("avatars: lookup for user {} failed: {}", user.id, e);
                return;
            }
        }
    }

    let url = identicon_url(&user.id);
    let request = Request::builder().method(Method::Get).uri(&url).build();
    let response = match spin_sdk::http::send::<_, Response>(request).await {
        Ok(r) if *r.status() == 200 => r,
        Ok(r) => {
            log::warn!("avatars: identicon fetch for user {} returned {}", user.id, r.status());
            return;
        }
        Err(e) => {
            log::warn!("avatars: identicon fetch for user {} failed: {}", user.id, e);
            return;
        }
    };

    let filename = avatar_filename(&user.id, "png");
    if let Err(e) = store_avatar(store, &filename, response.body()) {
        log::warn!("avatars: storing identicon for user {} failed: {}", user.id, e);
        return;
    }

    user.avatar_filename = Some(filename);
    if let Err(e) = store.set_json(&user_key(&user.id), user) {
        log::warn!("avatars: recording filename for user {} failed: {}", user.id, e);
    }
}

// === HTTP Handlers ===

/// `POST /avatars` — raw image upload for the caller. The previous file, if
/// any, stays in storage until the purge job sweeps it.
pub fn handle_upload(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let mut user = match current_user(&store, &req) {
        Some(u) => u,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let content_type = req
        .header("Content-Type")
        .and_then(|h| h.as_str())
        .unwrap_or_default();
    let extension = match content_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        _ => return Ok(ApiError::BadRequest("Unsupported image type".to_string()).into()),
    };

    let bytes = req.body();
    if bytes.is_empty() {
        return Ok(ApiError::BadRequest("Empty image".to_string()).into());
    }

    let filename = avatar_filename(&user.id, extension);
    if let Err(e) = store_avatar(&store, &filename, bytes) {
        return Ok(e.into());
    }

    // Bytes are in place; now commit the metadata
    user.avatar_filename = Some(filename.clone());
    store.set_json(&user_key(&user.id), &user)?;

    Ok(Response::builder()
        .status(201)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&serde_json::json!({"avatar_filename": filename}))?)
        .build())
}

/// `GET /avatars/{filename}`
pub fn handle_serve(path: &str) -> anyhow::Result<Response> {
    let filename = path.trim_start_matches("/avatars/");
    if filename.is_empty() || filename.contains('/') {
        return Ok(ApiError::BadRequest("Filename required".to_string()).into());
    }

    let store = store();
    let bytes = match store.get(&avatar_key(filename))? {
        Some(b) => b,
        None => return Ok(ApiError::NotFound("Avatar not found".to_string()).into()),
    };

    let mime = from_path(filename).first_or_octet_stream();

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", mime.as_ref())
        .body(bytes)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identicon_url_is_deterministic() {
        let a = identicon_url("1d8cbf70-0bdb-43a1-a03e-70c2bd26ad7d");
        let b = identicon_url("1d8cbf70-0bdb-43a1-a03e-70c2bd26ad7d");
        assert_eq!(a, b);
        assert!(a.contains("d=identicon"));
    }

    #[test]
    fn identicon_url_varies_by_user() {
        assert_ne!(identicon_url("user-a"), identicon_url("user-b"));
    }

    #[test]
    fn filenames_derive_from_the_user_id() {
        assert_eq!(avatar_filename("abc", "png"), "userabc.png");
    }
}
