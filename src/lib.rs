pub mod config;
pub mod identity;

pub mod core {
    pub mod errors;
    pub mod helpers;
    pub mod pagination;
    pub mod query_params;
}

pub mod models {
    pub mod models;
}

pub mod avatars;
pub mod follow;
pub mod likes;
pub mod maintenance;
pub mod messages;
pub mod notifications;
pub mod posts;
pub mod search;
pub mod translate;
pub mod users;

use spin_sdk::http::{Request, Response};

/// Map HTTP verbs to domain operations. Shared by the Spin component and the
/// native adapter binary.
pub async fn route(req: Request) -> anyhow::Result<Response> {
    let path = req.path().to_string();
    let method = req.method().to_string();

    match (method.as_str(), path.as_str()) {
        ("POST", "/users") => users::create_user(req),
        ("GET", p) if p.starts_with("/users/") => users::get_user_details(req).await,
        ("PUT", "/profile") => users::update_profile(req),
        ("DELETE", "/profile") => users::delete_profile(req),
        ("GET", "/feed") => follow::handle_feed(req),
        ("GET", "/explore") => posts::handle_explore(req),
        ("GET", "/posts") => posts::handle_list_posts(req),
        ("POST", "/posts") => posts::create_post(req).await,
        ("DELETE", p) if p.starts_with("/posts/") => posts::delete_post(req).await,
        ("POST", "/follow") => follow::handle_follow(req),
        ("POST", "/unfollow") => follow::handle_unfollow(req),
        ("GET", p) if p.starts_with("/followings/") => follow::get_followings_list(p),
        ("GET", p) if p.starts_with("/followers/") => follow::get_followers_list(p),
        ("POST", p) if p.starts_with("/likes/") => likes::handle_like(req),
        ("DELETE", p) if p.starts_with("/likes/") => likes::handle_unlike(req),
        ("GET", "/search") => search::handle_search(req).await,
        ("POST", "/translate") => translate::handle_translate(req).await,
        ("POST", "/messages") => messages::handle_send_message(req),
        ("GET", "/messages") => messages::handle_list_messages(req),
        ("GET", p) if p.starts_with("/messages/") => messages::handle_conversation(req),
        ("GET", "/notifications") => notifications::handle_notifications(req),
        ("POST", "/avatars") => avatars::handle_upload(req),
        ("GET", p) if p.starts_with("/avatars/") => avatars::handle_serve(p),
        ("POST", "/maintenance/reindex") => maintenance::handle_reindex(req).await,
        ("POST", "/maintenance/purge-posts") => maintenance::handle_purge_posts(req).await,
        ("POST", "/maintenance/purge-avatars") => maintenance::handle_purge_avatars(req),
        ("POST", "/maintenance/purge-notifications") => {
            maintenance::handle_purge_notifications(req)
        }
        _ => Ok(Response::builder().status(404).body("Not found").build()),
    }
}

#[cfg(target_arch = "wasm32")]
mod component {
    use spin_sdk::http::{IntoResponse, Request};
    use spin_sdk::http_component;

    #[http_component]
    async fn handle(req: Request) -> anyhow::Result<impl IntoResponse> {
        super::route(req).await
    }
}
