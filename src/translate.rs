use spin_sdk::http::{Method, Request, Response};
use crate::config::translate_url;
use crate::core::errors::ApiError;
use crate::core::helpers::store;
use crate::identity::current_user;

/// Translate through the external service at `base`. Degrades to a
/// placeholder text when the service is unreachable; never a fatal error.
pub async fn translate_text(base: &str, text: &str, source: &str, dest: &str) -> String {
    let payload = serde_json::json!({
        "text": text,
        "source_language": source,
        "dest_language": dest,
    });
    let request = Request::builder()
        .method(Method::Post)
        .uri(format!("{}/translate", base))
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&payload).unwrap_or_default())
        .build();

    let response = match spin_sdk::http::send::<_, Response>(request).await {
        Ok(r) if *r.status() == 200 => r,
        Ok(r) => {
            log::warn!("translate: service returned {}", r.status());
            return "Error: the translation service failed.".to_string();
        }
        Err(e) => {
            log::warn!("translate: request failed: {}", e);
            return "Error: the translation service failed.".to_string();
        }
    };

    serde_json::from_slice::<serde_json::Value>(response.body())
        .ok()
        .and_then(|v| v["text"].as_str().map(str::to_string))
        .unwrap_or_else(|| "Error: the translation service failed.".to_string())
}

// === HTTP Handlers ===

pub async fn handle_translate(req: Request) -> anyhow::Result<Response> {
    let store = store();
    if current_user(&store, &req).is_none() {
        return Ok(ApiError::Unauthorized.into());
    }

    // A transient outage degrades to placeholder text; no service configured
    // at all is a deployment state worth surfacing as such
    let Some(base) = translate_url() else {
        return Ok(ApiError::ServiceUnavailable(
            "Translation service is not configured".to_string(),
        )
        .into());
    };

    let value: serde_json::Value = serde_json::from_slice(req.body())?;
    let text = value["text"].as_str().unwrap_or_default();
    let source = value["source_language"].as_str().unwrap_or_default();
    let dest = value["dest_language"].as_str().unwrap_or_default();

    if text.is_empty() || dest.is_empty() {
        return Ok(ApiError::BadRequest("text and dest_language required".to_string()).into());
    }

    let translated = translate_text(&base, text, source, dest).await;

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&serde_json::json!({"text": translated}))?)
        .build())
}
