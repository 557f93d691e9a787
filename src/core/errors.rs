use spin_sdk::http::Response;
use std::fmt;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// Rejected domain operation (self-follow, deleting somebody else's
    /// post). Surfaced as a user-visible rejection, not a crash.
    InvalidOperation(String),
    Unauthorized,
    Forbidden,
    NotFound(String),
    Conflict(String),
    /// External dependency (search index, identicon or translation service)
    /// unreachable. Components degrade instead of failing the request; this
    /// variant exists for the few endpoints where there is nothing to
    /// degrade to.
    ServiceUnavailable(String),
    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::InvalidOperation(msg) => write!(f, "Invalid Operation: {}", msg),
            ApiError::Unauthorized => write!(f, "Unauthorized"),
            ApiError::Forbidden => write!(f, "Forbidden"),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service Unavailable: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal Error: {}", msg),
        }
    }
}

fn json_error(status: u16, msg: &str) -> Response {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&serde_json::json!({"error": msg})).unwrap_or_default())
        .build()
}

impl From<ApiError> for Response {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::BadRequest(msg) => json_error(400, &msg),
            ApiError::InvalidOperation(msg) => json_error(400, &msg),
            ApiError::Unauthorized => json_error(401, "Unauthorized"),
            ApiError::Forbidden => json_error(403, "Forbidden"),
            ApiError::NotFound(msg) => json_error(404, &msg),
            ApiError::Conflict(msg) => json_error(409, &msg),
            ApiError::ServiceUnavailable(msg) => json_error(503, &msg),
            ApiError::InternalError(msg) => json_error(500, &msg),
        }
    }
}

impl std::error::Error for ApiError {}

// Store and serialization failures surface as internal errors
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<spin_sdk::key_value::Error> for ApiError {
    fn from(err: spin_sdk::key_value::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}
