/// Canonical error type used across all modules.
#[derive(Debug, thiserror::Error)]
pub enum CanonicalError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Upstream error: status={status}, message={message}")]
    Upstream { status: u16, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Upstream protocol error: {0}")]
    UpstreamProtocol(String),
    #[error("Upstream aborted: {0}")]
    UpstreamAbort(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad error category for status code selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    Authentication,
    Permission,
    RateLimit,
    ServerError,
    Unknown,
}

/// Map an upstream HTTP status code to an error category.
#[must_use]
pub fn category_from_upstream_status(status: u16) -> ErrorCategory {
    match status {
        400 => ErrorCategory::InvalidRequest,
        401 => ErrorCategory::Authentication,
        403 => ErrorCategory::Permission,
        429 => ErrorCategory::RateLimit,
        500..=599 => ErrorCategory::ServerError,
        _ => ErrorCategory::Unknown,
    }
}

impl CanonicalError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            CanonicalError::InvalidRequest(_) => ErrorCategory::InvalidRequest,
            CanonicalError::Config(_)
            | CanonicalError::Transport(_)
            | CanonicalError::UpstreamProtocol(_)
            | CanonicalError::UpstreamAbort(_)
            | CanonicalError::Internal(_) => ErrorCategory::ServerError,
            CanonicalError::Upstream { status, .. } => category_from_upstream_status(*status),
        }
    }

    /// A single malformed event that a stream session may drop and continue past.
    #[must_use]
    pub fn is_recoverable_in_stream(&self) -> bool {
        matches!(self, CanonicalError::UpstreamProtocol(_))
    }

    /// Failure to open or authenticate against the upstream.
    #[must_use]
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            CanonicalError::Transport(_) | CanonicalError::Upstream { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Category -> HTTP status code
// ---------------------------------------------------------------------------

fn http_status_for_category(cat: ErrorCategory) -> http::StatusCode {
    match cat {
        ErrorCategory::InvalidRequest => http::StatusCode::BAD_REQUEST,
        ErrorCategory::Authentication => http::StatusCode::UNAUTHORIZED,
        ErrorCategory::Permission => http::StatusCode::FORBIDDEN,
        ErrorCategory::RateLimit => http::StatusCode::TOO_MANY_REQUESTS,
        ErrorCategory::ServerError | ErrorCategory::Unknown => {
            http::StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn openai_error_kind(cat: ErrorCategory) -> (&'static str, &'static str) {
    match cat {
        ErrorCategory::InvalidRequest => ("invalid_request_error", "invalid_request"),
        ErrorCategory::Authentication => ("authentication_error", "invalid_api_key"),
        ErrorCategory::Permission => ("permission_error", "permission_denied"),
        ErrorCategory::RateLimit => ("rate_limit_error", "rate_limit_exceeded"),
        ErrorCategory::ServerError | ErrorCategory::Unknown => ("server_error", "server_error"),
    }
}

/// Build an OpenAI-shaped error body.
#[must_use]
pub fn openai_error_payload(cat: ErrorCategory, message: &str) -> serde_json::Value {
    let (kind, code) = openai_error_kind(cat);
    serde_json::json!({
        "error": {
            "message": message,
            "type": kind,
            "code": code,
            "param": null,
        }
    })
}

/// Format an error for the chat-completion ingress, returning (`status_code`, JSON body).
#[must_use]
pub fn format_error(err: &CanonicalError) -> (http::StatusCode, serde_json::Value) {
    let cat = err.category();
    let status = http_status_for_category(cat);
    (status, openai_error_payload(cat, &err.to_string()))
}

// ---------------------------------------------------------------------------
// Axum integration
// ---------------------------------------------------------------------------

/// Convert a `CanonicalError` into an axum response.
#[must_use]
pub fn into_axum_response(err: &CanonicalError) -> axum::response::Response {
    use axum::response::IntoResponse;
    let (status, body) = format_error(err);
    (status, axum::Json(body)).into_response()
}

impl axum::response::IntoResponse for CanonicalError {
    fn into_response(self) -> axum::response::Response {
        into_axum_response(&self)
    }
}
