use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// ApiError
///
/// The application-wide error taxonomy. Every handler returns `Result<_, ApiError>`,
/// letting guard checks and repository calls short-circuit with `?`.
///
/// Mapping to HTTP:
/// - `Unauthenticated` -> 401 (missing/malformed/expired token, or token for a deleted user)
/// - `Forbidden`       -> 403 (role or ownership mismatch)
/// - `NotFound`        -> 404 (absent record; made explicit rather than returning null)
/// - `Conflict`        -> 409 (duplicate resource)
/// - `TokenSigning`    -> 500 (JWT encoding failure; should never happen with a valid secret)
/// - `Database`        -> 500 (store failure; logged with the request span, never crashes)
/// - `Payment`         -> 502 (payment-processor failure or malformed session)
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("insufficient permissions")]
    Forbidden,

    #[error("resource not found")]
    NotFound,

    #[error("duplicate resource")]
    Conflict,

    #[error("token signing failed")]
    TokenSigning(#[from] jsonwebtoken::errors::Error),

    #[error("database operation failed")]
    Database(#[from] sqlx::Error),

    #[error("payment processor error: {0}")]
    Payment(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::TokenSigning(_) | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Payment(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    /// Renders the error as a small JSON body. Infrastructure failures are logged at
    /// error level (the surrounding TraceLayer span already carries the request id),
    /// and the client only ever sees the generic variant message, never the source.
    fn into_response(self) -> Response {
        match &self {
            ApiError::Database(e) => tracing::error!("database failure: {:?}", e),
            ApiError::Payment(msg) => tracing::error!("payment processor failure: {}", msg),
            ApiError::TokenSigning(e) => tracing::error!("token signing failure: {:?}", e),
            _ => {}
        }

        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}
