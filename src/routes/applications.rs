use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Applications Router Module
///
/// The application lifecycle surface. The two checkout endpoints implement the
/// NONE -> CHECKOUT_PENDING -> CONFIRMED/ABANDONED state machine: `/application`
/// opens a processor-hosted session (no local record), `/application-success`
/// confirms it idempotently against the transaction-id uniqueness constraint.
///
/// Access Control:
/// - POST /application, POST /application-success, GET /applications: student role
///   (the listing additionally requires ownership of the queried email).
/// - PATCH /applications/{id}, GET /applications/moderator: moderator role.
/// - GET /applications/application-status/stats: admin role.
pub fn application_routes() -> Router<AppState> {
    Router::new()
        // POST /application
        // Computes the charge server-side and returns the checkout redirect URL.
        .route("/application", post(handlers::start_checkout))
        // POST /application-success?session_id=...
        // Idempotent confirmation; safe to retry on success-page refresh.
        .route("/application-success", post(handlers::confirm_checkout))
        // GET /applications?email=...
        // A student's own applications (ownership-guarded).
        .route("/applications", get(handlers::my_applications))
        // GET /applications/moderator
        // The full review queue, pending first.
        .route(
            "/applications/moderator",
            get(handlers::moderator_applications),
        )
        // GET /applications/application-status/stats
        // Admin analytics: group-count by status.
        .route(
            "/applications/application-status/stats",
            get(handlers::application_status_stats),
        )
        // PATCH /applications/{id}
        // Moderator status/feedback mutation.
        .route("/applications/{id}", patch(handlers::update_application))
}
