use crate::{AppState, handlers};
use axum::{
    Router,
    routing::get,
};

/// Reviews Router Module
///
/// Review reads are fully public; creation requires a token (the reviewer identity
/// comes from the verified claim, never the body), and deletion is gated by the
/// student role plus the ownership guard against the query-string email.
pub fn review_routes() -> Router<AppState> {
    Router::new()
        // GET  /review?email=... — public listing, optionally by reviewer
        // POST /review — authenticated creation with denormalized scholarship fields
        .route(
            "/review",
            get(handlers::list_reviews).post(handlers::create_review),
        )
        // GET    /review/{id} — public listing of one scholarship's reviews (the
        //                       path segment is the *scholarship* id here)
        // DELETE /review/{id}?email=... — owner-only delete of a single review; the
        //                       storage layer re-checks the reviewer email
        .route(
            "/review/{id}",
            get(handlers::reviews_for_scholarship).delete(handlers::delete_review),
        )
}
