use crate::{AppState, handlers};
use axum::{
    Router,
    routing::get,
};

/// Scholarships Router Module
///
/// The catalog surface. Listing and the latest-six feed are anonymous reads (the
/// repository projection already excludes the description column there); the detail
/// view requires a token, and all mutation is admin-only inside the handlers.
pub fn scholarship_routes() -> Router<AppState> {
    Router::new()
        // GET  /scholarship?search&sort&order&limit&skip — public paginated listing
        // POST /scholarship — admin creation
        .route(
            "/scholarship",
            get(handlers::list_scholarships).post(handlers::create_scholarship),
        )
        // GET/DELETE /scholarship/{id}
        // Detail view (token) and admin delete. Scholarships are immutable between
        // creation and deletion, so there is no update route.
        .route(
            "/scholarship/{id}",
            get(handlers::get_scholarship).delete(handlers::delete_scholarship),
        )
        // GET /latest-scholarship?search
        // Landing-page feed: top 6 by post date.
        .route("/latest-scholarship", get(handlers::latest_scholarships))
}
