use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Users Router Module
///
/// Identity endpoints. Registration and token issuance are the two public gateways
/// into the system; everything else here is management surface gated per handler.
///
/// Access Control:
/// - POST /getToken, POST /users: public. Issuing a token for an arbitrary email is
///   harmless by design—the token only becomes useful once a matching user record
///   exists, because every guard re-resolves the role from the database.
/// - GET /users/{email}/role: any valid token.
/// - GET /users/{email}/id: student role.
/// - GET /users, PATCH /users/{id}, DELETE /users/{id}: admin role.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        // POST /getToken
        // Signs a one-hour bearer token carrying the posted email as its claim.
        .route("/getToken", post(handlers::get_token))
        // POST /users  — registration (idempotent on duplicate email)
        // GET  /users  — admin listing
        .route(
            "/users",
            post(handlers::register_user).get(handlers::list_users),
        )
        // GET /users/{email}/role
        // Role lookup used by frontends to pick a dashboard after sign-in.
        .route("/users/{email}/role", get(handlers::get_user_role))
        // GET /users/{email}/id
        .route("/users/{email}/id", get(handlers::get_user_id))
        // PATCH/DELETE /users/{id}
        // Admin role change and the explicit hard-delete path.
        .route(
            "/users/{id}",
            patch(handlers::update_user).delete(handlers::delete_user),
        )
}
