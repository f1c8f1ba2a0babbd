use axum::{Router, extract::FromRef, http::HeaderName, routing::get};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod payments;
pub mod repository;

// Module for routing segregation by resource.
pub mod routes;
use routes::{applications, reviews, scholarships, users};

// --- Public Re-exports ---

// Makes core state types easily accessible to the main application entry point (main.rs).
pub use config::AppConfig;
pub use error::ApiError;
pub use payments::{MockPaymentService, PaymentState, StripeCheckoutClient};
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// Auto-generates the OpenAPI documentation (Swagger JSON) for the application by
/// aggregating every handler decorated with `#[utoipa::path]` and every schema
/// decorated with `#[derive(utoipa::ToSchema)]`. The resulting JSON is served at
/// `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_token, handlers::register_user, handlers::get_user_role,
        handlers::get_user_id, handlers::list_users, handlers::update_user,
        handlers::delete_user, handlers::create_scholarship, handlers::list_scholarships,
        handlers::get_scholarship, handlers::delete_scholarship, handlers::latest_scholarships,
        handlers::start_checkout, handlers::confirm_checkout, handlers::update_application,
        handlers::my_applications, handlers::moderator_applications,
        handlers::application_status_stats, handlers::create_review, handlers::delete_review,
        handlers::list_reviews, handlers::reviews_for_scholarship,
    ),
    components(
        schemas(
            models::User, models::Scholarship, models::ScholarshipSummary,
            models::Application, models::Review, models::TokenRequest, models::TokenResponse,
            models::RegisterUserRequest, models::RegisterUserResponse, models::UpdateUserRequest,
            models::RoleResponse, models::UserIdResponse, models::CreateScholarshipRequest,
            models::CreatedResponse, models::ScholarshipPage, models::StartCheckoutRequest,
            models::CheckoutRedirectResponse, models::ConfirmCheckoutResponse,
            models::UpdateApplicationRequest, models::StatusStat, models::CreateReviewRequest,
        )
    ),
    tags(
        (name = "scholar-stream", description = "Scholar Stream scholarship platform API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Implements the **Unified State Pattern**. This is the single, thread-safe, and
/// immutable container holding all essential application services and configuration,
/// shared across all incoming requests. Both external collaborators (the store and
/// the payment processor) live behind trait objects so tests can swap them out.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: abstracts database access via the PgPool connection.
    pub repo: RepositoryState,
    /// Payments Layer: abstracts the payment processor's checkout API.
    pub payments: PaymentState,
    /// Configuration: the loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// These implementations allow extractors and handlers to selectively pull components
// from the shared AppState. The AuthUser extractor relies on them to reach the
// repository (role lookup) and config (token secret) without seeing the whole state.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for PaymentState {
    fn from_ref(app_state: &AppState) -> PaymentState {
        app_state.payments.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the application's entire routing structure, applies global middleware,
/// and registers the application state. Guard enforcement happens per handler (the
/// AuthUser extractor plus the role/ownership guard functions), so the resource
/// routers merge without any access-level nesting.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // GET /health
        // Unauthenticated endpoint for monitoring and load balancer checks.
        .route("/health", get(|| async { "ok" }))
        // Resource routers.
        .merge(users::user_routes())
        .merge(scholarships::scholarship_routes())
        .merge(applications::application_routes())
        .merge(reviews::review_routes())
        // Apply the Unified State to all routes.
        .with_state(state);

    // 3. Observability and Correlation Layers (applied outermost/first)
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: a unique UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: wraps the request/response lifecycle in a span
                // that carries the generated request id, so error logs emitted by
                // ApiError correlate back to a single request.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: return the x-request-id header to the
                // client and inject it into downstream service calls.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Helper used by `TraceLayer` to customize span creation: extracts the
/// `x-request-id` header (if present) and includes it in the structured logging
/// metadata alongside the HTTP method and URI, so every log line for a single
/// request is correlated by a unique ID.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
