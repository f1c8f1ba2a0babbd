use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Represents a platform member's canonical identity record stored in the `users` table.
/// The email is the unique business key; the `role` field drives Role-Based Access
/// Control (student, moderator or admin).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    // Unique business key, also the identity claim carried inside bearer tokens.
    pub email: String,
    pub name: Option<String>,
    pub photo_url: Option<String>,
    // The RBAC field: 'student', 'moderator' or 'admin'.
    pub role: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Scholarship
///
/// A scholarship listing from the `scholarships` table. Created exclusively by admins
/// and publicly readable. Monetary amounts are stored in integer cents so they can be
/// handed to the payment processor without float conversion.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Scholarship {
    pub id: Uuid,
    pub scholarship_name: String,
    pub university_name: String,
    pub university_city: Option<String>,
    pub university_country: Option<String>,
    pub world_rank: Option<i32>,
    pub degree: String,
    pub category: String,
    pub subject_category: Option<String>,
    #[ts(type = "string")]
    pub post_date: DateTime<Utc>,
    // Cents.
    pub application_fees: i64,
    // Cents.
    pub service_charge: i64,
    pub stipend: Option<String>,
    pub description: Option<String>,
}

/// ScholarshipSummary
///
/// List-view projection of a scholarship. Identical to `Scholarship` minus the
/// `description` column, which is excluded from list queries by contract.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct ScholarshipSummary {
    pub id: Uuid,
    pub scholarship_name: String,
    pub university_name: String,
    pub university_city: Option<String>,
    pub university_country: Option<String>,
    pub world_rank: Option<i32>,
    pub degree: String,
    pub category: String,
    pub subject_category: Option<String>,
    #[ts(type = "string")]
    pub post_date: DateTime<Utc>,
    pub application_fees: i64,
    pub service_charge: i64,
    pub stipend: Option<String>,
}

/// Application
///
/// A scholarship application from the `applications` table, materialized exactly once
/// per successful payment. `transaction_id` carries a UNIQUE constraint: the storage
/// layer, not application code, is the idempotency arbiter for payment confirmation.
/// The user and scholarship names are denormalized so moderator list views need no joins.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Application {
    pub id: Uuid,
    pub scholarship_id: Uuid,
    pub user_id: Uuid,
    pub user_email: String,
    pub user_name: Option<String>,
    pub scholarship_name: String,
    pub university_name: String,
    // Payment-intent identifier from the processor. UNIQUE in the database.
    pub transaction_id: String,
    // 'pending' until a moderator assigns a terminal state.
    pub application_status: String,
    pub payment_status: String,
    pub application_fees: i64,
    pub service_charge: i64,
    #[ts(type = "string")]
    pub application_date: DateTime<Utc>,
    pub feedback: Option<String>,
}

/// Review
///
/// A scholarship review from the `reviews` table. The scholarship name and university
/// are denormalized onto the row at write time (read-then-write, acceptable staleness
/// against a concurrent scholarship deletion).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Review {
    pub id: Uuid,
    pub scholarship_id: Uuid,
    pub scholarship_name: String,
    pub university_name: String,
    // Ownership key: only this email (via a verified token) may delete the review.
    pub reviewer_email: String,
    pub reviewer_name: Option<String>,
    pub reviewer_image: Option<String>,
    pub rating: i32,
    pub comment: Option<String>,
    #[ts(type = "string")]
    pub review_date: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// TokenRequest
///
/// Input payload for POST /getToken. The posted email becomes the token's identity claim.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TokenRequest {
    pub email: String,
}

/// TokenResponse
///
/// Output schema carrying the freshly signed one-hour bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
}

/// RegisterUserRequest
///
/// Input payload for the public registration endpoint (POST /users).
/// The role is never client-controlled: every new user starts as a student.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub email: String,
    pub name: Option<String>,
    pub photo_url: Option<String>,
}

/// RegisterUserResponse
///
/// Output schema for registration. Duplicate registration is not an error: the
/// existing record is returned with `inserted = false` and an informational message.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterUserResponse {
    pub user: User,
    pub inserted: bool,
    pub message: String,
}

/// UpdateUserRequest
///
/// Admin-only partial update for a user record (PATCH /users/{id}).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// RoleResponse
///
/// Output schema for GET /users/{email}/role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RoleResponse {
    pub role: String,
}

/// UserIdResponse
///
/// Output schema for GET /users/{email}/id.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserIdResponse {
    pub id: Uuid,
}

/// CreateScholarshipRequest
///
/// Input payload for submitting a new scholarship listing (POST /scholarship).
/// `post_date` is optional; the server stamps the current time when omitted.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateScholarshipRequest {
    pub scholarship_name: String,
    pub university_name: String,
    pub university_city: Option<String>,
    pub university_country: Option<String>,
    pub world_rank: Option<i32>,
    pub degree: String,
    pub category: String,
    pub subject_category: Option<String>,
    #[ts(type = "string | null")]
    pub post_date: Option<DateTime<Utc>>,
    pub application_fees: i64,
    pub service_charge: i64,
    pub stipend: Option<String>,
    pub description: Option<String>,
}

/// CreatedResponse
///
/// Minimal output schema for creation endpoints: the generated identifier.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatedResponse {
    pub id: Uuid,
}

/// ScholarshipFilter
///
/// Query parameters for the public scholarship listing (GET /scholarship).
/// Search is a case-insensitive substring matched across the name, university and
/// degree columns (OR semantics). Sorting accepts any whitelisted column and defaults
/// to `post_date` descending. Pagination is limit/skip based.
#[derive(Debug, Clone, Deserialize, Serialize, utoipa::IntoParams, Default)]
pub struct ScholarshipFilter {
    pub search: Option<String>,
    pub sort: Option<String>,
    /// "asc" or "desc" (default).
    pub order: Option<String>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

/// LatestFilter
///
/// Query parameters for GET /latest-scholarship (search only; the result is always
/// the top 6 by post date).
#[derive(Debug, Clone, Deserialize, Serialize, utoipa::IntoParams, Default)]
pub struct LatestFilter {
    pub search: Option<String>,
}

/// ScholarshipPage
///
/// Output schema for the paginated listing. `total_count` reflects the full filtered
/// set irrespective of limit/skip, so clients can render page controls.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ScholarshipPage {
    pub items: Vec<ScholarshipSummary>,
    pub total_count: i64,
}

/// StartCheckoutRequest
///
/// Input payload for POST /application. Only the scholarship reference is accepted;
/// fees, charges and all denormalized names are resolved server-side so a client can
/// never tamper with the amount sent to the payment processor.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct StartCheckoutRequest {
    pub scholarship_id: Uuid,
}

/// CheckoutRedirectResponse
///
/// Output schema carrying the processor-hosted checkout URL the client must follow.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CheckoutRedirectResponse {
    pub url: String,
}

/// SessionQuery
///
/// Query parameter for POST /application-success: the checkout session identifier the
/// processor appended to the success redirect.
#[derive(Debug, Clone, Deserialize, Serialize, utoipa::IntoParams)]
pub struct SessionQuery {
    pub session_id: String,
}

/// ConfirmCheckoutResponse
///
/// Output schema for the idempotent confirmation endpoint.
/// - Paid, first confirmation: `application_id` set, `already_recorded = false`.
/// - Paid, retried confirmation: the existing id, `already_recorded = true`.
/// - Not paid: no id, `payment_status` reports the processor's state.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ConfirmCheckoutResponse {
    pub application_id: Option<Uuid>,
    pub transaction_id: Option<String>,
    pub payment_status: String,
    pub already_recorded: bool,
}

/// UpdateApplicationRequest
///
/// Moderator-only partial update (PATCH /applications/{id}): the status and/or the
/// feedback text. Omitted fields are left untouched (COALESCE semantics).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateApplicationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// EmailQuery
///
/// Query parameter carrying an email, used by the ownership-guarded application
/// listing and review deletion endpoints.
#[derive(Debug, Clone, Deserialize, Serialize, utoipa::IntoParams)]
pub struct EmailQuery {
    pub email: String,
}

/// ReviewFilter
///
/// Optional reviewer-email filter for the public review listing (GET /review).
#[derive(Debug, Clone, Deserialize, Serialize, utoipa::IntoParams, Default)]
pub struct ReviewFilter {
    pub email: Option<String>,
}

/// StatusStat
///
/// One bucket of the admin status aggregation: an application status and how many
/// applications currently hold it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct StatusStat {
    pub application_status: String,
    pub count: i64,
}

/// CreateReviewRequest
///
/// Input payload for posting a review. The reviewer email always comes from the
/// verified token, never from the body.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateReviewRequest {
    pub scholarship_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub reviewer_name: Option<String>,
    pub reviewer_image: Option<String>,
}

// --- Repository Input Records ---

/// NewApplication
///
/// Internal record assembled from a paid checkout session's metadata, handed to the
/// repository's atomic insert-if-absent operation.
#[derive(Debug, Clone, Default)]
pub struct NewApplication {
    pub scholarship_id: Uuid,
    pub user_id: Uuid,
    pub user_email: String,
    pub user_name: Option<String>,
    pub scholarship_name: String,
    pub university_name: String,
    pub transaction_id: String,
    pub application_fees: i64,
    pub service_charge: i64,
}

/// NewReview
///
/// Internal record for review insertion, carrying the denormalized scholarship fields
/// the handler resolved before the write.
#[derive(Debug, Clone, Default)]
pub struct NewReview {
    pub scholarship_id: Uuid,
    pub scholarship_name: String,
    pub university_name: String,
    pub reviewer_email: String,
    pub reviewer_name: Option<String>,
    pub reviewer_image: Option<String>,
    pub rating: i32,
    pub comment: Option<String>,
}
