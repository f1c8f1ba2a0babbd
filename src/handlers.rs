use crate::{
    AppState,
    auth::{AuthUser, Role, issue_token, require_owner, require_role},
    error::ApiError,
    models::{
        Application, CheckoutRedirectResponse, ConfirmCheckoutResponse, CreatedResponse,
        CreateReviewRequest, CreateScholarshipRequest, EmailQuery, LatestFilter, NewApplication,
        NewReview, RegisterUserRequest, RegisterUserResponse, Review, ReviewFilter, RoleResponse,
        Scholarship, ScholarshipFilter, ScholarshipPage, ScholarshipSummary, SessionQuery,
        StartCheckoutRequest, StatusStat, TokenRequest, TokenResponse, UpdateApplicationRequest,
        UpdateUserRequest, User, UserIdResponse,
    },
    payments::{CheckoutRequest, CheckoutSession},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use std::collections::HashMap;
use uuid::Uuid;

// --- Identity & Tokens ---

/// get_token
///
/// [Public Route] Issues a one-hour bearer token for the posted email. The token is
/// stateless; authorization decisions are made at verification time against the
/// user's current database record, so issuing a token for an unregistered email
/// grants nothing.
#[utoipa::path(
    post,
    path = "/getToken",
    request_body = TokenRequest,
    responses((status = 200, description = "Signed bearer token", body = TokenResponse))
)]
pub async fn get_token(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = issue_token(&payload.email, &state.config.jwt_secret)?;
    Ok(Json(TokenResponse { token }))
}

/// register_user
///
/// [Public Route] Creates a user record with the default 'student' role.
///
/// *Idempotency*: duplicate registration is a single atomic no-op at the storage
/// layer (`ON CONFLICT (email) DO NOTHING`); the existing record comes back with an
/// informational message instead of an error status.
#[utoipa::path(
    post,
    path = "/users",
    request_body = RegisterUserRequest,
    responses((status = 200, description = "Registered or already present", body = RegisterUserResponse))
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<Json<RegisterUserResponse>, ApiError> {
    let email = payload.email.clone();
    match state.repo.create_user(payload).await? {
        Some(user) => Ok(Json(RegisterUserResponse {
            user,
            inserted: true,
            message: "user registered".to_string(),
        })),
        None => {
            let existing = state
                .repo
                .get_user_by_email(&email)
                .await?
                .ok_or(ApiError::Conflict)?;
            Ok(Json(RegisterUserResponse {
                user: existing,
                inserted: false,
                message: "user already registered".to_string(),
            }))
        }
    }
}

/// get_user_role
///
/// [Token Route] Looks up the role recorded for the given email. Frontends use this
/// to decide which dashboard to render after sign-in.
#[utoipa::path(
    get,
    path = "/users/{email}/role",
    responses(
        (status = 200, description = "Role", body = RoleResponse),
        (status = 404, description = "Unknown email")
    )
)]
pub async fn get_user_role(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<RoleResponse>, ApiError> {
    let user = state
        .repo
        .get_user_by_email(&email)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(RoleResponse { role: user.role }))
}

/// get_user_id
///
/// [Student Route] Resolves an email to the user's surrogate id.
#[utoipa::path(
    get,
    path = "/users/{email}/id",
    responses(
        (status = 200, description = "User id", body = UserIdResponse),
        (status = 404, description = "Unknown email")
    )
)]
pub async fn get_user_id(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<UserIdResponse>, ApiError> {
    require_role(&auth, Role::Student)?;
    let user = state
        .repo
        .get_user_by_email(&email)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(UserIdResponse { id: user.id }))
}

/// list_users
///
/// [Admin Route] Lists every registered user for the management dashboard.
#[utoipa::path(
    get,
    path = "/users",
    responses((status = 200, description = "All users", body = [User]))
)]
pub async fn list_users(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, ApiError> {
    require_role(&auth, Role::Admin)?;
    Ok(Json(state.repo.list_users().await?))
}

/// update_user
///
/// [Admin Route] Partially updates a user record. In practice this is the role-change
/// endpoint (promoting a student to moderator/admin).
#[utoipa::path(
    patch,
    path = "/users/{id}",
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    require_role(&auth, Role::Admin)?;
    let user = state
        .repo
        .update_user(id, payload.role, payload.name)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(user))
}

/// delete_user
///
/// [Admin Route] Hard-deletes a user record. The only deletion path for users.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_role(&auth, Role::Admin)?;
    if state.repo.delete_user(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

// --- Scholarship Catalog ---

/// create_scholarship
///
/// [Admin Route] Publishes a new scholarship listing and returns its identifier.
#[utoipa::path(
    post,
    path = "/scholarship",
    request_body = CreateScholarshipRequest,
    responses((status = 200, description = "Created", body = CreatedResponse))
)]
pub async fn create_scholarship(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateScholarshipRequest>,
) -> Result<Json<CreatedResponse>, ApiError> {
    require_role(&auth, Role::Admin)?;
    let id = state.repo.create_scholarship(payload).await?;
    Ok(Json(CreatedResponse { id }))
}

/// list_scholarships
///
/// [Public Route] Paginated catalog listing with case-insensitive OR search across
/// name/university/degree, whitelisted sorting (default post date descending), and a
/// filtered total irrespective of pagination. The description column never appears in
/// list projections.
#[utoipa::path(
    get,
    path = "/scholarship",
    params(ScholarshipFilter),
    responses((status = 200, description = "Filtered page", body = ScholarshipPage))
)]
pub async fn list_scholarships(
    State(state): State<AppState>,
    Query(filter): Query<ScholarshipFilter>,
) -> Result<Json<ScholarshipPage>, ApiError> {
    Ok(Json(state.repo.list_scholarships(filter).await?))
}

/// get_scholarship
///
/// [Token Route] Full detail view of one scholarship, description included.
#[utoipa::path(
    get,
    path = "/scholarship/{id}",
    params(("id" = Uuid, Path, description = "Scholarship ID")),
    responses(
        (status = 200, description = "Found", body = Scholarship),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_scholarship(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Scholarship>, ApiError> {
    let scholarship = state
        .repo
        .get_scholarship(id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(scholarship))
}

/// delete_scholarship
///
/// [Admin Route] Removes a listing. Scholarships are otherwise immutable after
/// creation.
#[utoipa::path(
    delete,
    path = "/scholarship/{id}",
    params(("id" = Uuid, Path, description = "Scholarship ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_scholarship(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_role(&auth, Role::Admin)?;
    if state.repo.delete_scholarship(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

/// latest_scholarships
///
/// [Public Route] The landing-page feed: top 6 listings by post date, optionally
/// searched with the same semantics as the full listing.
#[utoipa::path(
    get,
    path = "/latest-scholarship",
    params(LatestFilter),
    responses((status = 200, description = "Latest six", body = [ScholarshipSummary]))
)]
pub async fn latest_scholarships(
    State(state): State<AppState>,
    Query(filter): Query<LatestFilter>,
) -> Result<Json<Vec<ScholarshipSummary>>, ApiError> {
    Ok(Json(state.repo.latest_scholarships(filter.search).await?))
}

// --- Application Lifecycle ---

/// start_checkout
///
/// [Student Route] Opens a payment-checkout session for a prospective application and
/// returns the processor-hosted redirect URL.
///
/// The charge (application fees + service charge) and all denormalized names are
/// resolved server-side from the scholarship and user records; the client supplies
/// only the scholarship reference. Everything the confirmation step will need rides
/// along as opaque session metadata—no application record exists until the payment
/// is confirmed.
#[utoipa::path(
    post,
    path = "/application",
    request_body = StartCheckoutRequest,
    responses(
        (status = 200, description = "Checkout redirect", body = CheckoutRedirectResponse),
        (status = 404, description = "Unknown scholarship")
    )
)]
pub async fn start_checkout(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<StartCheckoutRequest>,
) -> Result<Json<CheckoutRedirectResponse>, ApiError> {
    require_role(&auth, Role::Student)?;

    let scholarship = state
        .repo
        .get_scholarship(payload.scholarship_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let user = state
        .repo
        .get_user_by_email(&auth.email)
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    let amount_cents = scholarship.application_fees + scholarship.service_charge;

    let mut metadata = HashMap::new();
    metadata.insert("scholarship_id".to_string(), scholarship.id.to_string());
    metadata.insert("user_id".to_string(), user.id.to_string());
    metadata.insert("user_email".to_string(), user.email.clone());
    if let Some(name) = &user.name {
        metadata.insert("user_name".to_string(), name.clone());
    }
    metadata.insert(
        "scholarship_name".to_string(),
        scholarship.scholarship_name.clone(),
    );
    metadata.insert(
        "university_name".to_string(),
        scholarship.university_name.clone(),
    );
    metadata.insert(
        "application_fees".to_string(),
        scholarship.application_fees.to_string(),
    );
    metadata.insert(
        "service_charge".to_string(),
        scholarship.service_charge.to_string(),
    );

    let base = &state.config.checkout_redirect_base;
    let session = state
        .payments
        .create_checkout_session(CheckoutRequest {
            amount_cents,
            currency: "usd".to_string(),
            product_name: scholarship.scholarship_name,
            // The processor substitutes the real session id into the template.
            success_url: format!(
                "{}/application-success?session_id={{CHECKOUT_SESSION_ID}}",
                base
            ),
            cancel_url: format!("{}/application-cancelled", base),
            metadata,
        })
        .await
        .map_err(ApiError::Payment)?;

    let url = session
        .url
        .ok_or_else(|| ApiError::Payment("session missing redirect URL".to_string()))?;
    Ok(Json(CheckoutRedirectResponse { url }))
}

/// application_from_session
///
/// Rebuilds the application record from the metadata a paid checkout session carried.
/// A session missing required fields means it was not created by `start_checkout`,
/// which is treated as a processor-level fault.
fn application_from_session(
    session: &CheckoutSession,
    transaction_id: &str,
) -> Result<NewApplication, ApiError> {
    let meta = &session.metadata;
    let get = |key: &str| -> Result<&String, ApiError> {
        meta.get(key)
            .ok_or_else(|| ApiError::Payment(format!("session metadata missing '{}'", key)))
    };
    let parse_uuid = |value: &str, key: &str| -> Result<Uuid, ApiError> {
        Uuid::parse_str(value)
            .map_err(|_| ApiError::Payment(format!("session metadata field '{}' invalid", key)))
    };
    let parse_cents = |value: &str, key: &str| -> Result<i64, ApiError> {
        value
            .parse::<i64>()
            .map_err(|_| ApiError::Payment(format!("session metadata field '{}' invalid", key)))
    };

    Ok(NewApplication {
        scholarship_id: parse_uuid(get("scholarship_id")?, "scholarship_id")?,
        user_id: parse_uuid(get("user_id")?, "user_id")?,
        user_email: get("user_email")?.clone(),
        user_name: meta.get("user_name").cloned(),
        scholarship_name: get("scholarship_name")?.clone(),
        university_name: get("university_name")?.clone(),
        transaction_id: transaction_id.to_string(),
        application_fees: parse_cents(get("application_fees")?, "application_fees")?,
        service_charge: parse_cents(get("service_charge")?, "service_charge")?,
    })
}

/// confirm_checkout
///
/// [Student Route] Confirms a checkout session and materializes the application
/// record **exactly once per payment transaction**.
///
/// *Idempotency contract*: the payment-intent id is the idempotency key. If an
/// application with that transaction id already exists, its identifier is returned
/// with `already_recorded = true`—this call is safe to retry (success-page refresh,
/// webhook redelivery). Two concurrent confirmations are arbitrated by the UNIQUE
/// constraint on `transaction_id`, never by a find-then-insert in application code:
/// the loser of the insert race re-reads the winner's row.
///
/// A session whose payment is not "paid" creates nothing and reports the processor's
/// status as-is.
#[utoipa::path(
    post,
    path = "/application-success",
    params(SessionQuery),
    responses((status = 200, description = "Confirmation result", body = ConfirmCheckoutResponse))
)]
pub async fn confirm_checkout(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<ConfirmCheckoutResponse>, ApiError> {
    require_role(&auth, Role::Student)?;

    let session = state
        .payments
        .retrieve_session(&query.session_id)
        .await
        .map_err(ApiError::Payment)?;

    // No payment intent yet: the session was opened but checkout never completed.
    let Some(transaction_id) = session.payment_intent.clone() else {
        return Ok(Json(ConfirmCheckoutResponse {
            application_id: None,
            transaction_id: None,
            payment_status: session.payment_status,
            already_recorded: false,
        }));
    };

    // Retry path: the record already exists for this transaction.
    if let Some(existing) = state
        .repo
        .find_application_by_transaction(&transaction_id)
        .await?
    {
        return Ok(Json(ConfirmCheckoutResponse {
            application_id: Some(existing.id),
            transaction_id: Some(transaction_id),
            payment_status: existing.payment_status,
            already_recorded: true,
        }));
    }

    // Unpaid sessions create nothing (the ABANDONED terminal state).
    if session.payment_status != "paid" {
        return Ok(Json(ConfirmCheckoutResponse {
            application_id: None,
            transaction_id: Some(transaction_id),
            payment_status: session.payment_status,
            already_recorded: false,
        }));
    }

    let new_application = application_from_session(&session, &transaction_id)?;
    match state
        .repo
        .insert_application_if_absent(new_application)
        .await?
    {
        Some(id) => Ok(Json(ConfirmCheckoutResponse {
            application_id: Some(id),
            transaction_id: Some(transaction_id),
            payment_status: "paid".to_string(),
            already_recorded: false,
        })),
        None => {
            // Lost the insert race against a concurrent confirmation; the winner's
            // row is authoritative.
            let existing = state
                .repo
                .find_application_by_transaction(&transaction_id)
                .await?
                .ok_or(ApiError::NotFound)?;
            Ok(Json(ConfirmCheckoutResponse {
                application_id: Some(existing.id),
                transaction_id: Some(transaction_id),
                payment_status: existing.payment_status,
                already_recorded: true,
            }))
        }
    }
}

/// update_application
///
/// [Moderator Route] Mutates an application's status and/or feedback. Payment fields
/// are immutable once the record exists.
#[utoipa::path(
    patch,
    path = "/applications/{id}",
    params(("id" = Uuid, Path, description = "Application ID")),
    request_body = UpdateApplicationRequest,
    responses(
        (status = 200, description = "Updated", body = Application),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_application(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateApplicationRequest>,
) -> Result<Json<Application>, ApiError> {
    require_role(&auth, Role::Moderator)?;
    let application = state
        .repo
        .update_application(id, payload.application_status, payload.feedback)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(application))
}

/// my_applications
///
/// [Student Route] Lists the caller's own applications.
///
/// *Ownership*: the email query parameter must equal the token-verified email; a
/// student can never enumerate someone else's applications.
#[utoipa::path(
    get,
    path = "/applications",
    params(EmailQuery),
    responses((status = 200, description = "Own applications", body = [Application]))
)]
pub async fn my_applications(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<Vec<Application>>, ApiError> {
    require_role(&auth, Role::Student)?;
    require_owner(&auth, &query.email)?;
    Ok(Json(state.repo.applications_for_email(&auth.email).await?))
}

/// moderator_applications
///
/// [Moderator Route] Lists every application for the review queue, pending first.
#[utoipa::path(
    get,
    path = "/applications/moderator",
    responses((status = 200, description = "All applications", body = [Application]))
)]
pub async fn moderator_applications(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Application>>, ApiError> {
    require_role(&auth, Role::Moderator)?;
    Ok(Json(state.repo.list_all_applications().await?))
}

/// application_status_stats
///
/// [Admin Route] Group-count of applications by status for the analytics dashboard.
#[utoipa::path(
    get,
    path = "/applications/application-status/stats",
    responses((status = 200, description = "Counts by status", body = [StatusStat]))
)]
pub async fn application_status_stats(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<StatusStat>>, ApiError> {
    require_role(&auth, Role::Admin)?;
    Ok(Json(state.repo.application_status_stats().await?))
}

// --- Reviews ---

/// create_review
///
/// [Token Route] Posts a review for a scholarship. The scholarship's name and
/// university are read and denormalized onto the review at write time (no
/// transactional guarantee against a concurrent scholarship deletion; the staleness
/// is acceptable). The reviewer email always comes from the verified token.
#[utoipa::path(
    post,
    path = "/review",
    request_body = CreateReviewRequest,
    responses(
        (status = 200, description = "Created", body = Review),
        (status = 404, description = "Unknown scholarship")
    )
)]
pub async fn create_review(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateReviewRequest>,
) -> Result<Json<Review>, ApiError> {
    let scholarship = state
        .repo
        .get_scholarship(payload.scholarship_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let review = state
        .repo
        .create_review(NewReview {
            scholarship_id: scholarship.id,
            scholarship_name: scholarship.scholarship_name,
            university_name: scholarship.university_name,
            reviewer_email: auth.email,
            reviewer_name: payload.reviewer_name,
            reviewer_image: payload.reviewer_image,
            rating: payload.rating,
            comment: payload.comment,
        })
        .await?;
    Ok(Json(review))
}

/// delete_review
///
/// [Student Route] Deletes the caller's own review.
///
/// *Ownership*: the email query parameter must equal the token-verified email
/// (RequireOwnership guard), and the delete itself is additionally scoped by
/// `reviewer_email` at the storage layer. A 404 afterwards means the review did not
/// exist under that owner.
#[utoipa::path(
    delete,
    path = "/review/{id}",
    params(("id" = Uuid, Path, description = "Review ID"), EmailQuery),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the reviewer"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_review(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<EmailQuery>,
) -> Result<StatusCode, ApiError> {
    require_role(&auth, Role::Student)?;
    require_owner(&auth, &query.email)?;
    if state.repo.delete_review(id, &auth.email).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

/// list_reviews
///
/// [Public Route] Lists reviews, optionally filtered by reviewer email.
#[utoipa::path(
    get,
    path = "/review",
    params(ReviewFilter),
    responses((status = 200, description = "Reviews", body = [Review]))
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Query(filter): Query<ReviewFilter>,
) -> Result<Json<Vec<Review>>, ApiError> {
    Ok(Json(state.repo.list_reviews(filter.email).await?))
}

/// reviews_for_scholarship
///
/// [Public Route] Lists every review attached to one scholarship, newest first.
#[utoipa::path(
    get,
    path = "/review/{scholarship_id}",
    params(("scholarship_id" = Uuid, Path, description = "Scholarship ID")),
    responses((status = 200, description = "Reviews", body = [Review]))
)]
pub async fn reviews_for_scholarship(
    State(state): State<AppState>,
    Path(scholarship_id): Path<Uuid>,
) -> Result<Json<Vec<Review>>, ApiError> {
    Ok(Json(
        state.repo.reviews_for_scholarship(scholarship_id).await?,
    ))
}
