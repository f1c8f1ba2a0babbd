use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::{Json, http::StatusCode};
use chrono::{Duration, Utc};
use scholar_stream::{
    AppState,
    auth::AuthUser,
    config::AppConfig,
    error::ApiError,
    handlers,
    models::{
        Application, CreateReviewRequest, CreateScholarshipRequest, EmailQuery, NewApplication,
        NewReview, RegisterUserRequest, Review, Scholarship, ScholarshipFilter, ScholarshipPage,
        ScholarshipSummary, SessionQuery, StartCheckoutRequest, StatusStat,
        UpdateApplicationRequest, User,
    },
    payments::{CheckoutRequest, MockPaymentService, PaymentService, PaymentState},
    repository::{Repository, RepositoryState},
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// --- In-Memory Repository ---
//
// Implements the Repository contract over plain vectors, mirroring the semantics the
// Postgres implementation gets from SQL: unique email and transaction_id keys,
// ILIKE-style search, whitelisted sorting, limit/skip pagination with a filtered
// total. This lets the handler suite exercise real list/paginate/idempotency logic
// without a live database.

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    scholarships: Vec<Scholarship>,
    applications: Vec<Application>,
    reviews: Vec<Review>,
}

#[derive(Default)]
struct InMemoryRepo {
    inner: Mutex<Inner>,
}

fn summary_of(s: &Scholarship) -> ScholarshipSummary {
    ScholarshipSummary {
        id: s.id,
        scholarship_name: s.scholarship_name.clone(),
        university_name: s.university_name.clone(),
        university_city: s.university_city.clone(),
        university_country: s.university_country.clone(),
        world_rank: s.world_rank,
        degree: s.degree.clone(),
        category: s.category.clone(),
        subject_category: s.subject_category.clone(),
        post_date: s.post_date,
        application_fees: s.application_fees,
        service_charge: s.service_charge,
        stipend: s.stipend.clone(),
    }
}

fn matches_search(s: &Scholarship, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    s.scholarship_name.to_lowercase().contains(&needle)
        || s.university_name.to_lowercase().contains(&needle)
        || s.degree.to_lowercase().contains(&needle)
}

#[async_trait]
impl Repository for InMemoryRepo {
    async fn create_user(&self, req: RegisterUserRequest) -> Result<Option<User>, sqlx::Error> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.iter().any(|u| u.email == req.email) {
            return Ok(None);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: req.email,
            name: req.name,
            photo_url: req.photo_url,
            role: "student".to_string(),
            created_at: Utc::now(),
        };
        inner.users.push(user.clone());
        Ok(Some(user))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, sqlx::Error> {
        Ok(self.inner.lock().unwrap().users.clone())
    }

    async fn update_user(
        &self,
        id: Uuid,
        role: Option<String>,
        name: Option<String>,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.iter_mut().find(|u| u.id == id) {
            if let Some(role) = role {
                user.role = role;
            }
            if let Some(name) = name {
                user.name = Some(name);
            }
            return Ok(Some(user.clone()));
        }
        Ok(None)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.users.len();
        inner.users.retain(|u| u.id != id);
        Ok(inner.users.len() < before)
    }

    async fn create_scholarship(
        &self,
        req: CreateScholarshipRequest,
    ) -> Result<Uuid, sqlx::Error> {
        let mut inner = self.inner.lock().unwrap();
        let id = Uuid::new_v4();
        inner.scholarships.push(Scholarship {
            id,
            scholarship_name: req.scholarship_name,
            university_name: req.university_name,
            university_city: req.university_city,
            university_country: req.university_country,
            world_rank: req.world_rank,
            degree: req.degree,
            category: req.category,
            subject_category: req.subject_category,
            post_date: req.post_date.unwrap_or_else(Utc::now),
            application_fees: req.application_fees,
            service_charge: req.service_charge,
            stipend: req.stipend,
            description: req.description,
        });
        Ok(id)
    }

    async fn list_scholarships(
        &self,
        filter: ScholarshipFilter,
    ) -> Result<ScholarshipPage, sqlx::Error> {
        let inner = self.inner.lock().unwrap();
        let mut matched: Vec<&Scholarship> = inner
            .scholarships
            .iter()
            .filter(|s| match &filter.search {
                Some(needle) => matches_search(s, needle),
                None => true,
            })
            .collect();

        let total_count = matched.len() as i64;

        match filter.sort.as_deref() {
            Some("scholarship_name") => {
                matched.sort_by(|a, b| a.scholarship_name.cmp(&b.scholarship_name))
            }
            Some("application_fees") => {
                matched.sort_by_key(|s| s.application_fees);
            }
            _ => matched.sort_by_key(|s| s.post_date),
        }
        if filter.order.as_deref() != Some("asc") {
            matched.reverse();
        }

        let limit = filter.limit.unwrap_or(10).clamp(1, 100) as usize;
        let skip = filter.skip.unwrap_or(0).max(0) as usize;
        let items = matched
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(summary_of)
            .collect();

        Ok(ScholarshipPage { items, total_count })
    }

    async fn get_scholarship(&self, id: Uuid) -> Result<Option<Scholarship>, sqlx::Error> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.scholarships.iter().find(|s| s.id == id).cloned())
    }

    async fn delete_scholarship(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.scholarships.len();
        inner.scholarships.retain(|s| s.id != id);
        Ok(inner.scholarships.len() < before)
    }

    async fn latest_scholarships(
        &self,
        search: Option<String>,
    ) -> Result<Vec<ScholarshipSummary>, sqlx::Error> {
        let inner = self.inner.lock().unwrap();
        let mut matched: Vec<&Scholarship> = inner
            .scholarships
            .iter()
            .filter(|s| match &search {
                Some(needle) => matches_search(s, needle),
                None => true,
            })
            .collect();
        matched.sort_by_key(|s| s.post_date);
        matched.reverse();
        Ok(matched.into_iter().take(6).map(summary_of).collect())
    }

    async fn find_application_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Application>, sqlx::Error> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .applications
            .iter()
            .find(|a| a.transaction_id == transaction_id)
            .cloned())
    }

    async fn insert_application_if_absent(
        &self,
        app: NewApplication,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        let mut inner = self.inner.lock().unwrap();
        // The unique-constraint arbitration the database performs.
        if inner
            .applications
            .iter()
            .any(|a| a.transaction_id == app.transaction_id)
        {
            return Ok(None);
        }
        let id = Uuid::new_v4();
        inner.applications.push(Application {
            id,
            scholarship_id: app.scholarship_id,
            user_id: app.user_id,
            user_email: app.user_email,
            user_name: app.user_name,
            scholarship_name: app.scholarship_name,
            university_name: app.university_name,
            transaction_id: app.transaction_id,
            application_status: "pending".to_string(),
            payment_status: "paid".to_string(),
            application_fees: app.application_fees,
            service_charge: app.service_charge,
            application_date: Utc::now(),
            feedback: None,
        });
        Ok(Some(id))
    }

    async fn applications_for_email(&self, email: &str) -> Result<Vec<Application>, sqlx::Error> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .applications
            .iter()
            .filter(|a| a.user_email == email)
            .cloned()
            .collect())
    }

    async fn list_all_applications(&self) -> Result<Vec<Application>, sqlx::Error> {
        Ok(self.inner.lock().unwrap().applications.clone())
    }

    async fn update_application(
        &self,
        id: Uuid,
        status: Option<String>,
        feedback: Option<String>,
    ) -> Result<Option<Application>, sqlx::Error> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(app) = inner.applications.iter_mut().find(|a| a.id == id) {
            if let Some(status) = status {
                app.application_status = status;
            }
            if let Some(feedback) = feedback {
                app.feedback = Some(feedback);
            }
            return Ok(Some(app.clone()));
        }
        Ok(None)
    }

    async fn application_status_stats(&self) -> Result<Vec<StatusStat>, sqlx::Error> {
        let inner = self.inner.lock().unwrap();
        let mut counts: HashMap<String, i64> = HashMap::new();
        for app in &inner.applications {
            *counts.entry(app.application_status.clone()).or_insert(0) += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(application_status, count)| StatusStat {
                application_status,
                count,
            })
            .collect())
    }

    async fn create_review(&self, review: NewReview) -> Result<Review, sqlx::Error> {
        let mut inner = self.inner.lock().unwrap();
        let stored = Review {
            id: Uuid::new_v4(),
            scholarship_id: review.scholarship_id,
            scholarship_name: review.scholarship_name,
            university_name: review.university_name,
            reviewer_email: review.reviewer_email,
            reviewer_name: review.reviewer_name,
            reviewer_image: review.reviewer_image,
            rating: review.rating,
            comment: review.comment,
            review_date: Utc::now(),
        };
        inner.reviews.push(stored.clone());
        Ok(stored)
    }

    async fn delete_review(&self, id: Uuid, reviewer_email: &str) -> Result<bool, sqlx::Error> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.reviews.len();
        inner
            .reviews
            .retain(|r| !(r.id == id && r.reviewer_email == reviewer_email));
        Ok(inner.reviews.len() < before)
    }

    async fn list_reviews(&self, email: Option<String>) -> Result<Vec<Review>, sqlx::Error> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .reviews
            .iter()
            .filter(|r| match &email {
                Some(email) => &r.reviewer_email == email,
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn reviews_for_scholarship(
        &self,
        scholarship_id: Uuid,
    ) -> Result<Vec<Review>, sqlx::Error> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .reviews
            .iter()
            .filter(|r| r.scholarship_id == scholarship_id)
            .cloned()
            .collect())
    }
}

// --- Test Scaffolding ---

fn test_state() -> AppState {
    AppState {
        repo: Arc::new(InMemoryRepo::default()) as RepositoryState,
        payments: Arc::new(MockPaymentService::new()) as PaymentState,
        config: AppConfig::default(),
    }
}

fn state_with_payments(payments: MockPaymentService) -> AppState {
    AppState {
        repo: Arc::new(InMemoryRepo::default()) as RepositoryState,
        payments: Arc::new(payments) as PaymentState,
        config: AppConfig::default(),
    }
}

fn auth(email: &str, role: &str) -> AuthUser {
    AuthUser {
        email: email.to_string(),
        role: role.to_string(),
    }
}

fn scholarship_request(name: &str, university: &str, degree: &str) -> CreateScholarshipRequest {
    CreateScholarshipRequest {
        scholarship_name: name.to_string(),
        university_name: university.to_string(),
        degree: degree.to_string(),
        category: "Full fund".to_string(),
        application_fees: 5000,
        service_charge: 500,
        ..Default::default()
    }
}

async fn seed_student(state: &AppState, email: &str) -> User {
    state
        .repo
        .create_user(RegisterUserRequest {
            email: email.to_string(),
            name: Some("Test Student".to_string()),
            photo_url: None,
        })
        .await
        .unwrap()
        .expect("seed user should insert")
}

/// Creates a checkout session the way start_checkout would, returning its id.
async fn seed_session(state: &AppState, user: &User, scholarship: &Scholarship) -> String {
    let mut metadata = HashMap::new();
    metadata.insert("scholarship_id".to_string(), scholarship.id.to_string());
    metadata.insert("user_id".to_string(), user.id.to_string());
    metadata.insert("user_email".to_string(), user.email.clone());
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

    state
        .payments
        .create_checkout_session(CheckoutRequest {
            amount_cents: scholarship.application_fees + scholarship.service_charge,
            currency: "usd".to_string(),
            product_name: scholarship.scholarship_name.clone(),
            success_url: "http://localhost/s".to_string(),
            cancel_url: "http://localhost/c".to_string(),
            metadata,
        })
        .await
        .unwrap()
        .id
}

// --- Registration ---

#[tokio::test]
async fn duplicate_registration_is_a_noop_with_message() {
    let state = test_state();
    let payload = RegisterUserRequest {
        email: "dup@x.com".to_string(),
        name: Some("First".to_string()),
        photo_url: None,
    };

    let Json(first) = handlers::register_user(State(state.clone()), Json(payload.clone()))
        .await
        .unwrap();
    assert!(first.inserted);
    assert_eq!(first.user.role, "student");

    let Json(second) = handlers::register_user(State(state.clone()), Json(payload))
        .await
        .unwrap();
    assert!(!second.inserted);
    assert_eq!(second.message, "user already registered");
    assert_eq!(second.user.id, first.user.id);

    // No second insert happened.
    assert_eq!(state.repo.list_users().await.unwrap().len(), 1);
}

// --- Role Gating ---

#[tokio::test]
async fn wrong_role_is_forbidden_on_role_guarded_routes() {
    let state = test_state();
    let student = auth("s@x.com", "student");

    // Admin-only listing.
    let result = handlers::list_users(student.clone(), State(state.clone())).await;
    assert!(matches!(result, Err(ApiError::Forbidden)));

    // Moderator-only queue.
    let result = handlers::moderator_applications(student.clone(), State(state.clone())).await;
    assert!(matches!(result, Err(ApiError::Forbidden)));

    // Admin-only stats, even for a moderator.
    let moderator = auth("m@x.com", "moderator");
    let result = handlers::application_status_stats(moderator, State(state.clone())).await;
    assert!(matches!(result, Err(ApiError::Forbidden)));

    // Student-only checkout, attempted by an admin.
    let admin = auth("a@x.com", "admin");
    let result = handlers::start_checkout(
        admin,
        State(state),
        Json(StartCheckoutRequest {
            scholarship_id: Uuid::new_v4(),
        }),
    )
    .await;
    assert!(matches!(result, Err(ApiError::Forbidden)));
}

// --- Ownership ---

#[tokio::test]
async fn application_listing_rejects_foreign_email() {
    let state = test_state();
    let result = handlers::my_applications(
        auth("a@x.com", "student"),
        State(state),
        Query(EmailQuery {
            email: "b@x.com".to_string(),
        }),
    )
    .await;
    assert!(matches!(result, Err(ApiError::Forbidden)));
}

#[tokio::test]
async fn review_deletion_rejects_foreign_email() {
    let state = test_state();
    let admin = auth("admin@x.com", "admin");
    let Json(created) = handlers::create_scholarship(
        admin,
        State(state.clone()),
        Json(scholarship_request("A", "U", "PhD")),
    )
    .await
    .unwrap();

    // b@x.com owns the review.
    let Json(review) = handlers::create_review(
        auth("b@x.com", "student"),
        State(state.clone()),
        Json(CreateReviewRequest {
            scholarship_id: created.id,
            rating: 5,
            ..Default::default()
        }),
    )
    .await
    .unwrap();

    // a@x.com names b@x.com in the query string: ownership guard fires.
    let result = handlers::delete_review(
        auth("a@x.com", "student"),
        State(state.clone()),
        Path(review.id),
        Query(EmailQuery {
            email: "b@x.com".to_string(),
        }),
    )
    .await;
    assert!(matches!(result, Err(ApiError::Forbidden)));

    // The rightful owner succeeds.
    let status = handlers::delete_review(
        auth("b@x.com", "student"),
        State(state.clone()),
        Path(review.id),
        Query(EmailQuery {
            email: "b@x.com".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(state.repo.list_reviews(None).await.unwrap().is_empty());
}

// --- Search & Pagination ---

#[tokio::test]
async fn search_is_case_insensitive_across_fields() {
    let state = test_state();
    let admin = auth("admin@x.com", "admin");
    for (name, university, degree) in [
        ("Merit Award", "Engineering Institute", "Masters"),
        ("ENGLISH Excellence", "Arts College", "Bachelor"),
        ("Science Grant", "Plain University", "B.Eng"),
        ("Unrelated", "Elsewhere", "MBA"),
    ] {
        handlers::create_scholarship(
            admin.clone(),
            State(state.clone()),
            Json(scholarship_request(name, university, degree)),
        )
        .await
        .unwrap();
    }

    let Json(page) = handlers::list_scholarships(
        State(state),
        Query(ScholarshipFilter {
            search: Some("eng".to_string()),
            ..Default::default()
        }),
    )
    .await
    .unwrap();

    // OR semantics: a university match, a name match and a degree match all count.
    assert_eq!(page.total_count, 3);
    let universities: Vec<_> = page.items.iter().map(|s| s.university_name.as_str()).collect();
    assert!(universities.contains(&"Engineering Institute"));
}

#[tokio::test]
async fn pagination_returns_middle_slice_with_full_total() {
    let state = test_state();
    let admin = auth("admin@x.com", "admin");
    let base = Utc::now();
    for i in 0..5 {
        let mut req = scholarship_request(&format!("S{}", i), "U", "PhD");
        // Distinct post dates so the default sort (post_date desc) is deterministic:
        // S4 is newest, S0 oldest.
        req.post_date = Some(base + Duration::minutes(i));
        handlers::create_scholarship(admin.clone(), State(state.clone()), Json(req))
            .await
            .unwrap();
    }

    let Json(page) = handlers::list_scholarships(
        State(state),
        Query(ScholarshipFilter {
            limit: Some(2),
            skip: Some(2),
            ..Default::default()
        }),
    )
    .await
    .unwrap();

    // Records 3 and 4 of the sorted set, total unaffected by pagination.
    assert_eq!(page.total_count, 5);
    let names: Vec<_> = page.items.iter().map(|s| s.scholarship_name.as_str()).collect();
    assert_eq!(names, vec!["S2", "S1"]);
}

#[tokio::test]
async fn latest_returns_top_six_by_post_date() {
    let state = test_state();
    let admin = auth("admin@x.com", "admin");
    let base = Utc::now();
    for i in 0..8 {
        let mut req = scholarship_request(&format!("S{}", i), "U", "PhD");
        req.post_date = Some(base + Duration::minutes(i));
        handlers::create_scholarship(admin.clone(), State(state.clone()), Json(req))
            .await
            .unwrap();
    }

    let Json(latest) = handlers::latest_scholarships(
        State(state),
        Query(Default::default()),
    )
    .await
    .unwrap();

    assert_eq!(latest.len(), 6);
    assert_eq!(latest[0].scholarship_name, "S7");
    assert_eq!(latest[5].scholarship_name, "S2");
}

// --- Application Lifecycle ---

#[tokio::test]
async fn confirm_checkout_is_idempotent() {
    let state = test_state();
    let student = seed_student(&state, "s@x.com").await;
    let admin = auth("admin@x.com", "admin");
    let Json(created) = handlers::create_scholarship(
        admin,
        State(state.clone()),
        Json(scholarship_request("Merit", "Engineering Institute", "PhD")),
    )
    .await
    .unwrap();
    let scholarship = state
        .repo
        .get_scholarship(created.id)
        .await
        .unwrap()
        .unwrap();

    let session_id = seed_session(&state, &student, &scholarship).await;
    let caller = auth("s@x.com", "student");

    let Json(first) = handlers::confirm_checkout(
        caller.clone(),
        State(state.clone()),
        Query(SessionQuery {
            session_id: session_id.clone(),
        }),
    )
    .await
    .unwrap();
    assert!(!first.already_recorded);
    assert_eq!(first.payment_status, "paid");
    let app_id = first.application_id.expect("record should exist");

    // Refreshing the success page replays the confirmation.
    let Json(second) = handlers::confirm_checkout(
        caller,
        State(state.clone()),
        Query(SessionQuery { session_id }),
    )
    .await
    .unwrap();
    assert!(second.already_recorded);
    assert_eq!(second.application_id, Some(app_id));

    // Exactly one record materialized.
    let all = state.repo.list_all_applications().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].application_status, "pending");
    assert_eq!(all[0].user_email, "s@x.com");
    assert_eq!(all[0].scholarship_name, "Merit");
}

#[tokio::test]
async fn unpaid_session_creates_no_record() {
    let state = state_with_payments(MockPaymentService::new_unpaid());
    let student = seed_student(&state, "s@x.com").await;
    let admin = auth("admin@x.com", "admin");
    let Json(created) = handlers::create_scholarship(
        admin,
        State(state.clone()),
        Json(scholarship_request("Merit", "U", "PhD")),
    )
    .await
    .unwrap();
    let scholarship = state
        .repo
        .get_scholarship(created.id)
        .await
        .unwrap()
        .unwrap();
    let session_id = seed_session(&state, &student, &scholarship).await;

    let Json(result) = handlers::confirm_checkout(
        auth("s@x.com", "student"),
        State(state.clone()),
        Query(SessionQuery { session_id }),
    )
    .await
    .unwrap();

    assert_eq!(result.payment_status, "unpaid");
    assert!(result.application_id.is_none());
    assert!(!result.already_recorded);
    assert!(state.repo.list_all_applications().await.unwrap().is_empty());
}

#[tokio::test]
async fn start_checkout_returns_redirect_url() {
    let state = test_state();
    seed_student(&state, "s@x.com").await;
    let Json(created) = handlers::create_scholarship(
        auth("admin@x.com", "admin"),
        State(state.clone()),
        Json(scholarship_request("Merit", "U", "PhD")),
    )
    .await
    .unwrap();

    let Json(redirect) = handlers::start_checkout(
        auth("s@x.com", "student"),
        State(state.clone()),
        Json(StartCheckoutRequest {
            scholarship_id: created.id,
        }),
    )
    .await
    .unwrap();
    assert!(redirect.url.starts_with("https://checkout.mock.local/"));

    // Still no application record: checkout is stateless until confirmation.
    assert!(state.repo.list_all_applications().await.unwrap().is_empty());
}

#[tokio::test]
async fn start_checkout_for_unknown_scholarship_is_not_found() {
    let state = test_state();
    seed_student(&state, "s@x.com").await;
    let result = handlers::start_checkout(
        auth("s@x.com", "student"),
        State(state),
        Json(StartCheckoutRequest {
            scholarship_id: Uuid::new_v4(),
        }),
    )
    .await;
    assert!(matches!(result, Err(ApiError::NotFound)));
}

#[tokio::test]
async fn moderator_updates_status_and_feedback() {
    let state = test_state();
    let id = state
        .repo
        .insert_application_if_absent(NewApplication {
            transaction_id: "pi_1".to_string(),
            user_email: "s@x.com".to_string(),
            scholarship_name: "Merit".to_string(),
            university_name: "U".to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
        .unwrap();

    let Json(updated) = handlers::update_application(
        auth("m@x.com", "moderator"),
        State(state.clone()),
        Path(id),
        Json(UpdateApplicationRequest {
            application_status: Some("approved".to_string()),
            feedback: Some("well prepared".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(updated.application_status, "approved");
    assert_eq!(updated.feedback.as_deref(), Some("well prepared"));
    // Payment fields untouched.
    assert_eq!(updated.payment_status, "paid");
}

#[tokio::test]
async fn status_stats_group_counts_by_status() {
    let state = test_state();
    for (tx, status) in [("pi_1", "pending"), ("pi_2", "pending"), ("pi_3", "approved")] {
        let id = state
            .repo
            .insert_application_if_absent(NewApplication {
                transaction_id: tx.to_string(),
                ..Default::default()
            })
            .await
            .unwrap()
            .unwrap();
        if status != "pending" {
            state
                .repo
                .update_application(id, Some(status.to_string()), None)
                .await
                .unwrap();
        }
    }

    let Json(stats) = handlers::application_status_stats(
        auth("a@x.com", "admin"),
        State(state),
    )
    .await
    .unwrap();

    let lookup: HashMap<_, _> = stats
        .iter()
        .map(|s| (s.application_status.as_str(), s.count))
        .collect();
    assert_eq!(lookup.get("pending"), Some(&2));
    assert_eq!(lookup.get("approved"), Some(&1));
    assert_eq!(stats.len(), 2);
}

// --- Reviews ---

#[tokio::test]
async fn review_creation_denormalizes_scholarship_fields() {
    let state = test_state();
    let Json(created) = handlers::create_scholarship(
        auth("admin@x.com", "admin"),
        State(state.clone()),
        Json(scholarship_request("Merit", "Engineering Institute", "PhD")),
    )
    .await
    .unwrap();

    let Json(review) = handlers::create_review(
        auth("s@x.com", "student"),
        State(state.clone()),
        Json(CreateReviewRequest {
            scholarship_id: created.id,
            rating: 4,
            comment: Some("great support".to_string()),
            ..Default::default()
        }),
    )
    .await
    .unwrap();

    assert_eq!(review.scholarship_name, "Merit");
    assert_eq!(review.university_name, "Engineering Institute");
    // Identity comes from the token, never the body.
    assert_eq!(review.reviewer_email, "s@x.com");
}

#[tokio::test]
async fn review_for_unknown_scholarship_is_not_found() {
    let state = test_state();
    let result = handlers::create_review(
        auth("s@x.com", "student"),
        State(state),
        Json(CreateReviewRequest {
            scholarship_id: Uuid::new_v4(),
            rating: 3,
            ..Default::default()
        }),
    )
    .await;
    assert!(matches!(result, Err(ApiError::NotFound)));
}
