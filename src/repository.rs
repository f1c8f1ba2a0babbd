use crate::models::{
    Application, CreateScholarshipRequest, NewApplication, NewReview, RegisterUserRequest, Review,
    Scholarship, ScholarshipFilter, ScholarshipPage, ScholarshipSummary, StatusStat, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations. This is the core of
/// the Repository Abstraction pattern: handlers and guards interact with the data
/// layer without knowing the concrete implementation (Postgres, in-memory mock, etc.).
///
/// Every method returns `Result<_, sqlx::Error>`; store failures propagate to the
/// handlers where they become a logged 500 instead of crashing the process.
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity Store ---
    /// Atomic insert-if-absent keyed on the unique email. Returns `None` when the
    /// email is already registered (no second insert is performed).
    async fn create_user(&self, req: RegisterUserRequest) -> Result<Option<User>, sqlx::Error>;
    /// The single lookup the RequireToken/RequireRole guard chain performs.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error>;
    async fn list_users(&self) -> Result<Vec<User>, sqlx::Error>;
    /// Admin action: partial update of role and/or display name.
    async fn update_user(
        &self,
        id: Uuid,
        role: Option<String>,
        name: Option<String>,
    ) -> Result<Option<User>, sqlx::Error>;
    async fn delete_user(&self, id: Uuid) -> Result<bool, sqlx::Error>;

    // --- Scholarship Catalog ---
    async fn create_scholarship(
        &self,
        req: CreateScholarshipRequest,
    ) -> Result<Uuid, sqlx::Error>;
    /// Search/sort/paginate. The returned total counts the filtered set irrespective
    /// of pagination. Description is excluded from the projection.
    async fn list_scholarships(
        &self,
        filter: ScholarshipFilter,
    ) -> Result<ScholarshipPage, sqlx::Error>;
    async fn get_scholarship(&self, id: Uuid) -> Result<Option<Scholarship>, sqlx::Error>;
    async fn delete_scholarship(&self, id: Uuid) -> Result<bool, sqlx::Error>;
    /// Top 6 by post date, same search semantics as `list_scholarships`.
    async fn latest_scholarships(
        &self,
        search: Option<String>,
    ) -> Result<Vec<ScholarshipSummary>, sqlx::Error>;

    // --- Application Lifecycle ---
    async fn find_application_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Application>, sqlx::Error>;
    /// Atomic insert-if-absent keyed on the unique transaction id. Returns `None`
    /// when another confirmation already materialized this payment; this is the
    /// storage-layer half of the idempotency contract.
    async fn insert_application_if_absent(
        &self,
        app: NewApplication,
    ) -> Result<Option<Uuid>, sqlx::Error>;
    async fn applications_for_email(&self, email: &str) -> Result<Vec<Application>, sqlx::Error>;
    async fn list_all_applications(&self) -> Result<Vec<Application>, sqlx::Error>;
    /// Moderator action: mutate status and/or feedback only.
    async fn update_application(
        &self,
        id: Uuid,
        status: Option<String>,
        feedback: Option<String>,
    ) -> Result<Option<Application>, sqlx::Error>;
    /// Group-count of applications by status for the admin dashboard.
    async fn application_status_stats(&self) -> Result<Vec<StatusStat>, sqlx::Error>;

    // --- Reviews ---
    async fn create_review(&self, review: NewReview) -> Result<Review, sqlx::Error>;
    /// Owner-scoped delete: affects a row only when the reviewer email matches.
    async fn delete_review(&self, id: Uuid, reviewer_email: &str) -> Result<bool, sqlx::Error>;
    async fn list_reviews(&self, email: Option<String>) -> Result<Vec<Review>, sqlx::Error>;
    async fn reviews_for_scholarship(
        &self,
        scholarship_id: Uuid,
    ) -> Result<Vec<Review>, sqlx::Error>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the PostgreSQL
/// database. Owns nothing but the injected pool; the pool is created once at process
/// start and dropped when the server exits.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Columns of the list-view projection. `description` is deliberately absent.
const SUMMARY_COLUMNS: &str = "id, scholarship_name, university_name, university_city, \
     university_country, world_rank, degree, category, subject_category, post_date, \
     application_fees, service_charge, stipend";

/// sort_column
///
/// Maps a client-supplied sort field onto a whitelisted column name. Sorting is the
/// one place a query parameter lands in SQL text instead of a bind parameter, so the
/// whitelist is mandatory. Unknown fields fall back to `post_date`.
fn sort_column(sort: Option<&str>) -> &'static str {
    match sort {
        Some("scholarship_name") => "scholarship_name",
        Some("university_name") => "university_name",
        Some("degree") => "degree",
        Some("category") => "category",
        Some("subject_category") => "subject_category",
        Some("application_fees") => "application_fees",
        Some("service_charge") => "service_charge",
        Some("world_rank") => "world_rank",
        _ => "post_date",
    }
}

/// push_search
///
/// Appends the shared WHERE clause for scholarship search: a case-insensitive
/// substring match OR-combined across the name, university and degree columns.
/// All user input goes through bind parameters.
fn push_search(builder: &mut QueryBuilder<'_, sqlx::Postgres>, pattern: &str) {
    builder.push(" WHERE (scholarship_name ILIKE ");
    builder.push_bind(pattern.to_string());
    builder.push(" OR university_name ILIKE ");
    builder.push_bind(pattern.to_string());
    builder.push(" OR degree ILIKE ");
    builder.push_bind(pattern.to_string());
    builder.push(")");
}

#[async_trait]
impl Repository for PostgresRepository {
    /// create_user
    ///
    /// Registration insert. `ON CONFLICT (email) DO NOTHING` makes duplicate
    /// registration a single atomic no-op instead of a find-then-insert race; the
    /// absence of a returned row tells the handler the email was already taken.
    /// Every new user starts with the 'student' role.
    async fn create_user(&self, req: RegisterUserRequest) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"INSERT INTO users (id, email, name, photo_url, role, created_at)
               VALUES ($1, $2, $3, $4, 'student', NOW())
               ON CONFLICT (email) DO NOTHING
               RETURNING id, email, name, photo_url, role, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(&req.email)
        .bind(&req.name)
        .bind(&req.photo_url)
        .fetch_optional(&self.pool)
        .await
    }

    /// get_user_by_email
    ///
    /// Retrieves the identity record needed for authentication and authorization.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, name, photo_url, role, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    /// list_users
    ///
    /// Administrative listing of every registered user, newest first.
    async fn list_users(&self) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, name, photo_url, role, created_at FROM users ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
    }

    /// update_user
    ///
    /// Partial update using COALESCE so omitted fields are left untouched.
    async fn update_user(
        &self,
        id: Uuid,
        role: Option<String>,
        name: Option<String>,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"UPDATE users
               SET role = COALESCE($2, role),
                   name = COALESCE($3, name)
               WHERE id = $1
               RETURNING id, email, name, photo_url, role, created_at"#,
        )
        .bind(id)
        .bind(role)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
    }

    /// delete_user
    ///
    /// Explicit admin-only hard delete. True when a row was removed.
    async fn delete_user(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// create_scholarship
    ///
    /// Inserts a new listing and returns the generated identifier. A missing post
    /// date defaults to the insertion time.
    async fn create_scholarship(
        &self,
        req: CreateScholarshipRequest,
    ) -> Result<Uuid, sqlx::Error> {
        let id = Uuid::new_v4();
        let post_date: DateTime<Utc> = req.post_date.unwrap_or_else(Utc::now);
        sqlx::query(
            r#"INSERT INTO scholarships
               (id, scholarship_name, university_name, university_city, university_country,
                world_rank, degree, category, subject_category, post_date,
                application_fees, service_charge, stipend, description)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"#,
        )
        .bind(id)
        .bind(&req.scholarship_name)
        .bind(&req.university_name)
        .bind(&req.university_city)
        .bind(&req.university_country)
        .bind(req.world_rank)
        .bind(&req.degree)
        .bind(&req.category)
        .bind(&req.subject_category)
        .bind(post_date)
        .bind(req.application_fees)
        .bind(req.service_charge)
        .bind(&req.stipend)
        .bind(&req.description)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    /// list_scholarships
    ///
    /// Implements search/sort/paginate using QueryBuilder for safe parameterization.
    /// Two queries run: one COUNT over the filtered set (pagination-independent total)
    /// and one page query with ORDER BY / LIMIT / OFFSET. The sort column comes from
    /// the whitelist in `sort_column`, never from raw client input.
    async fn list_scholarships(
        &self,
        filter: ScholarshipFilter,
    ) -> Result<ScholarshipPage, sqlx::Error> {
        let pattern = filter.search.as_ref().map(|s| format!("%{}%", s));

        // Total over the filtered set, ignoring limit/skip.
        let mut count_builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM scholarships");
        if let Some(p) = &pattern {
            push_search(&mut count_builder, p);
        }
        let total_count: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        // Page query.
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM scholarships", SUMMARY_COLUMNS));
        if let Some(p) = &pattern {
            push_search(&mut builder, p);
        }

        builder.push(" ORDER BY ");
        builder.push(sort_column(filter.sort.as_deref()));
        // Descending unless "asc" was asked for explicitly.
        match filter.order.as_deref() {
            Some("asc") => builder.push(" ASC"),
            _ => builder.push(" DESC"),
        };

        let limit = filter.limit.unwrap_or(10).clamp(1, 100);
        let skip = filter.skip.unwrap_or(0).max(0);
        builder.push(" LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(skip);

        let items = builder
            .build_query_as::<ScholarshipSummary>()
            .fetch_all(&self.pool)
            .await?;

        Ok(ScholarshipPage { items, total_count })
    }

    /// get_scholarship
    ///
    /// Full single-record fetch, description included.
    async fn get_scholarship(&self, id: Uuid) -> Result<Option<Scholarship>, sqlx::Error> {
        sqlx::query_as::<_, Scholarship>(
            r#"SELECT id, scholarship_name, university_name, university_city,
                      university_country, world_rank, degree, category, subject_category,
                      post_date, application_fees, service_charge, stipend, description
               FROM scholarships WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// delete_scholarship
    ///
    /// Admin-only delete. True when a row was removed.
    async fn delete_scholarship(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM scholarships WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// latest_scholarships
    ///
    /// The landing-page feed: top 6 listings by post date, optionally searched with
    /// the same OR semantics as the full listing.
    async fn latest_scholarships(
        &self,
        search: Option<String>,
    ) -> Result<Vec<ScholarshipSummary>, sqlx::Error> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM scholarships", SUMMARY_COLUMNS));
        if let Some(s) = &search {
            let pattern = format!("%{}%", s);
            push_search(&mut builder, &pattern);
        }
        builder.push(" ORDER BY post_date DESC LIMIT 6");

        builder
            .build_query_as::<ScholarshipSummary>()
            .fetch_all(&self.pool)
            .await
    }

    /// find_application_by_transaction
    ///
    /// Lookup used by the retry path of checkout confirmation.
    async fn find_application_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Application>, sqlx::Error> {
        sqlx::query_as::<_, Application>(
            r#"SELECT id, scholarship_id, user_id, user_email, user_name, scholarship_name,
                      university_name, transaction_id, application_status, payment_status,
                      application_fees, service_charge, application_date, feedback
               FROM applications WHERE transaction_id = $1"#,
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// insert_application_if_absent
    ///
    /// Materializes an application from a paid checkout session. The UNIQUE
    /// constraint on `transaction_id` plus `ON CONFLICT DO NOTHING` guarantees at
    /// most one row per payment even when two confirmations race; losing the race
    /// surfaces as `None` rather than an error.
    async fn insert_application_if_absent(
        &self,
        app: NewApplication,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"INSERT INTO applications
               (id, scholarship_id, user_id, user_email, user_name, scholarship_name,
                university_name, transaction_id, application_status, payment_status,
                application_fees, service_charge, application_date)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', 'paid', $9, $10, NOW())
               ON CONFLICT (transaction_id) DO NOTHING
               RETURNING id"#,
        )
        .bind(Uuid::new_v4())
        .bind(app.scholarship_id)
        .bind(app.user_id)
        .bind(&app.user_email)
        .bind(&app.user_name)
        .bind(&app.scholarship_name)
        .bind(&app.university_name)
        .bind(&app.transaction_id)
        .bind(app.application_fees)
        .bind(app.service_charge)
        .fetch_optional(&self.pool)
        .await
    }

    /// applications_for_email
    ///
    /// A student's own applications, newest first.
    async fn applications_for_email(&self, email: &str) -> Result<Vec<Application>, sqlx::Error> {
        sqlx::query_as::<_, Application>(
            r#"SELECT id, scholarship_id, user_id, user_email, user_name, scholarship_name,
                      university_name, transaction_id, application_status, payment_status,
                      application_fees, service_charge, application_date, feedback
               FROM applications WHERE user_email = $1 ORDER BY application_date DESC"#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await
    }

    /// list_all_applications
    ///
    /// Moderator view of every application, pending first.
    async fn list_all_applications(&self) -> Result<Vec<Application>, sqlx::Error> {
        sqlx::query_as::<_, Application>(
            r#"SELECT id, scholarship_id, user_id, user_email, user_name, scholarship_name,
                      university_name, transaction_id, application_status, payment_status,
                      application_fees, service_charge, application_date, feedback
               FROM applications
               ORDER BY application_status = 'pending' DESC, application_date DESC"#,
        )
        .fetch_all(&self.pool)
        .await
    }

    /// update_application
    ///
    /// Moderator mutation of status/feedback only; COALESCE leaves omitted fields
    /// untouched. Payment fields are immutable after confirmation.
    async fn update_application(
        &self,
        id: Uuid,
        status: Option<String>,
        feedback: Option<String>,
    ) -> Result<Option<Application>, sqlx::Error> {
        sqlx::query_as::<_, Application>(
            r#"UPDATE applications
               SET application_status = COALESCE($2, application_status),
                   feedback = COALESCE($3, feedback)
               WHERE id = $1
               RETURNING id, scholarship_id, user_id, user_email, user_name, scholarship_name,
                         university_name, transaction_id, application_status, payment_status,
                         application_fees, service_charge, application_date, feedback"#,
        )
        .bind(id)
        .bind(status)
        .bind(feedback)
        .fetch_optional(&self.pool)
        .await
    }

    /// application_status_stats
    ///
    /// Group-count by status for the admin dashboard. Order unspecified by contract.
    async fn application_status_stats(&self) -> Result<Vec<StatusStat>, sqlx::Error> {
        sqlx::query_as::<_, StatusStat>(
            "SELECT application_status, COUNT(*) AS count FROM applications GROUP BY application_status",
        )
        .fetch_all(&self.pool)
        .await
    }

    /// create_review
    ///
    /// Inserts a review carrying the denormalized scholarship fields resolved by the
    /// handler's read-then-write.
    async fn create_review(&self, review: NewReview) -> Result<Review, sqlx::Error> {
        sqlx::query_as::<_, Review>(
            r#"INSERT INTO reviews
               (id, scholarship_id, scholarship_name, university_name, reviewer_email,
                reviewer_name, reviewer_image, rating, comment, review_date)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
               RETURNING id, scholarship_id, scholarship_name, university_name, reviewer_email,
                         reviewer_name, reviewer_image, rating, comment, review_date"#,
        )
        .bind(Uuid::new_v4())
        .bind(review.scholarship_id)
        .bind(&review.scholarship_name)
        .bind(&review.university_name)
        .bind(&review.reviewer_email)
        .bind(&review.reviewer_name)
        .bind(&review.reviewer_image)
        .bind(review.rating)
        .bind(&review.comment)
        .fetch_one(&self.pool)
        .await
    }

    /// delete_review
    ///
    /// Deletes a review only when the provided reviewer email matches the row.
    /// This is the storage half of the Owner-Only check.
    async fn delete_review(&self, id: Uuid, reviewer_email: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1 AND reviewer_email = $2")
            .bind(id)
            .bind(reviewer_email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// list_reviews
    ///
    /// Public listing of reviews, optionally filtered by reviewer email.
    async fn list_reviews(&self, email: Option<String>) -> Result<Vec<Review>, sqlx::Error> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT id, scholarship_id, scholarship_name, university_name, reviewer_email, \
             reviewer_name, reviewer_image, rating, comment, review_date FROM reviews",
        );
        if let Some(email) = email {
            builder.push(" WHERE reviewer_email = ");
            builder.push_bind(email);
        }
        builder.push(" ORDER BY review_date DESC");

        builder.build_query_as::<Review>().fetch_all(&self.pool).await
    }

    /// reviews_for_scholarship
    ///
    /// Public listing of every review attached to one scholarship.
    async fn reviews_for_scholarship(
        &self,
        scholarship_id: Uuid,
    ) -> Result<Vec<Review>, sqlx::Error> {
        sqlx::query_as::<_, Review>(
            r#"SELECT id, scholarship_id, scholarship_name, university_name, reviewer_email,
                      reviewer_name, reviewer_image, rating, comment, review_date
               FROM reviews WHERE scholarship_id = $1 ORDER BY review_date DESC"#,
        )
        .bind(scholarship_id)
        .fetch_all(&self.pool)
        .await
    }
}
