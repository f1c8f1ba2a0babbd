/// Router Module Index
///
/// Organizes the application's routing logic into one module per resource. Access
/// control is not decided here: every guarded handler names its guards explicitly
/// (the `AuthUser` extractor for token presence, then `require_role` /
/// `require_owner` inside the handler), so the authorization story for any endpoint
/// is readable at its definition rather than implied by router nesting.

/// Identity endpoints: token issuance, registration, user management.
pub mod users;

/// Scholarship catalog endpoints: listing, search, detail, admin CRUD.
pub mod scholarships;

/// Application lifecycle endpoints: checkout, confirmation, moderation, stats.
pub mod applications;

/// Review endpoints: creation, owner deletion, public reads.
pub mod reviews;
