use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use crate::{config::AppConfig, error::ApiError, repository::RepositoryState};

/// Seconds a freshly issued token remains valid. Fixed at one hour by contract.
pub const TOKEN_TTL_SECS: i64 = 3600;

/// Claims
///
/// The payload structure embedded inside every JSON Web Token (JWT) this service
/// issues. Claims are signed with the server secret and validated on every
/// authenticated request. Tokens are stateless: validity is determined solely by the
/// signature and expiry at verification time.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's email. This is the canonical verified-identity field;
    /// every ownership comparison in the application uses it and nothing else.
    pub sub: String,
    /// Expiration Time (exp): timestamp after which the token must not be accepted.
    pub exp: usize,
    /// Issued At (iat): timestamp when the token was issued.
    pub iat: usize,
}

/// issue_token
///
/// Signs a one-hour bearer token for the given email with the server secret (HS256).
/// CPU-bound, no side effects.
pub fn issue_token(email: &str, secret: &str) -> Result<String, ApiError> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: email.to_string(),
        iat: now as usize,
        exp: (now + TOKEN_TTL_SECS) as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// Role
///
/// The three membership tiers recognized by the authorization guards. Stored as plain
/// text in the `users.role` column; this enum only exists so handlers name roles
/// instead of scattering string literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }
}

/// AuthUser
///
/// The resolved identity of an authenticated request: the token-verified email plus
/// the role currently recorded in the database. This is the output of the RequireToken
/// guard; handlers receive it as an extractor argument and feed it to the role and
/// ownership guards below.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub email: String,
    pub role: String,
}

/// AuthUser Extractor Implementation (the RequireToken guard)
///
/// Implements Axum's FromRequestParts trait, making AuthUser usable as a function
/// argument in any guarded handler. The extraction pipeline:
/// 1. Bearer token extraction from the Authorization header.
/// 2. JWT decoding with mandatory expiry validation.
/// 3. Exactly one database lookup resolving the claim email to a live user and role.
///    This also revokes access for users deleted after their token was issued.
///
/// Rejection: `ApiError::Unauthenticated` (401) on any failure. The extractor never
/// mutates state.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        // 1. Token Extraction
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthenticated)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthenticated)?;

        // 2. JWT Decoding Setup
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        // 3. Decode and Validate the Token
        let token_data = match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(data) => data,
            Err(e) => {
                return match e.kind() {
                    // Token expired: the most common failure for a valid-but-old token.
                    ErrorKind::ExpiredSignature => Err(ApiError::Unauthenticated),
                    // Bad signature, malformed token, etc.
                    _ => Err(ApiError::Unauthenticated),
                };
            }
        };

        let email = token_data.claims.sub;

        // 4. Database Lookup (Final Verification)
        // The token is cryptographically valid; the user must still exist.
        let user = repo
            .get_user_by_email(&email)
            .await?
            .ok_or(ApiError::Unauthenticated)?;

        Ok(AuthUser {
            email: user.email,
            role: user.role,
        })
    }
}

/// require_role
///
/// The RequireRole guard: fails `Forbidden` unless the resolved identity holds exactly
/// the given role. Stateless; the single role lookup already happened inside the
/// AuthUser extractor. Composes left-to-right with `?` and short-circuits.
pub fn require_role(user: &AuthUser, role: Role) -> Result<(), ApiError> {
    if user.role == role.as_str() {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// require_owner
///
/// The RequireOwnership guard: compares the token-verified email against an email
/// supplied in the request (query parameter or path) and fails `Forbidden` on
/// mismatch. Privileged roles must be admitted *before* this guard runs, not inside it.
pub fn require_owner(user: &AuthUser, email: &str) -> Result<(), ApiError> {
    if user.email == email {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}
