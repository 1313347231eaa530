//! Users and bearer-token authentication.
//!
//! Passwords are stored as bcrypt hashes; logins exchange credentials for
//! an HS256 JWT whose subject is the user's email. The first registered
//! user becomes the admin; ingestion endpoints require the admin role.

use std::sync::Arc;

use axum::extract::State;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{async_trait, extract::FromRequestParts, Json};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::{ErrorResponse, AppState};

#[derive(Debug, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub full_name: Option<String>,
    pub hashed_password: String,
    pub role: String,
}

#[derive(Serialize)]
struct UserOut {
    id: i64,
    email: String,
    full_name: Option<String>,
    role: String,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
}

// =============================================================================
// TOKENS
// =============================================================================

pub fn create_access_token(settings: &Settings, email: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let expires_at = Utc::now() + chrono::Duration::minutes(settings.access_token_expire_minutes);
    let claims = Claims {
        sub: email.to_string(),
        exp: expires_at.timestamp() as usize,
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
    )
}

/// Returns the subject email for a valid, unexpired token.
pub fn decode_token(secret: &str, token: &str) -> Option<String> {
    jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims.sub)
}

// =============================================================================
// HANDLERS
// =============================================================================

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Response {
    let existing: Result<Option<(i64,)>, _> =
        sqlx::query_as("SELECT id FROM users WHERE email = $1")
            .bind(&req.email)
            .fetch_optional(&state.pool)
            .await;

    match existing {
        Ok(Some(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Email already registered".to_string(),
                }),
            )
                .into_response();
        }
        Ok(None) => {}
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response();
        }
    }

    let hashed = match bcrypt::hash(&req.password, bcrypt::DEFAULT_COST) {
        Ok(h) => h,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response();
        }
    };

    // First user in becomes the admin.
    let result: Result<(i64, String), sqlx::Error> = async {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&state.pool)
            .await?;
        let role = if total == 0 { "admin" } else { "user" };

        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO users (email, full_name, hashed_password, role) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&req.email)
        .bind(&req.full_name)
        .bind(&hashed)
        .bind(role)
        .fetch_one(&state.pool)
        .await?;

        Ok((id, role.to_string()))
    }
    .await;

    match result {
        Ok((id, role)) => Json(UserOut {
            id,
            email: req.email,
            full_name: req.full_name,
            role,
        })
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Response {
    let user: Result<Option<User>, _> = sqlx::query_as(
        "SELECT id, email, full_name, hashed_password, role FROM users WHERE email = $1",
    )
    .bind(&req.email)
    .fetch_optional(&state.pool)
    .await;

    let user = match user {
        Ok(u) => u,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response();
        }
    };

    let valid = user
        .as_ref()
        .map(|u| bcrypt::verify(&req.password, &u.hashed_password).unwrap_or(false))
        .unwrap_or(false);

    if !valid {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Invalid credentials".to_string(),
            }),
        )
            .into_response();
    }

    match create_access_token(&state.settings, &req.email) {
        Ok(token) => Json(serde_json::json!({
            "access_token": token,
            "token_type": "bearer",
        }))
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

// =============================================================================
// ADMIN GUARD
// =============================================================================

/// Extractor for endpoints that mutate the store: resolves the bearer
/// token to a user and requires the admin role.
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let unauthorized = |msg: &str| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: msg.to_string(),
                }),
            )
        };

        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| unauthorized("Not authenticated"))?;

        let email = decode_token(&state.settings.jwt_secret, token)
            .ok_or_else(|| unauthorized("Invalid or expired token"))?;

        let user: Option<User> = sqlx::query_as(
            "SELECT id, email, full_name, hashed_password, role FROM users WHERE email = $1",
        )
        .bind(&email)
        .fetch_optional(&state.pool)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
        })?;

        let user = user.ok_or_else(|| unauthorized("Invalid or expired token"))?;

        if user.role != "admin" {
            return Err((
                StatusCode::FORBIDDEN,
                Json(ErrorResponse {
                    error: "Admin privileges required".to_string(),
                }),
            ));
        }

        Ok(AdminUser(user))
    }
}
