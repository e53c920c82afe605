use axum::extract::{FromRef, FromRequestParts};
use axum::http::{request::Parts, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::response::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Principal tokens are issued by an identity provider outside this
/// service; signing lives here for seeding, tooling and tests.
pub fn sign_token(
    subject: &str,
    role: Role,
    secret: &str,
    expires_in_hours: i64,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: subject.to_string(),
        role,
        iat: now.timestamp(),
        exp: (now + Duration::hours(expires_in_hours)).timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(&format!("jwt sign failed: {e}")))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.algorithms = vec![Algorithm::HS256];

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::unauthorized("Invalid or expired token"))
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::unauthorized("Missing bearer token"))
}

fn claims_from_parts(parts: &Parts, state: &AppState) -> Result<Claims, AppError> {
    let token = extract_bearer_token(&parts.headers)?;
    verify_token(&token, &state.config().jwt_secret)
}

/// A verified student principal. Resolving one touches the student's
/// `lastLogin`.
#[derive(Debug, Clone)]
pub struct StudentPrincipal {
    pub student_id: String,
}

#[derive(Debug, Clone)]
pub struct AdminPrincipal {
    pub admin_id: String,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for StudentPrincipal
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let claims = claims_from_parts(parts, &app_state)?;
        if claims.role != Role::Student {
            return Err(AppError::forbidden("Student token required"));
        }

        app_state.engine().touch_login(&claims.sub).await.map_err(|e| match e {
            crate::lex::EngineError::NotFound { .. } => AppError::unauthorized("Unknown student"),
            other => AppError::from(other),
        })?;

        Ok(StudentPrincipal {
            student_id: claims.sub,
        })
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminPrincipal
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let claims = claims_from_parts(parts, &app_state)?;
        if claims.role != Role::Admin {
            return Err(AppError::forbidden("Admin token required"));
        }
        Ok(AdminPrincipal {
            admin_id: claims.sub,
        })
    }
}
