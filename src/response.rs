use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::lex::EngineError;
use crate::store::StoreError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub code: String,
    pub message: String,
    pub trace_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub is_operational: bool,
}

impl AppError {
    fn operational(status: StatusCode, code: &str, message: &str) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.to_string(),
            is_operational: true,
        }
    }

    pub fn bad_request(code: &str, message: &str) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn unauthorized(message: &str) -> Self {
        Self::operational(StatusCode::UNAUTHORIZED, "AUTH_UNAUTHORIZED", message)
    }

    pub fn forbidden(message: &str) -> Self {
        Self::operational(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn not_found(message: &str) -> Self {
        Self::operational(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn conflict(code: &str, message: &str) -> Self {
        Self::operational(StatusCode::CONFLICT, code, message)
    }

    pub fn unprocessable(code: &str, message: &str) -> Self {
        Self::operational(StatusCode::UNPROCESSABLE_ENTITY, code, message)
    }

    pub fn internal(message: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR".to_string(),
            message: message.to_string(),
            is_operational: false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let exposed_message = if self.is_operational {
            self.message.clone()
        } else {
            "Internal server error".to_string()
        };

        if self.is_operational {
            tracing::warn!(status = %self.status, code = %self.code, error = %self.message, "API error");
        } else {
            tracing::error!(status = %self.status, code = %self.code, error = %self.message, "Internal API error");
        }

        (
            self.status,
            Json(ErrorBody {
                success: false,
                code: self.code,
                message: exposed_message,
                trace_id: None,
            }),
        )
            .into_response()
    }
}

// Only validation, not-found and conflict messages reach the client; the
// rest are replaced by a generic message in IntoResponse.
impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        match &value {
            StoreError::Validation(msg) => AppError::bad_request("VALIDATION_ERROR", msg),
            StoreError::NotFound { entity, key } => {
                AppError::not_found(&format!("{entity} not found: {key}"))
            }
            StoreError::Conflict { entity, key } => {
                AppError::conflict("CONFLICT", &format!("{entity} already exists: {key}"))
            }
            _ => AppError::internal(&value.to_string()),
        }
    }
}

impl From<EngineError> for AppError {
    fn from(value: EngineError) -> Self {
        match value {
            EngineError::NotFound { entity, key } => {
                AppError::not_found(&format!("{entity} not found: {key}"))
            }
            EngineError::Conflict { entity, key } => AppError::conflict(
                &format!("{}_CONFLICT", entity.to_ascii_uppercase()),
                &format!("{entity} already exists: {key}"),
            ),
            EngineError::InvalidState(msg) => AppError::unprocessable("INVALID_STATE", &msg),
            EngineError::Store(e) => AppError::from(e),
            EngineError::Internal(msg) => AppError::internal(&msg),
        }
    }
}

pub fn ok<T: Serialize>(data: T) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(ApiResponse {
            success: true,
            data,
        }),
    )
}

pub fn created<T: Serialize>(data: T) -> impl IntoResponse {
    (
        StatusCode::CREATED,
        Json(ApiResponse {
            success: true,
            data,
        }),
    )
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use axum::response::IntoResponse;

    use super::*;

    async fn json_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn internal_error_is_redacted() {
        let (status, json) = json_of(AppError::internal("sled crash")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], "Internal server error");
        assert_eq!(json["code"], "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn bad_request_keeps_message() {
        let (_, json) = json_of(AppError::bad_request("BAD_INPUT", "answers must not be empty")).await;
        assert_eq!(json["message"], "answers must not be empty");
        assert_eq!(json["code"], "BAD_INPUT");
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn engine_errors_map_to_statuses() {
        let (status, json) = json_of(EngineError::not_found("question", "q9").into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["message"], "question not found: q9");

        let (status, json) = json_of(EngineError::conflict("badge", "speed_demon").into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["code"], "BADGE_CONFLICT");

        let (status, _) = json_of(EngineError::InvalidState("nope".into()).into()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, json) = json_of(EngineError::Internal("join failed".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], "Internal server error");
    }

    #[tokio::test]
    async fn store_validation_is_bad_request() {
        let (status, json) = json_of(StoreError::Validation("rating out of range".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }
}
