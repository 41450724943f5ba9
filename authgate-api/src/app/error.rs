use authgate_core::{AuthError, ErrorKind};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub struct ApiError {
    code: &'static str,
    message: String,
    status: StatusCode,
    /// 密码策略的逐条违规原因
    errors: Vec<String>,
}

impl ApiError {
    pub fn new(code: &'static str, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            status,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new("Unauthorized", StatusCode::UNAUTHORIZED, "unauthorized")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("Forbidden", StatusCode::FORBIDDEN, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BadRequest", StatusCode::BAD_REQUEST, message)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match (err.kind(), err) {
            (ErrorKind::Policy, AuthError::PasswordPolicy(errors)) => Self {
                code: "PasswordPolicy",
                status: StatusCode::BAD_REQUEST,
                message,
                errors,
            },
            (ErrorKind::Validation, _) | (ErrorKind::Policy, _) => {
                ApiError::new("ValidationError", StatusCode::BAD_REQUEST, message)
            }
            (ErrorKind::Conflict, _) => ApiError::new("Conflict", StatusCode::CONFLICT, message),
            (ErrorKind::Authentication, _) => {
                ApiError::new("InvalidCredentials", StatusCode::UNAUTHORIZED, message)
            }
            (ErrorKind::Authorization, AuthError::AccountLocked { .. }) => {
                ApiError::new("AccountLocked", StatusCode::FORBIDDEN, message)
            }
            (ErrorKind::Authorization, AuthError::AccountDeactivated) => {
                ApiError::new("AccountDeactivated", StatusCode::FORBIDDEN, message)
            }
            (ErrorKind::Authorization, _) => {
                ApiError::new("Unauthorized", StatusCode::UNAUTHORIZED, message)
            }
            (ErrorKind::Throttled, _) => {
                ApiError::new("TooManyRequests", StatusCode::TOO_MANY_REQUESTS, message)
            }
            (ErrorKind::NotFound, _) => ApiError::new("NotFound", StatusCode::NOT_FOUND, message),
            (ErrorKind::Unavailable, _) => {
                // 内部细节只进日志，不回给客户端
                tracing::error!(error = %message, "storage failure");
                ApiError::new(
                    "ServiceUnavailable",
                    StatusCode::SERVICE_UNAVAILABLE,
                    "service temporarily unavailable",
                )
            }
            (ErrorKind::Config, _) => {
                tracing::error!(error = %message, "configuration error");
                ApiError::new(
                    "Error",
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error",
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = if self.errors.is_empty() {
            json!({
                "code": self.code,
                "message": self.message,
            })
        } else {
            json!({
                "code": self.code,
                "message": self.message,
                "errors": self.errors,
            })
        };
        (self.status, Json(body)).into_response()
    }
}
