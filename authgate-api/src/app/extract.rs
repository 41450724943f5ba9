use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;

use super::error::ApiError;

/// JSON 请求体；解析失败同样返回 {code, message}
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new("InvalidBody", rejection.status(), rejection.body_text())
    }
}
