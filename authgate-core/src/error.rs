use chrono::{DateTime, Utc};
use thiserror::Error;

/// Common result type for core operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Generic message shared by "unknown email" and "wrong password".
pub const INVALID_CREDENTIALS: &str = "Invalid email or password.";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("{}", .0.join(" "))]
    PasswordPolicy(Vec<String>),
    #[error("User with this email already exists.")]
    DuplicateEmail,
    #[error("username already taken: {0}")]
    DuplicateUsername(String),
    #[error("Invalid email or password.")]
    InvalidCredentials,
    #[error("Account is locked until {until}.")]
    AccountLocked { until: DateTime<Utc> },
    #[error("Account is deactivated.")]
    AccountDeactivated,
    #[error("Invalid refresh token.")]
    InvalidRefreshToken,
    #[error("Refresh token has expired.")]
    RefreshTokenExpired,
    #[error("Current password is incorrect.")]
    CurrentPasswordIncorrect,
    #[error("Too many attempts, try again later.")]
    TooManyAttempts,
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("background task failed: {0}")]
    Task(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// 错误分类，供上层（HTTP 等）映射状态码，无需匹配字符串。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Policy,
    Conflict,
    Authentication,
    Authorization,
    Throttled,
    NotFound,
    Unavailable,
    Config,
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Validation(_) => ErrorKind::Validation,
            AuthError::PasswordPolicy(_) => ErrorKind::Policy,
            AuthError::DuplicateEmail | AuthError::DuplicateUsername(_) => ErrorKind::Conflict,
            AuthError::InvalidCredentials => ErrorKind::Authentication,
            AuthError::AccountLocked { .. }
            | AuthError::AccountDeactivated
            | AuthError::InvalidRefreshToken
            | AuthError::RefreshTokenExpired
            | AuthError::CurrentPasswordIncorrect => ErrorKind::Authorization,
            AuthError::TooManyAttempts => ErrorKind::Throttled,
            AuthError::UserNotFound(_) => ErrorKind::NotFound,
            AuthError::Storage(_) | AuthError::Task(_) | AuthError::Io(_) | AuthError::Serde(_) => {
                ErrorKind::Unavailable
            }
            AuthError::Config(_) => ErrorKind::Config,
        }
    }

    /// 缺少必填字段
    pub(crate) fn required(field: &str) -> Self {
        AuthError::Validation(format!("{field} is required."))
    }
}
