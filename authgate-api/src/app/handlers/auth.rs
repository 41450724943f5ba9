//! 认证相关 API handlers

use authgate_core::{LoginRequest, RefreshRequest, TokenPair};
use axum::extract::State;
use axum::Json;

use super::super::error::ApiError;
use super::super::extract::AppJson;
use super::super::middleware::ClientIp;
use super::super::state::AppState;

/// POST /users/login - 用户登录
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let pair = state.auth.login(&req.email, &req.password, &ip).await?;
    Ok(Json(pair))
}

/// POST /auth/refresh-token - 刷新 token（旧 refresh token 随即失效）
pub async fn refresh(
    State(state): State<AppState>,
    AppJson(req): AppJson<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let pair = state.auth.refresh(&req.refresh_token).await?;
    Ok(Json(pair))
}
