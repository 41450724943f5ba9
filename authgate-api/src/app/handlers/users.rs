//! 用户相关 API handlers

use authgate_core::{ChangePasswordRequest, RegisterRequest, UserSummary};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::super::error::ApiError;
use super::super::extract::AppJson;
use super::super::middleware::{Authenticated, ClientIp, RequireAdmin};
use super::super::state::AppState;

fn parse_user_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::bad_request("invalid user id"))
}

/// POST /users/register - 注册
pub async fn register(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserSummary>), ApiError> {
    let summary = state.auth.register(&req.email, &req.password, &ip).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// GET /users/:id - 获取用户信息
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserSummary>, ApiError> {
    let user_id = parse_user_id(&id)?;
    let summary = state.auth.get_user(user_id).await?;
    Ok(Json(summary))
}

/// POST /users/change-password - 修改本人密码
pub async fn change_password(
    State(state): State<AppState>,
    auth: Authenticated,
    ClientIp(ip): ClientIp,
    AppJson(req): AppJson<ChangePasswordRequest>,
) -> Result<Json<bool>, ApiError> {
    if auth.user_id != req.user_id {
        return Err(ApiError::forbidden(
            "cannot change password for other users",
        ));
    }

    let changed = state
        .auth
        .change_password(req.user_id, &req.current_password, &req.new_password, &ip)
        .await?;
    Ok(Json(changed))
}

/// 账户状态请求
#[derive(Debug, Deserialize)]
pub struct UserStatusRequest {
    pub is_active: bool,
}

/// PUT /users/:id/status - 启用/停用账户（仅管理员）
pub async fn set_user_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
    AppJson(req): AppJson<UserStatusRequest>,
) -> Result<Json<UserSummary>, ApiError> {
    let user_id = parse_user_id(&id)?;
    tracing::info!(
        admin_id = %admin.user_id,
        user_id = %user_id,
        is_active = req.is_active,
        "changing account status"
    );
    let summary = state
        .auth
        .set_user_active(user_id, req.is_active, &ip)
        .await?;
    Ok(Json(summary))
}
