//! 用户数据模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use uuid::Uuid;

/// 用户账户（存储模型，包含密码哈希与当前 refresh token）
#[skip_serializing_none]
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    /// 用户唯一 ID
    pub id: Uuid,
    /// 邮箱（唯一，用于登录）
    pub email: String,
    /// 用户名（唯一，默认取邮箱 @ 前部分）
    pub username: String,
    /// bcrypt 哈希后的密码
    pub password_hash: String,
    /// 管理员停用标记
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_locked_out: bool,
    #[serde(default)]
    pub failed_login_attempts: u32,
    pub last_failed_login_at: Option<DateTime<Utc>>,
    /// 锁定截止时间
    pub lockout_end: Option<DateTime<Utc>>,
    /// 当前有效的 refresh token（每个用户只有一个）
    pub refresh_token: Option<String>,
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl UserRecord {
    /// 新建用户记录（未锁定、启用状态）
    pub fn new(email: String, username: String, password_hash: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            username,
            password_hash,
            is_active: true,
            is_locked_out: false,
            failed_login_attempts: 0,
            last_failed_login_at: None,
            lockout_end: None,
            refresh_token: None,
            refresh_token_expires_at: None,
            created_at: now,
            last_login_at: None,
        }
    }
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("username", &self.username)
            .field("is_active", &self.is_active)
            .field("is_locked_out", &self.is_locked_out)
            .field("failed_login_attempts", &self.failed_login_attempts)
            .field("lockout_end", &self.lockout_end)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

/// 角色（名称区分大小写且唯一）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
}

/// 用户-角色关联
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RoleAssignment {
    pub user_id: Uuid,
    pub role_id: Uuid,
}

/// 审计日志条目（只追加，核心不回读）
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub action: String,
    pub user_id: Option<Uuid>,
    pub entity_type: String,
    pub entity_id: String,
    pub ip_address: Option<String>,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    /// 针对某个用户的审计事件
    pub fn for_user(action: &str, user_id: Uuid, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: action.to_string(),
            user_id: Some(user_id),
            entity_type: "User".to_string(),
            entity_id: user_id.to_string(),
            ip_address: None,
            old_values: None,
            new_values: None,
            timestamp,
        }
    }

    pub fn with_ip(mut self, ip: &str) -> Self {
        self.ip_address = Some(ip.to_string());
        self
    }

    pub fn with_values(
        mut self,
        old_values: Option<serde_json::Value>,
        new_values: Option<serde_json::Value>,
    ) -> Self {
        self.old_values = old_values;
        self.new_values = new_values;
        self
    }
}

/// 新签发的 refresh token 及其过期时间
#[derive(Clone)]
pub struct RefreshGrant {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for RefreshGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshGrant")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Access token claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessClaims {
    /// Subject: 用户 ID
    pub sub: String,
    pub email: String,
    /// Token 唯一 ID（可用于撤销/重放追踪）
    pub jti: String,
    /// 每个角色一项
    #[serde(default)]
    pub roles: Vec<String>,
    pub iss: String,
    pub aud: String,
    /// 签发时间戳 (Unix timestamp)
    pub iat: i64,
    /// 过期时间戳 (Unix timestamp)
    pub exp: i64,
}

impl AccessClaims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// 认证响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Access token (JWT)
    pub access_token: String,
    /// Refresh token（不透明随机串）
    pub refresh_token: String,
    pub token_type: String,
    /// Access token 过期时间
    pub expires_at: DateTime<Utc>,
    /// Access token 剩余有效期（秒）
    pub expires_in: i64,
}

/// 注册请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// 登录请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// 刷新请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

/// 修改密码请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

/// 用户信息（不含敏感字段）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub is_active: bool,
    pub roles: Vec<String>,
}

impl UserSummary {
    pub fn from_record(user: &UserRecord, roles: Vec<String>) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            is_active: user.is_active,
            roles,
        }
    }
}
