//! 认证服务：核心结构、注册与用户查询

use super::crypto::hash_password;
use super::models::*;
use super::policy::PasswordPolicy;
use super::token::TokenIssuer;
use crate::clock::{Clock, SystemClock};
use crate::config::AuthSettings;
use crate::error::{AuthError, Result};
use crate::store::CredentialStore;
use crate::throttle::{MemoryThrottle, RequestThrottle};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// 用户名冲突时最多尝试的数字后缀个数
const USERNAME_SUFFIX_ATTEMPTS: u32 = 16;

/// 认证服务：编排密码策略、限流、存储、token 与锁定状态机
pub struct AuthService {
    pub(super) store: Arc<dyn CredentialStore>,
    pub(super) throttle: Arc<dyn RequestThrottle>,
    pub(super) tokens: TokenIssuer,
    pub(super) policy: PasswordPolicy,
    pub(super) settings: AuthSettings,
    pub(super) clock: Arc<dyn Clock>,
    /// 未知邮箱登录时用于对齐耗时的哈希
    pub(super) dummy_hash: OnceCell<String>,
}

// ============================================================================
// 构造器
// ============================================================================

impl AuthService {
    /// 创建认证服务；签名密钥缺失时直接返回配置错误
    pub fn new(
        settings: AuthSettings,
        store: Arc<dyn CredentialStore>,
        throttle: Arc<dyn RequestThrottle>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let tokens = TokenIssuer::new(settings.tokens.clone(), clock.clone())?;
        Ok(Self {
            store,
            throttle,
            tokens,
            policy: PasswordPolicy,
            settings,
            clock,
            dummy_hash: OnceCell::new(),
        })
    }

    /// 使用系统时钟与进程内限流器
    pub fn with_defaults(settings: AuthSettings, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let throttle = Arc::new(MemoryThrottle::new(
            clock.clone(),
            settings.throttle.longest_period(),
        ));
        Self::new(settings, store, throttle, clock)
    }
}

// ============================================================================
// 内部辅助方法
// ============================================================================

impl AuthService {
    /// 邮箱统一去空白并转小写
    pub(super) fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    /// 写审计日志；失败只记录告警，不影响主流程
    pub(super) async fn audit(&self, entry: AuditEntry) {
        if let Err(e) = self.store.append_audit(&entry).await {
            warn!(action = %entry.action, error = %e, "failed to write audit entry");
        }
    }

    /// 查询用户，不存在时返回 UserNotFound
    pub(super) async fn require_user(&self, user_id: Uuid) -> Result<UserRecord> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::UserNotFound(user_id.to_string()))
    }

    /// 签发 access token + refresh token（不落盘）
    pub(super) async fn issue_token_pair(
        &self,
        user: &UserRecord,
    ) -> Result<(TokenPair, RefreshGrant)> {
        let roles = self.store.role_names(user.id).await?;
        let (access_token, expires_at) =
            self.tokens
                .issue_access_token(user.id, &user.email, &roles)?;
        let refresh_token = self.tokens.issue_refresh_token();
        let now = self.clock.now();

        let grant = RefreshGrant {
            token: refresh_token.clone(),
            expires_at: now + self.settings.tokens.refresh_token_ttl,
        };
        let pair = TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_at,
            expires_in: (expires_at - now).num_seconds(),
        };
        Ok((pair, grant))
    }

    /// 插入用户；用户名被占用时追加数字后缀重试
    async fn insert_with_unique_username(
        &self,
        email: &str,
        base: &str,
        password_hash: String,
    ) -> Result<UserRecord> {
        let now = self.clock.now();
        let candidates = (1..=USERNAME_SUFFIX_ATTEMPTS)
            .map(|n| {
                if n == 1 {
                    base.to_string()
                } else {
                    format!("{base}{n}")
                }
            })
            .chain(std::iter::once(format!(
                "{base}-{}",
                &Uuid::new_v4().simple().to_string()[..8]
            )));

        let mut last_err = None;
        for username in candidates {
            let user = UserRecord::new(email.to_string(), username, password_hash.clone(), now);
            match self.store.insert_user(&user).await {
                Ok(()) => return Ok(user),
                Err(AuthError::DuplicateUsername(name)) => {
                    last_err = Some(AuthError::DuplicateUsername(name));
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| AuthError::DuplicateUsername(base.to_string())))
    }
}

// ============================================================================
// 注册与用户查询
// ============================================================================

impl AuthService {
    /// 注册新用户并分配默认角色
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        client_ip: &str,
    ) -> Result<UserSummary> {
        let email = Self::normalize_email(email);
        if email.is_empty() {
            return Err(AuthError::required("Email"));
        }
        if password.is_empty() {
            return Err(AuthError::required("Password"));
        }
        let local_part = match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => local.to_string(),
            _ => return Err(AuthError::Validation("Email address is invalid.".into())),
        };

        let key = format!("register:{client_ip}");
        let rule = self.settings.throttle.register;
        if !self.throttle.admit(&key, rule.max_requests, rule.period).await {
            warn!(client_ip = %client_ip, "registration throttled");
            return Err(AuthError::TooManyAttempts);
        }

        let check = self.policy.validate(password);
        if !check.is_ok() {
            return Err(AuthError::PasswordPolicy(check.violations));
        }

        // 重复邮箱计入限流
        if self.store.find_user_by_email(&email).await?.is_some() {
            self.throttle.record(&key).await;
            return Err(AuthError::DuplicateEmail);
        }

        let password_hash = hash_password(password, self.settings.bcrypt_cost).await?;
        let user = match self
            .insert_with_unique_username(&email, &local_part, password_hash)
            .await
        {
            Ok(user) => user,
            Err(AuthError::DuplicateEmail) => {
                self.throttle.record(&key).await;
                return Err(AuthError::DuplicateEmail);
            }
            Err(e) => return Err(e),
        };

        let role = self.store.ensure_role(&self.settings.default_role).await?;
        self.store.assign_role(user.id, role.id).await?;

        self.audit(
            AuditEntry::for_user("UserRegistered", user.id, user.created_at)
                .with_ip(client_ip)
                .with_values(
                    None,
                    Some(json!({ "email": user.email, "username": user.username })),
                ),
        )
        .await;

        info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(UserSummary::from_record(&user, vec![role.name]))
    }

    /// 获取用户信息
    #[instrument(skip(self))]
    pub async fn get_user(&self, user_id: Uuid) -> Result<UserSummary> {
        let user = self.require_user(user_id).await?;
        let roles = self.store.role_names(user_id).await?;
        Ok(UserSummary::from_record(&user, roles))
    }

    /// 按邮箱为用户授予角色（角色不存在则创建），重复授予无副作用
    #[instrument(skip(self))]
    pub async fn grant_role(&self, email: &str, role: &str) -> Result<UserSummary> {
        let email = Self::normalize_email(email);
        if role.trim().is_empty() {
            return Err(AuthError::required("Role"));
        }
        let user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| AuthError::UserNotFound(email.clone()))?;

        let role = self.store.ensure_role(role.trim()).await?;
        self.store.assign_role(user.id, role.id).await?;

        self.audit(
            AuditEntry::for_user("RoleGranted", user.id, self.clock.now())
                .with_values(None, Some(json!({ "role": role.name }))),
        )
        .await;

        info!(user_id = %user.id, role = %role.name, "role granted");
        let roles = self.store.role_names(user.id).await?;
        Ok(UserSummary::from_record(&user, roles))
    }

    /// 启用/停用账户；停用时同时吊销 refresh token
    #[instrument(skip(self))]
    pub async fn set_user_active(
        &self,
        user_id: Uuid,
        active: bool,
        actor_ip: &str,
    ) -> Result<UserSummary> {
        let before = self.require_user(user_id).await?;
        let user = self.store.set_active(user_id, active).await?;
        if !active {
            self.store.set_refresh_token(user_id, None).await?;
        }

        self.audit(
            AuditEntry::for_user("UserStatusChanged", user_id, self.clock.now())
                .with_ip(actor_ip)
                .with_values(
                    Some(json!({ "is_active": before.is_active })),
                    Some(json!({ "is_active": user.is_active })),
                ),
        )
        .await;

        info!(user_id = %user_id, active, "user status changed");
        let roles = self.store.role_names(user_id).await?;
        Ok(UserSummary::from_record(&user, roles))
    }
}
