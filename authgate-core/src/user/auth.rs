//! 登录、刷新与 access token 校验

use super::crypto::{hash_password, verify_password};
use super::guard::{AccountGuard, LockState};
use super::models::*;
use super::AuthService;
use crate::error::{AuthError, Result};
use serde_json::json;
use tracing::{info, instrument, warn};

/// 未知邮箱时参与比对的占位密码
const DUMMY_PASSWORD: &str = "authgate-timing-equalizer";

impl AuthService {
    /// 用户登录
    ///
    /// 顺序：限流 → 查用户 → 锁定检查 → 密码校验 → 停用检查 → 签发并轮换 refresh token。
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str, client_ip: &str) -> Result<TokenPair> {
        let email = Self::normalize_email(email);
        if email.is_empty() {
            return Err(AuthError::required("Email"));
        }
        if password.is_empty() {
            return Err(AuthError::required("Password"));
        }

        let key = format!("login:{email}:{client_ip}");
        let rule = self.settings.throttle.login;
        if !self.throttle.admit(&key, rule.max_requests, rule.period).await {
            warn!(client_ip = %client_ip, "login throttled");
            return Err(AuthError::TooManyAttempts);
        }

        let Some(user) = self.store.find_user_by_email(&email).await? else {
            self.burn_verification(password).await?;
            self.throttle.record(&key).await;
            warn!(client_ip = %client_ip, "login failed: unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        let now = self.clock.now();
        // 锁定优先于密码校验
        if let LockState::Locked { until } = AccountGuard::state(&user, now) {
            warn!(user_id = %user.id, %until, "login rejected: account locked");
            return Err(AuthError::AccountLocked { until });
        }

        if !verify_password(password, &user.password_hash).await? {
            let updated = self
                .store
                .record_login_failure(user.id, &self.settings.lockout, now)
                .await?;
            self.throttle.record(&key).await;
            warn!(
                user_id = %user.id,
                failed_attempts = updated.failed_login_attempts,
                "login failed: invalid password"
            );
            if updated.is_locked_out {
                warn!(user_id = %user.id, until = ?updated.lockout_end, "account locked");
                self.audit(
                    AuditEntry::for_user("UserLockedOut", user.id, now)
                        .with_ip(client_ip)
                        .with_values(
                            None,
                            Some(json!({
                                "failed_login_attempts": updated.failed_login_attempts,
                                "lockout_end": updated.lockout_end,
                            })),
                        ),
                )
                .await;
            }
            return Err(AuthError::InvalidCredentials);
        }

        // 只有凭据正确才暴露停用状态
        if !user.is_active {
            warn!(user_id = %user.id, "login rejected: account deactivated");
            return Err(AuthError::AccountDeactivated);
        }

        let (pair, grant) = self.issue_token_pair(&user).await?;
        // 校验期间账户可能被并发失败锁定或被停用，由存储层在锁内重新确认；
        // 写入同时覆盖旧 refresh token，每个用户只有一个有效 token
        let user = match self.store.record_login_success(user.id, now, grant).await {
            Ok(user) => user,
            Err(e @ (AuthError::AccountLocked { .. } | AuthError::AccountDeactivated)) => {
                warn!(user_id = %user.id, error = %e, "login rejected: account state changed during verification");
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        self.audit(AuditEntry::for_user("UserLoggedIn", user.id, now).with_ip(client_ip))
            .await;

        info!(user_id = %user.id, "user logged in");
        Ok(pair)
    }

    /// 用 refresh token 换取新的 token 对；旧 token 使用一次即失效
    #[instrument(skip(self, presented))]
    pub async fn refresh(&self, presented: &str) -> Result<TokenPair> {
        if presented.is_empty() {
            return Err(AuthError::required("Refresh token"));
        }

        let user = self
            .store
            .find_user_by_refresh_token(presented)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        let now = self.clock.now();
        match user.refresh_token_expires_at {
            Some(expires_at) if expires_at > now => {}
            _ => {
                warn!(user_id = %user.id, "refresh rejected: token expired");
                return Err(AuthError::RefreshTokenExpired);
            }
        }

        let (pair, grant) = self.issue_token_pair(&user).await?;
        // 以出示的 token 为条件写入，并发重放只有一个能成功
        if !self
            .store
            .rotate_refresh_token(user.id, presented, grant)
            .await?
        {
            warn!(user_id = %user.id, "refresh rejected: token already rotated");
            return Err(AuthError::InvalidRefreshToken);
        }

        self.audit(AuditEntry::for_user("TokenRefreshed", user.id, now))
            .await;

        info!(user_id = %user.id, "token refreshed");
        Ok(pair)
    }

    /// 校验 access token（签名、iss、aud、过期），只返回是否有效
    pub fn validate_access_token(&self, token: &str) -> bool {
        self.tokens.validate_access_token(token)
    }

    /// 校验并解析 access token
    pub fn decode_access_token(&self, token: &str) -> Option<AccessClaims> {
        self.tokens.decode_access_token(token)
    }

    /// 对未知邮箱同样执行一次 bcrypt 校验，避免通过耗时区分账户是否存在
    async fn burn_verification(&self, password: &str) -> Result<()> {
        let cost = self.settings.bcrypt_cost;
        let hash = self
            .dummy_hash
            .get_or_try_init(|| hash_password(DUMMY_PASSWORD, cost))
            .await?;
        verify_password(password, hash).await?;
        Ok(())
    }
}
