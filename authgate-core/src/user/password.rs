//! 修改密码

use super::crypto::{hash_password, verify_password};
use super::models::*;
use super::AuthService;
use crate::error::{AuthError, Result};
use tracing::{info, instrument, warn};
use uuid::Uuid;

impl AuthService {
    /// 修改用户密码：校验当前密码 → 策略校验 → 写入新哈希
    #[instrument(skip(self, current_password, new_password))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
        client_ip: &str,
    ) -> Result<bool> {
        if current_password.is_empty() {
            return Err(AuthError::required("Current password"));
        }
        if new_password.is_empty() {
            return Err(AuthError::required("New password"));
        }

        let user = self.require_user(user_id).await?;

        // 按用户 ID 限流，防止暴力破解当前密码
        let key = format!("password:{user_id}");
        let rule = self.settings.throttle.change_password;
        if !self.throttle.admit(&key, rule.max_requests, rule.period).await {
            warn!(user_id = %user_id, "password change throttled");
            return Err(AuthError::TooManyAttempts);
        }

        if !verify_password(current_password, &user.password_hash).await? {
            self.throttle.record(&key).await;
            warn!(user_id = %user_id, "password change rejected: current password incorrect");
            return Err(AuthError::CurrentPasswordIncorrect);
        }

        let check = self.policy.validate(new_password);
        if !check.is_ok() {
            return Err(AuthError::PasswordPolicy(check.violations));
        }

        let password_hash = hash_password(new_password, self.settings.bcrypt_cost).await?;
        self.store.set_password_hash(user_id, password_hash).await?;
        if self.settings.revoke_refresh_on_password_change {
            self.store.set_refresh_token(user_id, None).await?;
        }

        self.audit(AuditEntry::for_user("PasswordChanged", user_id, self.clock.now()).with_ip(client_ip))
            .await;

        info!(user_id = %user_id, "password changed");
        Ok(true)
    }
}
