//! 登录失败计数与锁定状态机
//!
//! 状态：Active（失败次数低于阈值）/ Locked（锁定至 lockout_end）。
//! 这里只定义纯状态迁移，由存储层在同一把锁内原子执行。

use super::models::UserRecord;
use crate::config::LockoutPolicy;
use crate::error::{AuthError, Result};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Active,
    Locked { until: DateTime<Utc> },
}

/// 账户保护状态机
pub struct AccountGuard;

impl AccountGuard {
    /// 当前锁定状态；锁定已过期视为 Active
    pub fn state(user: &UserRecord, now: DateTime<Utc>) -> LockState {
        match (user.is_locked_out, user.lockout_end) {
            (true, Some(until)) if now < until => LockState::Locked { until },
            _ => LockState::Active,
        }
    }

    /// 写入登录成功前的最终检查：未锁定且未停用
    pub fn ensure_can_sign_in(user: &UserRecord, now: DateTime<Utc>) -> Result<()> {
        if let LockState::Locked { until } = Self::state(user, now) {
            return Err(AuthError::AccountLocked { until });
        }
        if !user.is_active {
            return Err(AuthError::AccountDeactivated);
        }
        Ok(())
    }

    /// 密码校验失败
    ///
    /// 过期的锁定先被清除并从零重新计数；仍在锁定期内只计数，不延长 lockout_end。
    pub fn record_failure(user: &mut UserRecord, policy: &LockoutPolicy, now: DateTime<Utc>) {
        let state = Self::state(user, now);
        if user.is_locked_out && state == LockState::Active {
            user.is_locked_out = false;
            user.lockout_end = None;
            user.failed_login_attempts = 0;
        }

        user.failed_login_attempts = user.failed_login_attempts.saturating_add(1);
        user.last_failed_login_at = Some(now);
        if matches!(state, LockState::Locked { .. }) {
            return;
        }
        if user.failed_login_attempts >= policy.max_failed_attempts {
            user.is_locked_out = true;
            user.lockout_end = Some(now + policy.lockout_duration);
        }
    }

    /// 密码校验成功：清零计数、解除锁定、记录登录时间
    pub fn record_success(user: &mut UserRecord, now: DateTime<Utc>) {
        user.failed_login_attempts = 0;
        user.is_locked_out = false;
        user.lockout_end = None;
        user.last_login_at = Some(now);
    }
}
