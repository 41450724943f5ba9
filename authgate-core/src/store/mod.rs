//! 凭据存储抽象：用户记录、角色关联与审计日志
//!
//! 同一用户的状态变更（失败计数、refresh token 轮换）必须由实现方原子执行，
//! 编排层不做读-改-写。

mod file;

pub use file::FileCredentialStore;

use crate::config::LockoutPolicy;
use crate::error::Result;
use crate::user::{AuditEntry, RefreshGrant, Role, UserRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    /// 精确匹配当前 refresh token（不做前缀/部分匹配）
    async fn find_user_by_refresh_token(&self, token: &str) -> Result<Option<UserRecord>>;

    /// 插入新用户；邮箱或用户名冲突时返回 DuplicateEmail / DuplicateUsername
    async fn insert_user(&self, user: &UserRecord) -> Result<()>;

    /// 按名称查找角色，不存在则创建（幂等）
    async fn ensure_role(&self, name: &str) -> Result<Role>;

    /// 关联用户与角色（幂等）
    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> Result<()>;

    async fn role_names(&self, user_id: Uuid) -> Result<Vec<String>>;

    /// 原子地记录一次密码失败并按策略迁移锁定状态，返回更新后的记录
    async fn record_login_failure(
        &self,
        user_id: Uuid,
        policy: &LockoutPolicy,
        at: DateTime<Utc>,
    ) -> Result<UserRecord>;

    /// 登录成功的条件写入：在同一把锁内重新确认账户未锁定且未停用，
    /// 然后清零失败计数、写入登录时间并替换 refresh token。
    /// 条件不满足时返回 AccountLocked / AccountDeactivated，且不做任何修改。
    async fn record_login_success(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
        grant: RefreshGrant,
    ) -> Result<UserRecord>;

    /// 无条件替换（或清除）refresh token
    async fn set_refresh_token(&self, user_id: Uuid, grant: Option<RefreshGrant>) -> Result<()>;

    /// 仅当当前 token 仍等于 presented 时替换；返回是否替换成功
    async fn rotate_refresh_token(
        &self,
        user_id: Uuid,
        presented: &str,
        grant: RefreshGrant,
    ) -> Result<bool>;

    async fn set_password_hash(&self, user_id: Uuid, password_hash: String) -> Result<()>;

    async fn set_active(&self, user_id: Uuid, active: bool) -> Result<UserRecord>;

    /// 追加审计日志
    async fn append_audit(&self, entry: &AuditEntry) -> Result<()>;
}
