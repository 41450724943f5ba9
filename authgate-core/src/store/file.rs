//! 基于本地文件系统的凭据存储
//!
//! 目录结构：
//! - `<data_dir>/users/<id>.json`
//! - `<data_dir>/roles.json`
//! - `<data_dir>/user_roles.json`
//! - `<data_dir>/audit.log`（JSON lines，只追加）
//!
//! 启动时加载全部数据到内存并重建邮箱/用户名/refresh token 索引；
//! 所有写操作在同一把锁内先落盘再提交到内存。

use super::CredentialStore;
use crate::config::LockoutPolicy;
use crate::error::{AuthError, Result};
use crate::user::{AccountGuard, AuditEntry, RefreshGrant, Role, RoleAssignment, UserRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use subtle::ConstantTimeEq;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, UserRecord>,
    by_email: HashMap<String, Uuid>,
    by_username: HashMap<String, Uuid>,
    by_refresh_token: HashMap<String, Uuid>,
    roles: Vec<Role>,
    assignments: Vec<RoleAssignment>,
}

impl Tables {
    /// 写入/替换用户并维护索引
    fn put_user(&mut self, user: UserRecord) {
        if let Some(old) = self.users.get(&user.id) {
            if let Some(token) = &old.refresh_token {
                self.by_refresh_token.remove(token);
            }
            self.by_email.remove(&old.email);
            self.by_username.remove(&old.username);
        }
        self.by_email.insert(user.email.clone(), user.id);
        self.by_username.insert(user.username.clone(), user.id);
        if let Some(token) = &user.refresh_token {
            self.by_refresh_token.insert(token.clone(), user.id);
        }
        self.users.insert(user.id, user);
    }

    fn user(&self, id: Uuid) -> Result<&UserRecord> {
        self.users
            .get(&id)
            .ok_or_else(|| AuthError::UserNotFound(id.to_string()))
    }
}

/// 文件凭据存储
#[derive(Debug)]
pub struct FileCredentialStore {
    data_dir: PathBuf,
    tables: Mutex<Tables>,
    audit_lock: Mutex<()>,
}

impl FileCredentialStore {
    /// 打开（必要时创建）数据目录并加载已有数据
    #[instrument(skip_all, fields(data_dir = %data_dir.as_ref().display()))]
    pub async fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let store = Self {
            data_dir,
            tables: Mutex::new(Tables::default()),
            audit_lock: Mutex::new(()),
        };
        tokio::fs::create_dir_all(store.users_dir()).await?;

        let mut tables = Tables::default();
        let mut entries = tokio::fs::read_dir(store.users_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            let data = tokio::fs::read(&path).await?;
            // 跳过损坏文件会让邮箱从索引中消失，只能拒绝打开
            let user: UserRecord = serde_json::from_slice(&data).map_err(|e| {
                AuthError::Storage(format!("corrupt user file {}: {e}", path.display()))
            })?;
            tables.put_user(user);
        }
        tables.roles = read_json_or_default(&store.roles_path()).await?;
        tables.assignments = read_json_or_default(&store.assignments_path()).await?;

        info!(users = tables.users.len(), roles = tables.roles.len(), "credential store loaded");
        *store.tables.lock().await = tables;
        Ok(store)
    }

    /// 用户存储目录
    fn users_dir(&self) -> PathBuf {
        self.data_dir.join("users")
    }

    /// 用户文件路径
    fn user_path(&self, id: Uuid) -> PathBuf {
        self.users_dir().join(format!("{}.json", id))
    }

    fn roles_path(&self) -> PathBuf {
        self.data_dir.join("roles.json")
    }

    fn assignments_path(&self) -> PathBuf {
        self.data_dir.join("user_roles.json")
    }

    fn audit_path(&self) -> PathBuf {
        self.data_dir.join("audit.log")
    }

    async fn persist_user(&self, user: &UserRecord) -> Result<()> {
        write_json_atomic(&self.user_path(user.id), user).await
    }

    /// 在锁内对单个用户执行变更：先落盘，成功后才替换内存记录
    async fn update_user<F>(&self, user_id: Uuid, mutate: F) -> Result<UserRecord>
    where
        F: FnOnce(&mut UserRecord) + Send,
    {
        let mut tables = self.tables.lock().await;
        let mut updated = tables.user(user_id)?.clone();
        mutate(&mut updated);
        self.persist_user(&updated).await?;
        tables.put_user(updated.clone());
        Ok(updated)
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .by_email
            .get(email)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn find_user_by_refresh_token(&self, token: &str) -> Result<Option<UserRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .by_refresh_token
            .get(token)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn insert_user(&self, user: &UserRecord) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if tables.by_email.contains_key(&user.email) {
            return Err(AuthError::DuplicateEmail);
        }
        if tables.by_username.contains_key(&user.username) {
            return Err(AuthError::DuplicateUsername(user.username.clone()));
        }
        self.persist_user(user).await?;
        tables.put_user(user.clone());
        Ok(())
    }

    async fn ensure_role(&self, name: &str) -> Result<Role> {
        let mut tables = self.tables.lock().await;
        if let Some(role) = tables.roles.iter().find(|r| r.name == name) {
            return Ok(role.clone());
        }
        let role = Role {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        let mut roles = tables.roles.clone();
        roles.push(role.clone());
        write_json_atomic(&self.roles_path(), &roles).await?;
        tables.roles = roles;
        info!(role = %name, "created role");
        Ok(role)
    }

    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.user(user_id)?;
        let link = RoleAssignment { user_id, role_id };
        if tables.assignments.contains(&link) {
            return Ok(());
        }
        let mut assignments = tables.assignments.clone();
        assignments.push(link);
        write_json_atomic(&self.assignments_path(), &assignments).await?;
        tables.assignments = assignments;
        Ok(())
    }

    async fn role_names(&self, user_id: Uuid) -> Result<Vec<String>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .assignments
            .iter()
            .filter(|a| a.user_id == user_id)
            .filter_map(|a| tables.roles.iter().find(|r| r.id == a.role_id))
            .map(|r| r.name.clone())
            .collect())
    }

    async fn record_login_failure(
        &self,
        user_id: Uuid,
        policy: &LockoutPolicy,
        at: DateTime<Utc>,
    ) -> Result<UserRecord> {
        self.update_user(user_id, |user| AccountGuard::record_failure(user, policy, at))
            .await
    }

    async fn record_login_success(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
        grant: RefreshGrant,
    ) -> Result<UserRecord> {
        let mut tables = self.tables.lock().await;
        let current = tables.user(user_id)?;
        AccountGuard::ensure_can_sign_in(current, at)?;

        let mut updated = current.clone();
        AccountGuard::record_success(&mut updated, at);
        updated.refresh_token = Some(grant.token);
        updated.refresh_token_expires_at = Some(grant.expires_at);
        self.persist_user(&updated).await?;
        tables.put_user(updated.clone());
        Ok(updated)
    }

    async fn set_refresh_token(&self, user_id: Uuid, grant: Option<RefreshGrant>) -> Result<()> {
        self.update_user(user_id, |user| match grant {
            Some(grant) => {
                user.refresh_token = Some(grant.token);
                user.refresh_token_expires_at = Some(grant.expires_at);
            }
            None => {
                user.refresh_token = None;
                user.refresh_token_expires_at = None;
            }
        })
        .await?;
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        user_id: Uuid,
        presented: &str,
        grant: RefreshGrant,
    ) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let current = tables.user(user_id)?;
        let matches = current
            .refresh_token
            .as_deref()
            .map(|stored| bool::from(stored.as_bytes().ct_eq(presented.as_bytes())))
            .unwrap_or(false);
        if !matches {
            return Ok(false);
        }

        let mut updated = current.clone();
        updated.refresh_token = Some(grant.token);
        updated.refresh_token_expires_at = Some(grant.expires_at);
        self.persist_user(&updated).await?;
        tables.put_user(updated);
        Ok(true)
    }

    async fn set_password_hash(&self, user_id: Uuid, password_hash: String) -> Result<()> {
        self.update_user(user_id, |user| user.password_hash = password_hash)
            .await?;
        Ok(())
    }

    async fn set_active(&self, user_id: Uuid, active: bool) -> Result<UserRecord> {
        self.update_user(user_id, |user| user.is_active = active).await
    }

    async fn append_audit(&self, entry: &AuditEntry) -> Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        let _guard = self.audit_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.audit_path())
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

async fn read_json_or_default<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    match tokio::fs::read(path).await {
        Ok(data) => Ok(serde_json::from_slice(&data)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

/// 先写临时文件再 rename，避免半截文件
async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
