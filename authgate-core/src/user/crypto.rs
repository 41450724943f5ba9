//! bcrypt 哈希与校验
//!
//! bcrypt 是刻意放慢的 CPU 运算，统一放到阻塞线程池执行。登录时对未知邮箱也会
//! 跑一次 `verify_password`（对照占位哈希），让两种失败耗时一致。
//! 已存储的哈希无法解析说明数据损坏，上抛为 `AuthError::Storage`，
//! 不会被当成“密码错误”吞掉。

use crate::error::{AuthError, Result};

/// 在阻塞线程池执行 bcrypt 运算；线程池任务失败统一映射为 Task 错误
async fn on_blocking_pool<T, F>(job: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| AuthError::Task(format!("bcrypt worker failed: {e}")))
}

pub async fn hash_password(password: &str, cost: u32) -> Result<String> {
    let password = password.to_owned();
    on_blocking_pool(move || bcrypt::hash(password, cost))
        .await?
        .map_err(|e| AuthError::Task(format!("bcrypt hash failed: {e}")))
}

/// 返回明文是否匹配；哈希格式错误属于存储损坏
pub async fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let password = password.to_owned();
    let stored_hash = stored_hash.to_owned();
    on_blocking_pool(move || bcrypt::verify(password, &stored_hash))
        .await?
        .map_err(|e| AuthError::Storage(format!("stored password hash is unreadable: {e}")))
}
