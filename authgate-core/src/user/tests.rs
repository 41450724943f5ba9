use super::*;
use crate::clock::{Clock, ManualClock};
use crate::config::{AuthSettings, LockoutPolicy, TokenSettings};
use crate::error::AuthError;
use crate::store::{CredentialStore, FileCredentialStore};
use crate::throttle::MemoryThrottle;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;
use tempfile::TempDir;

const KEY: &str = "test-signing-key-0123456789abcdef";
const PASSWORD: &str = "Str0ng!Pass";
const IP: &str = "203.0.113.7";

struct Harness {
    dir: TempDir,
    clock: Arc<ManualClock>,
    store: Arc<FileCredentialStore>,
    service: Arc<AuthService>,
}

async fn harness_with(configure: impl FnOnce(AuthSettings) -> AuthSettings) -> Harness {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::starting_now());
    let store = Arc::new(FileCredentialStore::open(dir.path()).await.unwrap());
    let settings = configure(AuthSettings::new(TokenSettings::new(KEY)).with_bcrypt_cost(4));
    let throttle = Arc::new(MemoryThrottle::new(
        clock.clone(),
        settings.throttle.longest_period(),
    ));
    let service = AuthService::new(settings, store.clone(), throttle, clock.clone()).unwrap();
    Harness {
        dir,
        clock,
        store,
        service: Arc::new(service),
    }
}

async fn harness() -> Harness {
    harness_with(|s| s).await
}

#[tokio::test]
async fn register_assigns_default_role() {
    let h = harness().await;
    let summary = h
        .service
        .register(" Alice@Example.com ", PASSWORD, IP)
        .await
        .unwrap();
    assert_eq!(summary.email, "alice@example.com");
    assert_eq!(summary.username, "alice");
    assert!(summary.is_active);
    assert_eq!(summary.roles, vec!["User"]);

    let fetched = h.service.get_user(summary.id).await.unwrap();
    assert_eq!(fetched, summary);

    let stored = h.store.find_user_by_id(summary.id).await.unwrap().unwrap();
    assert_ne!(stored.password_hash, PASSWORD);
    assert!(stored.password_hash.starts_with("$2"));
}

#[tokio::test]
async fn duplicate_email_is_rejected_without_second_record() {
    let h = harness().await;
    let first = h.service.register("bob@example.com", PASSWORD, IP).await.unwrap();
    let err = h
        .service
        .register("BOB@example.com", "An0ther!Pass", IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::DuplicateEmail));

    let stored = h.store.find_user_by_email("bob@example.com").await.unwrap().unwrap();
    assert_eq!(stored.id, first.id);
    let files = std::fs::read_dir(h.dir.path().join("users")).unwrap().count();
    assert_eq!(files, 1);
}

#[tokio::test]
async fn username_collisions_get_a_suffix() {
    let h = harness().await;
    let a = h.service.register("sam@one.org", PASSWORD, IP).await.unwrap();
    let b = h.service.register("sam@two.org", PASSWORD, IP).await.unwrap();
    assert_eq!(a.username, "sam");
    assert_eq!(b.username, "sam2");
}

#[tokio::test]
async fn weak_password_reports_every_violation() {
    let h = harness().await;
    let err = h
        .service
        .register("weak@example.com", "abc", IP)
        .await
        .unwrap_err();
    match err {
        AuthError::PasswordPolicy(violations) => {
            assert!(violations.len() >= 4);
            assert!(violations.iter().any(|v| v.contains("uppercase")));
            assert!(violations.iter().any(|v| v.contains("special character")));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(h.store.find_user_by_email("weak@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn register_validates_required_fields() {
    let h = harness().await;
    assert!(matches!(
        h.service.register("", PASSWORD, IP).await.unwrap_err(),
        AuthError::Validation(_)
    ));
    assert!(matches!(
        h.service.register("a@b.c", "", IP).await.unwrap_err(),
        AuthError::Validation(_)
    ));
    assert!(matches!(
        h.service.register("no-at-sign", PASSWORD, IP).await.unwrap_err(),
        AuthError::Validation(_)
    ));
}

#[tokio::test]
async fn registration_throttle_counts_only_collisions() {
    let h = harness().await;
    // 成功注册不计入限额
    for i in 0..6 {
        h.service
            .register(&format!("user{i}@example.com"), PASSWORD, IP)
            .await
            .unwrap();
    }
    for _ in 0..5 {
        let err = h
            .service
            .register("user0@example.com", PASSWORD, IP)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateEmail));
    }
    let err = h
        .service
        .register("fresh@example.com", PASSWORD, IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TooManyAttempts));

    // 其他 IP 不受影响
    h.service
        .register("fresh@example.com", PASSWORD, "198.51.100.1")
        .await
        .unwrap();

    h.clock.advance(Duration::minutes(10) + Duration::seconds(1));
    h.service
        .register("later@example.com", PASSWORD, IP)
        .await
        .unwrap();
}

#[tokio::test]
async fn login_issues_valid_token_pair() {
    let h = harness().await;
    let user = h.service.register("carol@example.com", PASSWORD, IP).await.unwrap();
    let pair = h.service.login("carol@example.com", PASSWORD, IP).await.unwrap();

    assert_eq!(pair.token_type, "Bearer");
    assert_eq!(pair.expires_in, 30 * 60);
    assert_eq!(pair.expires_at, h.clock.now() + Duration::minutes(30));
    let claims = h.service.decode_access_token(&pair.access_token).unwrap();
    assert_eq!(claims.sub, user.id.to_string());
    assert_eq!(claims.email, "carol@example.com");
    assert_eq!(claims.roles, vec!["User"]);

    let stored = h.store.find_user_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(stored.refresh_token.as_deref(), Some(pair.refresh_token.as_str()));
    assert_eq!(
        stored.refresh_token_expires_at,
        Some(h.clock.now() + Duration::days(7))
    );
    assert_eq!(stored.last_login_at, Some(h.clock.now()));
}

#[tokio::test]
async fn unknown_email_and_wrong_password_look_identical() {
    let h = harness().await;
    h.service.register("dave@example.com", PASSWORD, IP).await.unwrap();

    let unknown = h
        .service
        .login("nobody@example.com", PASSWORD, IP)
        .await
        .unwrap_err();
    let wrong = h
        .service
        .login("dave@example.com", "Wr0ng!Pass", IP)
        .await
        .unwrap_err();
    assert!(matches!(unknown, AuthError::InvalidCredentials));
    assert!(matches!(wrong, AuthError::InvalidCredentials));
    assert_eq!(unknown.to_string(), wrong.to_string());
}

#[tokio::test]
async fn five_failures_lock_until_window_elapses() {
    let h = harness().await;
    let user = h.service.register("erin@example.com", PASSWORD, IP).await.unwrap();

    for _ in 0..5 {
        let err = h
            .service
            .login("erin@example.com", "Wr0ng!Pass", IP)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }
    let stored = h.store.find_user_by_id(user.id).await.unwrap().unwrap();
    assert!(stored.is_locked_out);
    assert_eq!(stored.failed_login_attempts, 5);

    // 正确密码在锁定期内依然失败（换 IP 绕开登录限流，观察锁定本身）
    let err = h
        .service
        .login("erin@example.com", PASSWORD, "198.51.100.9")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::AccountLocked { .. }));

    // 同一 IP 先被限流拦下
    let err = h
        .service
        .login("erin@example.com", PASSWORD, IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TooManyAttempts));

    h.clock.advance(Duration::hours(1));
    h.service.login("erin@example.com", PASSWORD, IP).await.unwrap();
    let stored = h.store.find_user_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(stored.failed_login_attempts, 0);
    assert!(!stored.is_locked_out);
    assert_eq!(stored.lockout_end, None);
}

#[tokio::test]
async fn login_throttle_blocks_without_touching_the_store() {
    let h = harness().await;
    for _ in 0..5 {
        let _ = h.service.login("ghost@example.com", PASSWORD, IP).await;
    }
    let err = h
        .service
        .login("ghost@example.com", PASSWORD, IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TooManyAttempts));
}

#[tokio::test]
async fn deactivated_account_revealed_only_with_valid_credentials() {
    let h = harness().await;
    let user = h.service.register("frank@example.com", PASSWORD, IP).await.unwrap();
    let pair = h.service.login("frank@example.com", PASSWORD, IP).await.unwrap();
    let summary = h.service.set_user_active(user.id, false, IP).await.unwrap();
    assert!(!summary.is_active);

    let err = h
        .service
        .login("frank@example.com", "Wr0ng!Pass", IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    let err = h
        .service
        .login("frank@example.com", PASSWORD, IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::AccountDeactivated));

    // 停用同时吊销 refresh token
    let err = h.service.refresh(&pair.refresh_token).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidRefreshToken));
}

#[tokio::test]
async fn refresh_rotates_on_every_use() {
    let h = harness().await;
    h.service.register("gina@example.com", PASSWORD, IP).await.unwrap();
    let first = h.service.login("gina@example.com", PASSWORD, IP).await.unwrap();

    let second = h.service.refresh(&first.refresh_token).await.unwrap();
    assert_ne!(second.refresh_token, first.refresh_token);
    assert!(h.service.validate_access_token(&second.access_token));

    let err = h.service.refresh(&first.refresh_token).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidRefreshToken));

    let third = h.service.refresh(&second.refresh_token).await.unwrap();
    assert_ne!(third.refresh_token, second.refresh_token);
}

#[tokio::test]
async fn login_invalidates_previous_refresh_token() {
    let h = harness().await;
    h.service.register("hank@example.com", PASSWORD, IP).await.unwrap();
    let first = h.service.login("hank@example.com", PASSWORD, IP).await.unwrap();
    let second = h.service.login("hank@example.com", PASSWORD, IP).await.unwrap();

    assert!(matches!(
        h.service.refresh(&first.refresh_token).await.unwrap_err(),
        AuthError::InvalidRefreshToken
    ));
    h.service.refresh(&second.refresh_token).await.unwrap();
}

#[tokio::test]
async fn refresh_token_expires_after_seven_days() {
    let h = harness().await;
    h.service.register("ivy@example.com", PASSWORD, IP).await.unwrap();
    let pair = h.service.login("ivy@example.com", PASSWORD, IP).await.unwrap();

    h.clock.advance(Duration::days(7));
    let err = h.service.refresh(&pair.refresh_token).await.unwrap_err();
    assert!(matches!(err, AuthError::RefreshTokenExpired));
}

#[tokio::test]
async fn unknown_or_partial_refresh_token_is_invalid() {
    let h = harness().await;
    h.service.register("jack@example.com", PASSWORD, IP).await.unwrap();
    let pair = h.service.login("jack@example.com", PASSWORD, IP).await.unwrap();

    let prefix = &pair.refresh_token[..10];
    assert!(matches!(
        h.service.refresh(prefix).await.unwrap_err(),
        AuthError::InvalidRefreshToken
    ));
    assert!(matches!(
        h.service.refresh("").await.unwrap_err(),
        AuthError::Validation(_)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_refresh_with_same_token_succeeds_once() {
    let h = harness().await;
    h.service.register("kate@example.com", PASSWORD, IP).await.unwrap();
    let pair = h.service.login("kate@example.com", PASSWORD, IP).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..2 {
        let service = h.service.clone();
        let token = pair.refresh_token.clone();
        handles.push(tokio::spawn(async move { service.refresh(&token).await }));
    }
    let mut successes = 0;
    let mut invalid = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(AuthError::InvalidRefreshToken) => invalid += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(invalid, 1);
}

#[tokio::test]
async fn access_token_expires_after_lifetime() {
    let h = harness().await;
    h.service.register("liam@example.com", PASSWORD, IP).await.unwrap();
    let pair = h.service.login("liam@example.com", PASSWORD, IP).await.unwrap();
    assert!(h.service.validate_access_token(&pair.access_token));

    h.clock.advance(Duration::minutes(30));
    assert!(!h.service.validate_access_token(&pair.access_token));
}

#[tokio::test]
async fn wrong_current_password_leaves_hash_unchanged() {
    let h = harness().await;
    let user = h.service.register("mia@example.com", PASSWORD, IP).await.unwrap();
    let before = h.store.find_user_by_id(user.id).await.unwrap().unwrap();

    let err = h
        .service
        .change_password(user.id, "Wr0ng!Pass", "N3w!Password", IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::CurrentPasswordIncorrect));

    let after = h.store.find_user_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(before.password_hash, after.password_hash);
}

#[tokio::test]
async fn changed_password_replaces_the_old_one() {
    let h = harness().await;
    let user = h.service.register("noah@example.com", PASSWORD, IP).await.unwrap();
    let pair = h.service.login("noah@example.com", PASSWORD, IP).await.unwrap();

    assert!(h
        .service
        .change_password(user.id, PASSWORD, "N3w!Password", IP)
        .await
        .unwrap());

    h.service
        .login("noah@example.com", "N3w!Password", IP)
        .await
        .unwrap();
    let err = h
        .service
        .login("noah@example.com", PASSWORD, IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));

    // 默认策略：修改密码吊销旧 refresh token
    assert!(matches!(
        h.service.refresh(&pair.refresh_token).await.unwrap_err(),
        AuthError::InvalidRefreshToken
    ));
}

#[tokio::test]
async fn refresh_survives_password_change_when_revocation_disabled() {
    let h = harness_with(|s| s.with_refresh_revocation(false)).await;
    let user = h.service.register("olga@example.com", PASSWORD, IP).await.unwrap();
    let pair = h.service.login("olga@example.com", PASSWORD, IP).await.unwrap();
    h.service
        .change_password(user.id, PASSWORD, "N3w!Password", IP)
        .await
        .unwrap();
    h.service.refresh(&pair.refresh_token).await.unwrap();
}

#[tokio::test]
async fn change_password_enforces_policy_and_existence() {
    let h = harness().await;
    let user = h.service.register("paul@example.com", PASSWORD, IP).await.unwrap();

    let err = h
        .service
        .change_password(user.id, PASSWORD, "weak", IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::PasswordPolicy(_)));

    let err = h
        .service
        .change_password(uuid::Uuid::new_v4(), PASSWORD, "N3w!Password", IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UserNotFound(_)));

    let err = h
        .service
        .change_password(user.id, "", "N3w!Password", IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));
}

#[tokio::test]
async fn change_password_is_throttled_per_user() {
    let h = harness().await;
    let user = h.service.register("quinn@example.com", PASSWORD, IP).await.unwrap();
    for _ in 0..5 {
        let _ = h
            .service
            .change_password(user.id, "Wr0ng!Pass", "N3w!Password", IP)
            .await;
    }
    let err = h
        .service
        .change_password(user.id, PASSWORD, "N3w!Password", IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TooManyAttempts));
}

#[tokio::test]
async fn get_unknown_user_is_not_found() {
    let h = harness().await;
    let err = h.service.get_user(uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AuthError::UserNotFound(_)));
}

#[tokio::test]
async fn security_events_are_audited() {
    let h = harness().await;
    let user = h.service.register("rose@example.com", PASSWORD, IP).await.unwrap();
    let pair = h.service.login("rose@example.com", PASSWORD, IP).await.unwrap();
    h.service.refresh(&pair.refresh_token).await.unwrap();
    h.service
        .change_password(user.id, PASSWORD, "N3w!Password", IP)
        .await
        .unwrap();

    let log = std::fs::read_to_string(h.dir.path().join("audit.log")).unwrap();
    let actions: Vec<String> = log
        .lines()
        .map(|line| {
            let v: serde_json::Value = serde_json::from_str(line).unwrap();
            v["action"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(
        actions,
        vec!["UserRegistered", "UserLoggedIn", "TokenRefreshed", "PasswordChanged"]
    );
    assert!(!log.contains(PASSWORD));
}

#[tokio::test]
async fn granted_role_appears_in_new_tokens() {
    let h = harness().await;
    h.service.register("sara@example.com", PASSWORD, IP).await.unwrap();
    let summary = h.service.grant_role("Sara@Example.com", "Admin").await.unwrap();
    assert_eq!(summary.roles, vec!["User", "Admin"]);

    // 重复授予不产生重复角色
    let again = h.service.grant_role("sara@example.com", "Admin").await.unwrap();
    assert_eq!(again.roles, vec!["User", "Admin"]);

    let pair = h.service.login("sara@example.com", PASSWORD, IP).await.unwrap();
    let claims = h.service.decode_access_token(&pair.access_token).unwrap();
    assert!(claims.has_role("Admin"));

    let err = h.service.grant_role("nobody@example.com", "Admin").await.unwrap_err();
    assert!(matches!(err, AuthError::UserNotFound(_)));
}

/// 登录成功写入前插入的并发操作
#[derive(Debug, Clone, Copy)]
enum Interleave {
    LockOut,
    Deactivate,
}

/// 委托给文件存储，在 record_login_success 之前执行一次 Interleave
struct InterleavingStore {
    inner: Arc<FileCredentialStore>,
    before_success: std::sync::Mutex<Option<Interleave>>,
}

impl InterleavingStore {
    fn arm(&self, step: Interleave) {
        *self.before_success.lock().unwrap() = Some(step);
    }
}

#[async_trait]
impl CredentialStore for InterleavingStore {
    async fn find_user_by_id(&self, id: Uuid) -> crate::Result<Option<UserRecord>> {
        self.inner.find_user_by_id(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> crate::Result<Option<UserRecord>> {
        self.inner.find_user_by_email(email).await
    }

    async fn find_user_by_refresh_token(&self, token: &str) -> crate::Result<Option<UserRecord>> {
        self.inner.find_user_by_refresh_token(token).await
    }

    async fn insert_user(&self, user: &UserRecord) -> crate::Result<()> {
        self.inner.insert_user(user).await
    }

    async fn ensure_role(&self, name: &str) -> crate::Result<Role> {
        self.inner.ensure_role(name).await
    }

    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> crate::Result<()> {
        self.inner.assign_role(user_id, role_id).await
    }

    async fn role_names(&self, user_id: Uuid) -> crate::Result<Vec<String>> {
        self.inner.role_names(user_id).await
    }

    async fn record_login_failure(
        &self,
        user_id: Uuid,
        policy: &LockoutPolicy,
        at: DateTime<Utc>,
    ) -> crate::Result<UserRecord> {
        self.inner.record_login_failure(user_id, policy, at).await
    }

    async fn record_login_success(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
        grant: RefreshGrant,
    ) -> crate::Result<UserRecord> {
        let step = self.before_success.lock().unwrap().take();
        match step {
            Some(Interleave::LockOut) => {
                let policy = LockoutPolicy::default();
                for _ in 0..policy.max_failed_attempts {
                    self.inner.record_login_failure(user_id, &policy, at).await?;
                }
            }
            Some(Interleave::Deactivate) => {
                self.inner.set_active(user_id, false).await?;
                self.inner.set_refresh_token(user_id, None).await?;
            }
            None => {}
        }
        self.inner.record_login_success(user_id, at, grant).await
    }

    async fn set_refresh_token(
        &self,
        user_id: Uuid,
        grant: Option<RefreshGrant>,
    ) -> crate::Result<()> {
        self.inner.set_refresh_token(user_id, grant).await
    }

    async fn rotate_refresh_token(
        &self,
        user_id: Uuid,
        presented: &str,
        grant: RefreshGrant,
    ) -> crate::Result<bool> {
        self.inner.rotate_refresh_token(user_id, presented, grant).await
    }

    async fn set_password_hash(&self, user_id: Uuid, password_hash: String) -> crate::Result<()> {
        self.inner.set_password_hash(user_id, password_hash).await
    }

    async fn set_active(&self, user_id: Uuid, active: bool) -> crate::Result<UserRecord> {
        self.inner.set_active(user_id, active).await
    }

    async fn append_audit(&self, entry: &AuditEntry) -> crate::Result<()> {
        self.inner.append_audit(entry).await
    }
}

async fn interleaving_harness() -> (Harness, Arc<InterleavingStore>, AuthService) {
    let h = harness().await;
    let store = Arc::new(InterleavingStore {
        inner: h.store.clone(),
        before_success: std::sync::Mutex::new(None),
    });
    let settings = AuthSettings::new(TokenSettings::new(KEY)).with_bcrypt_cost(4);
    let throttle = Arc::new(MemoryThrottle::new(
        h.clock.clone(),
        settings.throttle.longest_period(),
    ));
    let service = AuthService::new(settings, store.clone(), throttle, h.clock.clone()).unwrap();
    (h, store, service)
}

#[tokio::test]
async fn lock_set_during_verification_is_not_erased() {
    let (h, store, service) = interleaving_harness().await;
    let user = service.register("tina@example.com", PASSWORD, IP).await.unwrap();

    store.arm(Interleave::LockOut);
    let err = service
        .login("tina@example.com", PASSWORD, IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::AccountLocked { .. }));

    let stored = h.store.find_user_by_id(user.id).await.unwrap().unwrap();
    assert!(stored.is_locked_out);
    assert_eq!(stored.failed_login_attempts, 5);
    assert_eq!(stored.lockout_end, Some(h.clock.now() + Duration::hours(1)));
    assert_eq!(stored.refresh_token, None);
    assert_eq!(stored.last_login_at, None);
}

#[tokio::test]
async fn deactivation_during_verification_issues_no_tokens() {
    let (h, store, service) = interleaving_harness().await;
    let user = service.register("umar@example.com", PASSWORD, IP).await.unwrap();
    let earlier = service.login("umar@example.com", PASSWORD, IP).await.unwrap();

    store.arm(Interleave::Deactivate);
    let err = service
        .login("umar@example.com", PASSWORD, IP)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::AccountDeactivated));

    let stored = h.store.find_user_by_id(user.id).await.unwrap().unwrap();
    assert!(!stored.is_active);
    assert_eq!(stored.refresh_token, None);
    assert!(matches!(
        service.refresh(&earlier.refresh_token).await.unwrap_err(),
        AuthError::InvalidRefreshToken
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_logins_keep_lockout_consistent() {
    let h = harness().await;

    for round in 0..20 {
        let email = format!("race{round}@example.com");
        let user = h.service.register(&email, PASSWORD, IP).await.unwrap();

        // 每个请求使用独立 IP，避开登录限流
        let mut wrong = Vec::new();
        for i in 0..5 {
            let service = h.service.clone();
            let email = email.clone();
            let ip = format!("10.{round}.0.{i}");
            wrong.push(tokio::spawn(async move {
                service.login(&email, "Wr0ng!Pass", &ip).await
            }));
        }
        let correct = {
            let service = h.service.clone();
            let email = email.clone();
            let ip = format!("10.{round}.1.1");
            tokio::spawn(async move { service.login(&email, PASSWORD, &ip).await })
        };

        for handle in wrong {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials), "{err:?}");
        }
        let outcome = correct.await.unwrap();
        let stored = h.store.find_user_by_id(user.id).await.unwrap().unwrap();

        // 每次失败都被计入：成功写入之后至少还有一次失败，否则账户必然已锁定
        assert!(stored.failed_login_attempts >= 1);
        assert_eq!(stored.is_locked_out, stored.failed_login_attempts >= 5);
        assert_eq!(stored.is_locked_out, stored.lockout_end.is_some());
        match outcome {
            Ok(pair) => {
                assert_eq!(
                    stored.refresh_token.as_deref(),
                    Some(pair.refresh_token.as_str())
                );
            }
            Err(AuthError::AccountLocked { .. }) => {
                assert!(stored.is_locked_out);
                assert_eq!(stored.failed_login_attempts, 5);
                assert_eq!(stored.refresh_token, None);
            }
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
}
