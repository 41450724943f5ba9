//! 认证核心配置：token 有效期、锁定策略、限流规则

use chrono::Duration;

pub const DEFAULT_JWT_ISSUER: &str = "authgate-api";
pub const DEFAULT_JWT_AUDIENCE: &str = "authgate-clients";
/// HS256 签名密钥最小长度（字节）
pub const MIN_SIGNING_KEY_LEN: usize = 32;

/// JWT 签发参数
#[derive(Clone)]
pub struct TokenSettings {
    /// HMAC 签名密钥
    pub signing_key: String,
    pub issuer: String,
    pub audience: String,
    /// Access token 有效期
    pub access_token_ttl: Duration,
    /// Refresh token 有效期
    pub refresh_token_ttl: Duration,
}

impl TokenSettings {
    pub fn new(signing_key: impl Into<String>) -> Self {
        Self {
            signing_key: signing_key.into(),
            issuer: DEFAULT_JWT_ISSUER.to_string(),
            audience: DEFAULT_JWT_AUDIENCE.to_string(),
            access_token_ttl: Duration::minutes(30),
            refresh_token_ttl: Duration::days(7),
        }
    }

    /// 配置 JWT iss/aud
    pub fn with_claims_context(
        mut self,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        self.issuer = issuer.into();
        self.audience = audience.into();
        self
    }

    /// 配置 token 有效期
    pub fn with_ttl(mut self, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        self.access_token_ttl = access_ttl;
        self.refresh_token_ttl = refresh_ttl;
        self
    }
}

impl std::fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSettings")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .finish_non_exhaustive()
    }
}

/// 登录失败锁定策略
#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    /// 触发锁定的连续失败次数
    pub max_failed_attempts: u32,
    /// 锁定时长
    pub lockout_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lockout_duration: Duration::hours(1),
        }
    }
}

/// 单条限流规则：窗口内最多 max_requests 次
#[derive(Debug, Clone, Copy)]
pub struct ThrottleRule {
    pub max_requests: usize,
    pub period: std::time::Duration,
}

impl ThrottleRule {
    pub const fn new(max_requests: usize, period_secs: u64) -> Self {
        Self {
            max_requests,
            period: std::time::Duration::from_secs(period_secs),
        }
    }
}

/// 各入口的限流规则
#[derive(Debug, Clone)]
pub struct ThrottleRules {
    /// register:<ip>
    pub register: ThrottleRule,
    /// login:<email>:<ip>
    pub login: ThrottleRule,
    /// password:<user_id>
    pub change_password: ThrottleRule,
}

impl Default for ThrottleRules {
    fn default() -> Self {
        Self {
            register: ThrottleRule::new(5, 10 * 60),
            login: ThrottleRule::new(5, 15 * 60),
            change_password: ThrottleRule::new(5, 15 * 60),
        }
    }
}

impl ThrottleRules {
    /// 最长窗口，用于内存限流器的全量清理
    pub fn longest_period(&self) -> std::time::Duration {
        self.register
            .period
            .max(self.login.period)
            .max(self.change_password.period)
    }
}

/// AuthService 总配置
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub tokens: TokenSettings,
    pub lockout: LockoutPolicy,
    pub throttle: ThrottleRules,
    /// bcrypt cost（生产环境保持默认值或更高）
    pub bcrypt_cost: u32,
    /// 修改密码时是否吊销当前 refresh token
    pub revoke_refresh_on_password_change: bool,
    /// 新用户默认角色
    pub default_role: String,
}

impl AuthSettings {
    pub fn new(tokens: TokenSettings) -> Self {
        Self {
            tokens,
            lockout: LockoutPolicy::default(),
            throttle: ThrottleRules::default(),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            revoke_refresh_on_password_change: true,
            default_role: "User".to_string(),
        }
    }

    pub fn with_lockout(mut self, lockout: LockoutPolicy) -> Self {
        self.lockout = lockout;
        self
    }

    pub fn with_throttle(mut self, throttle: ThrottleRules) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub fn with_refresh_revocation(mut self, revoke: bool) -> Self {
        self.revoke_refresh_on_password_change = revoke;
        self
    }
}
