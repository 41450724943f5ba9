//! Core library for account authentication: password policy, throttling, credential storage, token issuance, and lockout.

pub mod clock;
mod config;
mod error;
pub mod store;
mod throttle;
pub mod user;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    AuthSettings, LockoutPolicy, ThrottleRule, ThrottleRules, TokenSettings, DEFAULT_JWT_AUDIENCE,
    DEFAULT_JWT_ISSUER, MIN_SIGNING_KEY_LEN,
};
pub use error::{AuthError, ErrorKind, Result, INVALID_CREDENTIALS};
pub use store::{CredentialStore, FileCredentialStore};
pub use throttle::{MemoryThrottle, RequestThrottle};
pub use user::{
    AccessClaims, AccountGuard, AuditEntry, AuthService, ChangePasswordRequest, LockState,
    LoginRequest, PasswordCheck, PasswordPolicy, RefreshGrant, RefreshRequest, RegisterRequest,
    Role, TokenIssuer, TokenPair, UserRecord, UserSummary,
};
