//! 用户认证与账户保护模块

mod auth;
mod crypto;
mod guard;
mod manager;
mod models;
mod password;
mod policy;
mod token;

#[cfg(test)]
mod tests;

pub use guard::{AccountGuard, LockState};
pub use manager::AuthService;
pub use models::{
    AccessClaims, AuditEntry, ChangePasswordRequest, LoginRequest, RefreshGrant, RefreshRequest,
    RegisterRequest, Role, RoleAssignment, TokenPair, UserRecord, UserSummary,
};
pub use policy::{PasswordCheck, PasswordPolicy, SPECIAL_CHARACTERS};
pub use token::TokenIssuer;
