use authgate_core::AuthService;
use std::sync::Arc;

/// Shared application state for handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    /// 是否信任反向代理传入的 X-Real-IP / X-Forwarded-For
    pub trust_proxy: bool,
}
