use axum::http::{header, HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    change_password, get_user, handler_404, health, login, refresh, register, set_user_status,
};
use super::middleware::security_headers;
use super::state::AppState;

/// 根据配置的来源列表构建 CorsLayer
fn build_cors_layer(cors_origins: Vec<String>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_credentials(true);

    if cors_origins.is_empty() {
        tracing::warn!(
            "AUTHGATE_CORS_ORIGINS not configured, allowing all origins. \
             Set AUTHGATE_CORS_ORIGINS in production."
        );
        base.allow_origin(AllowOrigin::any())
            .allow_credentials(false) // any() 不能与 credentials(true) 共用
    } else {
        let origins: Vec<HeaderValue> = cors_origins
            .into_iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        base.allow_origin(origins)
    }
}

/// Build the router with routes and middleware wired.
pub fn app_router(state: AppState, cors_origins: Vec<String>) -> Router {
    // 公开端点
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/auth/refresh-token", post(refresh))
        .route("/users/:id", get(get_user));

    // 需要 Bearer token 的端点，权限由 handler 中的 extractor 检查
    let protected_routes = Router::new()
        .route("/users/change-password", post(change_password))
        .route("/users/:id/status", put(set_user_status));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(handler_404)
        .layer(from_fn_with_state(state.clone(), security_headers))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(cors_origins))
        .with_state(state)
}
