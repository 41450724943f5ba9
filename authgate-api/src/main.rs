mod app;

use anyhow::Context;
use app::{app_router, AppState};
use authgate_core::{
    AuthService, AuthSettings, FileCredentialStore, TokenSettings, DEFAULT_JWT_AUDIENCE,
    DEFAULT_JWT_ISSUER,
};
use dotenvy::dotenv;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_ACCESS_TOKEN_MINUTES: i64 = 30;

#[derive(Clone)]
struct ApiConfig {
    bind: SocketAddr,
    data_dir: PathBuf,
    /// JWT 签名密钥（必填，>= 32 字节）
    jwt_key: String,
    /// JWT iss
    jwt_issuer: String,
    /// JWT aud
    jwt_audience: String,
    /// Access token 有效期（分钟）
    access_token_minutes: i64,
    /// 是否信任 X-Real-IP / X-Forwarded-For
    trust_proxy: bool,
    /// CORS 允许的来源列表（空则允许所有）
    cors_origins: Vec<String>,
    /// 启动时授予 Admin 角色的邮箱
    admin_emails: Vec<String>,
}

impl ApiConfig {
    fn from_env() -> anyhow::Result<Self> {
        let bind = env::var("AUTHGATE_BIND").unwrap_or_else(|_| DEFAULT_BIND.into());
        let bind: SocketAddr = bind
            .parse()
            .with_context(|| format!("invalid AUTHGATE_BIND: {bind}"))?;

        let data_dir = env::var("AUTHGATE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        // 签名密钥没有默认值，缺失直接拒绝启动
        let jwt_key = env::var("AUTHGATE_JWT_KEY")
            .map(|s| s.trim().to_string())
            .context("AUTHGATE_JWT_KEY must be set")?;
        let jwt_issuer =
            env::var("AUTHGATE_JWT_ISSUER").unwrap_or_else(|_| DEFAULT_JWT_ISSUER.into());
        let jwt_audience =
            env::var("AUTHGATE_JWT_AUDIENCE").unwrap_or_else(|_| DEFAULT_JWT_AUDIENCE.into());

        let access_token_minutes = match env::var("AUTHGATE_ACCESS_TOKEN_MINUTES") {
            Ok(s) => s
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|m| *m > 0)
                .with_context(|| format!("invalid AUTHGATE_ACCESS_TOKEN_MINUTES: {s}"))?,
            Err(_) => DEFAULT_ACCESS_TOKEN_MINUTES,
        };

        let trust_proxy = env::var("AUTHGATE_TRUST_PROXY")
            .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        // 逗号分隔；空或 "*" 表示允许所有
        let cors_origins = env::var("AUTHGATE_CORS_ORIGINS")
            .ok()
            .map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() || trimmed == "*" {
                    vec![]
                } else {
                    split_list(trimmed)
                }
            })
            .unwrap_or_default();

        let admin_emails = env::var("AUTHGATE_ADMIN_EMAILS")
            .map(|s| split_list(&s))
            .unwrap_or_default();

        Ok(Self {
            bind,
            data_dir,
            jwt_key,
            jwt_issuer,
            jwt_audience,
            access_token_minutes,
            trust_proxy,
            cors_origins,
            admin_emails,
        })
    }

    fn auth_settings(&self) -> AuthSettings {
        let tokens = TokenSettings::new(self.jwt_key.clone())
            .with_claims_context(self.jwt_issuer.clone(), self.jwt_audience.clone())
            .with_ttl(
                chrono::Duration::minutes(self.access_token_minutes),
                chrono::Duration::days(7),
            );
        AuthSettings::new(tokens)
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 优先读取 .env（若存在）
    let _ = dotenv();
    init_tracing();

    let config = ApiConfig::from_env()?;
    info!("starting API on {}", config.bind);

    let store = Arc::new(
        FileCredentialStore::open(&config.data_dir)
            .await
            .with_context(|| format!("failed to open data dir {}", config.data_dir.display()))?,
    );
    let auth = Arc::new(AuthService::with_defaults(config.auth_settings(), store)?);

    bootstrap_admins(&auth, &config.admin_emails).await;

    let state = AppState {
        auth,
        trust_proxy: config.trust_proxy,
    };

    let app = app_router(state, config.cors_origins.clone());
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing() {
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

/// 为已注册的管理员邮箱授予 Admin 角色
async fn bootstrap_admins(auth: &AuthService, emails: &[String]) {
    for email in emails {
        match auth.grant_role(email, app::ADMIN_ROLE).await {
            Ok(user) => info!(user_id = %user.id, "admin role ensured"),
            Err(e) => tracing::warn!(email = %email, error = %e, "failed to grant admin role"),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received");
}
