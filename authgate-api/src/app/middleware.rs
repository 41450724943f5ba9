use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

use authgate_core::AccessClaims;
use axum::body::Body;
use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use super::error::ApiError;
use super::state::AppState;

/// 管理员角色名
pub const ADMIN_ROLE: &str = "Admin";

/// 通过 Bearer access token 认证的调用者
#[derive(Debug, Clone)]
pub struct Authenticated {
	pub user_id: Uuid,
	pub claims: AccessClaims,
}

impl FromRequestParts<AppState> for Authenticated {
	type Rejection = ApiError;

	fn from_request_parts<'a, 'b, 'c>(
		parts: &'a mut Parts,
		state: &'b AppState,
	) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'c>>
	where
		'a: 'c,
		'b: 'c,
	{
		Box::pin(async move {
			let token = bearer_token(&parts.headers).ok_or_else(ApiError::unauthorized)?;
			let claims = state
				.auth
				.decode_access_token(token)
				.ok_or_else(ApiError::unauthorized)?;
			let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ApiError::unauthorized())?;
			Ok(Authenticated { user_id, claims })
		})
	}
}

/// 要求管理员角色的 Extractor
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Authenticated);

impl FromRequestParts<AppState> for RequireAdmin {
	type Rejection = ApiError;

	fn from_request_parts<'a, 'b, 'c>(
		parts: &'a mut Parts,
		state: &'b AppState,
	) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'c>>
	where
		'a: 'c,
		'b: 'c,
	{
		Box::pin(async move {
			let auth = Authenticated::from_request_parts(parts, state).await?;
			if !auth.claims.has_role(ADMIN_ROLE) {
				tracing::warn!(user_id = %auth.user_id, "admin access denied");
				return Err(ApiError::forbidden("admin access required"));
			}
			Ok(RequireAdmin(auth))
		})
	}
}

/// 客户端 IP
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

impl FromRequestParts<AppState> for ClientIp {
	type Rejection = ApiError;

	fn from_request_parts<'a, 'b, 'c>(
		parts: &'a mut Parts,
		state: &'b AppState,
	) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'c>>
	where
		'a: 'c,
		'b: 'c,
	{
		Box::pin(async move {
			let connect = parts.extensions.get::<ConnectInfo<SocketAddr>>();
			Ok(ClientIp(resolve_client_ip(
				&parts.headers,
				connect,
				state.trust_proxy,
			)))
		})
	}
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
	headers
		.get(header::AUTHORIZATION)
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.strip_prefix("Bearer "))
		.map(str::trim)
		.filter(|t| !t.is_empty())
}

/// 解析客户端 IP
/// 优先级：X-Real-IP > X-Forwarded-For（第一个） > Socket Address；
/// 代理头只在 trust_proxy 时生效
fn resolve_client_ip(
	headers: &HeaderMap,
	connect: Option<&ConnectInfo<SocketAddr>>,
	trust_proxy: bool,
) -> String {
	if trust_proxy {
		// 1. X-Real-IP（Nginx 常用）
		if let Some(real_ip) = headers
			.get("X-Real-IP")
			.and_then(|v| v.to_str().ok())
			.map(str::trim)
			.filter(|s| !s.is_empty())
		{
			return real_ip.to_string();
		}

		// 2. X-Forwarded-For 最左边是真实客户端
		if let Some(first_ip) = headers
			.get("X-Forwarded-For")
			.and_then(|v| v.to_str().ok())
			.and_then(|v| v.split(',').next())
			.map(str::trim)
			.filter(|s| !s.is_empty())
		{
			return first_ip.to_string();
		}
	}

	// 3. 直连 socket 地址
	connect
		.map(|ci| ci.0.ip().to_string())
		.unwrap_or_else(|| "unknown".to_string())
}

/// 记录请求并为每个响应附加安全头
pub async fn security_headers(
	State(state): State<AppState>,
	request: Request<Body>,
	next: Next,
) -> Response {
	let client_ip = resolve_client_ip(
		request.headers(),
		request.extensions().get::<ConnectInfo<SocketAddr>>(),
		state.trust_proxy,
	);
	tracing::debug!(
		client_ip = %client_ip,
		method = %request.method(),
		path = %request.uri().path(),
		"incoming request"
	);

	let mut response = next.run(request).await;
	let headers = response.headers_mut();
	headers.insert(
		header::X_CONTENT_TYPE_OPTIONS,
		HeaderValue::from_static("nosniff"),
	);
	headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
	headers.insert(
		header::X_XSS_PROTECTION,
		HeaderValue::from_static("1; mode=block"),
	);
	response
}
