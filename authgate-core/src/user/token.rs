//! Token 签发与校验：HS256 access token + 不透明 refresh token

use super::models::AccessClaims;
use crate::clock::Clock;
use crate::config::{TokenSettings, MIN_SIGNING_KEY_LEN};
use crate::error::{AuthError, Result};
use base64::{engine::general_purpose, Engine};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;
use uuid::Uuid;

/// Refresh token 随机字节数（256 bit）
const REFRESH_TOKEN_BYTES: usize = 32;

pub struct TokenIssuer {
    settings: TokenSettings,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// 缺少签名密钥属于启动期致命配置错误
    pub fn new(settings: TokenSettings, clock: Arc<dyn Clock>) -> Result<Self> {
        if settings.signing_key.trim().is_empty() {
            return Err(AuthError::Config("JWT signing key is not configured".into()));
        }
        if settings.signing_key.len() < MIN_SIGNING_KEY_LEN {
            return Err(AuthError::Config(format!(
                "JWT signing key must be at least {MIN_SIGNING_KEY_LEN} bytes"
            )));
        }
        if settings.access_token_ttl <= chrono::Duration::zero() {
            return Err(AuthError::Config("access token lifetime must be positive".into()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[settings.issuer.clone()]);
        validation.set_audience(&[settings.audience.clone()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        // 过期由注入的时钟判定，零容差
        validation.validate_exp = false;
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(settings.signing_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.signing_key.as_bytes()),
            settings,
            validation,
            clock,
        })
    }

    /// 签发 access token，返回 token 与过期时间
    pub fn issue_access_token(
        &self,
        user_id: Uuid,
        email: &str,
        roles: &[String],
    ) -> Result<(String, DateTime<Utc>)> {
        let now = self.clock.now();
        let expires_at = now + self.settings.access_token_ttl;
        let claims = AccessClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            jti: Uuid::new_v4().to_string(),
            roles: roles.to_vec(),
            iss: self.settings.issuer.clone(),
            aud: self.settings.audience.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Task(format!("failed to sign access token: {e}")))?;
        Ok((token, expires_at))
    }

    /// 生成 refresh token：CSPRNG 随机字节，不携带任何 claims
    pub fn issue_refresh_token(&self) -> String {
        let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        general_purpose::STANDARD.encode(bytes)
    }

    /// 校验签名、iss、aud 与过期时间；任何失败都只返回 false
    pub fn validate_access_token(&self, token: &str) -> bool {
        self.decode_access_token(token).is_some()
    }

    /// 解析并校验 access token
    pub fn decode_access_token(&self, token: &str) -> Option<AccessClaims> {
        let data = decode::<AccessClaims>(token, &self.decoding_key, &self.validation).ok()?;
        if data.claims.exp <= self.clock.now().timestamp() {
            return None;
        }
        Some(data.claims)
    }
}
