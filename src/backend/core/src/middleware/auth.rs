//! Authentication middleware: bearer JWT → [`ActorContext`].
//!
//! Features:
//! - HMAC JWT validation (HS256/HS384/HS512) with issuer/audience checks
//! - Lenient role resolution: a missing or unknown `role` claim degrades to
//!   `USER` and is logged
//! - Public paths that pass through with an unresolved actor
//! - Request ID propagation
//!
//! # Example
//!
//! ```rust,ignore
//! use assetdesk_core::middleware::auth::{AuthConfig, AuthLayer};
//!
//! let config = AuthConfig::builder()
//!     .jwt_secret("your-secret-key")
//!     .build();
//!
//! let app = Router::new()
//!     .route("/api/v1/permissions", get(permissions))
//!     .layer(AuthLayer::from_config(config)?);
//! ```

use axum::{
    body::Body,
    extract::Request,
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use futures::future::BoxFuture;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::{
    sync::Arc,
    task::{Context, Poll},
};
use thiserror::Error;
use tower::{Layer, Service};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DeskError, ErrorCode};
use crate::rbac::{ActorContext, Role};
use crate::telemetry::AccessMetrics;

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

// ═══════════════════════════════════════════════════════════════════════════════
// Error Types
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Missing authentication credentials")]
    MissingCredentials,

    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Authentication is misconfigured: {0}")]
    Configuration(String),
}

impl From<AuthError> for DeskError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::MissingCredentials => {
                DeskError::new(ErrorCode::Unauthorized, "Authentication credentials are required")
            }
            AuthError::InvalidToken => {
                DeskError::new(ErrorCode::InvalidToken, "The provided token is invalid")
            }
            AuthError::TokenExpired => DeskError::new(
                ErrorCode::TokenExpired,
                "The authentication token has expired",
            ),
            AuthError::Configuration(message) => DeskError::with_internal(
                ErrorCode::ConfigurationError,
                "An authentication error occurred",
                message,
            ),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// JWT Claims
// ═══════════════════════════════════════════════════════════════════════════════

/// JWT token claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Session role string; resolved leniently
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Token ID
    #[serde(default = "generate_jti")]
    pub jti: String,

    /// Issued at timestamp
    pub iat: i64,

    /// Expiration timestamp
    pub exp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

fn generate_jti() -> String {
    Uuid::new_v4().to_string()
}

impl Claims {
    pub fn builder(user_id: impl Into<String>) -> ClaimsBuilder {
        ClaimsBuilder::new(user_id)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }

    /// The role this token grants, plus whether the fallback to `USER` fired.
    pub fn resolve_role(&self) -> (Role, bool) {
        match self.role.as_deref().map(str::parse::<Role>) {
            Some(Ok(role)) => (role, false),
            _ => (Role::User, true),
        }
    }
}

/// Builder for JWT claims.
pub struct ClaimsBuilder {
    claims: Claims,
}

impl ClaimsBuilder {
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            claims: Claims {
                sub: user_id.into(),
                email: None,
                name: None,
                role: None,
                jti: generate_jti(),
                iat: now.timestamp(),
                exp: (now + Duration::hours(1)).timestamp(),
                iss: None,
                aud: None,
            },
        }
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.claims.email = Some(email.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.claims.name = Some(name.into());
        self
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.claims.role = Some(role.into());
        self
    }

    pub fn expires_in(mut self, duration: Duration) -> Self {
        self.claims.exp = (Utc::now() + duration).timestamp();
        self
    }

    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.claims.iss = Some(issuer.into());
        self
    }

    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.claims.aud = Some(audience.into());
        self
    }

    pub fn build(self) -> Claims {
        self.claims
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════════════

/// Authentication configuration (the `auth` config section).
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// When false, every request carries an unresolved actor
    #[serde(default)]
    pub enabled: bool,

    /// Shared secret for HS256/HS384/HS512
    #[serde(default)]
    pub jwt_secret: Option<String>,

    #[serde(default = "default_jwt_algorithm")]
    pub jwt_algorithm: Algorithm,

    #[serde(default)]
    pub issuer: Option<String>,

    #[serde(default)]
    pub audience: Option<String>,

    /// Leeway for expiration checks (in seconds)
    #[serde(default = "default_leeway_secs")]
    pub leeway_secs: u64,

    /// Paths that don't require authentication; a trailing `*` matches a prefix
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
}

fn default_jwt_algorithm() -> Algorithm {
    Algorithm::HS256
}

fn default_leeway_secs() -> u64 {
    60
}

fn default_public_paths() -> Vec<String> {
    vec!["/health".to_string(), "/metrics".to_string()]
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            jwt_secret: None,
            jwt_algorithm: default_jwt_algorithm(),
            issuer: None,
            audience: None,
            leeway_secs: default_leeway_secs(),
            public_paths: default_public_paths(),
        }
    }
}

impl AuthConfig {
    /// Builder starting from an enabled config.
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder {
            config: AuthConfig {
                enabled: true,
                ..AuthConfig::default()
            },
        }
    }

    /// Startup validation.
    pub fn validate(&self) -> Result<(), AuthError> {
        if !matches!(
            self.jwt_algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(AuthError::Configuration(format!(
                "Unsupported JWT algorithm: {:?}",
                self.jwt_algorithm
            )));
        }
        if self.enabled && self.jwt_secret.as_deref().map_or(true, str::is_empty) {
            return Err(AuthError::Configuration(
                "auth.jwt_secret is required when auth is enabled".into(),
            ));
        }
        Ok(())
    }
}

pub struct AuthConfigBuilder {
    config: AuthConfig,
}

impl AuthConfigBuilder {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.jwt_secret = Some(secret.into());
        self
    }

    pub fn jwt_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.config.jwt_algorithm = algorithm;
        self
    }

    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.config.issuer = Some(issuer.into());
        self
    }

    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.config.audience = Some(audience.into());
        self
    }

    pub fn leeway_secs(mut self, secs: u64) -> Self {
        self.config.leeway_secs = secs;
        self
    }

    pub fn add_public_path(mut self, path: impl Into<String>) -> Self {
        self.config.public_paths.push(path.into());
        self
    }

    pub fn build(self) -> AuthConfig {
        self.config
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Authenticator
// ═══════════════════════════════════════════════════════════════════════════════

/// Verifies bearer tokens and resolves the actor's role.
pub struct Authenticator {
    config: AuthConfig,
    keys: Option<(EncodingKey, DecodingKey)>,
    validation: Validation,
}

impl Authenticator {
    pub fn new(config: AuthConfig) -> Result<Self, AuthError> {
        config.validate()?;

        let keys = config
            .jwt_secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
            .map(|secret| {
                (
                    EncodingKey::from_secret(secret.as_bytes()),
                    DecodingKey::from_secret(secret.as_bytes()),
                )
            });

        let mut validation = Validation::new(config.jwt_algorithm);
        validation.leeway = config.leeway_secs;

        if let Some(ref issuer) = config.issuer {
            validation.set_issuer(&[issuer]);
        }

        if let Some(ref audience) = config.audience {
            validation.set_audience(&[audience]);
        }

        Ok(Self {
            config,
            keys,
            validation,
        })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Check if a path is public (doesn't require auth).
    pub fn is_public_path(&self, path: &str) -> bool {
        self.config.public_paths.iter().any(|p| match p.strip_suffix('*') {
            Some(prefix) => path.starts_with(prefix),
            None => path == p,
        })
    }

    /// Authenticate a request from its headers.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<ActorContext, AuthError> {
        let request_id = request_id(headers);
        let token = extract_bearer(headers).ok_or(AuthError::MissingCredentials)?;
        let claims = self.validate_jwt(token)?;

        let (role, fell_back) = claims.resolve_role();
        if fell_back {
            warn!(
                user_id = %claims.sub,
                claimed_role = ?claims.role,
                request_id = %request_id,
                "Unrecognized role claim, treating actor as USER"
            );
            AccessMetrics::record_auth("jwt", "fallback");
        } else {
            AccessMetrics::record_auth("jwt", "success");
        }

        Ok(ActorContext::resolved(claims.sub, role, request_id))
    }

    /// Decode and verify a JWT.
    pub fn validate_jwt(&self, token: &str) -> Result<Claims, AuthError> {
        let (_, decoding_key) = self
            .keys
            .as_ref()
            .ok_or_else(|| AuthError::Configuration("JWT secret not configured".into()))?;

        decode::<Claims>(token, decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("JWT validation failed: {}", e);
                AccessMetrics::record_auth("jwt", "failure");
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    _ => AuthError::InvalidToken,
                }
            })
    }

    /// Sign a new JWT with the configured secret.
    pub fn generate_token(&self, claims: &Claims) -> Result<String, AuthError> {
        let (encoding_key, _) = self
            .keys
            .as_ref()
            .ok_or_else(|| AuthError::Configuration("JWT secret not configured".into()))?;

        let header = Header::new(self.config.jwt_algorithm);
        encode(&header, claims, encoding_key)
            .map_err(|e| AuthError::Configuration(format!("Failed to generate token: {}", e)))
    }
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer ").or_else(|| s.strip_prefix("bearer ")))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer and Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Authentication layer for Tower.
#[derive(Clone)]
pub struct AuthLayer {
    authenticator: Arc<Authenticator>,
}

impl AuthLayer {
    pub fn new(authenticator: Arc<Authenticator>) -> Self {
        Self { authenticator }
    }

    pub fn from_config(config: AuthConfig) -> Result<Self, AuthError> {
        let authenticator = Authenticator::new(config)?;
        Ok(Self::new(Arc::new(authenticator)))
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            authenticator: self.authenticator.clone(),
        }
    }
}

/// Authentication service. Always inserts an [`ActorContext`] into the
/// request extensions before calling the inner service.
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    authenticator: Arc<Authenticator>,
}

impl<S> Service<Request<Body>> for AuthService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let authenticator = self.authenticator.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let headers = request.headers();

            if !authenticator.config.enabled {
                let ctx = ActorContext::unresolved(request_id(headers));
                request.extensions_mut().insert(ctx);
                return inner.call(request).await;
            }

            if authenticator.is_public_path(request.uri().path()) {
                // Credentials are optional here; a bad token leaves the actor unresolved.
                let ctx = authenticator
                    .authenticate(headers)
                    .unwrap_or_else(|_| ActorContext::unresolved(request_id(headers)));
                if !ctx.is_resolved() {
                    AccessMetrics::record_auth("anonymous", "public");
                }
                request.extensions_mut().insert(ctx);
                return inner.call(request).await;
            }

            match authenticator.authenticate(headers) {
                Ok(ctx) => {
                    request.extensions_mut().insert(ctx);
                    inner.call(request).await
                }
                Err(e) => Ok(DeskError::from(e)
                    .with_request_id(request_id(headers))
                    .into_response()),
            }
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use crate::rbac::RoleState;

    const SECRET: &str = "super-secret-key-for-testing-only";

    fn authenticator() -> Authenticator {
        Authenticator::new(AuthConfig::builder().jwt_secret(SECRET).build()).unwrap()
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_claims_role_resolution() {
        let claims = Claims::builder("u1").role("technician").build();
        assert_eq!(claims.resolve_role(), (Role::Technician, false));

        let claims = Claims::builder("u1").role("GUEST").build();
        assert_eq!(claims.resolve_role(), (Role::User, true));

        let claims = Claims::builder("u1").build();
        assert_eq!(claims.resolve_role(), (Role::User, true));
    }

    #[test]
    fn test_enabled_without_secret_is_rejected() {
        let config = AuthConfig::builder().build();
        assert!(matches!(
            Authenticator::new(config),
            Err(AuthError::Configuration(_))
        ));
    }

    #[test]
    fn test_unsupported_algorithm_is_rejected() {
        let config = AuthConfig::builder()
            .jwt_secret(SECRET)
            .jwt_algorithm(Algorithm::RS256)
            .build();
        assert!(matches!(
            Authenticator::new(config),
            Err(AuthError::Configuration(_))
        ));
    }

    #[test]
    fn test_public_paths() {
        let auth = Authenticator::new(
            AuthConfig::builder()
                .jwt_secret(SECRET)
                .add_public_path("/api/public/*")
                .build(),
        )
        .unwrap();

        assert!(auth.is_public_path("/health"));
        assert!(auth.is_public_path("/api/public/test"));
        assert!(!auth.is_public_path("/api/v1/permissions"));
    }

    #[test]
    fn test_authenticate_round_trip() {
        let auth = authenticator();
        let token = auth
            .generate_token(&Claims::builder("admin-1").role("ADMIN").build())
            .unwrap();

        let ctx = auth.authenticate(&bearer(&token)).unwrap();
        assert_eq!(ctx.user_id.as_deref(), Some("admin-1"));
        assert_eq!(ctx.role, RoleState::Resolved(Role::Admin));
        assert!(!ctx.request_id.is_empty());
    }

    #[test]
    fn test_unknown_role_claim_degrades_to_user() {
        let auth = authenticator();
        let token = auth
            .generate_token(&Claims::builder("u9").role("SUPERUSER").build())
            .unwrap();

        let ctx = auth.authenticate(&bearer(&token)).unwrap();
        assert_eq!(ctx.role(), Some(Role::User));
    }

    #[test]
    fn test_authenticate_failures() {
        let auth = authenticator();
        assert_eq!(
            auth.authenticate(&HeaderMap::new()),
            Err(AuthError::MissingCredentials)
        );
        assert_eq!(
            auth.authenticate(&bearer("not-a-jwt")),
            Err(AuthError::InvalidToken)
        );

        let other = Authenticator::new(AuthConfig::builder().jwt_secret("other").build()).unwrap();
        let forged = other
            .generate_token(&Claims::builder("x").role("ADMIN").build())
            .unwrap();
        assert_eq!(
            auth.authenticate(&bearer(&forged)),
            Err(AuthError::InvalidToken)
        );

        let expired = auth
            .generate_token(
                &Claims::builder("u1")
                    .role("USER")
                    .expires_in(Duration::hours(-2))
                    .build(),
            )
            .unwrap();
        assert_eq!(
            auth.authenticate(&bearer(&expired)),
            Err(AuthError::TokenExpired)
        );
    }

    #[test]
    fn test_request_id_is_propagated() {
        let auth = authenticator();
        let token = auth
            .generate_token(&Claims::builder("u1").role("USER").build())
            .unwrap();
        let mut headers = bearer(&token);
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("req-42"));

        let ctx = auth.authenticate(&headers).unwrap();
        assert_eq!(ctx.request_id, "req-42");
    }
}
