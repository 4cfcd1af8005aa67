//! Axum integration for role checks.
//!
//! The auth middleware inserts an [`ActorContext`] into every request. This
//! module reads it back, either as a handler extractor ([`Actor`]) or as a
//! route-level gate ([`RequireRoleLayer`]).

use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::warn;

use super::models::ActorContext;
use super::roles::{Role, RoleState};
use crate::error::DeskError;

// ═══════════════════════════════════════════════════════════════════════════════
// Actor (extracted in handlers)
// ═══════════════════════════════════════════════════════════════════════════════

/// A request actor whose role has been resolved.
///
/// Extracting `Actor` fails with 401 while the role is still unresolved, so a
/// handler taking it never has to treat "unknown" as a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Option<String>,
    pub role: Role,
    pub request_id: String,
}

impl Actor {
    fn from_context(ctx: &ActorContext) -> Option<Self> {
        ctx.role().map(|role| Self {
            user_id: ctx.user_id.clone(),
            role,
            request_id: ctx.request_id.clone(),
        })
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts.extensions.get::<ActorContext>();
        ctx.and_then(Actor::from_context).ok_or_else(|| {
            let request_id = ctx.map(|ctx| ctx.request_id.clone()).unwrap_or_default();
            DeskError::unauthorized("Authentication required")
                .with_request_id(request_id)
                .into_response()
        })
    }
}

/// Raw actor context, including the unresolved state.
#[axum::async_trait]
impl<S> FromRequestParts<S> for ActorContext
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<ActorContext>()
            .cloned()
            .unwrap_or_else(|| ActorContext::unresolved("")))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer
// ═══════════════════════════════════════════════════════════════════════════════

/// Layer that admits only actors at or above a minimum role.
///
/// ```rust,ignore
/// let admin = Router::new()
///     .route("/api/v1/permissions/matrix", get(matrix))
///     .layer(RequireRoleLayer::new(Role::Admin));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequireRoleLayer {
    min: Role,
}

impl RequireRoleLayer {
    pub fn new(min: Role) -> Self {
        Self { min }
    }
}

impl<S> Layer<S> for RequireRoleLayer {
    type Service = RequireRoleService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireRoleService {
            inner,
            min: self.min,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Service
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct RequireRoleService<S> {
    inner: S,
    min: Role,
}

impl<S> Service<Request<Body>> for RequireRoleService<S>
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

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let min = self.min;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let (state, request_id) = request
                .extensions()
                .get::<ActorContext>()
                .map(|ctx| (ctx.role, ctx.request_id.clone()))
                .unwrap_or_default();

            match state {
                RoleState::Unresolved => Ok(DeskError::unauthorized("Authentication required")
                    .with_request_id(request_id)
                    .into_response()),
                RoleState::Resolved(role) if !role.at_least(min) => {
                    warn!(
                        role = %role,
                        required = %min,
                        path = %request.uri().path(),
                        "Role check failed"
                    );
                    Ok(DeskError::forbidden(format!("Requires role {min} or higher"))
                        .with_request_id(request_id)
                        .into_response())
                }
                RoleState::Resolved(_) => inner.call(request).await,
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
    use axum::http::StatusCode;
    use std::convert::Infallible;
    use tower::{service_fn, ServiceExt};

    fn request_with(ctx: Option<ActorContext>) -> Request<Body> {
        let mut request = Request::builder().uri("/gated").body(Body::empty()).unwrap();
        if let Some(ctx) = ctx {
            request.extensions_mut().insert(ctx);
        }
        request
    }

    async fn status_for(min: Role, ctx: Option<ActorContext>) -> StatusCode {
        let service = RequireRoleLayer::new(min).layer(service_fn(|_req: Request<Body>| async {
            Ok::<_, Infallible>(StatusCode::OK.into_response())
        }));
        service.oneshot(request_with(ctx)).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_require_role_gate() {
        let admin = ActorContext::resolved("a1", Role::Admin, "r1");
        let tech = ActorContext::resolved("t1", Role::Technician, "r2");
        let user = ActorContext::resolved("u1", Role::User, "r3");

        assert_eq!(status_for(Role::Admin, Some(admin)).await, StatusCode::OK);
        assert_eq!(
            status_for(Role::Technician, Some(tech.clone())).await,
            StatusCode::OK
        );
        assert_eq!(status_for(Role::Admin, Some(tech)).await, StatusCode::FORBIDDEN);
        assert_eq!(status_for(Role::Technician, Some(user)).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_require_role_unresolved_is_unauthorized() {
        assert_eq!(status_for(Role::User, None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_for(Role::User, Some(ActorContext::unresolved("r4"))).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_actor_from_context() {
        let ctx = ActorContext::resolved("u1", Role::User, "r1");
        let actor = Actor::from_context(&ctx).unwrap();
        assert_eq!(actor.role, Role::User);
        assert_eq!(actor.user_id.as_deref(), Some("u1"));

        assert!(Actor::from_context(&ActorContext::unresolved("r2")).is_none());
    }
}
