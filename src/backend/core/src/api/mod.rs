//! HTTP surface for the access-control engine.
//!
//! | Route                              | Access        |
//! |------------------------------------|---------------|
//! | `GET /health`                      | public        |
//! | `GET /metrics`                     | public        |
//! | `GET /api/v1/permissions`          | any actor     |
//! | `GET /api/v1/permissions/matrix`   | `ADMIN`       |
//! | `POST /api/v1/projection/:entity/read`  | any actor |
//! | `POST /api/v1/projection/:entity/write` | any actor |

mod handlers;
pub mod middleware;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::middleware::AuthLayer;
use crate::rbac::{FieldPolicy, RequireRoleLayer, Role};
use crate::telemetry::MetricsRegistry;

pub use handlers::{MatrixAudit, RoleSummary};

/// Application state shared across handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub policy: FieldPolicy,
    pub metrics: MetricsRegistry,
}

impl AppState {
    pub fn new(policy: FieldPolicy, metrics: MetricsRegistry) -> Self {
        Self { policy, metrics }
    }
}

/// Build the API router.
///
/// ```rust,ignore
/// let state = AppState::new(policy, metrics);
/// let app = build_router(state, AuthLayer::from_config(config.auth.clone())?);
/// ```
pub fn build_router(state: AppState, auth: AuthLayer) -> Router {
    let admin = Router::new()
        .route("/permissions/matrix", get(handlers::get_matrix))
        .route_layer(RequireRoleLayer::new(Role::Admin));

    let v1 = Router::new()
        .route("/permissions", get(handlers::get_permissions))
        .route("/projection/:entity/read", post(handlers::project_read))
        .route("/projection/:entity/write", post(handlers::project_write))
        .merge(admin);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::prometheus_metrics))
        .nest("/api/v1", v1)
        .layer(auth)
        // Outside `auth` so its rejections carry the headers too.
        .layer(axum_middleware::from_fn(middleware::response_headers))
        .layer(axum_middleware::from_fn(middleware::request_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Success envelope. Errors use [`crate::error::ErrorResponse`].
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
        }
    }
}
