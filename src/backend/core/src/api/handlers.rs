//! API request handlers.
//!
//! Handlers return `Result<impl IntoResponse, DeskError>` so that errors are
//! converted to HTTP responses by `DeskError`'s `IntoResponse`.

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::Value;

use super::{ApiResponse, AppState};
use crate::error::DeskError;
use crate::rbac::{Actor, EntityType, GrantEntry, Record, Role, ScopedPolicy};

// ═══════════════════════════════════════════════════════════════════════════════
// Health & Metrics
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.render(),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// Permissions
// ═══════════════════════════════════════════════════════════════════════════════

/// The caller's own grants.
pub async fn get_permissions(
    State(state): State<AppState>,
    actor: Actor,
) -> impl IntoResponse {
    Json(ApiResponse::success(state.policy.snapshot(actor.role)))
}

#[derive(Debug, Serialize)]
pub struct MatrixAudit {
    pub roles: Vec<RoleSummary>,
    pub grants: Vec<GrantEntry>,
}

#[derive(Debug, Serialize)]
pub struct RoleSummary {
    pub role: Role,
    pub rank: u8,
}

/// Full matrix listing. Mounted behind `RequireRoleLayer::new(Role::Admin)`.
pub async fn get_matrix(State(state): State<AppState>) -> impl IntoResponse {
    let audit = MatrixAudit {
        roles: Role::ALL
            .into_iter()
            .map(|role| RoleSummary {
                role,
                rank: role.rank(),
            })
            .collect(),
        grants: state.policy.matrix().entries(),
    };
    Json(ApiResponse::success(audit))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Projection
// ═══════════════════════════════════════════════════════════════════════════════

fn entity_from_path(raw: &str) -> Result<EntityType, DeskError> {
    raw.parse::<EntityType>()
        .map_err(|e| DeskError::not_found("Entity type", e.0))
}

/// Project a record (or a list of records) for the caller's role.
pub async fn project_read(
    State(state): State<AppState>,
    actor: Actor,
    Path(entity): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, DeskError> {
    let projected = entity_from_path(&entity)
        .and_then(|entity| read_projection(state.policy.for_role(actor.role), entity, body))
        .map_err(|e| e.with_request_id(actor.request_id.as_str()))?;
    Ok(Json(ApiResponse::success(projected)))
}

fn read_projection(
    scoped: ScopedPolicy<'_>,
    entity: EntityType,
    body: Value,
) -> Result<Value, DeskError> {
    match body {
        Value::Object(record) => Ok(Value::Object(scoped.project_for_read(entity, &record))),
        Value::Array(items) => {
            let records = items
                .into_iter()
                .map(|item| match item {
                    Value::Object(record) => Ok(record),
                    _ => Err(DeskError::validation("Every list item must be a JSON object")),
                })
                .collect::<Result<Vec<Record>, _>>()?;
            Ok(Value::Array(
                scoped
                    .project_many(entity, &records)
                    .into_iter()
                    .map(Value::Object)
                    .collect(),
            ))
        }
        _ => Err(DeskError::validation("Body must be a JSON object or an array of objects")),
    }
}

/// Validate a partial update for the caller's role.
///
/// Responds with the accepted payload, or 403 `FIELD_PERMISSION_DENIED`
/// listing every field the role may not edit.
pub async fn project_write(
    State(state): State<AppState>,
    actor: Actor,
    Path(entity): Path<String>,
    Json(payload): Json<Record>,
) -> Result<impl IntoResponse, DeskError> {
    let accepted = entity_from_path(&entity)
        .and_then(|entity| {
            state
                .policy
                .project_for_write(actor.role, entity, payload)
                .map_err(DeskError::from)
        })
        .map_err(|e| e.with_request_id(actor.request_id.as_str()))?;
    Ok(Json(ApiResponse::success(accepted)))
}
