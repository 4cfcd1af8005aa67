#![allow(clippy::result_large_err)]
//! # AssetDesk Core
//!
//! Field-level access control for the AssetDesk asset and ticket desk.
//!
//! ## Architecture
//!
//! - **RBAC**: roles, the immutable permission matrix, the field evaluator and
//!   record projection. Pure and lock-free; safe to share across threads.
//! - **Middleware**: JWT authentication producing the per-request actor context
//! - **API**: Axum routes serving permission snapshots and projection
//! - **Telemetry**: structured logging and Prometheus metrics
//! - **Config**: layered file + environment configuration

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod rbac;
pub mod telemetry;

pub use error::{DeskError, ErrorCode, ErrorDetails, ErrorSeverity, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{DeskError, ErrorCode, Result};
    pub use crate::rbac::{
        Actor, ActorContext, Capability, EntityType, FieldPermissionDenied, FieldPolicy,
        PermissionMatrix, PermissionSnapshot, Record, Role, RoleState, ScopedPolicy,
    };
}
