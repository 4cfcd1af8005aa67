//! Role-based, field-level access control.
//!
//! This module provides:
//! - **Roles**: the closed set `ADMIN > TECHNICIAN > USER` and the resolution
//!   state of the current actor
//! - **Matrix**: the immutable `Role → EntityType → field → Capability` table,
//!   validated at construction
//! - **Policy**: the evaluator answering "may role R view/edit field F of E?"
//! - **Projection**: read-side filtering and write-side rejection of records
//! - **Middleware**: Axum extractors and a minimum-role layer
//!
//! # Usage
//!
//! ```rust,ignore
//! use assetdesk_core::rbac::{EntityType, FieldPolicy, Role};
//!
//! let policy = FieldPolicy::builtin()?;
//!
//! let visible = policy.project_for_read(Role::User, EntityType::Ticket, &ticket);
//! let accepted = policy.project_for_write(Role::Technician, EntityType::Ticket, patch)?;
//! ```

pub mod defaults;
pub mod matrix;
pub mod middleware;
pub mod models;
pub mod policy;
pub mod projection;
pub mod roles;
pub mod schema;

pub use defaults::{builtin_matrix, load_matrix, BUILTIN_MATRIX};
pub use matrix::{
    EntityGrants, GrantChange, GrantEntry, MatrixBuilder, MatrixError, PermissionMatrix,
};
pub use middleware::{Actor, RequireRoleLayer, RequireRoleService};
pub use models::{ActorContext, Capability, EntityType, UnknownEntityType};
pub use policy::{FieldPolicy, PermissionSnapshot, ScopedPolicy};
pub use projection::{FieldPermissionDenied, Record};
pub use roles::{Role, RoleState, UnknownRole};
pub use schema::EntitySchema;
