//! Access-control data models: entity types, capabilities and actor context.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::roles::{Role, RoleState};

// ═══════════════════════════════════════════════════════════════════════════════
// Entity Types
// ═══════════════════════════════════════════════════════════════════════════════

/// Closed set of record kinds whose fields are permissioned independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Asset,
    User,
    Ticket,
}

impl EntityType {
    pub const ALL: [EntityType; 3] = [EntityType::Asset, EntityType::User, EntityType::Ticket];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::User => "user",
            Self::Ticket => "ticket",
        }
    }

    pub(crate) const fn index(&self) -> usize {
        match self {
            Self::Asset => 0,
            Self::User => 1,
            Self::Ticket => 2,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A caller named an entity type outside the closed set.
///
/// This is a programming error at the call site, not a per-request failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown entity type: {0}")]
pub struct UnknownEntityType(pub String);

impl FromStr for EntityType {
    type Err = UnknownEntityType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asset" => Ok(Self::Asset),
            "user" => Ok(Self::User),
            "ticket" => Ok(Self::Ticket),
            other => Err(UnknownEntityType(other.to_string())),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Capability
// ═══════════════════════════════════════════════════════════════════════════════

/// Access level a role holds on one field of one entity type.
///
/// Ordered `None < View < Edit`; `Edit` implies `View`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    #[default]
    None,
    View,
    Edit,
}

impl Capability {
    pub const fn can_view(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub const fn can_edit(&self) -> bool {
        matches!(self, Self::Edit)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::View => "VIEW",
            Self::Edit => "EDIT",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Actor Context
// ═══════════════════════════════════════════════════════════════════════════════

/// Who is acting on this request, as established by the auth collaborator.
///
/// Created once per request and threaded explicitly into evaluator calls;
/// the engine reads it and never stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    /// Authenticated user id, if any.
    pub user_id: Option<String>,
    /// Role resolution state.
    pub role: RoleState,
    /// Request ID for correlation.
    pub request_id: String,
}

impl ActorContext {
    /// Context for a request whose actor has not been established.
    pub fn unresolved(request_id: impl Into<String>) -> Self {
        Self {
            user_id: None,
            role: RoleState::Unresolved,
            request_id: request_id.into(),
        }
    }

    /// Context for an authenticated actor.
    pub fn resolved(
        user_id: impl Into<String>,
        role: Role,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: Some(user_id.into()),
            role: RoleState::Resolved(role),
            request_id: request_id.into(),
        }
    }

    /// The resolved role, or `None` while unresolved.
    pub fn role(&self) -> Option<Role> {
        self.role.role()
    }

    pub fn is_resolved(&self) -> bool {
        self.role.is_resolved()
    }
}
