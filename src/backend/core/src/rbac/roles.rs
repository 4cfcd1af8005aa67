//! Actor roles and their trust ordering.
//!
//! AssetDesk knows three roles:
//!
//! | Role       | Rank | Description                                              |
//! |------------|------|----------------------------------------------------------|
//! | Admin      | 3    | Manages assets, users and every ticket field              |
//! | Technician | 2    | Works tickets and maintains asset location/status         |
//! | User       | 1    | Reports tickets and reads the assets assigned to them     |
//!
//! The rank is only used for coarse "minimum role" gating. Field-level
//! decisions always go through the permission matrix, which declares every
//! role's grants explicitly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The trust class of the current actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Technician,
    Admin,
}

impl Role {
    /// All roles, lowest rank first.
    pub const ALL: [Role; 3] = [Role::User, Role::Technician, Role::Admin];

    /// Trust level, strictly increasing: `USER < TECHNICIAN < ADMIN`.
    pub const fn rank(&self) -> u8 {
        match self {
            Self::User => 1,
            Self::Technician => 2,
            Self::Admin => 3,
        }
    }

    /// Whether this role meets a minimum-role requirement.
    pub const fn at_least(&self, minimum: Role) -> bool {
        self.rank() >= minimum.rank()
    }

    /// Canonical wire name (`ADMIN`, `TECHNICIAN`, `USER`).
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Technician => "TECHNICIAN",
            Self::User => "USER",
        }
    }

    /// Resolve a session role string.
    ///
    /// Anything that is not a known role (including empty strings and
    /// corrupted values) degrades to [`Role::User`], the least-privileged
    /// role. Use [`Role::from_str`] where an unknown value must be an error,
    /// e.g. when reading the matrix declaration.
    pub fn resolve(raw: &str) -> Role {
        raw.parse().unwrap_or(Role::User)
    }

    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    pub const fn is_technician(&self) -> bool {
        matches!(self, Self::Technician)
    }

    pub const fn is_user(&self) -> bool {
        matches!(self, Self::User)
    }

    pub(crate) const fn index(&self) -> usize {
        match self {
            Self::User => 0,
            Self::Technician => 1,
            Self::Admin => 2,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by the strict role parser.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Self::Admin),
            "TECHNICIAN" => Ok(Self::Technician),
            "USER" => Ok(Self::User),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// Resolution state of the actor's role.
///
/// `Unresolved` means the auth collaborator has not (or could not) establish
/// who the actor is. It is not the same as `Resolved(Role::User)`: callers
/// must block on `Unresolved` instead of rendering least-privilege output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "role", rename_all = "lowercase")]
pub enum RoleState {
    #[default]
    Unresolved,
    Resolved(Role),
}

impl RoleState {
    /// The resolved role, if any.
    pub fn role(&self) -> Option<Role> {
        match self {
            Self::Resolved(role) => Some(*role),
            Self::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

impl From<Role> for RoleState {
    fn from(role: Role) -> Self {
        Self::Resolved(role)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
