//! Field permission evaluator.
//!
//! The evaluator answers the question:
//! "May role R view (or edit) field F of entity type E?"
//!
//! It is a pure layer over the immutable [`PermissionMatrix`]: no I/O, no
//! locks, no logging. Unknown fields are denied; unknown entity types can
//! only reach it through the string entry points, which reject them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::defaults;
use super::matrix::{EntityGrants, MatrixError, PermissionMatrix};
use super::models::{Capability, EntityType, UnknownEntityType};
use super::roles::Role;

// ═══════════════════════════════════════════════════════════════════════════════
// Field Policy
// ═══════════════════════════════════════════════════════════════════════════════

/// Evaluator over a shared permission matrix.
///
/// Cheap to clone; all clones read the same matrix.
#[derive(Debug, Clone)]
pub struct FieldPolicy {
    matrix: Arc<PermissionMatrix>,
}

impl FieldPolicy {
    pub fn new(matrix: Arc<PermissionMatrix>) -> Self {
        Self { matrix }
    }

    /// Evaluator over the compiled-in matrix.
    pub fn builtin() -> Result<Self, MatrixError> {
        defaults::builtin_matrix().map(Self::new)
    }

    pub fn matrix(&self) -> &PermissionMatrix {
        &self.matrix
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Single-field checks
    // ─────────────────────────────────────────────────────────────────────────

    pub fn lookup(&self, role: Role, entity: EntityType, field: &str) -> Capability {
        self.matrix.lookup(role, entity, field)
    }

    /// `lookup(..) != None`.
    pub fn can_view(&self, role: Role, entity: EntityType, field: &str) -> bool {
        self.lookup(role, entity, field).can_view()
    }

    /// `lookup(..) == Edit`.
    pub fn can_edit(&self, role: Role, entity: EntityType, field: &str) -> bool {
        self.lookup(role, entity, field).can_edit()
    }

    /// `can_view` for raw session/request values.
    ///
    /// The role is resolved leniently (unknown roles act as `USER`); the
    /// entity type must be one of the closed set.
    pub fn can_view_raw(
        &self,
        role: &str,
        entity: &str,
        field: &str,
    ) -> Result<bool, UnknownEntityType> {
        let entity: EntityType = entity.parse()?;
        Ok(self.can_view(Role::resolve(role), entity, field))
    }

    /// `can_edit` for raw session/request values. See [`can_view_raw`].
    ///
    /// [`can_view_raw`]: FieldPolicy::can_view_raw
    pub fn can_edit_raw(
        &self,
        role: &str,
        entity: &str,
        field: &str,
    ) -> Result<bool, UnknownEntityType> {
        let entity: EntityType = entity.parse()?;
        Ok(self.can_edit(Role::resolve(role), entity, field))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Field-set filters
    // ─────────────────────────────────────────────────────────────────────────

    /// The subset of `candidates` that `role` may view.
    ///
    /// Candidates the matrix does not know are excluded.
    pub fn viewable_fields<I, S>(
        &self,
        role: Role,
        entity: EntityType,
        candidates: I,
    ) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        filter(self.grants(role, entity).viewable(), candidates)
    }

    /// The subset of `candidates` that `role` may edit.
    pub fn editable_fields<I, S>(
        &self,
        role: Role,
        entity: EntityType,
        candidates: I,
    ) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        filter(self.grants(role, entity).editable(), candidates)
    }

    pub(crate) fn grants(&self, role: Role, entity: EntityType) -> &EntityGrants {
        self.matrix.grants(role, entity)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Role binding
    // ─────────────────────────────────────────────────────────────────────────

    /// Bind a resolved role for the duration of a request.
    pub fn for_role(&self, role: Role) -> ScopedPolicy<'_> {
        ScopedPolicy { policy: self, role }
    }

    /// Everything `role` may see or change, for client-side rendering.
    pub fn snapshot(&self, role: Role) -> PermissionSnapshot {
        let entities: BTreeMap<EntityType, BTreeMap<String, Capability>> = EntityType::ALL
            .into_iter()
            .map(|entity| {
                let fields: BTreeMap<String, Capability> = self
                    .grants(role, entity)
                    .iter()
                    .map(|(field, capability)| (field.to_string(), capability))
                    .collect();
                (entity, fields)
            })
            .collect();

        PermissionSnapshot {
            role,
            is_admin: role.is_admin(),
            is_technician: role.is_technician(),
            is_user: role.is_user(),
            entities,
        }
    }
}

fn filter<I, S>(allowed: &BTreeSet<String>, candidates: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    candidates
        .into_iter()
        .filter(|field| allowed.contains(field.as_ref()))
        .map(|field| field.as_ref().to_string())
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Role-bound view
// ═══════════════════════════════════════════════════════════════════════════════

/// The evaluator with the actor's role already applied.
#[derive(Debug, Clone, Copy)]
pub struct ScopedPolicy<'a> {
    pub(crate) policy: &'a FieldPolicy,
    pub(crate) role: Role,
}

impl<'a> ScopedPolicy<'a> {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn is_technician(&self) -> bool {
        self.role.is_technician()
    }

    pub fn is_user(&self) -> bool {
        self.role.is_user()
    }

    pub fn can_view(&self, entity: EntityType, field: &str) -> bool {
        self.policy.can_view(self.role, entity, field)
    }

    pub fn can_edit(&self, entity: EntityType, field: &str) -> bool {
        self.policy.can_edit(self.role, entity, field)
    }

    pub fn viewable_fields<I, S>(&self, entity: EntityType, candidates: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.policy.viewable_fields(self.role, entity, candidates)
    }

    pub fn editable_fields<I, S>(&self, entity: EntityType, candidates: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.policy.editable_fields(self.role, entity, candidates)
    }

    pub fn snapshot(&self) -> PermissionSnapshot {
        self.policy.snapshot(self.role)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Snapshot
// ═══════════════════════════════════════════════════════════════════════════════

/// Serialized grants of one role, served to UI clients.
///
/// Only fields with `VIEW` or `EDIT` are listed; anything absent is denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSnapshot {
    pub role: Role,
    pub is_admin: bool,
    pub is_technician: bool,
    pub is_user: bool,
    pub entities: BTreeMap<EntityType, BTreeMap<String, Capability>>,
}

impl PermissionSnapshot {
    pub fn capability(&self, entity: EntityType, field: &str) -> Capability {
        self.entities
            .get(&entity)
            .and_then(|fields| fields.get(field))
            .copied()
            .unwrap_or_default()
    }

    pub fn can_view(&self, entity: EntityType, field: &str) -> bool {
        self.capability(entity, field).can_view()
    }

    pub fn can_edit(&self, entity: EntityType, field: &str) -> bool {
        self.capability(entity, field).can_edit()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
