//! The permission matrix: `Role → EntityType → field → Capability`.
//!
//! The matrix is the single source of truth for field-level decisions. It is
//! built once, validated at construction and never mutated afterwards, so it
//! can be shared by any number of threads without locking.
//!
//! Grants are declared as independent `view` and `edit` lists per
//! `(role, entity)` pair. Construction rejects:
//!
//! - an `edit` grant without a matching `view` grant (never upgraded),
//! - roles or entity types outside the closed sets,
//! - fields that are not part of the entity schema.
//!
//! Anything not declared is `Capability::None`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use thiserror::Error;

use super::models::{Capability, EntityType};
use super::roles::Role;
use super::schema::EntitySchema;

const ROLE_COUNT: usize = Role::ALL.len();
const ENTITY_COUNT: usize = EntityType::ALL.len();

// ═══════════════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Matrix construction failures. All of them are startup-fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatrixError {
    #[error("{role}.{entity}.{field} is editable but not viewable")]
    EditWithoutView {
        role: Role,
        entity: EntityType,
        field: String,
    },

    #[error("Unknown role in matrix declaration: {0}")]
    UnknownRole(String),

    #[error("Unknown entity type in matrix declaration: {0}")]
    UnknownEntity(String),

    #[error("Field '{field}' is not part of the {entity} schema")]
    UnknownField { entity: EntityType, field: String },

    #[error("Invalid matrix declaration: {0}")]
    Parse(String),

    #[error("Failed to read matrix file {path}: {message}")]
    Io { path: String, message: String },
}

// ═══════════════════════════════════════════════════════════════════════════════
// Per-(role, entity) grants
// ═══════════════════════════════════════════════════════════════════════════════

/// Resolved grants of one role on one entity type.
///
/// The viewable and editable sets are computed once at construction so the
/// evaluator never rebuilds them per request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityGrants {
    fields: BTreeMap<String, Capability>,
    viewable: BTreeSet<String>,
    editable: BTreeSet<String>,
}

impl EntityGrants {
    fn insert(&mut self, field: String, capability: Capability) {
        if capability.can_view() {
            self.viewable.insert(field.clone());
        }
        if capability.can_edit() {
            self.editable.insert(field.clone());
        }
        self.fields.insert(field, capability);
    }

    /// Capability on `field`; absent fields are `None`.
    pub fn lookup(&self, field: &str) -> Capability {
        self.fields.get(field).copied().unwrap_or_default()
    }

    /// Fields with `View` or `Edit`.
    pub fn viewable(&self) -> &BTreeSet<String> {
        &self.viewable
    }

    /// Fields with `Edit`.
    pub fn editable(&self) -> &BTreeSet<String> {
        &self.editable
    }

    /// Declared `(field, capability)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Capability)> + '_ {
        self.fields.iter().map(|(f, c)| (f.as_str(), *c))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Audit types
// ═══════════════════════════════════════════════════════════════════════════════

/// One declared grant, as listed by [`PermissionMatrix::entries`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantEntry {
    pub role: Role,
    pub entity: EntityType,
    pub field: String,
    pub capability: Capability,
}

/// A capability that differs between two matrices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantChange {
    pub role: Role,
    pub entity: EntityType,
    pub field: String,
    pub before: Capability,
    pub after: Capability,
}

impl GrantChange {
    /// Whether the change widens access.
    pub fn is_escalation(&self) -> bool {
        self.after > self.before
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Matrix
// ═══════════════════════════════════════════════════════════════════════════════

/// Immutable, validated field-permission table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionMatrix {
    grants: [[EntityGrants; ENTITY_COUNT]; ROLE_COUNT],
    schema: EntitySchema,
}

impl PermissionMatrix {
    /// Start a programmatic declaration validated against `schema`.
    pub fn builder(schema: EntitySchema) -> MatrixBuilder {
        MatrixBuilder::new(schema)
    }

    /// Parse a TOML declaration (see `permissions.toml`).
    pub fn from_toml_str(source: &str, schema: EntitySchema) -> Result<Self, MatrixError> {
        let decl: BTreeMap<String, BTreeMap<String, GrantDecl>> =
            toml::from_str(source).map_err(|e| MatrixError::Parse(e.to_string()))?;

        let mut builder = MatrixBuilder::new(schema);
        for (role_key, entities) in decl {
            let role: Role = role_key
                .parse()
                .map_err(|_| MatrixError::UnknownRole(role_key.clone()))?;
            // Role keys are case-sensitive in the file even though the
            // session parser is not.
            if role.as_str() != role_key {
                return Err(MatrixError::UnknownRole(role_key));
            }

            for (entity_key, grant) in entities {
                let entity: EntityType = entity_key
                    .parse()
                    .map_err(|_| MatrixError::UnknownEntity(entity_key.clone()))?;
                builder = builder
                    .allow_view(role, entity, grant.view)
                    .allow_edit(role, entity, grant.edit);
            }
        }

        builder.build()
    }

    /// Read and parse a TOML declaration from disk.
    pub fn from_file(path: impl AsRef<Path>, schema: EntitySchema) -> Result<Self, MatrixError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| MatrixError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&source, schema)
    }

    /// Capability of `role` on `entity.field`. Total: absent means `None`.
    pub fn lookup(&self, role: Role, entity: EntityType, field: &str) -> Capability {
        self.grants(role, entity).lookup(field)
    }

    /// All grants of `role` on `entity`.
    pub fn grants(&self, role: Role, entity: EntityType) -> &EntityGrants {
        &self.grants[role.index()][entity.index()]
    }

    /// The schema this matrix was validated against.
    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    /// Every declared grant, ordered by role, entity, then field.
    pub fn entries(&self) -> Vec<GrantEntry> {
        let mut entries = Vec::new();
        for role in Role::ALL {
            for entity in EntityType::ALL {
                for (field, capability) in self.grants(role, entity).iter() {
                    entries.push(GrantEntry {
                        role,
                        entity,
                        field: field.to_string(),
                        capability,
                    });
                }
            }
        }
        entries
    }

    /// Capabilities that change when moving from `self` to `next`.
    pub fn diff(&self, next: &PermissionMatrix) -> Vec<GrantChange> {
        let mut changes = Vec::new();
        for role in Role::ALL {
            for entity in EntityType::ALL {
                let before = self.grants(role, entity);
                let after = next.grants(role, entity);
                let fields: BTreeSet<&str> = before
                    .iter()
                    .chain(after.iter())
                    .map(|(field, _)| field)
                    .collect();

                for field in fields {
                    let (old, new) = (before.lookup(field), after.lookup(field));
                    if old != new {
                        changes.push(GrantChange {
                            role,
                            entity,
                            field: field.to_string(),
                            before: old,
                            after: new,
                        });
                    }
                }
            }
        }
        changes
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct GrantDecl {
    #[serde(default)]
    view: Vec<String>,
    #[serde(default)]
    edit: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Builder
// ═══════════════════════════════════════════════════════════════════════════════

/// Collects `view`/`edit` declarations and validates them in [`build`].
///
/// [`build`]: MatrixBuilder::build
#[derive(Debug, Clone)]
pub struct MatrixBuilder {
    schema: EntitySchema,
    view: BTreeMap<(Role, EntityType), BTreeSet<String>>,
    edit: BTreeMap<(Role, EntityType), BTreeSet<String>>,
}

impl MatrixBuilder {
    pub fn new(schema: EntitySchema) -> Self {
        Self {
            schema,
            view: BTreeMap::new(),
            edit: BTreeMap::new(),
        }
    }

    /// Grant `View` on `fields`.
    pub fn allow_view<I, S>(mut self, role: Role, entity: EntityType, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.view
            .entry((role, entity))
            .or_default()
            .extend(fields.into_iter().map(Into::into));
        self
    }

    /// Grant `Edit` on `fields`. Each field must also be granted `View`.
    pub fn allow_edit<I, S>(mut self, role: Role, entity: EntityType, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.edit
            .entry((role, entity))
            .or_default()
            .extend(fields.into_iter().map(Into::into));
        self
    }

    /// Validate and freeze the declarations.
    pub fn build(self) -> Result<PermissionMatrix, MatrixError> {
        let mut grants: [[EntityGrants; ENTITY_COUNT]; ROLE_COUNT] =
            std::array::from_fn(|_| std::array::from_fn(|_| EntityGrants::default()));

        for (&(_, entity), fields) in &self.view {
            for field in fields {
                self.check_field(entity, field)?;
            }
        }

        for (&(role, entity), fields) in &self.edit {
            let viewable = self.view.get(&(role, entity));
            for field in fields {
                self.check_field(entity, field)?;
                if !viewable.is_some_and(|v| v.contains(field)) {
                    return Err(MatrixError::EditWithoutView {
                        role,
                        entity,
                        field: field.clone(),
                    });
                }
            }
        }

        for (&(role, entity), fields) in &self.view {
            let editable = self.edit.get(&(role, entity));
            let slot = &mut grants[role.index()][entity.index()];
            for field in fields {
                let capability = if editable.is_some_and(|e| e.contains(field)) {
                    Capability::Edit
                } else {
                    Capability::View
                };
                slot.insert(field.clone(), capability);
            }
        }

        Ok(PermissionMatrix {
            grants,
            schema: self.schema,
        })
    }

    fn check_field(&self, entity: EntityType, field: &str) -> Result<(), MatrixError> {
        if self.schema.contains(entity, field) {
            Ok(())
        } else {
            Err(MatrixError::UnknownField {
                entity,
                field: field.to_string(),
            })
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> EntitySchema {
        EntitySchema::builtin()
    }

    #[test]
    fn test_builder_resolves_capabilities() {
        let matrix = PermissionMatrix::builder(schema())
            .allow_view(Role::Technician, EntityType::Ticket, ["status", "assignedToId"])
            .allow_edit(Role::Technician, EntityType::Ticket, ["status"])
            .build()
            .unwrap();

        assert_eq!(
            matrix.lookup(Role::Technician, EntityType::Ticket, "status"),
            Capability::Edit
        );
        assert_eq!(
            matrix.lookup(Role::Technician, EntityType::Ticket, "assignedToId"),
            Capability::View
        );
        assert_eq!(
            matrix.lookup(Role::Technician, EntityType::Ticket, "internalCost"),
            Capability::None
        );
    }

    #[test]
    fn test_edit_without_view_rejected() {
        let err = PermissionMatrix::builder(schema())
            .allow_edit(Role::User, EntityType::Ticket, ["title"])
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            MatrixError::EditWithoutView {
                role: Role::User,
                entity: EntityType::Ticket,
                field: "title".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = PermissionMatrix::builder(schema())
            .allow_view(Role::Admin, EntityType::Asset, ["purchaseCots"])
            .build()
            .unwrap_err();
        assert!(matches!(err, MatrixError::UnknownField { entity: EntityType::Asset, .. }));
    }

    #[test]
    fn test_fields_not_shared_across_entities() {
        let matrix = PermissionMatrix::builder(schema())
            .allow_view(Role::User, EntityType::Ticket, ["status"])
            .build()
            .unwrap();

        assert!(matrix.lookup(Role::User, EntityType::Ticket, "status").can_view());
        assert_eq!(
            matrix.lookup(Role::User, EntityType::Asset, "status"),
            Capability::None
        );
    }

    #[test]
    fn test_from_toml() {
        let source = r#"
            [TECHNICIAN.ticket]
            view = ["status", "assignedToId"]
            edit = ["status"]

            [USER.asset]
            view = ["name"]
        "#;
        let matrix = PermissionMatrix::from_toml_str(source, schema()).unwrap();

        assert_eq!(
            matrix.lookup(Role::Technician, EntityType::Ticket, "status"),
            Capability::Edit
        );
        assert_eq!(
            matrix.lookup(Role::User, EntityType::Asset, "name"),
            Capability::View
        );
        assert!(matrix.grants(Role::Admin, EntityType::Ticket).is_empty());
    }

    #[test]
    fn test_toml_rejects_unknown_keys() {
        let unknown_role = "[GUEST.ticket]\nview = [\"title\"]\n";
        assert_eq!(
            PermissionMatrix::from_toml_str(unknown_role, schema()).unwrap_err(),
            MatrixError::UnknownRole("GUEST".to_string())
        );

        let lowercase_role = "[admin.ticket]\nview = [\"title\"]\n";
        assert!(matches!(
            PermissionMatrix::from_toml_str(lowercase_role, schema()).unwrap_err(),
            MatrixError::UnknownRole(_)
        ));

        let unknown_entity = "[ADMIN.invoice]\nview = [\"id\"]\n";
        assert_eq!(
            PermissionMatrix::from_toml_str(unknown_entity, schema()).unwrap_err(),
            MatrixError::UnknownEntity("invoice".to_string())
        );

        let unknown_list = "[ADMIN.ticket]\nview = [\"id\"]\nwrite = [\"id\"]\n";
        assert!(matches!(
            PermissionMatrix::from_toml_str(unknown_list, schema()).unwrap_err(),
            MatrixError::Parse(_)
        ));
    }

    #[test]
    fn test_toml_edit_without_view() {
        let source = "[USER.user]\nview = [\"name\"]\nedit = [\"phone\"]\n";
        assert!(matches!(
            PermissionMatrix::from_toml_str(source, schema()).unwrap_err(),
            MatrixError::EditWithoutView { role: Role::User, entity: EntityType::User, .. }
        ));
    }

    #[test]
    fn test_entries_order() {
        let matrix = PermissionMatrix::builder(schema())
            .allow_view(Role::Admin, EntityType::Ticket, ["title"])
            .allow_view(Role::User, EntityType::Ticket, ["title", "status"])
            .build()
            .unwrap();

        let entries = matrix.entries();
        let keys: Vec<(Role, &str)> = entries.iter().map(|e| (e.role, e.field.as_str())).collect();
        assert_eq!(
            keys,
            vec![(Role::User, "status"), (Role::User, "title"), (Role::Admin, "title")]
        );
    }

    #[test]
    fn test_diff() {
        let before = PermissionMatrix::builder(schema())
            .allow_view(Role::User, EntityType::Ticket, ["title", "status"])
            .build()
            .unwrap();
        let after = PermissionMatrix::builder(schema())
            .allow_view(Role::User, EntityType::Ticket, ["title", "description"])
            .allow_edit(Role::User, EntityType::Ticket, ["title"])
            .build()
            .unwrap();

        let changes = before.diff(&after);
        let summary: Vec<(&str, Capability, Capability)> = changes
            .iter()
            .map(|c| (c.field.as_str(), c.before, c.after))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("description", Capability::None, Capability::View),
                ("status", Capability::View, Capability::None),
                ("title", Capability::View, Capability::Edit),
            ]
        );
        assert!(changes[0].is_escalation());
        assert!(!changes[1].is_escalation());
        assert!(before.diff(&before).is_empty());
    }
}
