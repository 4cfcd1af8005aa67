//! Field projection: applies evaluator decisions to concrete records.
//!
//! - **Read path**: keeps exactly the viewable keys of a record. Other keys
//!   are removed, not nulled, so a missing field is distinguishable from a
//!   legitimately null one. Never fails.
//! - **Write path**: accepts a payload only if every key is editable.
//!   A single disallowed key rejects the whole payload; nothing is dropped
//!   silently.
//!
//! Records are JSON objects (`serde_json::Map`), which is what the HTTP
//! layer receives and returns.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::models::EntityType;
use super::policy::{FieldPolicy, ScopedPolicy};
use super::roles::Role;

/// A JSON record.
pub type Record = Map<String, Value>;

/// A write payload contained fields the actor's role cannot edit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{role} may not edit {entity} field(s): {}", .fields.join(", "))]
pub struct FieldPermissionDenied {
    pub role: Role,
    pub entity: EntityType,
    /// Offending keys, sorted.
    pub fields: Vec<String>,
}

impl FieldPermissionDenied {
    /// Message safe to show to the end user.
    pub fn user_message(&self) -> String {
        format!(
            "You are not allowed to change the following {} field(s): {}",
            self.entity,
            self.fields.join(", ")
        )
    }
}

impl FieldPolicy {
    /// The role-scoped view of `record`.
    pub fn project_for_read(&self, role: Role, entity: EntityType, record: &Record) -> Record {
        let viewable = self.grants(role, entity).viewable();
        record
            .iter()
            .filter(|(key, _)| viewable.contains(key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// [`project_for_read`] over a list of records.
    ///
    /// [`project_for_read`]: FieldPolicy::project_for_read
    pub fn project_many(&self, role: Role, entity: EntityType, records: &[Record]) -> Vec<Record> {
        records
            .iter()
            .map(|record| self.project_for_read(role, entity, record))
            .collect()
    }

    /// Serialize `record` and project it.
    ///
    /// A value that does not serialize to a JSON object has no fields and
    /// projects to an empty record.
    pub fn project_serialize<T: Serialize>(
        &self,
        role: Role,
        entity: EntityType,
        record: &T,
    ) -> Result<Record, serde_json::Error> {
        match serde_json::to_value(record)? {
            Value::Object(map) => Ok(self.project_for_read(role, entity, &map)),
            _ => Ok(Record::new()),
        }
    }

    /// Validate a partial-record write. Returns the payload unchanged when
    /// every key is editable.
    pub fn project_for_write(
        &self,
        role: Role,
        entity: EntityType,
        payload: Record,
    ) -> Result<Record, FieldPermissionDenied> {
        let editable = self.grants(role, entity).editable();
        let mut denied: Vec<String> = payload
            .keys()
            .filter(|key| !editable.contains(key.as_str()))
            .cloned()
            .collect();

        if denied.is_empty() {
            return Ok(payload);
        }

        denied.sort();
        Err(FieldPermissionDenied {
            role,
            entity,
            fields: denied,
        })
    }
}

impl<'a> ScopedPolicy<'a> {
    pub fn project_for_read(&self, entity: EntityType, record: &Record) -> Record {
        self.policy.project_for_read(self.role, entity, record)
    }

    pub fn project_many(&self, entity: EntityType, records: &[Record]) -> Vec<Record> {
        self.policy.project_many(self.role, entity, records)
    }

    pub fn project_serialize<T: Serialize>(
        &self,
        entity: EntityType,
        record: &T,
    ) -> Result<Record, serde_json::Error> {
        self.policy.project_serialize(self.role, entity, record)
    }

    pub fn project_for_write(
        &self,
        entity: EntityType,
        payload: Record,
    ) -> Result<Record, FieldPermissionDenied> {
        self.policy.project_for_write(self.role, entity, payload)
    }
}
