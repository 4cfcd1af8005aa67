//! Entity schemas: the known field names of each entity type.
//!
//! Stands in for the persistence layer's column lists. The matrix is
//! validated against it so a misspelled field in a grant fails at startup
//! instead of silently granting or denying nothing.

use std::collections::{BTreeMap, BTreeSet};

use super::models::EntityType;

const ASSET_FIELDS: &[&str] = &[
    "id",
    "name",
    "assetTag",
    "serialNumber",
    "category",
    "model",
    "manufacturer",
    "status",
    "location",
    "purchaseDate",
    "purchaseCost",
    "warrantyExpiresAt",
    "assignedToId",
    "notes",
    "createdAt",
    "updatedAt",
];

const USER_FIELDS: &[&str] = &[
    "id",
    "name",
    "email",
    "role",
    "department",
    "phone",
    "whatsappNumber",
    "passwordHash",
    "isActive",
    "lastLoginAt",
    "createdAt",
    "updatedAt",
];

const TICKET_FIELDS: &[&str] = &[
    "id",
    "title",
    "description",
    "status",
    "priority",
    "category",
    "assetId",
    "createdById",
    "assignedToId",
    "internalCost",
    "resolution",
    "whatsappThreadId",
    "dueAt",
    "resolvedAt",
    "createdAt",
    "updatedAt",
];

/// Field sets per entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitySchema {
    fields: BTreeMap<EntityType, BTreeSet<String>>,
}

impl EntitySchema {
    /// An empty schema. Every field is unknown until declared.
    pub fn new() -> Self {
        Self::default()
    }

    /// The AssetDesk record schema.
    pub fn builtin() -> Self {
        Self::new()
            .with_entity(EntityType::Asset, ASSET_FIELDS.iter().copied())
            .with_entity(EntityType::User, USER_FIELDS.iter().copied())
            .with_entity(EntityType::Ticket, TICKET_FIELDS.iter().copied())
    }

    /// Declare (or extend) the field set of an entity type.
    pub fn with_entity<I, S>(mut self, entity: EntityType, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields
            .entry(entity)
            .or_default()
            .extend(fields.into_iter().map(Into::into));
        self
    }

    /// Whether `field` is a column of `entity`.
    pub fn contains(&self, entity: EntityType, field: &str) -> bool {
        self.fields
            .get(&entity)
            .is_some_and(|fields| fields.contains(field))
    }

    /// All fields of `entity`, the usual candidate set for evaluator calls.
    pub fn fields(&self, entity: EntityType) -> impl Iterator<Item = &str> + '_ {
        self.fields
            .get(&entity)
            .into_iter()
            .flat_map(|fields| fields.iter().map(String::as_str))
    }
}
