pub mod can;
pub mod health;
pub mod matrix;
pub mod project;
pub mod whoami;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use assetdesk_core::rbac::{EntitySchema, FieldPolicy, PermissionMatrix};

/// Load the matrix from `path`, or the built-in one.
pub fn load_policy(path: Option<&Path>) -> Result<FieldPolicy> {
    match path {
        Some(path) => {
            let matrix = read_matrix(path)?;
            Ok(FieldPolicy::new(Arc::new(matrix)))
        }
        None => FieldPolicy::builtin().context("Built-in permission matrix is invalid"),
    }
}

/// Parse and validate a matrix file against the built-in schema.
pub fn read_matrix(path: &Path) -> Result<PermissionMatrix> {
    PermissionMatrix::from_file(path, EntitySchema::builtin())
        .with_context(|| format!("Invalid permission matrix {}", path.display()))
}
