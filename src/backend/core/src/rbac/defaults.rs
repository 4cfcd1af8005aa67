//! Built-in permission matrix and startup loading.
//!
//! The default table lives in `permissions.toml` at the crate root and is
//! compiled into the binary, so the audited file and the enforced table are
//! the same bytes.

use std::sync::{Arc, OnceLock};
use tracing::info;

use super::matrix::{MatrixError, PermissionMatrix};
use super::schema::EntitySchema;

/// Source of the compiled-in matrix.
pub const BUILTIN_MATRIX: &str = include_str!("../../permissions.toml");

static BUILTIN: OnceLock<Result<Arc<PermissionMatrix>, MatrixError>> = OnceLock::new();

/// The compiled-in matrix, parsed and validated on first use.
pub fn builtin_matrix() -> Result<Arc<PermissionMatrix>, MatrixError> {
    BUILTIN
        .get_or_init(|| {
            PermissionMatrix::from_toml_str(BUILTIN_MATRIX, EntitySchema::builtin()).map(Arc::new)
        })
        .clone()
}

/// Load the matrix the process will enforce: `path` if given, otherwise the
/// built-in table. Any error must abort startup.
pub fn load_matrix(path: Option<&str>) -> Result<Arc<PermissionMatrix>, MatrixError> {
    let (matrix, source) = match path {
        Some(path) => (
            Arc::new(PermissionMatrix::from_file(path, EntitySchema::builtin())?),
            path,
        ),
        None => (builtin_matrix()?, "builtin"),
    };

    info!(
        source = source,
        grants = matrix.entries().len(),
        "Permission matrix loaded"
    );
    Ok(matrix)
}
