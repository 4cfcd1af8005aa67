//! Permission matrix commands.
//!
//! Provides show, check, and diff operations over matrix files.

use std::path::{Path, PathBuf};

use anyhow::Result;
use assetdesk_core::rbac::{EntityType, GrantChange, GrantEntry, Role};
use clap::Subcommand;
use colored::*;
use serde::Serialize;
use tabled::Tabled;

use super::{load_policy, read_matrix};
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum MatrixCommands {
    /// List every grant of the active matrix
    Show {
        /// Only grants of this role (ADMIN, TECHNICIAN, USER)
        #[arg(short, long)]
        role: Option<Role>,

        /// Only grants on this entity type (asset, user, ticket)
        #[arg(short, long)]
        entity: Option<EntityType>,
    },

    /// Validate a matrix file
    Check {
        /// Matrix TOML file
        file: PathBuf,
    },

    /// List capability changes between two matrix files
    Diff {
        /// Current matrix
        old: PathBuf,

        /// Proposed matrix
        new: PathBuf,
    },
}

// ── Table rows ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Tabled)]
struct GrantRow {
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Capability")]
    capability: String,
}

impl From<GrantEntry> for GrantRow {
    fn from(entry: GrantEntry) -> Self {
        Self {
            role: entry.role.to_string(),
            entity: entry.entity.to_string(),
            field: entry.field,
            capability: output::capability_cell(entry.capability.as_str()),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct ChangeRow {
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Before")]
    before: String,
    #[tabled(rename = "After")]
    after: String,
}

impl From<&GrantChange> for ChangeRow {
    fn from(change: &GrantChange) -> Self {
        let after = if change.is_escalation() {
            change.after.as_str().yellow().bold().to_string()
        } else {
            change.after.as_str().to_string()
        };
        Self {
            role: change.role.to_string(),
            entity: change.entity.to_string(),
            field: change.field.clone(),
            before: change.before.as_str().to_string(),
            after,
        }
    }
}

#[derive(Debug, Serialize)]
struct CheckReport {
    file: String,
    valid: bool,
    grants: usize,
}

// ── Execution ───────────────────────────────────────────────────────────────

pub fn execute(cmd: MatrixCommands, matrix: Option<&Path>, format: OutputFormat) -> Result<()> {
    match cmd {
        MatrixCommands::Show { role, entity } => {
            let policy = load_policy(matrix)?;
            let entries: Vec<GrantEntry> = policy
                .matrix()
                .entries()
                .into_iter()
                .filter(|e| role.map_or(true, |r| e.role == r))
                .filter(|e| entity.map_or(true, |t| e.entity == t))
                .collect();

            match format {
                OutputFormat::Table => {
                    let rows: Vec<GrantRow> = entries.into_iter().map(GrantRow::from).collect();
                    output::print_list(&rows, format)?;
                }
                _ => output::print_item(&entries, format)?,
            }
        }

        MatrixCommands::Check { file } => {
            let parsed = read_matrix(&file)?;
            let report = CheckReport {
                file: file.display().to_string(),
                valid: true,
                grants: parsed.entries().len(),
            };

            match format {
                OutputFormat::Table => output::print_success(&format!(
                    "{} is valid ({} grants)",
                    report.file, report.grants
                )),
                _ => output::print_item(&report, format)?,
            }
        }

        MatrixCommands::Diff { old, new } => {
            let before = read_matrix(&old)?;
            let after = read_matrix(&new)?;
            let changes = before.diff(&after);
            let escalations = changes.iter().filter(|c| c.is_escalation()).count();

            match format {
                OutputFormat::Table => {
                    if changes.is_empty() {
                        output::print_success("No capability changes");
                        return Ok(());
                    }
                    let rows: Vec<ChangeRow> = changes.iter().map(ChangeRow::from).collect();
                    output::print_list(&rows, format)?;
                    if escalations > 0 {
                        output::print_warning(&format!(
                            "{escalations} change(s) grant more access than before"
                        ));
                    }
                }
                _ => output::print_item(&changes, format)?,
            }
        }
    }

    Ok(())
}
