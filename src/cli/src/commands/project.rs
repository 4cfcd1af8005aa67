//! Local projection of JSON records.
//!
//! Reads a record (or, for `read`, a list of records) from a file or stdin and
//! prints what the given role would receive or be allowed to write.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use assetdesk_core::rbac::{EntityType, FieldPolicy, Record, Role};
use clap::{Args, Subcommand};
use serde_json::Value;

use super::load_policy;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Strip fields the role may not view
    Read(ProjectArgs),

    /// Validate a partial update; fails if any field is not editable
    Write(ProjectArgs),
}

#[derive(Args)]
pub struct ProjectArgs {
    /// Role as a session would carry it; unknown values act as USER
    #[arg(short, long)]
    role: String,

    /// Entity type (asset, user, ticket)
    #[arg(short, long)]
    entity: EntityType,

    /// JSON input file (stdin when omitted)
    #[arg(short, long)]
    input: Option<PathBuf>,
}

pub fn execute(cmd: ProjectCommands, matrix: Option<&Path>, format: OutputFormat) -> Result<()> {
    let policy = load_policy(matrix)?;

    let projected = match cmd {
        ProjectCommands::Read(args) => {
            let input = read_input(args.input.as_deref())?;
            project_read(&policy, Role::resolve(&args.role), args.entity, input)?
        }
        ProjectCommands::Write(args) => {
            let input = read_input(args.input.as_deref())?;
            let Value::Object(payload) = input else {
                bail!("Write payload must be a JSON object");
            };
            let accepted =
                policy.project_for_write(Role::resolve(&args.role), args.entity, payload)?;
            Value::Object(accepted)
        }
    };

    output::print_item(&projected, format)
}

fn project_read(
    policy: &FieldPolicy,
    role: Role,
    entity: EntityType,
    input: Value,
) -> Result<Value> {
    match input {
        Value::Object(record) => Ok(Value::Object(policy.project_for_read(role, entity, &record))),
        Value::Array(items) => {
            let records = items
                .into_iter()
                .map(|item| match item {
                    Value::Object(record) => Ok(record),
                    other => bail!("Expected a JSON object in list, got {other}"),
                })
                .collect::<Result<Vec<Record>>>()?;
            Ok(Value::Array(
                policy
                    .project_many(role, entity, &records)
                    .into_iter()
                    .map(Value::Object)
                    .collect(),
            ))
        }
        _ => bail!("Input must be a JSON object or an array of objects"),
    }
}

fn read_input(path: Option<&Path>) -> Result<Value> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("Input is not valid JSON")
}
