//! Resolve a bearer token against a running server.

use anyhow::Result;
use assetdesk_core::rbac::PermissionSnapshot;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct WhoamiArgs {
    /// Bearer token (JWT)
    #[arg(short, long, env = "ASSETDESK_TOKEN", hide_env_values = true)]
    token: String,
}

#[derive(Debug, Serialize, Tabled)]
struct FieldRow {
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Capability")]
    capability: String,
}

pub async fn execute(args: WhoamiArgs, client: ApiClient, format: OutputFormat) -> Result<()> {
    let client = client.with_token(args.token);
    let snapshot: PermissionSnapshot = client.get("/api/v1/permissions").await?;

    match format {
        OutputFormat::Table => {
            output::print_header("Actor");
            output::print_detail("Role", snapshot.role.as_str());
            output::print_detail("Admin", &output::yes_no(snapshot.is_admin));
            output::print_detail("Technician", &output::yes_no(snapshot.is_technician));
            output::print_detail("User", &output::yes_no(snapshot.is_user));

            let rows: Vec<FieldRow> = snapshot
                .entities
                .iter()
                .flat_map(|(entity, fields)| {
                    fields.iter().map(move |(field, capability)| FieldRow {
                        entity: entity.to_string(),
                        field: field.clone(),
                        capability: output::capability_cell(capability.as_str()),
                    })
                })
                .collect();
            output::print_header("Fields");
            output::print_list(&rows, format)?;
        }
        _ => output::print_item(&snapshot, format)?,
    }

    Ok(())
}
