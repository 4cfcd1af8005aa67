//! Single field decision.

use std::path::Path;

use anyhow::Result;
use assetdesk_core::rbac::{Capability, EntityType, Role};
use clap::Args;
use serde::Serialize;

use super::load_policy;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct CanArgs {
    /// Role as a session would carry it; unknown values act as USER
    role: String,

    /// Entity type (asset, user, ticket)
    entity: String,

    /// Field name
    field: String,
}

#[derive(Debug, Serialize)]
struct Decision {
    requested_role: String,
    role: Role,
    entity: EntityType,
    field: String,
    capability: Capability,
    can_view: bool,
    can_edit: bool,
}

pub fn execute(args: CanArgs, matrix: Option<&Path>, format: OutputFormat) -> Result<()> {
    let policy = load_policy(matrix)?;

    let entity: EntityType = args.entity.parse()?;
    let role = Role::resolve(&args.role);
    let decision = Decision {
        role,
        entity,
        capability: policy.lookup(role, entity, &args.field),
        can_view: policy.can_view_raw(&args.role, &args.entity, &args.field)?,
        can_edit: policy.can_edit_raw(&args.role, &args.entity, &args.field)?,
        requested_role: args.role,
        field: args.field,
    };

    match format {
        OutputFormat::Table => {
            if !decision.requested_role.eq_ignore_ascii_case(role.as_str()) {
                output::print_warning(&format!(
                    "Unknown role '{}', evaluated as {}",
                    decision.requested_role, role
                ));
            }
            output::print_header(&format!("{}.{} as {}", entity, decision.field, role));
            output::print_detail(
                "Capability",
                &output::capability_cell(decision.capability.as_str()),
            );
            output::print_detail("View", &output::yes_no(decision.can_view));
            output::print_detail("Edit", &output::yes_no(decision.can_edit));
        }
        _ => output::print_item(&decision, format)?,
    }

    Ok(())
}
