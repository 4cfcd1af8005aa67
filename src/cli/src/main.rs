//! AssetDesk CLI - audit and exercise field-level permissions.
//!
//! Offline commands (`matrix`, `can`, `project`) evaluate a permission matrix
//! locally; `health` and `whoami` talk to a running server.

mod client;
mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{can, health, matrix, project, whoami};
use output::OutputFormat;

/// AssetDesk - field-level access control CLI
#[derive(Parser)]
#[command(
    name = "assetdesk",
    version,
    about = "AssetDesk field permission tooling",
    long_about = "Inspect, validate and diff permission matrices, evaluate field decisions \
                  and project records locally, or query a running AssetDesk server.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// API server URL
    #[arg(long, global = true, env = "ASSETDESK_API_URL")]
    api_url: Option<String>,

    /// Permission matrix TOML file (defaults to the built-in matrix)
    #[arg(long, global = true, env = "ASSETDESK_MATRIX")]
    matrix: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect, validate and diff permission matrices
    #[command(subcommand)]
    Matrix(matrix::MatrixCommands),

    /// Show whether a role may view or edit a field
    Can(can::CanArgs),

    /// Apply read or write projection to a JSON record
    #[command(subcommand)]
    Project(project::ProjectCommands),

    /// Check server health
    Health,

    /// Show the permissions a bearer token resolves to
    Whoami(whoami::WhoamiArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let api_url = cli
        .api_url
        .clone()
        .unwrap_or_else(|| "http://localhost:8080".to_string());
    let format = cli.output;
    let matrix_path = cli.matrix.as_deref();

    let result = match cli.command {
        Commands::Matrix(cmd) => matrix::execute(cmd, matrix_path, format),
        Commands::Can(args) => can::execute(args, matrix_path, format),
        Commands::Project(cmd) => project::execute(cmd, matrix_path, format),
        Commands::Health => match client::ApiClient::new(&api_url) {
            Ok(client) => health::execute(&client, format).await,
            Err(e) => Err(e),
        },
        Commands::Whoami(args) => match client::ApiClient::new(&api_url) {
            Ok(client) => whoami::execute(args, client, format).await,
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
