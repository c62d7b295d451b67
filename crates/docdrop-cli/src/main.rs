//! docdrop: drop files onto a PLM container from the command line.
//!
//! Reads PLM_BASE_URL and the other PLM_* variables (or `.env`). Uses the
//! forwarded session cookie or a Bearer token for auth.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;

use docdrop_cli::{
    build_flow, create_mode_json, drop_outcome_json, init_tracing, read_source_files,
};
use docdrop_core::models::ModelObject;
use docdrop_core::Config;
use docdrop_upload::{DropOutcome, DropRequest, CREATE_DOC_PREFERENCE};

#[derive(Parser)]
#[command(name = "docdrop", about = "Create documents from dropped files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drop files onto a target container
    #[command(name = "drop")]
    DropFiles {
        /// UID of the target container
        #[arg(long)]
        target_uid: String,
        /// Type of the target container
        #[arg(long, default_value = "Folder")]
        target_type: String,
        /// Files to drop
        #[arg(required = true)]
        files: Vec<std::path::PathBuf>,
    },
    /// Show how a drop would be handled
    Preference,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration. Set PLM_BASE_URL")?;
    let flow = build_flow(&config)?;

    match cli.command {
        Commands::DropFiles {
            target_uid,
            target_type,
            files,
        } => {
            let request = DropRequest {
                target: ModelObject::new(target_uid, target_type),
                files: read_source_files(&files)?,
            };
            let outcome = flow.handle_drop(request).await?;
            if let DropOutcome::Committed(committed) = &outcome {
                for message in &committed.failure_messages {
                    tracing::warn!(message = %message, "File not delivered");
                }
            }
            print_json(&drop_outcome_json(&outcome)?)?;
        }
        Commands::Preference => {
            let mode = flow.create_mode().await?;
            let mut value = create_mode_json(&mode);
            value["preference"] = serde_json::Value::from(CREATE_DOC_PREFERENCE);
            print_json(&value)?;
        }
    }

    Ok(())
}
