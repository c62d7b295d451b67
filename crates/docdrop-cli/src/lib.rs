//! Helpers shared by the `docdrop` binary.

use std::path::{Component, Path};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{json, Value};

use docdrop_client::{FmsUploader, SoaClient};
use docdrop_core::models::SourceFile;
use docdrop_core::Config;
use docdrop_infra::{init_telemetry, CookieCredentials, LogFormat, TracingEventSink};
use docdrop_upload::{
    CoordinatorConfig, CreateDocOnDrop, CreateMode, DropOutcome, UploadCommitCoordinator,
};

/// Initialize tracing for the CLI. Honors `RUST_LOG` and `LOG_FORMAT`.
pub fn init_tracing() {
    if let Err(e) = init_telemetry("docdrop=info", LogFormat::from_env()) {
        eprintln!("Failed to initialize tracing: {}", e);
    }
}

/// Read dropped files from disk. The file name (without directories) becomes
/// the attachment name.
pub fn read_source_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<SourceFile>> {
    paths
        .iter()
        .map(|path| {
            let path = path.as_ref();
            if path.components().any(|c| c == Component::ParentDir) {
                return Err(anyhow::anyhow!("Invalid input: {}", path.display()));
            }
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .with_context(|| format!("Not a file path: {}", path.display()))?;
            let content = std::fs::read(path)
                .with_context(|| format!("Failed to read file: {}", path.display()))?;
            Ok(SourceFile::new(name, content))
        })
        .collect()
}

/// Wire the drop flow against the configured server.
pub fn build_flow(config: &Config) -> Result<CreateDocOnDrop> {
    let soa = Arc::new(SoaClient::from_config(config).context("Failed to create PLM client")?);
    let credentials = Arc::new(CookieCredentials::new(config.client.session_cookie.clone()));
    let uploader = Arc::new(FmsUploader::from_client(&soa, credentials));

    let coordinator = UploadCommitCoordinator::new(
        soa.clone(),
        uploader,
        Arc::new(TracingEventSink),
        CoordinatorConfig::from(&config.commit),
    );

    Ok(CreateDocOnDrop::new(
        soa,
        coordinator,
        config.create_doc_preference.clone(),
    ))
}

pub fn create_mode_json(mode: &CreateMode) -> Value {
    match mode {
        CreateMode::DefaultPaste => json!({ "mode": "default_paste" }),
        CreateMode::ShowCreatePanel { object_type } => {
            json!({ "mode": "show_create_panel", "objectType": object_type })
        }
        CreateMode::CreateSilently { object_type } => {
            json!({ "mode": "create_silently", "objectType": object_type })
        }
    }
}

pub fn drop_outcome_json(outcome: &DropOutcome) -> Result<Value> {
    Ok(match outcome {
        DropOutcome::Committed(outcome) => json!({
            "result": "committed",
            "outcome": serde_json::to_value(outcome).context("Serialize outcome")?,
        }),
        DropOutcome::CreatePanelRequested {
            object_type,
            suggested_name,
        } => json!({
            "result": "create_panel_requested",
            "objectType": object_type,
            "suggestedName": suggested_name,
        }),
        DropOutcome::DefaultPaste => json!({ "result": "default_paste" }),
    })
}
