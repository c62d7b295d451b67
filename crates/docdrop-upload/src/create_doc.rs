//! Create-document-on-drop.
//!
//! When files are dropped on a container, the `Dma1CreateDocOnDrop`
//! preference decides whether a new document is created around them. On the
//! silent path the document and one attachment per file are created in a
//! single call, the document is pasted into the drop target and the files
//! are handed to the [`UploadCommitCoordinator`].

use std::sync::Arc;

use docdrop_core::models::{
    CommitOutcome, CreateAttachInput, CreateAttachOutput, ModelObject, OutcomeContext,
    RejectedAttachment, RenderRequest, SourceFile, UploadTask, ITEM_REVISION_TYPE,
};
use docdrop_core::DocumentService;

use crate::coordinator::UploadCommitCoordinator;
use crate::error::{log_plm_error, DropError};

pub const CREATE_DOC_PREFERENCE: &str = "Dma1CreateDocOnDrop";

const CREATE_CLIENT_ID: &str = "CreateDocument";
const SHOW_CREATE_PANEL: &str = "ShowCreatePanel";
const DEFAULT_OBJECT_TYPE: &str = "Document";
/// Relation used when pasting the created document; empty lets the server
/// pick the target's default relation.
const PASTE_RELATION: &str = "";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateMode {
    /// Leave the drop to the host's default paste handler.
    DefaultPaste,
    /// Ask the host to show its interactive create panel.
    ShowCreatePanel { object_type: String },
    /// Create a document of `object_type` without user interaction.
    CreateSilently { object_type: String },
}

/// Interpret the preference value.
pub fn parse_create_preference(value: Option<&str>) -> CreateMode {
    let value = match value {
        Some(v) if !v.is_empty() && !v.eq_ignore_ascii_case("FALSE") => v,
        _ => return CreateMode::DefaultPaste,
    };

    if value.starts_with(SHOW_CREATE_PANEL) {
        let object_type = value
            .split_once(':')
            .map(|(_, ty)| ty.to_string())
            .unwrap_or_else(|| DEFAULT_OBJECT_TYPE.to_string());
        CreateMode::ShowCreatePanel { object_type }
    } else {
        CreateMode::CreateSilently {
            object_type: value.to_string(),
        }
    }
}

/// Name for a document created from `file_names`: the first name in sorted
/// order, without directory and extension.
pub fn derive_document_name(file_names: &[String]) -> Option<String> {
    let mut sorted: Vec<&str> = file_names.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let first = sorted.first()?;

    let separator = first.rfind('\\').or_else(|| first.rfind('/'));
    let start = separator.map(|i| i + 1).unwrap_or(0);
    let base = &first[start..];

    let name = match first.rfind('.') {
        Some(dot) if dot > start => &first[start..dot],
        _ => base,
    };
    Some(name.to_string())
}

/// File name with its trailing extension removed.
fn strip_extension(file_name: &str) -> &str {
    let dir_end = file_name.rfind('/').map(|i| i + 1).unwrap_or(0);
    match file_name.rfind('.') {
        Some(dot) if dot > dir_end => &file_name[..dot],
        _ => file_name,
    }
}

/// Files dropped onto a target container.
#[derive(Debug, Clone)]
pub struct DropRequest {
    pub target: ModelObject,
    pub files: Vec<SourceFile>,
}

impl DropRequest {
    pub fn file_names(&self) -> Vec<String> {
        self.files.iter().map(|f| f.name.clone()).collect()
    }
}

#[derive(Debug)]
pub enum DropOutcome {
    /// A document was created and the files went through upload/commit.
    Committed(CommitOutcome),
    /// The host should open its create panel, prefilled with `suggested_name`.
    CreatePanelRequested {
        object_type: String,
        suggested_name: String,
    },
    /// The host should handle the drop with its default paste handler.
    DefaultPaste,
}

/// Values owned by one drop, threaded through its steps.
#[derive(Debug, Clone)]
pub struct DropContext {
    pub object_type: String,
    pub document_name: String,
    pub target: ModelObject,
    /// Created revision; render target and cleanup container.
    pub revision: Option<ModelObject>,
    pub unattached_files: Vec<String>,
}

impl DropContext {
    fn new(object_type: String, document_name: String, target: ModelObject) -> Self {
        Self {
            object_type,
            document_name,
            target,
            revision: None,
            unattached_files: Vec::new(),
        }
    }

    /// Name reported to the user: the revision's display name when known.
    fn doc_name(&self) -> String {
        self.revision
            .as_ref()
            .and_then(|r| r.display_name())
            .map(str::to_string)
            .unwrap_or_else(|| self.document_name.clone())
    }
}

#[derive(Clone)]
pub struct CreateDocOnDrop {
    documents: Arc<dyn DocumentService>,
    coordinator: UploadCommitCoordinator,
    preference_override: Option<String>,
}

impl CreateDocOnDrop {
    pub fn new(
        documents: Arc<dyn DocumentService>,
        coordinator: UploadCommitCoordinator,
        preference_override: Option<String>,
    ) -> Self {
        Self {
            documents,
            coordinator,
            preference_override,
        }
    }

    /// Resolve the create mode, preferring the configured override.
    pub async fn create_mode(&self) -> Result<CreateMode, DropError> {
        if let Some(value) = &self.preference_override {
            tracing::debug!(value = %value, "Using configured create-document preference");
            return Ok(parse_create_preference(Some(value)));
        }

        let value = self
            .documents
            .string_preference(CREATE_DOC_PREFERENCE)
            .await
            .map_err(|source| DropError::Preference {
                name: CREATE_DOC_PREFERENCE.to_string(),
                source,
            })?;
        Ok(parse_create_preference(value.as_deref()))
    }

    #[tracing::instrument(skip(self, request), fields(target = %request.target.uid, files = request.files.len()))]
    pub async fn handle_drop(&self, request: DropRequest) -> Result<DropOutcome, DropError> {
        match self.create_mode().await? {
            CreateMode::DefaultPaste => {
                tracing::debug!("Create-on-drop disabled, using default paste");
                Ok(DropOutcome::DefaultPaste)
            }
            CreateMode::ShowCreatePanel { object_type } => {
                let suggested_name = request
                    .files
                    .first()
                    .map(|f| strip_extension(&f.name).to_string())
                    .unwrap_or_default();
                tracing::info!(object_type = %object_type, "Requesting create panel");
                Ok(DropOutcome::CreatePanelRequested {
                    object_type,
                    suggested_name,
                })
            }
            CreateMode::CreateSilently { object_type } => self
                .create_silently(object_type, request)
                .await
                .map(DropOutcome::Committed),
        }
    }

    async fn create_silently(
        &self,
        object_type: String,
        request: DropRequest,
    ) -> Result<CommitOutcome, DropError> {
        let DropRequest { target, files } = request;
        let mut file_names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        file_names.sort();
        let document_name = derive_document_name(&file_names).unwrap_or_default();
        let mut ctx = DropContext::new(object_type, document_name, target);

        let input = CreateAttachInput::new(
            CREATE_CLIENT_ID,
            ctx.object_type.clone(),
            ctx.document_name.clone(),
            file_names,
        );
        let response = self
            .documents
            .create_attach_and_submit(std::slice::from_ref(&input))
            .await
            .map_err(|source| {
                let code = source.first_partial_code();
                log_plm_error(
                    &source,
                    &format!(
                        "{} '{}' was not created; check the create-document preference",
                        ctx.object_type, ctx.document_name
                    ),
                );
                DropError::CreateFailed {
                    object_type: ctx.object_type.clone(),
                    document_name: ctx.document_name.clone(),
                    code,
                    source,
                }
            })?;

        let output = response.into_first_output();

        ctx.revision = output
            .objects
            .iter()
            .find(|o| o.is_instance_of(ITEM_REVISION_TYPE))
            .cloned();
        if ctx.revision.is_none() {
            tracing::warn!(document_name = %ctx.document_name, "No revision returned for created document");
        }

        let mut sources = files;
        let (tasks, rejected) = self.build_tasks(&ctx, &output, &mut sources);

        ctx.unattached_files = sources.into_iter().map(|f| f.name).collect();
        ctx.unattached_files.sort();
        for file_name in &ctx.unattached_files {
            tracing::warn!(
                file_name = %file_name,
                object_type = %ctx.object_type,
                "File was not attached; its type is not eligible for this document type"
            );
        }

        let created: Vec<ModelObject> = ctx.revision.iter().cloned().collect();
        self.documents
            .paste_objects(&ctx.target, &created, PASTE_RELATION)
            .await
            .map_err(|source| DropError::Paste {
                target: ctx.target.uid.clone(),
                source,
            })?;
        self.coordinator
            .events()
            .related_modified(std::slice::from_ref(&ctx.target));

        let context = OutcomeContext {
            doc_created: true,
            doc_name: ctx.doc_name(),
        };
        let mut outcome = self
            .coordinator
            .run_with_rejected(tasks, rejected, context)
            .await?;

        if let Some(revision) = &ctx.revision {
            if let Err(e) = self
                .documents
                .submit_render(&[RenderRequest::for_object(revision)])
                .await
            {
                tracing::error!(revision = %revision.uid, error = %e, "Render request failed");
            }
        }

        outcome.unattached_files = ctx.unattached_files;
        tracing::info!(
            doc_name = %outcome.doc_name,
            succeeded = outcome.success_count(),
            failed = outcome.failure_count(),
            "Document created on drop"
        );
        Ok(outcome)
    }

    /// One upload task per created attachment, matched to the first dropped
    /// file of the same name. Matched files are taken out of `sources`;
    /// attachments with no ticket or no matching file come back rejected.
    fn build_tasks(
        &self,
        ctx: &DropContext,
        output: &CreateAttachOutput,
        sources: &mut Vec<SourceFile>,
    ) -> (Vec<UploadTask>, Vec<RejectedAttachment>) {
        let container = ctx.revision.clone().unwrap_or_else(|| ctx.target.clone());
        let mut tasks = Vec::with_capacity(output.datasets.len());
        let mut rejected = Vec::new();

        for created in &output.datasets {
            let Some(ticket_info) = created.ticket_info() else {
                tracing::warn!(
                    dataset = %created.dataset.uid,
                    dataset_type = created.dataset_type(),
                    "Attachment returned without upload ticket"
                );
                rejected.push(RejectedAttachment {
                    attachment: created.dataset.to_reference(),
                    container: container.clone(),
                    file_name: created
                        .dataset
                        .display_name()
                        .unwrap_or(&created.dataset.uid)
                        .to_string(),
                    reason: "no upload ticket".to_string(),
                });
                continue;
            };
            let file_name = &ticket_info.dataset_file_info.file_name;
            let Some(index) = sources.iter().position(|f| &f.name == file_name) else {
                tracing::warn!(
                    file_name = %file_name,
                    dataset_type = created.dataset_type(),
                    "Attachment does not match any dropped file"
                );
                rejected.push(RejectedAttachment {
                    attachment: created.dataset.to_reference(),
                    container: container.clone(),
                    file_name: file_name.clone(),
                    reason: "no matching dropped file".to_string(),
                });
                continue;
            };

            tasks.push(UploadTask {
                attachment: created.dataset.clone(),
                container: container.clone(),
                file_info: ticket_info.dataset_file_info.clone(),
                ticket: ticket_info.ticket.clone(),
                source: sources.remove(index),
            });
        }

        (tasks, rejected)
    }
}
