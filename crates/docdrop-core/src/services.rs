//! Remote collaborator traits
//!
//! The coordinator and the drop flow only see these traits. `docdrop-client`
//! implements them over HTTP; tests implement them in memory.

use async_trait::async_trait;

use crate::error::PlmResult;
use crate::models::{
    CommitReport, CreateAttachInput, CreateAttachResponse, ModelObject, PendingCommitEntry, PendingRemoval,
    RenderRequest, SourceFile, Ticket, UploadResponse,
};

/// Document-level operations used by the create-on-drop flow.
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Read a string preference. `None` when the preference is not defined.
    async fn string_preference(&self, name: &str) -> PlmResult<Option<String>>;

    /// Create a business object and one attachment placeholder per file.
    async fn create_attach_and_submit(
        &self,
        inputs: &[CreateAttachInput],
    ) -> PlmResult<CreateAttachResponse>;

    /// Relate `objects` to `target` (paste).
    async fn paste_objects(
        &self,
        target: &ModelObject,
        objects: &[ModelObject],
        relation_type: &str,
    ) -> PlmResult<()>;

    /// Queue rendering of printable renditions.
    async fn submit_render(&self, requests: &[RenderRequest]) -> PlmResult<()>;
}

/// Finalization and cleanup calls issued by the coordinator.
#[async_trait]
pub trait CommitBackend: Send + Sync {
    /// Commit a batch of uploaded files to their attachments. `Err` means
    /// the batch as a whole failed; attachments refused individually are
    /// listed in the report.
    async fn commit_dataset_files(
        &self,
        entries: &[PendingCommitEntry],
    ) -> PlmResult<CommitReport>;

    /// Detach and delete the children of one removal group.
    async fn remove_children(&self, removal: &PendingRemoval) -> PlmResult<()>;
}

/// Generic file upload endpoint.
///
/// `Ok` carries whatever HTTP status the endpoint answered with, including
/// failures; `Err` means no HTTP response was received at all.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Endpoint identifier used in progress notifications.
    fn endpoint(&self) -> &str;

    async fn upload(&self, file: &SourceFile, ticket: &Ticket) -> PlmResult<UploadResponse>;
}

/// Source of the current session's anti-forgery token.
pub trait SessionCredentials: Send + Sync {
    fn xsrf_token(&self) -> Option<String>;
}
