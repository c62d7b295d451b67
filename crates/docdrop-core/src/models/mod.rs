//! Domain models shared by the client, the coordinator and the CLI.
//!
//! Field names follow the remote service's camelCase JSON so the same types
//! travel over the wire unchanged.

pub mod commit;
pub mod object;
pub mod outcome;
pub mod soa;
pub mod upload;

pub use commit::{
    CommitReport, DatasetFileTicketInfo, PendingCommitEntry, PendingRemoval, RejectedAttachment,
};
pub use object::{ModelObject, PropertyValues, ITEM_REVISION_TYPE};
pub use outcome::{CommitOutcome, OutcomeContext};
pub use soa::{
    CommitInfo, CreateAttachInput, CreateAttachOutput, CreateAttachResponse, CreateData,
    CreatedDataset, DataToBeRelated, RenderRequest,
};
pub use upload::{DatasetFileInfo, SourceFile, Ticket, UploadResponse, UploadTask};
