//! Upload/commit coordination and the create-document-on-drop flow.

pub mod coordinator;
pub mod create_doc;
pub mod debounce;
pub mod error;
pub mod state;

pub use coordinator::{CommitSession, CoordinatorConfig, UploadCommitCoordinator};
pub use create_doc::{
    derive_document_name, parse_create_preference, CreateDocOnDrop, CreateMode, DropContext,
    DropOutcome, DropRequest, CREATE_DOC_PREFERENCE,
};
pub use debounce::Debounce;
pub use error::DropError;
pub use state::{failure_message, Action, CoordinatorState, Event, Phase};
