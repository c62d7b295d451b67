use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{DatasetFileInfo, ModelObject, Ticket, UploadTask};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetFileTicketInfo {
    pub dataset_file_info: DatasetFileInfo,
    pub ticket: Ticket,
}

/// A successfully uploaded file waiting to be committed to its attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCommitEntry {
    pub dataset: ModelObject,
    pub create_new_version: bool,
    pub dataset_file_ticket_infos: Vec<DatasetFileTicketInfo>,
}

impl PendingCommitEntry {
    /// Commit entry for a finished upload. Always creates a new version.
    pub fn for_upload(task: &UploadTask) -> Self {
        Self {
            dataset: task.attachment.to_reference(),
            create_new_version: true,
            dataset_file_ticket_infos: vec![DatasetFileTicketInfo {
                dataset_file_info: task.file_info.clone(),
                ticket: task.ticket.clone(),
            }],
        }
    }

    pub fn file_name(&self) -> &str {
        self.dataset_file_ticket_infos
            .first()
            .map(|info| info.dataset_file_info.file_name.as_str())
            .unwrap_or_default()
    }
}

/// Result of a commit call the server answered.
///
/// The server may refuse individual attachments of a batch while committing
/// the rest; those are listed in `rejected` by uid, with the reason.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitReport {
    pub rejected: BTreeMap<String, String>,
}

impl CommitReport {
    pub fn all_committed() -> Self {
        Self::default()
    }

    pub fn reject(mut self, uid: impl Into<String>, reason: impl Into<String>) -> Self {
        self.rejected.insert(uid.into(), reason.into());
        self
    }

    pub fn rejection(&self, uid: &str) -> Option<&str> {
        self.rejected.get(uid).map(String::as_str)
    }

    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// An attachment created for a drop that has nothing to upload into it.
/// It counts as a failed file and is removed from its container.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedAttachment {
    pub attachment: ModelObject,
    pub container: ModelObject,
    pub file_name: String,
    pub reason: String,
}

/// Attachments to detach from one container after their upload failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRemoval {
    pub parent_obj: ModelObject,
    pub children_obj: Vec<ModelObject>,
}

impl PendingRemoval {
    /// Add `child` to the group for `parent`, creating the group if needed.
    pub fn add_to_group(groups: &mut Vec<PendingRemoval>, parent: &ModelObject, child: ModelObject) {
        match groups.iter_mut().find(|g| &g.parent_obj == parent) {
            Some(group) => group.children_obj.push(child),
            None => groups.push(PendingRemoval {
                parent_obj: parent.to_reference(),
                children_obj: vec![child],
            }),
        }
    }
}
