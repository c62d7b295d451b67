//! Request and response shapes of the remote document operations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{DatasetFileTicketInfo, ModelObject};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateData {
    pub bo_name: String,
    pub property_name_values: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataToBeRelated {
    pub attach_files: Vec<String>,
}

/// One entry of a create-and-attach request: a business object plus the
/// file names to create attachments for.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAttachInput {
    pub client_id: String,
    pub create_data: CreateData,
    pub data_to_be_related: DataToBeRelated,
}

impl CreateAttachInput {
    pub fn new(
        client_id: impl Into<String>,
        bo_name: impl Into<String>,
        object_name: impl Into<String>,
        attach_files: Vec<String>,
    ) -> Self {
        let mut property_name_values = BTreeMap::new();
        property_name_values.insert("object_name".to_string(), vec![object_name.into()]);
        Self {
            client_id: client_id.into(),
            create_data: CreateData {
                bo_name: bo_name.into(),
                property_name_values,
            },
            data_to_be_related: DataToBeRelated { attach_files },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    pub dataset: ModelObject,
    #[serde(default)]
    pub dataset_file_ticket_infos: Vec<DatasetFileTicketInfo>,
}

/// Attachment placeholder created by the service, with its upload ticket.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedDataset {
    pub dataset: ModelObject,
    #[serde(default)]
    pub commit_info: Vec<CommitInfo>,
}

impl CreatedDataset {
    /// Ticket info of the first file slot of this attachment.
    pub fn ticket_info(&self) -> Option<&DatasetFileTicketInfo> {
        self.commit_info
            .first()
            .and_then(|c| c.dataset_file_ticket_infos.first())
    }

    /// Attachment type name (e.g. "PDF", "MSWordX").
    pub fn dataset_type(&self) -> &str {
        self.commit_info
            .first()
            .map(|c| c.dataset.type_name.as_str())
            .unwrap_or(self.dataset.type_name.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAttachOutput {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub objects: Vec<ModelObject>,
    #[serde(default)]
    pub datasets: Vec<CreatedDataset>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAttachResponse {
    #[serde(default)]
    pub output: Vec<CreateAttachOutput>,
}

impl CreateAttachResponse {
    /// The output for the single input sent; empty when the server
    /// returned none.
    pub fn into_first_output(self) -> CreateAttachOutput {
        self.output.into_iter().next().unwrap_or_default()
    }
}

/// Request to render a printable rendition of a created object.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    pub client_id: String,
    pub render_objs: Vec<ModelObject>,
    pub preserve: bool,
    pub extra_info: BTreeMap<String, String>,
}

impl RenderRequest {
    pub fn for_object(object: &ModelObject) -> Self {
        Self {
            client_id: String::new(),
            render_objs: vec![object.to_reference()],
            preserve: false,
            extra_info: BTreeMap::new(),
        }
    }
}
