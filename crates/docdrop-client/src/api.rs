//! Service operations used by the drop flow and the coordinator.
//!
//! Request/response shapes that only matter on the wire are defined here;
//! shared shapes come from `docdrop_core::models`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use docdrop_core::models::{
    CommitReport, CreateAttachInput, CreateAttachResponse, ModelObject, PendingCommitEntry,
    PendingRemoval, RenderRequest,
};
use docdrop_core::{CommitBackend, DocumentService, PartialError, PlmError, PlmResult};

use crate::{partial_errors_by_uid, SoaClient};

pub const PREFERENCE_SERVICE: &str = "Administration-2012-09-PreferenceManagement";
pub const CREATE_SERVICE: &str = "Core-2016-09-DataManagement";
pub const RELATION_SERVICE: &str = "Core-2006-03-DataManagement";
pub const FILE_SERVICE: &str = "Core-2006-03-FileManagement";
pub const REMOVE_SERVICE: &str = "Core-2014-10-DataManagement";
pub const RENDER_SERVICE: &str = "DocumentManagement-2013-12-PrintOrRender";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreferenceDefinition {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreferenceValues {
    #[serde(default)]
    values: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreferenceEntry {
    #[serde(default)]
    definition: PreferenceDefinition,
    #[serde(default)]
    values: PreferenceValues,
}

#[derive(Debug, Deserialize)]
struct PreferencesResponse {
    #[serde(default)]
    response: Vec<PreferenceEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelationInput<'a> {
    primary_object: ModelObject,
    secondary_object: ModelObject,
    relation_type: &'a str,
    client_id: &'a str,
    user_data: Value,
}

impl SoaClient {
    /// First value of preference `name`; `None` when undefined or empty.
    pub async fn get_string_preference(&self, name: &str) -> PlmResult<Option<String>> {
        let response: PreferencesResponse = self
            .post_soa_unchecked(
                PREFERENCE_SERVICE,
                "getPreferences",
                &json!({
                    "preferenceNames": [name],
                    "includePreferenceDescriptions": false
                }),
            )
            .await?;

        let value = response
            .response
            .into_iter()
            .find(|entry| entry.definition.name.is_empty() || entry.definition.name == name)
            .and_then(|entry| entry.values.values.into_iter().next());

        tracing::debug!(preference = name, value = ?value, "Read preference");
        Ok(value)
    }
}

#[async_trait]
impl DocumentService for SoaClient {
    async fn string_preference(&self, name: &str) -> PlmResult<Option<String>> {
        self.get_string_preference(name).await
    }

    async fn create_attach_and_submit(
        &self,
        inputs: &[CreateAttachInput],
    ) -> PlmResult<CreateAttachResponse> {
        self.post_soa(
            CREATE_SERVICE,
            "createAttachAndSubmitObjects",
            &json!({ "inputs": inputs }),
        )
        .await
    }

    async fn paste_objects(
        &self,
        target: &ModelObject,
        objects: &[ModelObject],
        relation_type: &str,
    ) -> PlmResult<()> {
        if objects.is_empty() {
            return Ok(());
        }

        let input: Vec<RelationInput<'_>> = objects
            .iter()
            .map(|object| RelationInput {
                primary_object: target.to_reference(),
                secondary_object: object.to_reference(),
                relation_type,
                client_id: "",
                user_data: Value::Null,
            })
            .collect();

        let _: Value = self
            .post_soa(RELATION_SERVICE, "createRelations", &json!({ "input": input }))
            .await?;
        Ok(())
    }

    async fn submit_render(&self, requests: &[RenderRequest]) -> PlmResult<()> {
        let _: Value = self
            .post_soa(
                RENDER_SERVICE,
                "renderSubmitRequest",
                &json!({ "input": requests }),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CommitBackend for SoaClient {
    /// Partial errors reported for a dataset of the batch reject only that
    /// dataset; one without a uid fails the whole batch.
    async fn commit_dataset_files(
        &self,
        entries: &[PendingCommitEntry],
    ) -> PlmResult<CommitReport> {
        let response: Value = self
            .post_soa_unchecked(
                FILE_SERVICE,
                "commitDatasetFiles",
                &json!({ "commitInput": entries }),
            )
            .await?;

        let mut report = CommitReport::all_committed();
        for (uid, errors) in partial_errors_by_uid(&response) {
            let Some(uid) = uid else {
                return Err(PlmError::PartialErrors {
                    operation: "commitDatasetFiles".to_string(),
                    errors,
                });
            };
            if !entries.iter().any(|entry| entry.dataset.uid == uid) {
                tracing::warn!(uid = %uid, "Commit reported errors for a dataset outside the batch");
                continue;
            }
            let reason = errors
                .iter()
                .map(PartialError::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            tracing::warn!(uid = %uid, reason = %reason, "Dataset was not committed");
            report = report.reject(uid, reason);
        }
        Ok(report)
    }

    async fn remove_children(&self, removal: &PendingRemoval) -> PlmResult<()> {
        let _: Value = self
            .post_soa(
                REMOVE_SERVICE,
                "removeChildren",
                &json!({ "inputData": [removal] }),
            )
            .await?;
        Ok(())
    }
}
