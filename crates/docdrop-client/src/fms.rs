//! File upload endpoint.
//!
//! Each file is POSTed as multipart form data together with the ticket the
//! server issued for it. The server checks the anti-forgery token header
//! against the session cookie.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;

use docdrop_core::models::{SourceFile, Ticket, UploadResponse};
use docdrop_core::{PlmError, PlmResult, SessionCredentials, UploadTransport};

use crate::{Auth, SoaClient};

pub const FMS_UPLOAD_PATH: &str = "/fms/fmsupload/";
pub const XSRF_HEADER: &str = "X-XSRF-TOKEN";

const FILE_FIELD: &str = "fmsFile";
const TICKET_FIELD: &str = "fmsTicket";

pub struct FmsUploader {
    client: Client,
    url: String,
    auth: Auth,
    credentials: Arc<dyn SessionCredentials>,
}

impl FmsUploader {
    pub fn new(
        client: Client,
        base_url: &str,
        auth: Auth,
        credentials: Arc<dyn SessionCredentials>,
    ) -> Self {
        Self {
            client,
            url: format!("{}{}", base_url.trim_end_matches('/'), FMS_UPLOAD_PATH),
            auth,
            credentials,
        }
    }

    /// Share connection pool and auth with a gateway client.
    pub fn from_client(soa: &SoaClient, credentials: Arc<dyn SessionCredentials>) -> Self {
        Self::new(
            soa.client().clone(),
            soa.base_url(),
            soa.auth().clone(),
            credentials,
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl UploadTransport for FmsUploader {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn upload(&self, file: &SourceFile, ticket: &Ticket) -> PlmResult<UploadResponse> {
        let part = Part::bytes(file.content.to_vec()).file_name(file.name.clone());
        let form = Form::new()
            .part(FILE_FIELD, part)
            .text(TICKET_FIELD, ticket.as_str().to_string());

        let mut request = self.auth.apply(self.client.post(&self.url).multipart(form));
        match self.credentials.xsrf_token() {
            Some(token) => request = request.header(XSRF_HEADER, token),
            None => tracing::debug!(file_name = %file.name, "No XSRF token available for upload"),
        }

        let response = request
            .send()
            .await
            .map_err(|e| PlmError::Transport(format!("Upload of {} failed: {}", file.name, e)))?;

        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or("").to_string();
        tracing::debug!(
            file_name = %file.name,
            size = file.len(),
            status = status.as_u16(),
            "Upload finished"
        );

        Ok(UploadResponse::new(status.as_u16(), status_text))
    }
}
