//! HTTP client for the PLM server.
//!
//! Provides a client for the JSON service gateway with configurable auth
//! (session cookie or Bearer token), a generic envelope-aware POST helper and
//! implementations of the `docdrop-core` service traits. The file upload
//! endpoint lives in [`fms`].

pub mod api;
pub mod fms;

use std::time::Duration;

use docdrop_core::{Config, PartialError, PlmError, PlmResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub use fms::FmsUploader;

/// Client identifier sent in every request header.
pub const CLIENT_ID: &str = "docdrop";

/// Path of the JSON service gateway below the base URL.
pub const SOA_PATH: &str = "/tc/JsonRestServices";

/// Authentication strategy for the server.
#[derive(Clone, Debug)]
pub enum Auth {
    /// No credentials attached.
    Anonymous,
    /// `Cookie: {cookie}` of an authenticated browser session.
    SessionCookie(String),
    /// `Authorization: Bearer {token}`
    Bearer(String),
}

impl Auth {
    /// Bearer token wins over a session cookie when both are configured.
    pub fn from_config(config: &Config) -> Self {
        match (config.bearer_token(), config.session_cookie()) {
            (Some(token), _) => Auth::Bearer(token.to_string()),
            (None, Some(cookie)) => Auth::SessionCookie(cookie.to_string()),
            (None, None) => Auth::Anonymous,
        }
    }

    pub(crate) fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Auth::Anonymous => request,
            Auth::SessionCookie(cookie) => request.header(reqwest::header::COOKIE, cookie.as_str()),
            Auth::Bearer(token) => request.header("Authorization", format!("Bearer {}", token)),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestState<'a> {
    #[serde(rename = "clientID")]
    client_id: &'a str,
    stateless: bool,
}

#[derive(Serialize)]
struct RequestHeader<'a> {
    state: RequestState<'a>,
    policy: Value,
}

#[derive(Serialize)]
struct Envelope<'a, B: Serialize> {
    header: RequestHeader<'a>,
    body: &'a B,
}

/// HTTP client for the PLM JSON service gateway.
#[derive(Clone, Debug)]
pub struct SoaClient {
    client: Client,
    base_url: String,
    auth: Auth,
}

impl SoaClient {
    pub fn new(base_url: &str, auth: Auth, timeout: Duration) -> PlmResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlmError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn from_config(config: &Config) -> PlmResult<Self> {
        Self::new(
            config.base_url(),
            Auth::from_config(config),
            config.request_timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn service_url(&self, service: &str, operation: &str) -> String {
        self.build_url(&format!("{}/{}/{}", SOA_PATH, service, operation))
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    /// Raw client for custom requests. Caller must apply auth.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Call a service operation and deserialize its response. Partial errors
    /// in `ServiceData` fail the call.
    pub async fn post_soa<T: DeserializeOwned, B: Serialize>(
        &self,
        service: &str,
        operation: &str,
        body: &B,
    ) -> PlmResult<T> {
        let value = self.post_soa_value(service, operation, body).await?;

        let errors = partial_errors(&value);
        if !errors.is_empty() {
            tracing::warn!(
                service,
                operation,
                count = errors.len(),
                first_code = errors[0].code,
                "Service reported partial errors"
            );
            return Err(PlmError::PartialErrors {
                operation: operation.to_string(),
                errors,
            });
        }

        Ok(serde_json::from_value(value)?)
    }

    /// Like [`post_soa`](Self::post_soa) but leaves partial errors to the caller.
    pub async fn post_soa_unchecked<T: DeserializeOwned, B: Serialize>(
        &self,
        service: &str,
        operation: &str,
        body: &B,
    ) -> PlmResult<T> {
        let value = self.post_soa_value(service, operation, body).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn post_soa_value<B: Serialize>(
        &self,
        service: &str,
        operation: &str,
        body: &B,
    ) -> PlmResult<Value> {
        let url = self.service_url(service, operation);
        let envelope = Envelope {
            header: RequestHeader {
                state: RequestState {
                    client_id: CLIENT_ID,
                    stateless: true,
                },
                policy: Value::Object(Default::default()),
            },
            body,
        };

        tracing::debug!(service, operation, "Calling service");
        let request = self.auth.apply(self.client.post(&url).json(&envelope));
        let response = request
            .send()
            .await
            .map_err(|e| PlmError::Transport(format!("{} {}: {}", service, operation, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PlmError::Http {
                operation: operation.to_string(),
                status: status.as_u16(),
                body: error_text,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| PlmError::Transport(format!("Failed to read response: {}", e)))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

/// Collect `ServiceData.partialErrors[].errorValues[]` from a response.
pub fn partial_errors(response: &Value) -> Vec<PartialError> {
    partial_errors_by_uid(response)
        .into_iter()
        .flat_map(|(_, errors)| errors)
        .collect()
}

/// Partial errors grouped by the uid of the object they were reported for.
/// Entries without a `uid` concern the call as a whole.
pub fn partial_errors_by_uid(response: &Value) -> Vec<(Option<String>, Vec<PartialError>)> {
    let Some(partials) = response
        .get("ServiceData")
        .and_then(|sd| sd.get("partialErrors"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    partials
        .iter()
        .filter_map(|p| {
            let errors: Vec<PartialError> = p
                .get("errorValues")
                .and_then(Value::as_array)?
                .iter()
                .filter_map(|v| serde_json::from_value::<PartialError>(v.clone()).ok())
                .collect();
            if errors.is_empty() {
                return None;
            }
            let uid = p
                .get("uid")
                .and_then(Value::as_str)
                .filter(|uid| !uid.is_empty())
                .map(str::to_string);
            Some((uid, errors))
        })
        .collect()
}
