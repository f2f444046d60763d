//! ClippingKK GraphQL transport: one `createClippings` mutation per batch.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{BatchSink, UploadError};
use crate::models::ClippingInput;

const OPERATION_NAME: &str = "createClippings";
const CREATE_CLIPPINGS_MUTATION: &str = "
mutation createClippings($payload: [ClippingInput!]!, $visible: Boolean) {
    createClippings(payload: $payload, visible: $visible) {
        id
    }
}
";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphQlRequest<'a> {
    operation_name: &'static str,
    query: &'static str,
    variables: CreateClippingsVariables<'a>,
}

#[derive(Debug, Serialize)]
struct CreateClippingsVariables<'a> {
    payload: &'a [ClippingInput],
    visible: bool,
}

/// `data` stays untyped: the batch succeeds on an empty error list whatever
/// shape the server gives the created rows.
#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// Async client bound to one endpoint and a fixed header set.
#[derive(Debug, Clone)]
pub struct GraphQlClient {
    http: Client,
    endpoint: String,
}

impl GraphQlClient {
    pub fn new(
        endpoint: &str,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut header_map = HeaderMap::new();
        header_map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("invalid header name: {}", name))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("invalid value for header {}", name))?;
            header_map.insert(name, value);
        }

        let http = Client::builder()
            .timeout(timeout)
            .default_headers(header_map)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl BatchSink for GraphQlClient {
    async fn send(&self, batch: &[ClippingInput]) -> Result<usize, UploadError> {
        let request = GraphQlRequest {
            operation_name: OPERATION_NAME,
            query: CREATE_CLIPPINGS_MUTATION,
            variables: CreateClippingsVariables {
                payload: batch,
                visible: true,
            },
        };

        let resp = self.http.post(&self.endpoint).json(&request).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(UploadError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GraphQlResponse = serde_json::from_str(&body)?;
        if let Some(first) = parsed.errors.as_ref().and_then(|e| e.first()) {
            return Err(UploadError::Remote(first.message.clone()));
        }
        Ok(acknowledged_rows(parsed.data.as_ref()))
    }
}

/// Best-effort count of `data.createClippings`; 0 when the shape is unexpected.
fn acknowledged_rows(data: Option<&Value>) -> usize {
    data.and_then(|d| d.get("createClippings"))
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}
