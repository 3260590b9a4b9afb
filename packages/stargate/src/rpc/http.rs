//! JSON-RPC over HTTP POST.

use crate::error::RpcError;

use super::jsonrpc::{JsonRpcRequest, JsonRpcResponse};

/// A JSON-RPC client over plain HTTP. Each call is a single request/response
/// pair; no correlation state survives beyond the call.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    url: String,
}

impl HttpClient {
    pub fn new(url: impl Into<String>) -> Self {
        HttpClient {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn execute(&self, request: JsonRpcRequest) -> Result<serde_json::Value, RpcError> {
        let raw_body = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let response: JsonRpcResponse =
            serde_json::from_str(&raw_body).map_err(|_| RpcError::InvalidResponse {
                message: format!("Unable to parse JSON response: {raw_body}"),
            })?;
        response.into_result()
    }
}
