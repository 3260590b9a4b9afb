//! The JSON-RPC transport layer: envelopes, id generation, the HTTP client,
//! and the resilient WebSocket client.

pub mod jsonrpc;

mod http;
mod socket;
mod websocket;

pub use http::HttpClient;
pub use jsonrpc::{next_request_id, JsonRpcRequest, JsonRpcResponse};
pub use socket::{ConnectionStatus, ReconnectingSocket, SocketEvent};
pub use websocket::{SubscriptionEvent, WebsocketClient};

use crate::error::RpcError;

/// Either of the two physical transports, behind one `execute` call.
pub enum RpcTransport {
    Http(HttpClient),
    Websocket(WebsocketClient),
}

impl RpcTransport {
    /// Pick a transport from the URL scheme: http(s) uses plain HTTP POST,
    /// ws(s) the resilient WebSocket connection.
    pub fn for_url(url: &str) -> Result<Self, RpcError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            Ok(RpcTransport::Http(HttpClient::new(url)))
        } else {
            Ok(RpcTransport::Websocket(WebsocketClient::new(url)?))
        }
    }

    pub async fn execute(&self, request: JsonRpcRequest) -> Result<serde_json::Value, RpcError> {
        match self {
            RpcTransport::Http(client) => client.execute(request).await,
            RpcTransport::Websocket(client) => client.execute(request).await,
        }
    }

    /// The WebSocket client, if this transport supports subscriptions.
    pub fn streaming(&self) -> Option<&WebsocketClient> {
        match self {
            RpcTransport::Http(_) => None,
            RpcTransport::Websocket(client) => Some(client),
        }
    }

    pub fn disconnect(&self) {
        if let RpcTransport::Websocket(client) = self {
            client.disconnect();
        }
    }
}
