//! Request/response correlation and subscription routing over a
//! [ReconnectingSocket].
//!
//! Plain requests are matched back to their caller by JSON-RPC id.
//! Subscriptions register a long-lived broadcast channel keyed by the
//! subscription query; Tendermint tags every pushed event with the query it
//! matched, which is what the demultiplexer routes on.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, warn};

use crate::error::RpcError;

use super::jsonrpc::{JsonRpcRequest, JsonRpcResponse};
use super::socket::{ReconnectingSocket, SocketEvent};

const SUBSCRIPTION_CHANNEL_CAPACITY: usize = 256;

/// One event pushed for an active subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionEvent {
    /// The query this event matched, e.g. `tm.event='NewBlock'`.
    pub query: String,
    /// The `data` payload: `{"type": ..., "value": ...}`.
    pub data: serde_json::Value,
    /// The aggregated event attributes, if the node sent them.
    pub events: Option<serde_json::Value>,
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;
type Subscriptions = Arc<Mutex<HashMap<String, broadcast::Sender<SubscriptionEvent>>>>;

/// A JSON-RPC client over a resilient WebSocket connection.
pub struct WebsocketClient {
    socket: Arc<ReconnectingSocket>,
    pending: Pending,
    subscriptions: Subscriptions,
}

impl WebsocketClient {
    /// Connect to the given ws:// or wss:// URL.
    pub fn new(url: impl Into<String>) -> Result<Self, RpcError> {
        Self::with_socket(ReconnectingSocket::new(url))
    }

    pub fn with_socket(socket: ReconnectingSocket) -> Result<Self, RpcError> {
        let socket = Arc::new(socket);
        let events = socket.subscribe();
        socket.connect()?;
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let subscriptions: Subscriptions = Arc::new(Mutex::new(HashMap::new()));
        tokio::spawn(demux(events, pending.clone(), subscriptions.clone()));
        Ok(WebsocketClient {
            socket,
            pending,
            subscriptions,
        })
    }

    /// Send a request and wait for the response with the matching id.
    pub async fn execute(&self, request: JsonRpcRequest) -> Result<serde_json::Value, RpcError> {
        let id = request.id;
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        let payload = serde_json::to_string(&request)?;
        if let Err(err) = self.socket.queue_request(payload) {
            self.pending.lock().remove(&id);
            return Err(err);
        }
        match rx.await {
            Ok(response) => response.into_result(),
            // The demultiplexer dropped us: the connection completed without
            // an answer for this id. Requests lost in a reconnect are not
            // replayed.
            Err(_) => Err(RpcError::ResponseDropped { id }),
        }
    }

    /// Start a subscription for the given query and return its event stream.
    ///
    /// Subscribing twice to the same query shares one underlying
    /// subscription. Dropping the receiver does not affect the connection;
    /// call [WebsocketClient::unsubscribe] to stop the server-side stream.
    pub async fn subscribe(
        &self,
        query: &str,
    ) -> Result<broadcast::Receiver<SubscriptionEvent>, RpcError> {
        // Register the handler before talking to the server so no event can
        // slip through between the ack and the registration.
        let (receiver, fresh) = {
            let mut subscriptions = self.subscriptions.lock();
            match subscriptions.get(query) {
                Some(tx) => (tx.subscribe(), false),
                None => {
                    let (tx, rx) = broadcast::channel(SUBSCRIPTION_CHANNEL_CAPACITY);
                    subscriptions.insert(query.to_owned(), tx);
                    (rx, true)
                }
            }
        };
        if fresh {
            let request = JsonRpcRequest::new("subscribe", json!({ "query": query }));
            if let Err(err) = self.execute(request).await {
                self.subscriptions.lock().remove(query);
                return Err(err);
            }
        }
        Ok(receiver)
    }

    /// Stop the subscription for the given query and complete its stream.
    pub async fn unsubscribe(&self, query: &str) -> Result<(), RpcError> {
        let request = JsonRpcRequest::new("unsubscribe", json!({ "query": query }));
        self.execute(request).await?;
        self.subscriptions.lock().remove(query);
        Ok(())
    }

    /// Tear down the underlying socket. Terminal.
    pub fn disconnect(&self) {
        self.socket.disconnect();
    }
}

async fn demux(
    mut events: broadcast::Receiver<SocketEvent>,
    pending: Pending,
    subscriptions: Subscriptions,
) {
    loop {
        match events.recv().await {
            Ok(SocketEvent::Message(text)) => {
                let response: JsonRpcResponse = match serde_json::from_str(&text) {
                    Ok(response) => response,
                    Err(err) => {
                        debug!("Dropping unparseable inbound message: {err}");
                        continue;
                    }
                };
                let query = response
                    .result
                    .as_ref()
                    .and_then(|result| result.get("query"))
                    .and_then(|query| query.as_str())
                    .map(ToOwned::to_owned);
                if let Some(query) = query {
                    let result = response.result.expect("checked above");
                    let event = SubscriptionEvent {
                        data: result.get("data").cloned().unwrap_or(serde_json::Value::Null),
                        events: result.get("events").cloned(),
                        query: query.clone(),
                    };
                    if let Some(tx) = subscriptions.lock().get(&query) {
                        let _ = tx.send(event);
                    }
                    continue;
                }
                if let Some(id) = response.numeric_id() {
                    if let Some(tx) = pending.lock().remove(&id) {
                        let _ = tx.send(response);
                    }
                }
            }
            Ok(SocketEvent::Completed) => {
                // Dropping the senders fails pending callers and completes
                // subscription streams.
                pending.lock().clear();
                subscriptions.lock().clear();
                return;
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Inbound event stream lagged, skipped {skipped} messages");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    /// A fake Tendermint RPC endpoint: answers every request with an ack and
    /// pushes two events after a subscribe.
    async fn spawn_fake_node() -> (u16, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(_) => return,
                };
                tokio::spawn(async move {
                    let mut ws = match tokio_tungstenite::accept_async(stream).await {
                        Ok(ws) => ws,
                        Err(_) => return,
                    };
                    while let Some(Ok(Message::Text(text))) = ws.next().await {
                        let request: serde_json::Value = serde_json::from_str(&text).unwrap();
                        let id = request["id"].clone();
                        let method = request["method"].as_str().unwrap_or_default().to_owned();
                        let ack = json!({"jsonrpc": "2.0", "id": id, "result": {}});
                        if ws.send(Message::Text(ack.to_string())).await.is_err() {
                            return;
                        }
                        if method == "subscribe" {
                            let query = request["params"]["query"].as_str().unwrap().to_owned();
                            for height in [101, 102] {
                                let event = json!({
                                    "jsonrpc": "2.0",
                                    "id": request["id"],
                                    "result": {
                                        "query": query,
                                        "data": {
                                            "type": "tendermint/event/NewBlockHeader",
                                            "value": {"header": {"height": height.to_string()}},
                                        },
                                    },
                                });
                                if ws.send(Message::Text(event.to_string())).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                });
            }
        });
        (port, handle)
    }

    #[tokio::test]
    async fn execute_pairs_responses_by_id() {
        let (port, server) = spawn_fake_node().await;
        let client = WebsocketClient::new(format!("ws://127.0.0.1:{port}/websocket")).unwrap();
        let result = client
            .execute(JsonRpcRequest::new("status", json!({})))
            .await
            .unwrap();
        assert_eq!(result, json!({}));
        client.disconnect();
        server.abort();
    }

    #[tokio::test]
    async fn subscriptions_stream_events_in_order() {
        let (port, server) = spawn_fake_node().await;
        let client = WebsocketClient::new(format!("ws://127.0.0.1:{port}/websocket")).unwrap();
        let mut events = client.subscribe("tm.event='NewBlockHeader'").await.unwrap();

        let first = events.recv().await.unwrap();
        assert_eq!(first.query, "tm.event='NewBlockHeader'");
        assert_eq!(first.data["value"]["header"]["height"], "101");
        let second = events.recv().await.unwrap();
        assert_eq!(second.data["value"]["header"]["height"], "102");

        client.disconnect();
        server.abort();
    }

    #[tokio::test]
    async fn disconnect_completes_subscription_streams_and_fails_pending() {
        let (port, server) = spawn_fake_node().await;
        let client = WebsocketClient::new(format!("ws://127.0.0.1:{port}/websocket")).unwrap();
        let mut events = client.subscribe("tm.event='Tx'").await.unwrap();
        // Drain the two pushed events
        let _ = events.recv().await.unwrap();
        let _ = events.recv().await.unwrap();

        client.disconnect();
        loop {
            match events.recv().await {
                Err(broadcast::error::RecvError::Closed) => break,
                Ok(_) => continue,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
        server.abort();
    }
}
