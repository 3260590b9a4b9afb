//! A typed client for the Tendermint RPC method set, over either transport.

pub mod responses;

use base64::Engine;
use serde_json::json;
use tokio::sync::broadcast;

use crate::error::RpcError;
use crate::rpc::{JsonRpcRequest, RpcTransport, SubscriptionEvent};

use responses::*;

/// Parameters for `abci_query`.
#[derive(Clone, Debug)]
pub struct AbciQueryParams {
    /// Query path, e.g. `/cosmos.auth.v1beta1.Query/Account`.
    pub path: String,
    /// Protobuf-encoded request payload.
    pub data: Vec<u8>,
    /// Block height to query at, or `None` for the latest state.
    pub height: Option<u64>,
    pub prove: bool,
}

/// Parameters for `tx_search`.
#[derive(Clone, Debug)]
pub struct TxSearchParams {
    /// A Tendermint query, e.g. `tx.hash='...'` or `message.sender='...'`.
    pub query: String,
    pub prove: bool,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// A client for one Tendermint node.
///
/// Use [TendermintClient::connect] with an `http(s)://` URL for plain HTTP
/// or a `ws(s)://` URL for the resilient streaming connection (required for
/// the `subscribe_*` methods).
pub struct TendermintClient {
    transport: RpcTransport,
}

impl TendermintClient {
    pub async fn connect(url: &str) -> Result<Self, RpcError> {
        let client = TendermintClient {
            transport: RpcTransport::for_url(url)?,
        };
        // Say hi to the backend; also verifies we are actually talking to a
        // Tendermint RPC endpoint before anything else uses this client.
        client.status().await?;
        Ok(client)
    }

    /// Build a client without the initial status check.
    pub fn new(transport: RpcTransport) -> Self {
        TendermintClient { transport }
    }

    pub fn disconnect(&self) {
        self.transport.disconnect();
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, RpcError> {
        let result = self
            .transport
            .execute(JsonRpcRequest::new(method, params))
            .await?;
        decode_response(result)
    }

    pub async fn status(&self) -> Result<StatusResponse, RpcError> {
        self.call("status", json!({})).await
    }

    pub async fn abci_query(
        &self,
        params: AbciQueryParams,
    ) -> Result<AbciQueryResponse, RpcError> {
        let mut request = json!({
            "path": params.path,
            "data": hex::encode(&params.data),
            "prove": params.prove,
        });
        if let Some(height) = params.height {
            request["height"] = json!(height.to_string());
        }
        let wrapper: AbciQueryWrapper = self.call("abci_query", request).await?;
        Ok(wrapper.response)
    }

    pub async fn broadcast_tx_sync(&self, tx: &[u8]) -> Result<BroadcastTxSyncResponse, RpcError> {
        self.call("broadcast_tx_sync", broadcast_params(tx)).await
    }

    pub async fn broadcast_tx_async(&self, tx: &[u8]) -> Result<BroadcastTxSyncResponse, RpcError> {
        self.call("broadcast_tx_async", broadcast_params(tx)).await
    }

    pub async fn broadcast_tx_commit(
        &self,
        tx: &[u8],
    ) -> Result<BroadcastTxCommitResponse, RpcError> {
        self.call("broadcast_tx_commit", broadcast_params(tx)).await
    }

    pub async fn block(&self, height: Option<u64>) -> Result<BlockResponse, RpcError> {
        self.call("block", height_params(height)).await
    }

    /// Block headers filtered by `min_height <= height <= max_height`.
    pub async fn blockchain(
        &self,
        min_height: Option<u64>,
        max_height: Option<u64>,
    ) -> Result<BlockchainResponse, RpcError> {
        let mut params = json!({});
        if let Some(min) = min_height {
            params["minHeight"] = json!(min.to_string());
        }
        if let Some(max) = max_height {
            params["maxHeight"] = json!(max.to_string());
        }
        self.call("blockchain", params).await
    }

    pub async fn commit(&self, height: Option<u64>) -> Result<CommitResponse, RpcError> {
        self.call("commit", height_params(height)).await
    }

    /// Get a single transaction by hash (raw bytes, not hex).
    pub async fn tx(&self, hash: &[u8], prove: bool) -> Result<TxResponse, RpcError> {
        let params = json!({
            "hash": base64::engine::general_purpose::STANDARD.encode(hash),
            "prove": prove,
        });
        self.call("tx", params).await
    }

    pub async fn tx_search(&self, params: TxSearchParams) -> Result<TxSearchResponse, RpcError> {
        let mut request = json!({
            "query": params.query,
            "prove": params.prove,
        });
        if let Some(page) = params.page {
            request["page"] = json!(page.to_string());
        }
        if let Some(per_page) = params.per_page {
            request["per_page"] = json!(per_page.to_string());
        }
        self.call("tx_search", request).await
    }

    /// Paginate through all `tx_search` results, starting at the page given
    /// in the params (or page 1).
    pub async fn tx_search_all(
        &self,
        params: TxSearchParams,
    ) -> Result<TxSearchResponse, RpcError> {
        let mut page = params.page.unwrap_or(1);
        let mut txs = Vec::new();
        loop {
            let response = self
                .tx_search(TxSearchParams {
                    page: Some(page),
                    ..params.clone()
                })
                .await?;
            let total_count = response.total_count;
            txs.extend(response.txs);
            if (txs.len() as u64) < total_count {
                page += 1;
            } else {
                break;
            }
        }
        Ok(TxSearchResponse {
            total_count: txs.len() as u64,
            txs,
        })
    }

    pub async fn validators(
        &self,
        height: Option<u64>,
        page: Option<u32>,
        per_page: Option<u32>,
    ) -> Result<ValidatorsResponse, RpcError> {
        let mut params = height_params(height);
        if let Some(page) = page {
            params["page"] = json!(page.to_string());
        }
        if let Some(per_page) = per_page {
            params["per_page"] = json!(per_page.to_string());
        }
        self.call("validators", params).await
    }

    /// Subscribe to new blocks. Requires the WebSocket transport.
    pub async fn subscribe_new_block(&self) -> Result<EventStream<NewBlockEvent>, RpcError> {
        self.subscribe("tm.event='NewBlock'").await
    }

    /// Subscribe to new block headers. Requires the WebSocket transport.
    pub async fn subscribe_new_block_header(
        &self,
    ) -> Result<EventStream<NewBlockHeaderEvent>, RpcError> {
        self.subscribe("tm.event='NewBlockHeader'").await
    }

    /// Subscribe to transaction inclusion events, optionally filtered by an
    /// additional query fragment. Requires the WebSocket transport.
    pub async fn subscribe_tx(&self, query: Option<&str>) -> Result<EventStream<TxEvent>, RpcError> {
        match query {
            Some(extra) => self.subscribe(&format!("tm.event='Tx' AND {extra}")).await,
            None => self.subscribe("tm.event='Tx'").await,
        }
    }

    async fn subscribe<T: serde::de::DeserializeOwned>(
        &self,
        query: &str,
    ) -> Result<EventStream<T>, RpcError> {
        let client = self
            .transport
            .streaming()
            .ok_or_else(|| RpcError::InvalidResponse {
                message: "Subscriptions require a WebSocket connection".to_owned(),
            })?;
        let receiver = client.subscribe(query).await?;
        Ok(EventStream {
            receiver,
            _marker: std::marker::PhantomData,
        })
    }
}

/// A typed stream of subscription events.
///
/// Each instance delivers every event of its subscription in arrival order;
/// independent instances for the same query each see the full sequence.
/// `recv` returns `None` once the connection has been explicitly
/// disconnected. Dropping the stream stops delivery to this consumer only.
pub struct EventStream<T> {
    receiver: broadcast::Receiver<SubscriptionEvent>,
    _marker: std::marker::PhantomData<T>,
}

impl<T: serde::de::DeserializeOwned> EventStream<T> {
    pub async fn recv(&mut self) -> Option<Result<T, RpcError>> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    let value = event.data.get("value").cloned().unwrap_or(event.data);
                    return Some(decode_response(value));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event consumer lagged, skipped {skipped} events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

fn broadcast_params(tx: &[u8]) -> serde_json::Value {
    json!({ "tx": base64::engine::general_purpose::STANDARD.encode(tx) })
}

fn height_params(height: Option<u64>) -> serde_json::Value {
    match height {
        Some(height) => json!({ "height": height.to_string() }),
        None => json!({}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abci_query_params_hex_encode_payload() {
        let params = json!({
            "path": "/cosmos.auth.v1beta1.Query/Account",
            "data": hex::encode([0x0a, 0x03]),
            "prove": false,
        });
        assert_eq!(params["data"], "0a03");
    }

    #[test]
    fn height_params_are_stringified() {
        assert_eq!(height_params(Some(42)), json!({"height": "42"}));
        assert_eq!(height_params(None), json!({}));
    }
}
