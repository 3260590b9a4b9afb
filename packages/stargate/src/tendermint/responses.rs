//! Typed Tendermint RPC responses.
//!
//! The wire format carries 64-bit integers as strings and binary payloads as
//! base64 (hashes as upper-case hex), so most structs here lean on the serde
//! helpers at the bottom of the file. Unknown fields are ignored throughout,
//! which keeps the structs compatible across minor node versions.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::error::RpcError;

#[derive(Deserialize, Clone, Debug)]
pub struct NodeInfo {
    /// The chain id.
    pub network: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub moniker: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct SyncInfo {
    #[serde(default)]
    pub latest_block_hash: String,
    #[serde(deserialize_with = "u64_from_string")]
    pub latest_block_height: u64,
    pub latest_block_time: Option<DateTime<Utc>>,
    pub catching_up: bool,
}

#[derive(Deserialize, Clone, Debug)]
pub struct StatusResponse {
    pub node_info: NodeInfo,
    pub sync_info: SyncInfo,
}

#[derive(Deserialize, Clone, Debug)]
pub struct AbciQueryResponse {
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub codespace: String,
    #[serde(default, deserialize_with = "opt_base64_bytes")]
    pub key: Vec<u8>,
    #[serde(default, deserialize_with = "opt_base64_bytes")]
    pub value: Vec<u8>,
    #[serde(default, deserialize_with = "opt_u64_from_string")]
    pub height: Option<u64>,
}

/// Wrapper shape on the wire: `{"response": {...}}`.
#[derive(Deserialize, Clone, Debug)]
pub(crate) struct AbciQueryWrapper {
    pub response: AbciQueryResponse,
}

#[derive(Deserialize, Clone, Debug)]
pub struct BroadcastTxSyncResponse {
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub codespace: String,
    /// Transaction hash, upper-case hex.
    pub hash: String,
}

impl BroadcastTxSyncResponse {
    /// Whether the transaction passed mempool checks.
    pub fn is_accepted(&self) -> bool {
        self.code == 0
    }
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct ExecResult {
    #[serde(default)]
    pub code: u32,
    #[serde(default, deserialize_with = "opt_base64_bytes")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub log: String,
    #[serde(default, deserialize_with = "opt_i64_from_string")]
    pub gas_wanted: Option<i64>,
    #[serde(default, deserialize_with = "opt_i64_from_string")]
    pub gas_used: Option<i64>,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub codespace: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub attributes: Vec<EventAttribute>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct EventAttribute {
    #[serde(deserialize_with = "attr_string")]
    pub key: String,
    #[serde(default, deserialize_with = "opt_attr_string")]
    pub value: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct BroadcastTxCommitResponse {
    pub check_tx: ExecResult,
    #[serde(default)]
    pub deliver_tx: ExecResult,
    pub hash: String,
    #[serde(default, deserialize_with = "opt_u64_from_string")]
    pub height: Option<u64>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct TxResponse {
    pub hash: String,
    #[serde(deserialize_with = "u64_from_string")]
    pub height: u64,
    #[serde(default)]
    pub index: u32,
    pub tx_result: ExecResult,
    #[serde(default, deserialize_with = "opt_base64_bytes")]
    pub tx: Vec<u8>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct TxSearchResponse {
    #[serde(default)]
    pub txs: Vec<TxResponse>,
    #[serde(deserialize_with = "u64_from_string")]
    pub total_count: u64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct BlockId {
    #[serde(default)]
    pub hash: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Header {
    pub chain_id: String,
    #[serde(deserialize_with = "u64_from_string")]
    pub height: u64,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub proposer_address: String,
    #[serde(default)]
    pub app_hash: String,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct BlockData {
    #[serde(default, deserialize_with = "base64_tx_list")]
    pub txs: Vec<Vec<u8>>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Block {
    pub header: Header,
    #[serde(default)]
    pub data: BlockData,
}

#[derive(Deserialize, Clone, Debug)]
pub struct BlockResponse {
    pub block_id: BlockId,
    pub block: Block,
}

#[derive(Deserialize, Clone, Debug)]
pub struct BlockMeta {
    pub block_id: BlockId,
    pub header: Header,
    #[serde(default, deserialize_with = "opt_u64_from_string")]
    pub num_txs: Option<u64>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct BlockchainResponse {
    #[serde(deserialize_with = "u64_from_string")]
    pub last_height: u64,
    #[serde(default)]
    pub block_metas: Vec<BlockMeta>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Commit {
    #[serde(deserialize_with = "u64_from_string")]
    pub height: u64,
    #[serde(default)]
    pub round: i32,
    pub block_id: BlockId,
    /// Raw signature entries; left unparsed.
    #[serde(default)]
    pub signatures: serde_json::Value,
}

#[derive(Deserialize, Clone, Debug)]
pub struct SignedHeader {
    pub header: Header,
    pub commit: Commit,
}

#[derive(Deserialize, Clone, Debug)]
pub struct CommitResponse {
    pub signed_header: SignedHeader,
    #[serde(default)]
    pub canonical: bool,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Validator {
    pub address: String,
    pub pub_key: serde_json::Value,
    #[serde(deserialize_with = "i64_from_string")]
    pub voting_power: i64,
    #[serde(default, deserialize_with = "opt_i64_from_string")]
    pub proposer_priority: Option<i64>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ValidatorsResponse {
    #[serde(deserialize_with = "u64_from_string")]
    pub block_height: u64,
    #[serde(default)]
    pub validators: Vec<Validator>,
    #[serde(default, deserialize_with = "opt_u64_from_string")]
    pub total: Option<u64>,
}

/// Payload of a `tm.event='NewBlock'` push event.
#[derive(Deserialize, Clone, Debug)]
pub struct NewBlockEvent {
    pub block: Block,
}

/// Payload of a `tm.event='NewBlockHeader'` push event.
#[derive(Deserialize, Clone, Debug)]
pub struct NewBlockHeaderEvent {
    pub header: Header,
}

/// Payload of a `tm.event='Tx'` push event.
#[derive(Deserialize, Clone, Debug)]
pub struct TxEvent {
    #[serde(rename = "TxResult")]
    pub tx_result: TxEventResult,
}

#[derive(Deserialize, Clone, Debug)]
pub struct TxEventResult {
    #[serde(deserialize_with = "u64_from_string")]
    pub height: u64,
    #[serde(default)]
    pub index: u32,
    #[serde(default, deserialize_with = "opt_base64_bytes")]
    pub tx: Vec<u8>,
    pub result: ExecResult,
}

pub(crate) fn decode_response<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
) -> Result<T, RpcError> {
    serde_json::from_value(value).map_err(|err| RpcError::InvalidResponse {
        message: err.to_string(),
    })
}

fn u64_from_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

fn i64_from_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

fn opt_u64_from_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<u64>, D::Error> {
    let s = Option::<String>::deserialize(deserializer)?;
    match s {
        None => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn opt_i64_from_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    let s = Option::<String>::deserialize(deserializer)?;
    match s {
        None => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn opt_base64_bytes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let s = Option::<String>::deserialize(deserializer)?;
    match s {
        None => Ok(Vec::new()),
        Some(s) => base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(serde::de::Error::custom),
    }
}

fn base64_tx_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
    let list = Option::<Vec<String>>::deserialize(deserializer)?;
    list.unwrap_or_default()
        .into_iter()
        .map(|s| {
            base64::engine::general_purpose::STANDARD
                .decode(s)
                .map_err(serde::de::Error::custom)
        })
        .collect()
}

/// Event attribute keys/values are base64 on Tendermint 0.34 nodes and plain
/// strings on newer versions. Decode base64 when it yields valid UTF-8, fall
/// back to the raw string otherwise.
fn decode_attr(s: String) -> String {
    match base64::engine::general_purpose::STANDARD.decode(&s) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(decoded) => decoded,
            Err(_) => s,
        },
        Err(_) => s,
    }
}

fn attr_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(decode_attr(String::deserialize(deserializer)?))
}

fn opt_attr_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?
        .map(decode_attr)
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_status_response() {
        let status: StatusResponse = decode_response(json!({
            "node_info": {"network": "cosmoshub-4", "version": "0.34.19", "moniker": "node"},
            "sync_info": {
                "latest_block_hash": "A0B1",
                "latest_block_height": "123456",
                "latest_block_time": "2022-01-01T12:00:00.000000000Z",
                "catching_up": false,
            },
        }))
        .unwrap();
        assert_eq!(status.node_info.network, "cosmoshub-4");
        assert_eq!(status.sync_info.latest_block_height, 123_456);
        assert!(!status.sync_info.catching_up);
    }

    #[test]
    fn parses_abci_query_response_with_defaults() {
        let wrapper: AbciQueryWrapper = decode_response(json!({
            "response": {"value": "dGVzdA==", "height": "5"}
        }))
        .unwrap();
        assert_eq!(wrapper.response.code, 0);
        assert_eq!(wrapper.response.value, b"test");
        assert_eq!(wrapper.response.height, Some(5));
    }

    #[test]
    fn parses_tx_response_with_base64_attributes() {
        let tx: TxResponse = decode_response(json!({
            "hash": "DEADBEEF",
            "height": "17",
            "index": 0,
            "tx_result": {
                "code": 0,
                "log": "[]",
                "gas_wanted": "80000",
                "gas_used": "62431",
                "events": [{
                    "type": "message",
                    // base64("sender") / base64("cosmos1abc")
                    "attributes": [{"key": "c2VuZGVy", "value": "Y29zbW9zMWFiYw=="}],
                }],
            },
            "tx": "AAECAw==",
        }))
        .unwrap();
        assert_eq!(tx.height, 17);
        assert_eq!(tx.tx_result.gas_used, Some(62_431));
        let attr = &tx.tx_result.events[0].attributes[0];
        assert_eq!(attr.key, "sender");
        assert_eq!(attr.value, "cosmos1abc");
        assert_eq!(tx.tx, vec![0, 1, 2, 3]);
    }

    #[test]
    fn parses_block_response() {
        let block: BlockResponse = decode_response(json!({
            "block_id": {"hash": "CAFE"},
            "block": {
                "header": {
                    "chain_id": "testing",
                    "height": "44",
                    "time": "2023-05-01T00:00:00Z",
                },
                "data": {"txs": ["dGVzdA=="]},
            },
        }))
        .unwrap();
        assert_eq!(block.block.header.height, 44);
        assert_eq!(block.block.data.txs, vec![b"test".to_vec()]);
    }

    #[test]
    fn plain_string_attributes_survive() {
        // Newer nodes send attributes undecoded; "sender" happens to not be
        // valid base64, so it passes through unchanged.
        let event: Event = decode_response(json!({
            "type": "message",
            "attributes": [{"key": "sender!", "value": "cosmos1abc!"}],
        }))
        .unwrap();
        assert_eq!(event.attributes[0].key, "sender!");
        assert_eq!(event.attributes[0].value, "cosmos1abc!");
    }
}
