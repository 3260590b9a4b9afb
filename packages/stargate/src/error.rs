#![allow(missing_docs)]
//! Error types exposed by this package.

use std::time::Duration;

use crate::rpc::ConnectionStatus;

/// Errors from the pure Amino binary/bech32 pubkey codec.
#[derive(thiserror::Error, Debug)]
pub enum EncodingError {
    #[error("Public key must be compressed secp256k1, i.e. 33 bytes starting with 0x02 or 0x03")]
    InvalidSecp256k1Pubkey,
    #[error("Invalid rest data length. Expected {expected} bytes ({kind} pubkey), received {actual}")]
    InvalidPubkeyLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Unsupported public key type. Amino data starts with: {prefix_hex}")]
    UnsupportedPubkeyType { prefix_hex: String },
    #[error("Cannot uvarint-encode {value}: values over 127 are not supported by this encoder")]
    UvarintTooLarge { value: u64 },
    #[error("Unsupported pubkey variant for binary Amino encoding")]
    UnsupportedPubkeyVariant,
    #[error("Invalid bech32 data: {0}")]
    InvalidBech32(#[from] bech32::Error),
    #[error("Invalid base64 pubkey payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// Errors from the Amino message type register.
#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error(
        "Type URL {type_url} does not exist in the Amino message type register. \
         If you need support for this message type, you can pass additional converters \
         to AminoTypes::new."
    )]
    UnknownTypeUrl { type_url: String },
    #[error(
        "Type {amino_type} does not exist in the Amino message type register. \
         If you need support for this message type, you can pass additional converters \
         to AminoTypes::new."
    )]
    UnknownAminoType { amino_type: String },
    #[error("Malformed {type_url} value: {message}")]
    MalformedValue { type_url: String, message: String },
    #[error("Could not decode protobuf value for {type_url}: {source}")]
    Decode {
        type_url: String,
        source: prost::DecodeError,
    },
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

impl RegistryError {
    pub(crate) fn malformed(type_url: &str, message: impl Into<String>) -> Self {
        RegistryError::MalformedValue {
            type_url: type_url.to_owned(),
            message: message.into(),
        }
    }
}

/// Transport-level errors from the JSON-RPC layer, both HTTP and WebSocket.
#[derive(thiserror::Error, Debug)]
pub enum RpcError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("WebSocket transport error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc { code: i64, message: String },
    #[error("Unable to parse JSON-RPC response: {message}")]
    InvalidResponse { message: String },
    #[error("Cannot connect: socket is {status}, only an unconnected socket may connect")]
    CannotConnect { status: ConnectionStatus },
    #[error("Socket is disconnected and no longer accepts requests")]
    SocketClosed,
    #[error("Connection completed before a response for request {id} arrived")]
    ResponseDropped { id: u64 },
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from wallet construction and key derivation.
#[derive(thiserror::Error, Debug)]
pub enum WalletError {
    #[error("Unable to parse mnemonic from phrase")]
    InvalidPhrase,
    #[error("Invalid derivation path: {0}")]
    InvalidDerivationPath(String),
    #[error("Key derivation failed: {0}")]
    Bip32(#[from] bitcoin::util::bip32::Error),
}

/// Errors reported by an injected signer.
#[derive(thiserror::Error, Debug)]
pub enum SignerError {
    #[error("Failed to retrieve account {address} from signer")]
    AccountNotFound { address: String },
    #[error("Signer failed: {message}")]
    Failed { message: String },
}

/// Umbrella error for chain client operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Signer(#[from] SignerError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(
        "Account {address} does not exist on chain. \
         Send some tokens there before trying to query its sequence or sign with it."
    )]
    AccountNotFound { address: String },
    #[error("Query failed with code {code}: {log}")]
    QueryFailed { code: u32, log: String },
    #[error("Client is in offline mode, chain queries are not available")]
    Offline,
    #[error("Malformed response from chain: {message}")]
    MalformedResponse { message: String },
    #[error("Protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("Broadcasting transaction failed with code {code}. Log: {log}")]
    BroadcastRejected { code: u32, log: String },
    #[error(
        "Transaction with hash {txhash} was submitted but not yet found on the chain. \
         You might want to check later. Polled for {elapsed:?}."
    )]
    BroadcastTimedOut { txhash: String, elapsed: Duration },
    #[error("Transaction {txhash} failed with code {code}. Raw log: {raw_log}")]
    TxFailed {
        txhash: String,
        code: u32,
        raw_log: String,
    },
    #[error("Invalid gas price: {message}")]
    InvalidGasPrice { message: String },
    #[error("Missing {field} in transaction events")]
    MissingEventAttribute { field: &'static str },
}

impl Error {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedResponse {
            message: message.into(),
        }
    }
}
