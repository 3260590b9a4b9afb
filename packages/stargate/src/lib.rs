//! A client SDK for Cosmos SDK chains over Tendermint RPC.
//!
//! Builds, signs and broadcasts transactions in both the protobuf Direct
//! and the legacy Amino JSON signing protocols, and queries chain state over
//! JSON-RPC via plain HTTP or a self-healing WebSocket connection with
//! subscription support.

pub use address::{parse_raw_address, Address, AddressHrp, RawAddress};
pub use amino::{
    make_amino_sign_doc, serialize_sign_doc, AminoConverter, AminoMsg, AminoTypes, Coin, StdFee,
    StdSignDoc, StdSignature,
};
pub use amino::wasm::wasm_amino_converters;
pub use client::{
    BroadcastTxResponse, Cosmos, SequenceResponse, SignerData, SigningClient, SigningClientOptions,
};
pub use contract::{InstantiateResult, UploadResult};
pub use cosmos_sdk_proto as proto;
pub use error::{EncodingError, Error, RegistryError, RpcError, SignerError, WalletError};
pub use gas_price::{calculate_fee, GasPrice};
pub use pubkey::{
    decode_amino_pubkey, decode_bech32_pubkey, encode_amino_pubkey, encode_bech32_pubkey,
    encode_secp256k1_pubkey, PublicKey,
};
pub use rpc::{
    ConnectionStatus, HttpClient, ReconnectingSocket, RpcTransport, SocketEvent, SubscriptionEvent,
    WebsocketClient,
};
pub use signer::{
    AccountData, Algo, AminoSignResponse, AminoSigner, DirectSignResponse, DirectSigner, Signer,
};
pub use tendermint::{AbciQueryParams, EventStream, TendermintClient, TxSearchParams};
pub use txbuilder::{
    encode_pubkey, make_auth_info_bytes, make_sign_doc, TxBuilder, TxMessage,
};
pub use wallet::{RawWallet, SeedPhrase, Wallet};

pub mod address;
pub mod amino;
pub mod client;
pub mod contract;
pub mod error;
pub mod gas_price;
pub mod pubkey;
pub mod rpc;
pub mod signer;
pub mod tendermint;
pub mod txbuilder;
pub mod wallet;
