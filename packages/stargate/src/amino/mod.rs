//! Legacy Amino JSON signing support.
//!
//! Amino is the JSON-based encoding that predates protobuf transactions in
//! the Cosmos SDK. It is still required for hardware and other legacy
//! signers, which sign over a canonical JSON document instead of protobuf
//! bytes.

mod types;
pub mod wasm;

pub use types::{AminoConverter, AminoTypes};

use serde::{Deserialize, Serialize};

use crate::pubkey::PublicKey;

/// A single message in Amino JSON form: a type tag string plus an arbitrary
/// JSON value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AminoMsg {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub value: serde_json::Value,
}

/// A coin as it appears in Amino JSON and fee objects: both fields strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

impl Coin {
    pub fn new(amount: impl ToString, denom: impl Into<String>) -> Self {
        Coin {
            denom: denom.into(),
            amount: amount.to_string(),
        }
    }
}

impl From<Coin> for cosmos_sdk_proto::cosmos::base::v1beta1::Coin {
    fn from(Coin { denom, amount }: Coin) -> Self {
        cosmos_sdk_proto::cosmos::base::v1beta1::Coin { denom, amount }
    }
}

impl From<cosmos_sdk_proto::cosmos::base::v1beta1::Coin> for Coin {
    fn from(coin: cosmos_sdk_proto::cosmos::base::v1beta1::Coin) -> Self {
        Coin {
            denom: coin.denom,
            amount: coin.amount,
        }
    }
}

/// The fee object signed as part of a [StdSignDoc].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdFee {
    pub amount: Vec<Coin>,
    pub gas: String,
}

impl StdFee {
    pub fn new(amount: Vec<Coin>, gas_limit: u64) -> Self {
        StdFee {
            amount,
            gas: gas_limit.to_string(),
        }
    }
}

/// A signature over a [StdSignDoc] or a protobuf sign doc, together with the
/// signing pubkey. The signature is base64-encoded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdSignature {
    pub pub_key: PublicKey,
    pub signature: String,
}

/// The canonical JSON document an Amino signer signs over.
///
/// Produced fresh per signing operation and discarded after the signature is
/// extracted. All 64-bit integers are carried as strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdSignDoc {
    pub account_number: String,
    pub chain_id: String,
    pub fee: StdFee,
    pub memo: String,
    pub msgs: Vec<AminoMsg>,
    pub sequence: String,
}

/// Build a [StdSignDoc] from its parts.
pub fn make_amino_sign_doc(
    msgs: Vec<AminoMsg>,
    fee: StdFee,
    chain_id: impl Into<String>,
    memo: impl Into<String>,
    account_number: u64,
    sequence: u64,
) -> StdSignDoc {
    StdSignDoc {
        account_number: account_number.to_string(),
        chain_id: chain_id.into(),
        fee,
        memo: memo.into(),
        msgs,
        sequence: sequence.to_string(),
    }
}

/// Serialize a sign doc to its canonical JSON bytes: keys sorted at every
/// nesting level, no insignificant whitespace.
///
/// `serde_json` maps are backed by a BTreeMap (the crate default), so a
/// round-trip through [serde_json::Value] sorts all object keys.
pub fn serialize_sign_doc(sign_doc: &StdSignDoc) -> Result<Vec<u8>, serde_json::Error> {
    let value = serde_json::to_value(sign_doc)?;
    serde_json::to_vec(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_doc_serialization_is_sorted_and_compact() {
        let doc = make_amino_sign_doc(
            vec![AminoMsg {
                msg_type: "cosmos-sdk/MsgSend".to_owned(),
                value: serde_json::json!({
                    "to_address": "cosmos10dyr9899g6t0pelew4nvf4j5c3jcgv0r73qga5",
                    "from_address": "cosmos1pkptre7fdkl6gfrzlesjjvhxhlc3r4gmmk8rs6",
                    "amount": [{"denom": "ucosm", "amount": "1234"}],
                }),
            }],
            StdFee::new(vec![Coin::new(2000, "ucosm")], 180_000),
            "testing",
            "for-dinner",
            4,
            1,
        );
        let bytes = serialize_sign_doc(&doc).unwrap();
        let rendered = String::from_utf8(bytes).unwrap();
        // Top-level keys in alphabetical order
        assert!(rendered.starts_with(r#"{"account_number":"4","chain_id":"testing","fee":"#));
        // Nested message keys sorted as well: amount < from_address < to_address
        let amount = rendered.find(r#""amount":[{"#).unwrap();
        let from = rendered.find(r#""from_address""#).unwrap();
        let to = rendered.find(r#""to_address""#).unwrap();
        assert!(amount < from && from < to);
        assert!(!rendered.contains(' '));
    }

    #[test]
    fn sign_doc_roundtrips_through_json() {
        let doc = make_amino_sign_doc(
            vec![],
            StdFee::new(vec![], 200_000),
            "chain-x",
            "",
            42,
            7,
        );
        let bytes = serialize_sign_doc(&doc).unwrap();
        let back: StdSignDoc = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, doc);
    }
}
