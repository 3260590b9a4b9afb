//! Transaction assembly: chain-neutral messages, the transaction builder,
//! and the protobuf sign doc helpers shared by both signing paths.

use prost::Message;

use cosmos_sdk_proto::cosmos::bank::v1beta1::{MsgMultiSend, MsgSend};
use cosmos_sdk_proto::cosmos::base::v1beta1::Coin as ProtoCoin;
use cosmos_sdk_proto::cosmos::distribution::v1beta1::{
    MsgFundCommunityPool, MsgSetWithdrawAddress, MsgWithdrawDelegatorReward,
    MsgWithdrawValidatorCommission,
};
use cosmos_sdk_proto::cosmos::staking::v1beta1::{
    MsgBeginRedelegate, MsgCreateValidator, MsgDelegate, MsgEditValidator, MsgUndelegate,
};
use cosmos_sdk_proto::cosmos::tx::signing::v1beta1::SignMode;
use cosmos_sdk_proto::cosmos::tx::v1beta1::{
    mode_info, AuthInfo, Fee, ModeInfo, SignDoc, SignerInfo, TxBody,
};
use cosmos_sdk_proto::cosmwasm::wasm::v1::{
    MsgClearAdmin, MsgExecuteContract, MsgInstantiateContract, MsgMigrateContract, MsgStoreCode,
    MsgUpdateAdmin,
};

use crate::error::EncodingError;
use crate::pubkey::PublicKey;

/// A single chain-neutral transaction message: a type URL plus the
/// protobuf-encoded value. Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxMessage {
    type_url: String,
    value: Vec<u8>,
}

impl TxMessage {
    pub fn new(type_url: impl Into<String>, value: Vec<u8>) -> Self {
        TxMessage {
            type_url: type_url.into(),
            value,
        }
    }

    pub fn type_url(&self) -> &str {
        &self.type_url
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn to_any(&self) -> cosmos_sdk_proto::Any {
        cosmos_sdk_proto::Any {
            type_url: self.type_url.clone(),
            value: self.value.clone(),
        }
    }
}

impl From<cosmos_sdk_proto::Any> for TxMessage {
    fn from(any: cosmos_sdk_proto::Any) -> Self {
        TxMessage {
            type_url: any.type_url,
            value: any.value,
        }
    }
}

impl From<TxMessage> for cosmos_sdk_proto::Any {
    fn from(msg: TxMessage) -> Self {
        cosmos_sdk_proto::Any {
            type_url: msg.type_url,
            value: msg.value,
        }
    }
}

macro_rules! impl_tx_message {
    ($type:ty, $type_url:expr) => {
        impl From<$type> for TxMessage {
            fn from(msg: $type) -> Self {
                TxMessage::new($type_url, msg.encode_to_vec())
            }
        }
    };
}

impl_tx_message!(MsgSend, "/cosmos.bank.v1beta1.MsgSend");
impl_tx_message!(MsgMultiSend, "/cosmos.bank.v1beta1.MsgMultiSend");
impl_tx_message!(
    MsgFundCommunityPool,
    "/cosmos.distribution.v1beta1.MsgFundCommunityPool"
);
impl_tx_message!(
    MsgSetWithdrawAddress,
    "/cosmos.distribution.v1beta1.MsgSetWithdrawAddress"
);
impl_tx_message!(
    MsgWithdrawDelegatorReward,
    "/cosmos.distribution.v1beta1.MsgWithdrawDelegatorReward"
);
impl_tx_message!(
    MsgWithdrawValidatorCommission,
    "/cosmos.distribution.v1beta1.MsgWithdrawValidatorCommission"
);
impl_tx_message!(MsgDelegate, "/cosmos.staking.v1beta1.MsgDelegate");
impl_tx_message!(MsgUndelegate, "/cosmos.staking.v1beta1.MsgUndelegate");
impl_tx_message!(
    MsgBeginRedelegate,
    "/cosmos.staking.v1beta1.MsgBeginRedelegate"
);
impl_tx_message!(
    MsgCreateValidator,
    "/cosmos.staking.v1beta1.MsgCreateValidator"
);
impl_tx_message!(MsgEditValidator, "/cosmos.staking.v1beta1.MsgEditValidator");
impl_tx_message!(MsgStoreCode, "/cosmwasm.wasm.v1.MsgStoreCode");
impl_tx_message!(
    MsgInstantiateContract,
    "/cosmwasm.wasm.v1.MsgInstantiateContract"
);
impl_tx_message!(MsgExecuteContract, "/cosmwasm.wasm.v1.MsgExecuteContract");
impl_tx_message!(MsgMigrateContract, "/cosmwasm.wasm.v1.MsgMigrateContract");
impl_tx_message!(MsgUpdateAdmin, "/cosmwasm.wasm.v1.MsgUpdateAdmin");
impl_tx_message!(MsgClearAdmin, "/cosmwasm.wasm.v1.MsgClearAdmin");

/// Transaction builder: collects messages and a memo before signing.
#[derive(Default, Clone, Debug)]
pub struct TxBuilder {
    messages: Vec<TxMessage>,
    memo: Option<String>,
}

impl TxBuilder {
    /// Add a message to this transaction.
    pub fn add_message(&mut self, msg: impl Into<TxMessage>) -> &mut Self {
        self.messages.push(msg.into());
        self
    }

    /// Set the memo field.
    pub fn set_memo(&mut self, memo: impl Into<String>) -> &mut Self {
        self.memo = Some(memo.into());
        self
    }

    /// Either set or unset the memo field.
    pub fn set_optional_memo(&mut self, memo: impl Into<Option<String>>) -> &mut Self {
        self.memo = memo.into();
        self
    }

    pub fn messages(&self) -> &[TxMessage] {
        &self.messages
    }

    pub fn memo(&self) -> Option<&str> {
        self.memo.as_deref()
    }

    /// Make a [TxBody] for this builder.
    pub fn make_tx_body(&self) -> TxBody {
        make_tx_body(&self.messages, self.memo.as_deref().unwrap_or_default())
    }
}

pub(crate) fn make_tx_body(messages: &[TxMessage], memo: &str) -> TxBody {
    TxBody {
        messages: messages.iter().map(|msg| msg.to_any()).collect(),
        memo: memo.to_owned(),
        timeout_height: 0,
        extension_options: vec![],
        non_critical_extension_options: vec![],
    }
}

/// Wrap a public key into the protobuf `Any` used inside `SignerInfo`.
///
/// Only single-key secp256k1 and ed25519 keys have a protobuf form here.
pub fn encode_pubkey(pubkey: &PublicKey) -> Result<cosmos_sdk_proto::Any, EncodingError> {
    match pubkey {
        PublicKey::Secp256k1 { .. } => Ok(cosmos_sdk_proto::Any {
            type_url: "/cosmos.crypto.secp256k1.PubKey".to_owned(),
            value: cosmos_sdk_proto::cosmos::crypto::secp256k1::PubKey {
                key: pubkey.raw_bytes()?,
            }
            .encode_to_vec(),
        }),
        PublicKey::Ed25519 { .. } => Ok(cosmos_sdk_proto::Any {
            type_url: "/cosmos.crypto.ed25519.PubKey".to_owned(),
            value: cosmos_sdk_proto::cosmos::crypto::ed25519::PubKey {
                key: pubkey.raw_bytes()?,
            }
            .encode_to_vec(),
        }),
        PublicKey::Sr25519 { .. } | PublicKey::MultisigThreshold { .. } => {
            Err(EncodingError::UnsupportedPubkeyVariant)
        }
    }
}

fn make_signer_info(public_key: cosmos_sdk_proto::Any, sequence: u64, mode: SignMode) -> SignerInfo {
    SignerInfo {
        public_key: Some(public_key),
        mode_info: Some(ModeInfo {
            sum: Some(mode_info::Sum::Single(mode_info::Single { mode: mode as i32 })),
        }),
        sequence,
    }
}

/// Deterministically encode the auth info for a single-signer transaction.
pub fn make_auth_info_bytes(
    public_key: cosmos_sdk_proto::Any,
    fee_amount: Vec<ProtoCoin>,
    gas_limit: u64,
    sequence: u64,
    mode: SignMode,
) -> Vec<u8> {
    AuthInfo {
        signer_infos: vec![make_signer_info(public_key, sequence, mode)],
        fee: Some(Fee {
            amount: fee_amount,
            gas_limit,
            payer: "".to_owned(),
            granter: "".to_owned(),
        }),
        tip: None,
    }
    .encode_to_vec()
}

/// Build the binary sign doc for the Direct signing path.
pub fn make_sign_doc(
    body_bytes: Vec<u8>,
    auth_info_bytes: Vec<u8>,
    chain_id: impl Into<String>,
    account_number: u64,
) -> SignDoc {
    SignDoc {
        body_bytes,
        auth_info_bytes,
        chain_id: chain_id.into(),
        account_number,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pubkey::encode_secp256k1_pubkey;

    fn demo_pubkey() -> PublicKey {
        let mut key = vec![0x02u8];
        key.extend_from_slice(&[0x42; 32]);
        encode_secp256k1_pubkey(&key).unwrap()
    }

    #[test]
    fn tx_body_carries_messages_in_order() {
        let mut builder = TxBuilder::default();
        builder
            .add_message(MsgSend {
                from_address: "a".to_owned(),
                to_address: "b".to_owned(),
                amount: vec![],
            })
            .add_message(MsgDelegate {
                delegator_address: "a".to_owned(),
                validator_address: "v".to_owned(),
                amount: None,
            })
            .set_memo("hello");
        let body = builder.make_tx_body();
        assert_eq!(body.messages.len(), 2);
        assert_eq!(body.messages[0].type_url, "/cosmos.bank.v1beta1.MsgSend");
        assert_eq!(
            body.messages[1].type_url,
            "/cosmos.staking.v1beta1.MsgDelegate"
        );
        assert_eq!(body.memo, "hello");
    }

    #[test]
    fn auth_info_bytes_decode_back() {
        let pubkey = encode_pubkey(&demo_pubkey()).unwrap();
        let bytes = make_auth_info_bytes(
            pubkey.clone(),
            vec![ProtoCoin {
                denom: "ucosm".to_owned(),
                amount: "2000".to_owned(),
            }],
            180_000,
            7,
            SignMode::Direct,
        );
        let auth_info = AuthInfo::decode(bytes.as_slice()).unwrap();
        let signer_info = &auth_info.signer_infos[0];
        assert_eq!(signer_info.sequence, 7);
        assert_eq!(signer_info.public_key.as_ref().unwrap(), &pubkey);
        assert_eq!(auth_info.fee.as_ref().unwrap().gas_limit, 180_000);
    }

    #[test]
    fn sign_doc_assembly() {
        let doc = make_sign_doc(vec![1, 2], vec![3, 4], "testing", 42);
        assert_eq!(doc.chain_id, "testing");
        assert_eq!(doc.account_number, 42);
        assert_eq!(doc.body_bytes, vec![1, 2]);
    }

    #[test]
    fn multisig_pubkeys_have_no_protobuf_form() {
        let multisig = PublicKey::MultisigThreshold {
            threshold: 2,
            pubkeys: vec![demo_pubkey(), demo_pubkey()],
        };
        assert!(encode_pubkey(&multisig).is_err());
    }
}
