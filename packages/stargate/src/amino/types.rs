//! The Amino message type register: a bidirectional mapping between
//! protobuf-style [TxMessage]s and [AminoMsg] JSON messages.

use prost::Message;
use serde_json::{json, Value};

use cosmos_sdk_proto::cosmos::bank::v1beta1::{Input, MsgMultiSend, MsgSend, Output};
use cosmos_sdk_proto::cosmos::base::v1beta1::Coin as ProtoCoin;
use cosmos_sdk_proto::cosmos::crypto::secp256k1::PubKey as ProtoSecp256k1PubKey;
use cosmos_sdk_proto::cosmos::distribution::v1beta1::{
    MsgFundCommunityPool, MsgSetWithdrawAddress, MsgWithdrawDelegatorReward,
    MsgWithdrawValidatorCommission,
};
use cosmos_sdk_proto::cosmos::staking::v1beta1::{
    CommissionRates, Description, MsgBeginRedelegate, MsgCreateValidator, MsgDelegate,
    MsgEditValidator, MsgUndelegate,
};

use crate::amino::AminoMsg;
use crate::error::RegistryError;
use crate::pubkey::{
    decode_bech32_pubkey, encode_bech32_pubkey, encode_secp256k1_pubkey, PublicKey,
};
use crate::txbuilder::TxMessage;

const SECP256K1_PUBKEY_TYPE_URL: &str = "/cosmos.crypto.secp256k1.PubKey";

type ToAminoFn = Box<dyn Fn(&[u8]) -> Result<Value, RegistryError> + Send + Sync>;
type FromAminoFn = Box<dyn Fn(&Value) -> Result<Vec<u8>, RegistryError> + Send + Sync>;

/// A bidirectional mapping between one protobuf type URL and one Amino type
/// tag. The conversion functions operate on the protobuf-encoded value bytes
/// and the Amino JSON value.
pub struct AminoConverter {
    amino_type: String,
    to_amino: ToAminoFn,
    from_amino: FromAminoFn,
}

impl AminoConverter {
    pub fn new(
        amino_type: impl Into<String>,
        to_amino: impl Fn(&[u8]) -> Result<Value, RegistryError> + Send + Sync + 'static,
        from_amino: impl Fn(&Value) -> Result<Vec<u8>, RegistryError> + Send + Sync + 'static,
    ) -> Self {
        AminoConverter {
            amino_type: amino_type.into(),
            to_amino: Box::new(to_amino),
            from_amino: Box::new(from_amino),
        }
    }

    pub fn amino_type(&self) -> &str {
        &self.amino_type
    }
}

/// A register from protobuf type URLs to [AminoConverter]s.
///
/// Built by merging a fixed default catalog with caller-supplied additions.
/// An addition whose Amino type collides with a built-in converter replaces
/// that built-in (so reverse lookups stay unambiguous), and additions also
/// override built-ins sharing the same type URL. Reverse lookup scans the
/// register in registration order and the first matching Amino type wins.
pub struct AminoTypes {
    register: Vec<(String, AminoConverter)>,
}

impl Default for AminoTypes {
    fn default() -> Self {
        AminoTypes::new("cosmos", Vec::new())
    }
}

impl AminoTypes {
    /// Build a register for the given bech32 prefix with extra converters.
    ///
    /// The prefix parameterizes the bech32 pubkey encoding used inside the
    /// validator message converters.
    pub fn new(prefix: &str, additions: Vec<(String, AminoConverter)>) -> Self {
        let addition_amino_types: Vec<String> = additions
            .iter()
            .map(|(_, converter)| converter.amino_type.clone())
            .collect();
        let addition_type_urls: Vec<&String> = additions.iter().map(|(url, _)| url).collect();

        let mut register: Vec<(String, AminoConverter)> = builtin_converters(prefix)
            .into_iter()
            .filter(|(url, converter)| {
                !addition_amino_types.contains(&converter.amino_type)
                    && !addition_type_urls.contains(&url)
            })
            .collect();
        register.extend(additions);
        AminoTypes { register }
    }

    /// Convert a protobuf-style message to its Amino JSON form.
    pub fn to_amino(&self, msg: &TxMessage) -> Result<AminoMsg, RegistryError> {
        let (_, converter) = self
            .register
            .iter()
            .find(|(url, _)| url == msg.type_url())
            .ok_or_else(|| RegistryError::UnknownTypeUrl {
                type_url: msg.type_url().to_owned(),
            })?;
        Ok(AminoMsg {
            msg_type: converter.amino_type.clone(),
            value: (converter.to_amino)(msg.value())?,
        })
    }

    /// Convert an Amino JSON message back to its protobuf-style form.
    ///
    /// Resolves the converter by a linear scan over the register; if two
    /// entries share an Amino type the first registered one wins.
    pub fn from_amino(&self, msg: &AminoMsg) -> Result<TxMessage, RegistryError> {
        let (type_url, converter) = self
            .register
            .iter()
            .find(|(_, converter)| converter.amino_type == msg.msg_type)
            .ok_or_else(|| RegistryError::UnknownAminoType {
                amino_type: msg.msg_type.clone(),
            })?;
        Ok(TxMessage::new(
            type_url.clone(),
            (converter.from_amino)(&msg.value)?,
        ))
    }
}

pub(crate) fn decode_message<M: Message + Default>(
    type_url: &str,
    value: &[u8],
) -> Result<M, RegistryError> {
    M::decode(value).map_err(|source| RegistryError::Decode {
        type_url: type_url.to_owned(),
        source,
    })
}

fn get<'a>(type_url: &str, value: &'a Value, field: &str) -> Result<&'a Value, RegistryError> {
    value
        .get(field)
        .ok_or_else(|| RegistryError::malformed(type_url, format!("missing field {field}")))
}

pub(crate) fn get_str(type_url: &str, value: &Value, field: &str) -> Result<String, RegistryError> {
    get(type_url, value, field)?
        .as_str()
        .map(ToOwned::to_owned)
        .ok_or_else(|| RegistryError::malformed(type_url, format!("field {field} must be a string")))
}

/// 64-bit integers are carried as strings in Amino JSON.
pub(crate) fn get_u64_str(type_url: &str, value: &Value, field: &str) -> Result<u64, RegistryError> {
    get_str(type_url, value, field)?.parse().map_err(|_| {
        RegistryError::malformed(type_url, format!("field {field} must be a stringified integer"))
    })
}

fn parse_coin(type_url: &str, value: &Value) -> Result<ProtoCoin, RegistryError> {
    Ok(ProtoCoin {
        denom: get_str(type_url, value, "denom")?,
        amount: get_str(type_url, value, "amount")?,
    })
}

pub(crate) fn get_coin(type_url: &str, value: &Value, field: &str) -> Result<ProtoCoin, RegistryError> {
    parse_coin(type_url, get(type_url, value, field)?)
}

pub(crate) fn get_coins(
    type_url: &str,
    value: &Value,
    field: &str,
) -> Result<Vec<ProtoCoin>, RegistryError> {
    get(type_url, value, field)?
        .as_array()
        .ok_or_else(|| RegistryError::malformed(type_url, format!("field {field} must be an array")))?
        .iter()
        .map(|coin| parse_coin(type_url, coin))
        .collect()
}

pub(crate) fn coin_to_json(coin: &ProtoCoin) -> Value {
    json!({ "denom": coin.denom, "amount": coin.amount })
}

pub(crate) fn coins_to_json(coins: &[ProtoCoin]) -> Value {
    Value::Array(coins.iter().map(coin_to_json).collect())
}

fn require<T>(type_url: &str, field: &str, value: Option<T>) -> Result<T, RegistryError> {
    value.ok_or_else(|| RegistryError::malformed(type_url, format!("missing {field}")))
}

fn description_to_json(description: &Description) -> Value {
    json!({
        "moniker": description.moniker,
        "identity": description.identity,
        "website": description.website,
        "security_contact": description.security_contact,
        "details": description.details,
    })
}

fn description_from_json(type_url: &str, value: &Value) -> Result<Description, RegistryError> {
    let description = get(type_url, value, "description")?;
    Ok(Description {
        moniker: get_str(type_url, description, "moniker")?,
        identity: get_str(type_url, description, "identity")?,
        website: get_str(type_url, description, "website")?,
        security_contact: get_str(type_url, description, "security_contact")?,
        details: get_str(type_url, description, "details")?,
    })
}

/// Encode a validator pubkey as a bech32 Amino pubkey string. Only
/// secp256k1 keys are supported.
fn validator_pubkey_to_bech32(
    type_url: &str,
    pubkey: &cosmos_sdk_proto::Any,
    prefix: &str,
) -> Result<String, RegistryError> {
    if pubkey.type_url != SECP256K1_PUBKEY_TYPE_URL {
        return Err(RegistryError::malformed(
            type_url,
            "Only Secp256k1 public keys are supported",
        ));
    }
    let key: ProtoSecp256k1PubKey = decode_message(type_url, &pubkey.value)?;
    let pubkey = encode_secp256k1_pubkey(&key.key)?;
    Ok(encode_bech32_pubkey(&pubkey, prefix)?)
}

fn validator_pubkey_from_bech32(
    type_url: &str,
    bech_encoded: &str,
) -> Result<cosmos_sdk_proto::Any, RegistryError> {
    let decoded = decode_bech32_pubkey(bech_encoded)?;
    let raw = match &decoded {
        PublicKey::Secp256k1 { .. } => decoded.raw_bytes()?,
        _ => {
            return Err(RegistryError::malformed(
                type_url,
                "Only Secp256k1 public keys are supported",
            ))
        }
    };
    Ok(cosmos_sdk_proto::Any {
        type_url: SECP256K1_PUBKEY_TYPE_URL.to_owned(),
        value: ProtoSecp256k1PubKey { key: raw }.encode_to_vec(),
    })
}

fn builtin_converters(prefix: &str) -> Vec<(String, AminoConverter)> {
    let mut converters = Vec::new();

    {
        const URL: &str = "/cosmos.bank.v1beta1.MsgSend";
        converters.push((
            URL.to_owned(),
            AminoConverter::new(
                "cosmos-sdk/MsgSend",
                |value| {
                    let msg: MsgSend = decode_message(URL, value)?;
                    Ok(json!({
                        "from_address": msg.from_address,
                        "to_address": msg.to_address,
                        "amount": coins_to_json(&msg.amount),
                    }))
                },
                |value| {
                    Ok(MsgSend {
                        from_address: get_str(URL, value, "from_address")?,
                        to_address: get_str(URL, value, "to_address")?,
                        amount: get_coins(URL, value, "amount")?,
                    }
                    .encode_to_vec())
                },
            ),
        ));
    }

    {
        const URL: &str = "/cosmos.bank.v1beta1.MsgMultiSend";
        converters.push((
            URL.to_owned(),
            AminoConverter::new(
                "cosmos-sdk/MsgMultiSend",
                |value| {
                    let msg: MsgMultiSend = decode_message(URL, value)?;
                    let inputs: Vec<Value> = msg
                        .inputs
                        .iter()
                        .map(|input| {
                            json!({ "address": input.address, "coins": coins_to_json(&input.coins) })
                        })
                        .collect();
                    let outputs: Vec<Value> = msg
                        .outputs
                        .iter()
                        .map(|output| {
                            json!({ "address": output.address, "coins": coins_to_json(&output.coins) })
                        })
                        .collect();
                    Ok(json!({ "inputs": inputs, "outputs": outputs }))
                },
                |value| {
                    let inputs = get(URL, value, "inputs")?
                        .as_array()
                        .ok_or_else(|| RegistryError::malformed(URL, "inputs must be an array"))?
                        .iter()
                        .map(|input| {
                            Ok(Input {
                                address: get_str(URL, input, "address")?,
                                coins: get_coins(URL, input, "coins")?,
                            })
                        })
                        .collect::<Result<Vec<_>, RegistryError>>()?;
                    let outputs = get(URL, value, "outputs")?
                        .as_array()
                        .ok_or_else(|| RegistryError::malformed(URL, "outputs must be an array"))?
                        .iter()
                        .map(|output| {
                            Ok(Output {
                                address: get_str(URL, output, "address")?,
                                coins: get_coins(URL, output, "coins")?,
                            })
                        })
                        .collect::<Result<Vec<_>, RegistryError>>()?;
                    Ok(MsgMultiSend { inputs, outputs }.encode_to_vec())
                },
            ),
        ));
    }

    {
        const URL: &str = "/cosmos.distribution.v1beta1.MsgFundCommunityPool";
        converters.push((
            URL.to_owned(),
            AminoConverter::new(
                "cosmos-sdk/MsgFundCommunityPool",
                |value| {
                    let msg: MsgFundCommunityPool = decode_message(URL, value)?;
                    Ok(json!({
                        "amount": coins_to_json(&msg.amount),
                        "depositor": msg.depositor,
                    }))
                },
                |value| {
                    Ok(MsgFundCommunityPool {
                        amount: get_coins(URL, value, "amount")?,
                        depositor: get_str(URL, value, "depositor")?,
                    }
                    .encode_to_vec())
                },
            ),
        ));
    }

    {
        const URL: &str = "/cosmos.distribution.v1beta1.MsgSetWithdrawAddress";
        converters.push((
            URL.to_owned(),
            AminoConverter::new(
                "cosmos-sdk/MsgModifyWithdrawAddress",
                |value| {
                    let msg: MsgSetWithdrawAddress = decode_message(URL, value)?;
                    Ok(json!({
                        "delegator_address": msg.delegator_address,
                        "withdraw_address": msg.withdraw_address,
                    }))
                },
                |value| {
                    Ok(MsgSetWithdrawAddress {
                        delegator_address: get_str(URL, value, "delegator_address")?,
                        withdraw_address: get_str(URL, value, "withdraw_address")?,
                    }
                    .encode_to_vec())
                },
            ),
        ));
    }

    {
        const URL: &str = "/cosmos.distribution.v1beta1.MsgWithdrawDelegatorReward";
        converters.push((
            URL.to_owned(),
            AminoConverter::new(
                "cosmos-sdk/MsgWithdrawDelegationReward",
                |value| {
                    let msg: MsgWithdrawDelegatorReward = decode_message(URL, value)?;
                    Ok(json!({
                        "delegator_address": msg.delegator_address,
                        "validator_address": msg.validator_address,
                    }))
                },
                |value| {
                    Ok(MsgWithdrawDelegatorReward {
                        delegator_address: get_str(URL, value, "delegator_address")?,
                        validator_address: get_str(URL, value, "validator_address")?,
                    }
                    .encode_to_vec())
                },
            ),
        ));
    }

    {
        const URL: &str = "/cosmos.distribution.v1beta1.MsgWithdrawValidatorCommission";
        converters.push((
            URL.to_owned(),
            AminoConverter::new(
                "cosmos-sdk/MsgWithdrawValidatorCommission",
                |value| {
                    let msg: MsgWithdrawValidatorCommission = decode_message(URL, value)?;
                    Ok(json!({ "validator_address": msg.validator_address }))
                },
                |value| {
                    Ok(MsgWithdrawValidatorCommission {
                        validator_address: get_str(URL, value, "validator_address")?,
                    }
                    .encode_to_vec())
                },
            ),
        ));
    }

    {
        const URL: &str = "/cosmos.staking.v1beta1.MsgBeginRedelegate";
        converters.push((
            URL.to_owned(),
            AminoConverter::new(
                "cosmos-sdk/MsgBeginRedelegate",
                |value| {
                    let msg: MsgBeginRedelegate = decode_message(URL, value)?;
                    let amount = require(URL, "amount", msg.amount)?;
                    Ok(json!({
                        "delegator_address": msg.delegator_address,
                        "validator_src_address": msg.validator_src_address,
                        "validator_dst_address": msg.validator_dst_address,
                        "amount": coin_to_json(&amount),
                    }))
                },
                |value| {
                    Ok(MsgBeginRedelegate {
                        delegator_address: get_str(URL, value, "delegator_address")?,
                        validator_src_address: get_str(URL, value, "validator_src_address")?,
                        validator_dst_address: get_str(URL, value, "validator_dst_address")?,
                        amount: Some(get_coin(URL, value, "amount")?),
                    }
                    .encode_to_vec())
                },
            ),
        ));
    }

    {
        const URL: &str = "/cosmos.staking.v1beta1.MsgCreateValidator";
        let to_prefix = prefix.to_owned();
        converters.push((
            URL.to_owned(),
            AminoConverter::new(
                "cosmos-sdk/MsgCreateValidator",
                move |value| {
                    let msg: MsgCreateValidator = decode_message(URL, value)?;
                    let description = require(URL, "description", msg.description)?;
                    let commission = require(URL, "commission", msg.commission)?;
                    let pubkey = require(URL, "pubkey", msg.pubkey)?;
                    let value = require(URL, "value", msg.value)?;
                    Ok(json!({
                        "description": description_to_json(&description),
                        "commission": {
                            "rate": commission.rate,
                            "max_rate": commission.max_rate,
                            "max_change_rate": commission.max_change_rate,
                        },
                        "min_self_delegation": msg.min_self_delegation,
                        "delegator_address": msg.delegator_address,
                        "validator_address": msg.validator_address,
                        "pubkey": validator_pubkey_to_bech32(URL, &pubkey, &to_prefix)?,
                        "value": coin_to_json(&value),
                    }))
                },
                |value| {
                    let commission = get(URL, value, "commission")?;
                    Ok(MsgCreateValidator {
                        description: Some(description_from_json(URL, value)?),
                        commission: Some(CommissionRates {
                            rate: get_str(URL, commission, "rate")?,
                            max_rate: get_str(URL, commission, "max_rate")?,
                            max_change_rate: get_str(URL, commission, "max_change_rate")?,
                        }),
                        min_self_delegation: get_str(URL, value, "min_self_delegation")?,
                        delegator_address: get_str(URL, value, "delegator_address")?,
                        validator_address: get_str(URL, value, "validator_address")?,
                        pubkey: Some(validator_pubkey_from_bech32(
                            URL,
                            &get_str(URL, value, "pubkey")?,
                        )?),
                        value: Some(get_coin(URL, value, "value")?),
                    }
                    .encode_to_vec())
                },
            ),
        ));
    }

    {
        const URL: &str = "/cosmos.staking.v1beta1.MsgDelegate";
        converters.push((
            URL.to_owned(),
            AminoConverter::new(
                "cosmos-sdk/MsgDelegate",
                |value| {
                    let msg: MsgDelegate = decode_message(URL, value)?;
                    let amount = require(URL, "amount", msg.amount)?;
                    Ok(json!({
                        "delegator_address": msg.delegator_address,
                        "validator_address": msg.validator_address,
                        "amount": coin_to_json(&amount),
                    }))
                },
                |value| {
                    Ok(MsgDelegate {
                        delegator_address: get_str(URL, value, "delegator_address")?,
                        validator_address: get_str(URL, value, "validator_address")?,
                        amount: Some(get_coin(URL, value, "amount")?),
                    }
                    .encode_to_vec())
                },
            ),
        ));
    }

    {
        const URL: &str = "/cosmos.staking.v1beta1.MsgEditValidator";
        converters.push((
            URL.to_owned(),
            AminoConverter::new(
                "cosmos-sdk/MsgEditValidator",
                |value| {
                    let msg: MsgEditValidator = decode_message(URL, value)?;
                    let description = require(URL, "description", msg.description)?;
                    Ok(json!({
                        "description": description_to_json(&description),
                        "commission_rate": msg.commission_rate,
                        "min_self_delegation": msg.min_self_delegation,
                        "validator_address": msg.validator_address,
                    }))
                },
                |value| {
                    Ok(MsgEditValidator {
                        description: Some(description_from_json(URL, value)?),
                        commission_rate: get_str(URL, value, "commission_rate")?,
                        min_self_delegation: get_str(URL, value, "min_self_delegation")?,
                        validator_address: get_str(URL, value, "validator_address")?,
                    }
                    .encode_to_vec())
                },
            ),
        ));
    }

    {
        const URL: &str = "/cosmos.staking.v1beta1.MsgUndelegate";
        converters.push((
            URL.to_owned(),
            AminoConverter::new(
                "cosmos-sdk/MsgUndelegate",
                |value| {
                    let msg: MsgUndelegate = decode_message(URL, value)?;
                    let amount = require(URL, "amount", msg.amount)?;
                    Ok(json!({
                        "delegator_address": msg.delegator_address,
                        "validator_address": msg.validator_address,
                        "amount": coin_to_json(&amount),
                    }))
                },
                |value| {
                    Ok(MsgUndelegate {
                        delegator_address: get_str(URL, value, "delegator_address")?,
                        validator_address: get_str(URL, value, "validator_address")?,
                        amount: Some(get_coin(URL, value, "amount")?),
                    }
                    .encode_to_vec())
                },
            ),
        ));
    }

    {
        use ibc_proto::ibc::applications::transfer::v1::MsgTransfer;
        use ibc_proto::ibc::core::client::v1::Height;

        const URL: &str = "/ibc.applications.transfer.v1.MsgTransfer";
        converters.push((
            URL.to_owned(),
            AminoConverter::new(
                "cosmos-sdk/MsgTransfer",
                |value| {
                    let msg: MsgTransfer = decode_message(URL, value)?;
                    let token = require(URL, "token", msg.token)?;
                    let mut amino = json!({
                        "source_port": msg.source_port,
                        "source_channel": msg.source_channel,
                        "token": { "denom": token.denom, "amount": token.amount },
                        "sender": msg.sender,
                        "receiver": msg.receiver,
                        "timeout_timestamp": msg.timeout_timestamp.to_string(),
                    });
                    if let Some(height) = msg.timeout_height {
                        amino["timeout_height"] = json!({
                            "revision_number": height.revision_number.to_string(),
                            "revision_height": height.revision_height.to_string(),
                        });
                    }
                    Ok(amino)
                },
                |value| {
                    let token = get(URL, value, "token")?;
                    let timeout_height = match value.get("timeout_height") {
                        Some(height) => Some(Height {
                            revision_number: get_u64_str(URL, height, "revision_number")?,
                            revision_height: get_u64_str(URL, height, "revision_height")?,
                        }),
                        None => None,
                    };
                    Ok(MsgTransfer {
                        source_port: get_str(URL, value, "source_port")?,
                        source_channel: get_str(URL, value, "source_channel")?,
                        token: Some(ibc_proto::cosmos::base::v1beta1::Coin {
                            denom: get_str(URL, token, "denom")?,
                            amount: get_str(URL, token, "amount")?,
                        }),
                        sender: get_str(URL, value, "sender")?,
                        receiver: get_str(URL, value, "receiver")?,
                        timeout_height,
                        timeout_timestamp: get_u64_str(URL, value, "timeout_timestamp")?,
                        ..Default::default()
                    }
                    .encode_to_vec())
                },
            ),
        ));
    }

    converters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coins(amount: u64, denom: &str) -> Vec<ProtoCoin> {
        vec![ProtoCoin {
            denom: denom.to_owned(),
            amount: amount.to_string(),
        }]
    }

    #[test]
    fn to_amino_msg_send() {
        let msg = MsgSend {
            from_address: "cosmos1pkptre7fdkl6gfrzlesjjvhxhlc3r4gmmk8rs6".to_owned(),
            to_address: "cosmos10dyr9899g6t0pelew4nvf4j5c3jcgv0r73qga5".to_owned(),
            amount: coins(1234567, "ucosm"),
        };
        let amino = AminoTypes::default()
            .to_amino(&TxMessage::from(msg))
            .unwrap();
        assert_eq!(amino.msg_type, "cosmos-sdk/MsgSend");
        assert_eq!(
            amino.value,
            json!({
                "from_address": "cosmos1pkptre7fdkl6gfrzlesjjvhxhlc3r4gmmk8rs6",
                "to_address": "cosmos10dyr9899g6t0pelew4nvf4j5c3jcgv0r73qga5",
                "amount": [{"denom": "ucosm", "amount": "1234567"}],
            })
        );
    }

    #[test]
    fn roundtrip_msg_send() {
        let msg = MsgSend {
            from_address: "cosmos1pkptre7fdkl6gfrzlesjjvhxhlc3r4gmmk8rs6".to_owned(),
            to_address: "cosmos10dyr9899g6t0pelew4nvf4j5c3jcgv0r73qga5".to_owned(),
            amount: coins(1234567, "ucosm"),
        };
        let types = AminoTypes::default();
        let original = TxMessage::from(msg);
        let amino = types.to_amino(&original).unwrap();
        let back = types.from_amino(&amino).unwrap();
        assert_eq!(back, original);
        // And the reverse direction reproduces the Amino message exactly
        assert_eq!(types.to_amino(&back).unwrap(), amino);
    }

    #[test]
    fn roundtrip_msg_multi_send() {
        let msg = MsgMultiSend {
            inputs: vec![
                Input {
                    address: "cosmos1pkptre7fdkl6gfrzlesjjvhxhlc3r4gmmk8rs6".to_owned(),
                    coins: coins(1234, "ucosm"),
                },
                Input {
                    address: "cosmos10dyr9899g6t0pelew4nvf4j5c3jcgv0r73qga5".to_owned(),
                    coins: coins(5678, "ucosm"),
                },
            ],
            outputs: vec![Output {
                address: "cosmos1xy4yqngt0nlkdcenxymg8tenrghmek4nmqm28k".to_owned(),
                coins: coins(6912, "ucosm"),
            }],
        };
        let types = AminoTypes::default();
        let original = TxMessage::from(msg);
        let amino = types.to_amino(&original).unwrap();
        assert_eq!(amino.msg_type, "cosmos-sdk/MsgMultiSend");
        assert_eq!(types.from_amino(&amino).unwrap(), original);
    }

    #[test]
    fn roundtrip_msg_delegate() {
        let msg = MsgDelegate {
            delegator_address: "cosmos1pkptre7fdkl6gfrzlesjjvhxhlc3r4gmmk8rs6".to_owned(),
            validator_address: "cosmosvaloper1sjllsnramtg3ewxqwwrwjxfgc4n4ef9u2lcnj0".to_owned(),
            amount: Some(ProtoCoin {
                denom: "ustake".to_owned(),
                amount: "1234".to_owned(),
            }),
        };
        let types = AminoTypes::default();
        let original = TxMessage::from(msg);
        let amino = types.to_amino(&original).unwrap();
        assert_eq!(amino.msg_type, "cosmos-sdk/MsgDelegate");
        assert_eq!(types.from_amino(&amino).unwrap(), original);
    }

    #[test]
    fn roundtrip_msg_begin_redelegate_and_undelegate() {
        let types = AminoTypes::default();
        let redelegate = MsgBeginRedelegate {
            delegator_address: "cosmos1pkptre7fdkl6gfrzlesjjvhxhlc3r4gmmk8rs6".to_owned(),
            validator_src_address: "cosmos10dyr9899g6t0pelew4nvf4j5c3jcgv0r73qga5".to_owned(),
            validator_dst_address: "cosmos1xy4yqngt0nlkdcenxymg8tenrghmek4nmqm28k".to_owned(),
            amount: Some(ProtoCoin {
                denom: "ucosm".to_owned(),
                amount: "1234".to_owned(),
            }),
        };
        let original = TxMessage::from(redelegate);
        assert_eq!(
            types
                .from_amino(&types.to_amino(&original).unwrap())
                .unwrap(),
            original
        );

        let undelegate = MsgUndelegate {
            delegator_address: "cosmos1pkptre7fdkl6gfrzlesjjvhxhlc3r4gmmk8rs6".to_owned(),
            validator_address: "cosmos10dyr9899g6t0pelew4nvf4j5c3jcgv0r73qga5".to_owned(),
            amount: Some(ProtoCoin {
                denom: "ucosm".to_owned(),
                amount: "1234".to_owned(),
            }),
        };
        let original = TxMessage::from(undelegate);
        assert_eq!(
            types
                .from_amino(&types.to_amino(&original).unwrap())
                .unwrap(),
            original
        );
    }

    #[test]
    fn roundtrip_distribution_msgs() {
        let types = AminoTypes::default();
        for original in [
            TxMessage::from(MsgFundCommunityPool {
                amount: coins(1234, "ucosm"),
                depositor: "cosmos1pkptre7fdkl6gfrzlesjjvhxhlc3r4gmmk8rs6".to_owned(),
            }),
            TxMessage::from(MsgSetWithdrawAddress {
                delegator_address: "cosmos1pkptre7fdkl6gfrzlesjjvhxhlc3r4gmmk8rs6".to_owned(),
                withdraw_address: "cosmos10dyr9899g6t0pelew4nvf4j5c3jcgv0r73qga5".to_owned(),
            }),
            TxMessage::from(MsgWithdrawDelegatorReward {
                delegator_address: "cosmos1pkptre7fdkl6gfrzlesjjvhxhlc3r4gmmk8rs6".to_owned(),
                validator_address: "cosmos10dyr9899g6t0pelew4nvf4j5c3jcgv0r73qga5".to_owned(),
            }),
            TxMessage::from(MsgWithdrawValidatorCommission {
                validator_address: "cosmos10dyr9899g6t0pelew4nvf4j5c3jcgv0r73qga5".to_owned(),
            }),
        ] {
            let amino = types.to_amino(&original).unwrap();
            assert_eq!(types.from_amino(&amino).unwrap(), original);
        }
    }

    #[test]
    fn set_withdraw_address_uses_legacy_amino_name() {
        let msg = MsgSetWithdrawAddress {
            delegator_address: "cosmos1pkptre7fdkl6gfrzlesjjvhxhlc3r4gmmk8rs6".to_owned(),
            withdraw_address: "cosmos10dyr9899g6t0pelew4nvf4j5c3jcgv0r73qga5".to_owned(),
        };
        let amino = AminoTypes::default()
            .to_amino(&TxMessage::from(msg))
            .unwrap();
        assert_eq!(amino.msg_type, "cosmos-sdk/MsgModifyWithdrawAddress");
    }

    #[test]
    fn roundtrip_msg_create_validator() {
        let raw_key = {
            let mut key = vec![0x02u8];
            key.extend_from_slice(&[0x66; 32]);
            key
        };
        let msg = MsgCreateValidator {
            description: Some(Description {
                moniker: "validator".to_owned(),
                identity: "me".to_owned(),
                website: "valid.com".to_owned(),
                security_contact: "Hamburglar".to_owned(),
                details: "...".to_owned(),
            }),
            commission: Some(CommissionRates {
                rate: "0.2".to_owned(),
                max_rate: "0.3".to_owned(),
                max_change_rate: "0.1".to_owned(),
            }),
            min_self_delegation: "123".to_owned(),
            delegator_address: "cosmos1pkptre7fdkl6gfrzlesjjvhxhlc3r4gmmk8rs6".to_owned(),
            validator_address: "cosmosvaloper1sjllsnramtg3ewxqwwrwjxfgc4n4ef9u2lcnj0".to_owned(),
            pubkey: Some(cosmos_sdk_proto::Any {
                type_url: SECP256K1_PUBKEY_TYPE_URL.to_owned(),
                value: ProtoSecp256k1PubKey {
                    key: raw_key.clone(),
                }
                .encode_to_vec(),
            }),
            value: Some(ProtoCoin {
                denom: "ucosm".to_owned(),
                amount: "1234".to_owned(),
            }),
        };
        let types = AminoTypes::default();
        let original = TxMessage::from(msg);
        let amino = types.to_amino(&original).unwrap();
        let expected_pubkey =
            encode_bech32_pubkey(&encode_secp256k1_pubkey(&raw_key).unwrap(), "cosmos").unwrap();
        assert_eq!(amino.value["pubkey"], json!(expected_pubkey));
        assert_eq!(types.from_amino(&amino).unwrap(), original);
    }

    #[test]
    fn create_validator_rejects_non_secp256k1_pubkeys() {
        let msg = MsgCreateValidator {
            description: Some(Description::default()),
            commission: Some(CommissionRates::default()),
            min_self_delegation: "0".to_owned(),
            delegator_address: String::new(),
            validator_address: String::new(),
            pubkey: Some(cosmos_sdk_proto::Any {
                type_url: "/cosmos.crypto.ed25519.PubKey".to_owned(),
                value: Vec::new(),
            }),
            value: Some(ProtoCoin::default()),
        };
        let err = AminoTypes::default()
            .to_amino(&TxMessage::from(msg))
            .unwrap_err();
        assert!(err.to_string().contains("Only Secp256k1"));
    }

    #[test]
    fn roundtrip_msg_transfer() {
        use ibc_proto::ibc::applications::transfer::v1::MsgTransfer;
        use ibc_proto::ibc::core::client::v1::Height;

        let msg = MsgTransfer {
            source_port: "transfer".to_owned(),
            source_channel: "channel-0".to_owned(),
            token: Some(ibc_proto::cosmos::base::v1beta1::Coin {
                denom: "ucosm".to_owned(),
                amount: "1234".to_owned(),
            }),
            sender: "cosmos1pkptre7fdkl6gfrzlesjjvhxhlc3r4gmmk8rs6".to_owned(),
            receiver: "cosmos10dyr9899g6t0pelew4nvf4j5c3jcgv0r73qga5".to_owned(),
            timeout_height: Some(Height {
                revision_number: 1,
                revision_height: 9876,
            }),
            timeout_timestamp: 1_625_000_000_000_000_000,
            ..Default::default()
        };
        let types = AminoTypes::default();
        let original = TxMessage::new(
            "/ibc.applications.transfer.v1.MsgTransfer",
            msg.encode_to_vec(),
        );
        let amino = types.to_amino(&original).unwrap();
        assert_eq!(amino.msg_type, "cosmos-sdk/MsgTransfer");
        assert_eq!(amino.value["timeout_height"]["revision_height"], "9876");
        assert_eq!(types.from_amino(&amino).unwrap(), original);
    }

    #[test]
    fn unknown_types_are_rejected() {
        let types = AminoTypes::default();
        let err = types
            .to_amino(&TxMessage::new("/xyz.Unknown", Vec::new()))
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownTypeUrl { .. }));
        assert!(err.to_string().contains("/xyz.Unknown"));

        let err = types
            .from_amino(&AminoMsg {
                msg_type: "xyz/Unknown".to_owned(),
                value: json!({}),
            })
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownAminoType { .. }));
    }

    fn passthrough_converter(amino_type: &str) -> AminoConverter {
        AminoConverter::new(
            amino_type,
            |value| {
                Ok(json!({
                    "payload": base64::Engine::encode(
                        &base64::engine::general_purpose::STANDARD,
                        value,
                    )
                }))
            },
            |value| {
                let payload = get_str("custom", value, "payload")?;
                base64::Engine::decode(&base64::engine::general_purpose::STANDARD, payload)
                    .map_err(|_| RegistryError::malformed("custom", "bad payload"))
            },
        )
    }

    #[test]
    fn additions_replace_builtins_sharing_an_amino_type() {
        let types = AminoTypes::new(
            "cosmos",
            vec![(
                "/custom.MsgSendReplacement".to_owned(),
                passthrough_converter("cosmos-sdk/MsgSend"),
            )],
        );
        // The built-in MsgSend entry is gone entirely
        let err = types
            .to_amino(&TxMessage::new("/cosmos.bank.v1beta1.MsgSend", Vec::new()))
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownTypeUrl { .. }));
        // Reverse lookups resolve only to the addition
        let resolved = types
            .from_amino(&AminoMsg {
                msg_type: "cosmos-sdk/MsgSend".to_owned(),
                value: json!({ "payload": "" }),
            })
            .unwrap();
        assert_eq!(resolved.type_url(), "/custom.MsgSendReplacement");
    }

    #[test]
    fn additions_override_builtins_by_type_url() {
        let types = AminoTypes::new(
            "cosmos",
            vec![(
                "/cosmos.bank.v1beta1.MsgSend".to_owned(),
                passthrough_converter("custom/MsgSend"),
            )],
        );
        let amino = types
            .to_amino(&TxMessage::new(
                "/cosmos.bank.v1beta1.MsgSend",
                vec![1, 2, 3],
            ))
            .unwrap();
        assert_eq!(amino.msg_type, "custom/MsgSend");
    }

    #[test]
    fn duplicate_amino_types_resolve_to_first_registered() {
        // Two additions deliberately sharing an Amino type: reverse lookup is
        // order-dependent and the first one wins.
        let types = AminoTypes::new(
            "cosmos",
            vec![
                (
                    "/custom.First".to_owned(),
                    passthrough_converter("custom/Dup"),
                ),
                (
                    "/custom.Second".to_owned(),
                    passthrough_converter("custom/Dup"),
                ),
            ],
        );
        let resolved = types
            .from_amino(&AminoMsg {
                msg_type: "custom/Dup".to_owned(),
                value: json!({ "payload": "" }),
            })
            .unwrap();
        assert_eq!(resolved.type_url(), "/custom.First");
    }
}
