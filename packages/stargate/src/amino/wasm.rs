//! Amino converters for the CosmWasm message set, provided as additions for
//! [AminoTypes::new](crate::amino::AminoTypes::new).

use base64::Engine;
use prost::Message;
use serde_json::{json, Value};

use cosmos_sdk_proto::cosmwasm::wasm::v1::{
    MsgClearAdmin, MsgExecuteContract, MsgInstantiateContract, MsgMigrateContract, MsgStoreCode,
    MsgUpdateAdmin,
};

use crate::amino::types::{
    coins_to_json, decode_message, get_coins, get_str, get_u64_str, AminoConverter,
};
use crate::error::RegistryError;

fn parse_embedded_json(type_url: &str, msg: &[u8]) -> Result<Value, RegistryError> {
    serde_json::from_slice(msg)
        .map_err(|_| RegistryError::malformed(type_url, "embedded msg is not valid JSON"))
}

fn embedded_json_bytes(type_url: &str, value: &Value, field: &str) -> Result<Vec<u8>, RegistryError> {
    let msg = value
        .get(field)
        .ok_or_else(|| RegistryError::malformed(type_url, format!("missing field {field}")))?;
    serde_json::to_vec(msg).map_err(|_| RegistryError::malformed(type_url, "unserializable msg"))
}

fn optional_admin(type_url: &str, value: &Value) -> Result<String, RegistryError> {
    match value.get("admin") {
        None => Ok(String::new()),
        Some(_) => get_str(type_url, value, "admin"),
    }
}

/// The CosmWasm extension converter set. Pass these as additions when
/// constructing the register for a CosmWasm-enabled chain.
pub fn wasm_amino_converters() -> Vec<(String, AminoConverter)> {
    let mut converters = Vec::new();

    {
        const URL: &str = "/cosmwasm.wasm.v1.MsgStoreCode";
        converters.push((
            URL.to_owned(),
            AminoConverter::new(
                "wasm/MsgStoreCode",
                |value| {
                    let msg: MsgStoreCode = decode_message(URL, value)?;
                    if msg.instantiate_permission.is_some() {
                        return Err(RegistryError::malformed(
                            URL,
                            "instantiate_permission is not supported by the Amino representation",
                        ));
                    }
                    Ok(json!({
                        "sender": msg.sender,
                        "wasm_byte_code": base64::engine::general_purpose::STANDARD
                            .encode(&msg.wasm_byte_code),
                    }))
                },
                |value| {
                    let wasm_byte_code = base64::engine::general_purpose::STANDARD
                        .decode(get_str(URL, value, "wasm_byte_code")?)
                        .map_err(|_| {
                            RegistryError::malformed(URL, "wasm_byte_code is not valid base64")
                        })?;
                    Ok(MsgStoreCode {
                        sender: get_str(URL, value, "sender")?,
                        wasm_byte_code,
                        instantiate_permission: None,
                    }
                    .encode_to_vec())
                },
            ),
        ));
    }

    {
        const URL: &str = "/cosmwasm.wasm.v1.MsgInstantiateContract";
        converters.push((
            URL.to_owned(),
            AminoConverter::new(
                "wasm/MsgInstantiateContract",
                |value| {
                    let msg: MsgInstantiateContract = decode_message(URL, value)?;
                    let mut amino = json!({
                        "sender": msg.sender,
                        "code_id": msg.code_id.to_string(),
                        "label": msg.label,
                        "msg": parse_embedded_json(URL, &msg.msg)?,
                        "funds": coins_to_json(&msg.funds),
                    });
                    if !msg.admin.is_empty() {
                        amino["admin"] = json!(msg.admin);
                    }
                    Ok(amino)
                },
                |value| {
                    Ok(MsgInstantiateContract {
                        sender: get_str(URL, value, "sender")?,
                        admin: optional_admin(URL, value)?,
                        code_id: get_u64_str(URL, value, "code_id")?,
                        label: get_str(URL, value, "label")?,
                        msg: embedded_json_bytes(URL, value, "msg")?,
                        funds: get_coins(URL, value, "funds")?,
                    }
                    .encode_to_vec())
                },
            ),
        ));
    }

    {
        const URL: &str = "/cosmwasm.wasm.v1.MsgExecuteContract";
        converters.push((
            URL.to_owned(),
            AminoConverter::new(
                "wasm/MsgExecuteContract",
                |value| {
                    let msg: MsgExecuteContract = decode_message(URL, value)?;
                    Ok(json!({
                        "sender": msg.sender,
                        "contract": msg.contract,
                        "msg": parse_embedded_json(URL, &msg.msg)?,
                        "funds": coins_to_json(&msg.funds),
                    }))
                },
                |value| {
                    Ok(MsgExecuteContract {
                        sender: get_str(URL, value, "sender")?,
                        contract: get_str(URL, value, "contract")?,
                        msg: embedded_json_bytes(URL, value, "msg")?,
                        funds: get_coins(URL, value, "funds")?,
                    }
                    .encode_to_vec())
                },
            ),
        ));
    }

    {
        const URL: &str = "/cosmwasm.wasm.v1.MsgMigrateContract";
        converters.push((
            URL.to_owned(),
            AminoConverter::new(
                "wasm/MsgMigrateContract",
                |value| {
                    let msg: MsgMigrateContract = decode_message(URL, value)?;
                    Ok(json!({
                        "sender": msg.sender,
                        "contract": msg.contract,
                        "code_id": msg.code_id.to_string(),
                        "msg": parse_embedded_json(URL, &msg.msg)?,
                    }))
                },
                |value| {
                    Ok(MsgMigrateContract {
                        sender: get_str(URL, value, "sender")?,
                        contract: get_str(URL, value, "contract")?,
                        code_id: get_u64_str(URL, value, "code_id")?,
                        msg: embedded_json_bytes(URL, value, "msg")?,
                    }
                    .encode_to_vec())
                },
            ),
        ));
    }

    {
        const URL: &str = "/cosmwasm.wasm.v1.MsgUpdateAdmin";
        converters.push((
            URL.to_owned(),
            AminoConverter::new(
                "wasm/MsgUpdateAdmin",
                |value| {
                    let msg: MsgUpdateAdmin = decode_message(URL, value)?;
                    Ok(json!({
                        "sender": msg.sender,
                        "new_admin": msg.new_admin,
                        "contract": msg.contract,
                    }))
                },
                |value| {
                    Ok(MsgUpdateAdmin {
                        sender: get_str(URL, value, "sender")?,
                        new_admin: get_str(URL, value, "new_admin")?,
                        contract: get_str(URL, value, "contract")?,
                    }
                    .encode_to_vec())
                },
            ),
        ));
    }

    {
        const URL: &str = "/cosmwasm.wasm.v1.MsgClearAdmin";
        converters.push((
            URL.to_owned(),
            AminoConverter::new(
                "wasm/MsgClearAdmin",
                |value| {
                    let msg: MsgClearAdmin = decode_message(URL, value)?;
                    Ok(json!({
                        "sender": msg.sender,
                        "contract": msg.contract,
                    }))
                },
                |value| {
                    Ok(MsgClearAdmin {
                        sender: get_str(URL, value, "sender")?,
                        contract: get_str(URL, value, "contract")?,
                    }
                    .encode_to_vec())
                },
            ),
        ));
    }

    converters
}
