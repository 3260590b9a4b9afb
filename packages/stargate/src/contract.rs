//! CosmWasm support: code upload, contract lifecycle operations and smart
//! contract queries.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};

use cosmos_sdk_proto::cosmos::base::v1beta1::Coin as ProtoCoin;
use cosmos_sdk_proto::cosmwasm::wasm::v1::{
    ContractInfo, MsgClearAdmin, MsgExecuteContract, MsgInstantiateContract, MsgMigrateContract,
    MsgStoreCode, MsgUpdateAdmin, QueryContractInfoRequest, QueryContractInfoResponse,
    QueryRawContractStateRequest, QueryRawContractStateResponse, QuerySmartContractStateRequest,
    QuerySmartContractStateResponse,
};

use crate::amino::StdFee;
use crate::client::{BroadcastTxResponse, Cosmos, SigningClient};
use crate::error::Error;
use crate::tendermint::responses::Event;

/// Receipt for an uploaded contract code blob.
#[derive(Clone, Debug)]
pub struct UploadResult {
    /// Size of the original wasm code in bytes.
    pub original_size: usize,
    /// Hex-encoded sha256 of the original wasm code (stored on chain).
    pub original_checksum: String,
    /// Size of the gzip-compressed code carried in the transaction.
    pub compressed_size: usize,
    /// Hex-encoded sha256 of the compressed code.
    pub compressed_checksum: String,
    /// The code id assigned by the chain.
    pub code_id: u64,
    pub txhash: String,
    pub height: u64,
}

/// Receipt for a freshly instantiated contract.
#[derive(Clone, Debug)]
pub struct InstantiateResult {
    pub contract_address: String,
    pub txhash: String,
    pub height: u64,
}

impl SigningClient {
    /// Gzip and upload contract bytecode, returning the assigned code id.
    pub async fn upload_contract(
        &self,
        sender: &str,
        wasm_code: &[u8],
        fee: &StdFee,
        memo: &str,
    ) -> Result<UploadResult, Error> {
        let compressed = gzip(wasm_code)?;
        let msg = MsgStoreCode {
            sender: sender.to_owned(),
            wasm_byte_code: compressed.clone(),
            instantiate_permission: None,
        };
        let response = self
            .sign_and_broadcast(sender, &[msg.into()], fee, memo)
            .await?
            .assert_success()?;
        let code_id = find_event_attribute(&response.events, &["store_code", "message"], "code_id")
            .ok_or(Error::MissingEventAttribute { field: "code_id" })?
            .parse()
            .map_err(|_| Error::malformed("code_id attribute is not numeric"))?;
        Ok(UploadResult {
            original_size: wasm_code.len(),
            original_checksum: hex::encode(Sha256::digest(wasm_code)),
            compressed_size: compressed.len(),
            compressed_checksum: hex::encode(Sha256::digest(&compressed)),
            code_id,
            txhash: response.txhash,
            height: response.height,
        })
    }

    /// Instantiate a contract from an uploaded code id.
    #[allow(clippy::too_many_arguments)]
    pub async fn instantiate_contract(
        &self,
        sender: &str,
        code_id: u64,
        label: &str,
        msg: &impl serde::Serialize,
        funds: Vec<ProtoCoin>,
        admin: Option<&str>,
        fee: &StdFee,
        memo: &str,
    ) -> Result<InstantiateResult, Error> {
        let msg = MsgInstantiateContract {
            sender: sender.to_owned(),
            admin: admin.unwrap_or_default().to_owned(),
            code_id,
            label: label.to_owned(),
            msg: render_json(msg)?,
            funds,
        };
        let response = self
            .sign_and_broadcast(sender, &[msg.into()], fee, memo)
            .await?
            .assert_success()?;
        let contract_address = find_event_attribute(
            &response.events,
            &["instantiate", "message", "wasm"],
            "_contract_address",
        )
        .or_else(|| {
            find_event_attribute(
                &response.events,
                &["instantiate", "message", "wasm"],
                "contract_address",
            )
        })
        .ok_or(Error::MissingEventAttribute {
            field: "contract_address",
        })?
        .to_owned();
        Ok(InstantiateResult {
            contract_address,
            txhash: response.txhash,
            height: response.height,
        })
    }

    /// Execute a message against a contract. Fails on a non-zero code.
    pub async fn execute_contract(
        &self,
        sender: &str,
        contract: &str,
        msg: &impl serde::Serialize,
        funds: Vec<ProtoCoin>,
        fee: &StdFee,
        memo: &str,
    ) -> Result<BroadcastTxResponse, Error> {
        let msg = MsgExecuteContract {
            sender: sender.to_owned(),
            contract: contract.to_owned(),
            msg: render_json(msg)?,
            funds,
        };
        self.sign_and_broadcast(sender, &[msg.into()], fee, memo)
            .await?
            .assert_success()
    }

    /// Migrate a contract to a new code id.
    pub async fn migrate_contract(
        &self,
        sender: &str,
        contract: &str,
        code_id: u64,
        msg: &impl serde::Serialize,
        fee: &StdFee,
        memo: &str,
    ) -> Result<BroadcastTxResponse, Error> {
        let msg = MsgMigrateContract {
            sender: sender.to_owned(),
            contract: contract.to_owned(),
            code_id,
            msg: render_json(msg)?,
        };
        self.sign_and_broadcast(sender, &[msg.into()], fee, memo)
            .await?
            .assert_success()
    }

    /// Set a new admin on a contract.
    pub async fn update_contract_admin(
        &self,
        sender: &str,
        contract: &str,
        new_admin: &str,
        fee: &StdFee,
        memo: &str,
    ) -> Result<BroadcastTxResponse, Error> {
        let msg = MsgUpdateAdmin {
            sender: sender.to_owned(),
            new_admin: new_admin.to_owned(),
            contract: contract.to_owned(),
        };
        self.sign_and_broadcast(sender, &[msg.into()], fee, memo)
            .await?
            .assert_success()
    }

    /// Clear the admin on a contract, making it immutable.
    pub async fn clear_contract_admin(
        &self,
        sender: &str,
        contract: &str,
        fee: &StdFee,
        memo: &str,
    ) -> Result<BroadcastTxResponse, Error> {
        let msg = MsgClearAdmin {
            sender: sender.to_owned(),
            contract: contract.to_owned(),
        };
        self.sign_and_broadcast(sender, &[msg.into()], fee, memo)
            .await?
            .assert_success()
    }
}

impl Cosmos {
    /// Perform a smart contract query and return the raw response bytes.
    pub async fn wasm_smart_query(
        &self,
        contract: &str,
        msg: &impl serde::Serialize,
    ) -> Result<Vec<u8>, Error> {
        let response: QuerySmartContractStateResponse = self
            .abci_query_proto(
                "/cosmwasm.wasm.v1.Query/SmartContractState",
                QuerySmartContractStateRequest {
                    address: contract.to_owned(),
                    query_data: render_json(msg)?,
                },
            )
            .await?;
        Ok(response.data)
    }

    /// Perform a smart contract query and parse the response as JSON.
    pub async fn wasm_query<T: serde::de::DeserializeOwned>(
        &self,
        contract: &str,
        msg: &impl serde::Serialize,
    ) -> Result<T, Error> {
        let data = self.wasm_smart_query(contract, msg).await?;
        serde_json::from_slice(&data)
            .map_err(|_| Error::malformed("Invalid JSON response from smart contract query"))
    }

    /// Read a raw key from a contract's storage.
    pub async fn wasm_raw_query(&self, contract: &str, key: &[u8]) -> Result<Vec<u8>, Error> {
        let response: QueryRawContractStateResponse = self
            .abci_query_proto(
                "/cosmwasm.wasm.v1.Query/RawContractState",
                QueryRawContractStateRequest {
                    address: contract.to_owned(),
                    query_data: key.to_vec(),
                },
            )
            .await?;
        Ok(response.data)
    }

    /// Contract metadata: code id, creator, admin, label.
    pub async fn contract_info(&self, address: &str) -> Result<ContractInfo, Error> {
        let response: QueryContractInfoResponse = self
            .abci_query_proto(
                "/cosmwasm.wasm.v1.Query/ContractInfo",
                QueryContractInfoRequest {
                    address: address.to_owned(),
                },
            )
            .await?;
        response
            .contract_info
            .ok_or_else(|| Error::malformed("missing contract_info in query response"))
    }
}

fn render_json(msg: &impl serde::Serialize) -> Result<Vec<u8>, Error> {
    serde_json::to_vec(msg).map_err(|err| Error::MalformedResponse {
        message: format!("Could not serialize contract message: {err}"),
    })
}

fn gzip(data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(data)
        .and_then(|()| encoder.finish())
        .map_err(|err| Error::MalformedResponse {
            message: format!("Could not gzip contract code: {err}"),
        })
}

/// Scan transaction events for an attribute, checking the given event types
/// in order.
fn find_event_attribute<'a>(
    events: &'a [Event],
    event_types: &[&str],
    key: &str,
) -> Option<&'a str> {
    for event_type in event_types {
        for event in events.iter().filter(|event| event.event_type == *event_type) {
            for attribute in &event.attributes {
                if attribute.key == key {
                    return Some(&attribute.value);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Read;

    use crate::tendermint::responses::EventAttribute;

    #[test]
    fn gzip_roundtrips() {
        let data = b"\x00asm fake wasm blob fake wasm blob fake wasm blob";
        let compressed = gzip(data).unwrap();
        assert_ne!(compressed, data.to_vec());

        let mut decoder = flate2::read::GzDecoder::new(compressed.as_slice());
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).unwrap();
        assert_eq!(decompressed, data.to_vec());
    }

    fn event(event_type: &str, key: &str, value: &str) -> Event {
        Event {
            event_type: event_type.to_owned(),
            attributes: vec![EventAttribute {
                key: key.to_owned(),
                value: value.to_owned(),
            }],
        }
    }

    #[test]
    fn finds_attributes_by_event_type_priority() {
        let events = vec![
            event("message", "code_id", "7"),
            event("store_code", "code_id", "9"),
        ];
        // store_code is checked first
        assert_eq!(
            find_event_attribute(&events, &["store_code", "message"], "code_id"),
            Some("9")
        );
        assert_eq!(
            find_event_attribute(&events, &["missing"], "code_id"),
            None
        );
    }

    #[test]
    fn finds_instantiate_address_under_either_name() {
        let modern = vec![event("instantiate", "_contract_address", "cosmos1abc")];
        assert_eq!(
            find_event_attribute(&modern, &["instantiate", "message", "wasm"], "_contract_address"),
            Some("cosmos1abc")
        );
        let legacy = vec![event("message", "contract_address", "cosmos1xyz")];
        assert_eq!(
            find_event_attribute(&legacy, &["instantiate", "message", "wasm"], "contract_address"),
            Some("cosmos1xyz")
        );
    }
}
