//! The chain client: queries over ABCI, transaction broadcast with
//! inclusion polling, and the signing client driving the Direct and Amino
//! signing paths.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use prost::Message;
use tracing::debug;

use cosmos_sdk_proto::cosmos::auth::v1beta1::{BaseAccount, QueryAccountRequest, QueryAccountResponse};
use cosmos_sdk_proto::cosmos::bank::v1beta1::{
    QueryAllBalancesRequest, QueryAllBalancesResponse, QueryBalanceRequest, QueryBalanceResponse,
};
use cosmos_sdk_proto::cosmos::base::query::v1beta1::PageRequest;
use cosmos_sdk_proto::cosmos::base::v1beta1::Coin as ProtoCoin;
use cosmos_sdk_proto::cosmos::tx::signing::v1beta1::SignMode;
use cosmos_sdk_proto::cosmos::tx::v1beta1::TxRaw;

use crate::address::AddressHrp;
use crate::amino::{make_amino_sign_doc, AminoMsg, AminoTypes, StdFee};
use crate::error::Error;
use crate::signer::{AccountData, AminoSigner, DirectSigner, Signer};
use crate::tendermint::responses::{Event, TxResponse};
use crate::tendermint::{AbciQueryParams, TendermintClient, TxSearchParams};
use crate::txbuilder::{
    encode_pubkey, make_auth_info_bytes, make_sign_doc, make_tx_body, TxMessage,
};
use crate::pubkey::encode_secp256k1_pubkey;

const DEFAULT_BROADCAST_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_BROADCAST_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Account number and sequence for one account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SequenceResponse {
    pub account_number: u64,
    pub sequence: u64,
}

/// Account/chain metadata needed to produce a sign doc.
///
/// Supplying this explicitly skips all chain queries during signing, which
/// is what offline and air-gapped signing flows rely on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignerData {
    pub account_number: u64,
    pub sequence: u64,
    pub chain_id: String,
}

/// The result of broadcasting a transaction that made it into a block.
///
/// A non-zero `code` means the transaction was included but failed; this is
/// deliberately a value, not an error, so callers can inspect the raw log.
#[derive(Clone, Debug)]
pub struct BroadcastTxResponse {
    pub height: u64,
    pub txhash: String,
    pub code: u32,
    pub raw_log: String,
    pub data: Vec<u8>,
    pub gas_wanted: i64,
    pub gas_used: i64,
    pub events: Vec<Event>,
}

impl BroadcastTxResponse {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Turn an on-chain failure into an [Error::TxFailed].
    pub fn assert_success(self) -> Result<Self, Error> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::TxFailed {
                txhash: self.txhash,
                code: self.code,
                raw_log: self.raw_log,
            })
        }
    }
}

impl From<TxResponse> for BroadcastTxResponse {
    fn from(tx: TxResponse) -> Self {
        BroadcastTxResponse {
            height: tx.height,
            txhash: tx.hash,
            code: tx.tx_result.code,
            raw_log: tx.tx_result.log,
            data: tx.tx_result.data,
            gas_wanted: tx.tx_result.gas_wanted.unwrap_or_default(),
            gas_used: tx.tx_result.gas_used.unwrap_or_default(),
            events: tx.tx_result.events,
        }
    }
}

/// A read/broadcast client for one Cosmos chain, on top of the Tendermint
/// RPC connection. Cheap to clone.
#[derive(Clone)]
pub struct Cosmos {
    rpc: Arc<TendermintClient>,
    chain_id: Arc<tokio::sync::OnceCell<String>>,
}

impl Cosmos {
    /// Connect to a Tendermint RPC endpoint (`http(s)://` or `ws(s)://`).
    pub async fn connect(url: &str) -> Result<Cosmos, Error> {
        Ok(Cosmos::new(TendermintClient::connect(url).await?))
    }

    pub fn new(rpc: TendermintClient) -> Cosmos {
        Cosmos {
            rpc: Arc::new(rpc),
            chain_id: Arc::new(tokio::sync::OnceCell::new()),
        }
    }

    /// The underlying Tendermint RPC client, for direct method access and
    /// subscriptions.
    pub fn rpc(&self) -> &TendermintClient {
        &self.rpc
    }

    pub fn disconnect(&self) {
        self.rpc.disconnect();
    }

    /// The chain id, queried once and cached for the lifetime of the client.
    pub async fn get_chain_id(&self) -> Result<String, Error> {
        let chain_id = self
            .chain_id
            .get_or_try_init(|| async {
                let status = self.rpc.status().await?;
                Ok::<_, Error>(status.node_info.network)
            })
            .await?;
        Ok(chain_id.clone())
    }

    pub async fn get_height(&self) -> Result<u64, Error> {
        Ok(self.rpc.status().await?.sync_info.latest_block_height)
    }

    /// Run a gRPC-over-ABCI query: protobuf request in, protobuf response out.
    pub async fn abci_query_proto<Req, Res>(&self, path: &str, request: Req) -> Result<Res, Error>
    where
        Req: Message,
        Res: Message + Default,
    {
        let response = self
            .rpc
            .abci_query(AbciQueryParams {
                path: path.to_owned(),
                data: request.encode_to_vec(),
                height: None,
                prove: false,
            })
            .await?;
        if response.code != 0 {
            return Err(Error::QueryFailed {
                code: response.code,
                log: response.log,
            });
        }
        Ok(Res::decode(response.value.as_slice())?)
    }

    /// Look up the base account for an address. Fails with
    /// [Error::AccountNotFound] for addresses the chain has never seen.
    pub async fn get_account(&self, address: &str) -> Result<BaseAccount, Error> {
        let response: Result<QueryAccountResponse, _> = self
            .abci_query_proto(
                "/cosmos.auth.v1beta1.Query/Account",
                QueryAccountRequest {
                    address: address.to_owned(),
                },
            )
            .await;
        let response = match response {
            Ok(response) => response,
            Err(Error::QueryFailed { log, .. }) if log.contains("not found") => {
                return Err(Error::AccountNotFound {
                    address: address.to_owned(),
                })
            }
            Err(err) => return Err(err),
        };
        let any = response.account.ok_or(Error::AccountNotFound {
            address: address.to_owned(),
        })?;
        Ok(BaseAccount::decode(any.value.as_slice())?)
    }

    /// Account number and current sequence for an address.
    pub async fn get_sequence(&self, address: &str) -> Result<SequenceResponse, Error> {
        let account = self.get_account(address).await?;
        Ok(SequenceResponse {
            account_number: account.account_number,
            sequence: account.sequence,
        })
    }

    /// The balance of a single denom, zero if the account holds none.
    pub async fn get_balance(&self, address: &str, denom: &str) -> Result<ProtoCoin, Error> {
        let response: QueryBalanceResponse = self
            .abci_query_proto(
                "/cosmos.bank.v1beta1.Query/Balance",
                QueryBalanceRequest {
                    address: address.to_owned(),
                    denom: denom.to_owned(),
                },
            )
            .await?;
        Ok(response.balance.unwrap_or(ProtoCoin {
            denom: denom.to_owned(),
            amount: "0".to_owned(),
        }))
    }

    /// All balances of an address, following pagination.
    pub async fn get_all_balances(&self, address: &str) -> Result<Vec<ProtoCoin>, Error> {
        let mut coins = Vec::new();
        let mut pagination: Option<PageRequest> = None;
        loop {
            let mut response: QueryAllBalancesResponse = self
                .abci_query_proto(
                    "/cosmos.bank.v1beta1.Query/AllBalances",
                    QueryAllBalancesRequest {
                        address: address.to_owned(),
                        pagination: pagination.take(),
                    },
                )
                .await?;
            coins.append(&mut response.balances);
            match response.pagination {
                Some(page) if !page.next_key.is_empty() => {
                    pagination = Some(PageRequest {
                        key: page.next_key,
                        offset: 0,
                        limit: 0,
                        count_total: false,
                        reverse: false,
                    })
                }
                _ => break Ok(coins),
            }
        }
    }

    /// Get a transaction by its upper-case hex hash, or `None` if it is not
    /// (yet) in a block.
    pub async fn get_tx(&self, txhash: &str) -> Result<Option<BroadcastTxResponse>, Error> {
        let results = self
            .rpc
            .tx_search(TxSearchParams {
                query: format!("tx.hash='{txhash}'"),
                prove: false,
                page: None,
                per_page: None,
            })
            .await?;
        Ok(results.txs.into_iter().next().map(Into::into))
    }

    /// Broadcast raw transaction bytes and poll until the transaction is
    /// found in a block.
    ///
    /// A mempool rejection surfaces as [Error::BroadcastRejected]. Not
    /// finding the transaction within `timeout` surfaces as
    /// [Error::BroadcastTimedOut]; the transaction may still be included
    /// later. An on-chain failure is NOT an error, check
    /// [BroadcastTxResponse::code].
    pub async fn broadcast_tx(
        &self,
        tx_bytes: &[u8],
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<BroadcastTxResponse, Error> {
        let sync_response = self.rpc.broadcast_tx_sync(tx_bytes).await?;
        if !sync_response.is_accepted() {
            return Err(Error::BroadcastRejected {
                code: sync_response.code,
                log: sync_response.log,
            });
        }
        let txhash = sync_response.hash;
        debug!("Broadcast accepted, polling for inclusion of {txhash}");

        let started = std::time::Instant::now();
        loop {
            if let Some(tx) = self.get_tx(&txhash).await? {
                return Ok(tx);
            }
            if started.elapsed() + poll_interval > timeout {
                return Err(Error::BroadcastTimedOut {
                    txhash,
                    elapsed: started.elapsed(),
                });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

/// Options for constructing a [SigningClient].
pub struct SigningClientOptions {
    /// The Amino type register to use; defaults to the built-in catalog with
    /// the configured prefix.
    pub amino_types: Option<AminoTypes>,
    /// Bech32 address prefix, used inside validator pubkey conversion.
    pub prefix: AddressHrp,
    /// How long to wait for a broadcast transaction to be included.
    pub broadcast_timeout: Duration,
    /// How often to poll for inclusion.
    pub broadcast_poll_interval: Duration,
}

impl Default for SigningClientOptions {
    fn default() -> Self {
        SigningClientOptions {
            amino_types: None,
            prefix: AddressHrp::default(),
            broadcast_timeout: DEFAULT_BROADCAST_TIMEOUT,
            broadcast_poll_interval: DEFAULT_BROADCAST_POLL_INTERVAL,
        }
    }
}

/// A client that can produce signed, broadcast-ready transactions.
///
/// The signing protocol is fixed by the [Signer] variant injected at
/// construction: a Direct signer signs protobuf bytes, an Amino signer signs
/// the canonical JSON document. There is no runtime fallback between the two.
pub struct SigningClient {
    client: Option<Cosmos>,
    signer: Signer,
    amino_types: AminoTypes,
    broadcast_timeout: Duration,
    broadcast_poll_interval: Duration,
}

impl SigningClient {
    /// Connect to an endpoint and attach a signer.
    pub async fn connect(
        url: &str,
        signer: Signer,
        options: SigningClientOptions,
    ) -> Result<SigningClient, Error> {
        let client = Cosmos::connect(url).await?;
        Ok(SigningClient::new(client, signer, options))
    }

    pub fn new(client: Cosmos, signer: Signer, options: SigningClientOptions) -> SigningClient {
        SigningClient {
            client: Some(client),
            signer,
            amino_types: resolve_amino_types(options.amino_types, &options.prefix),
            broadcast_timeout: options.broadcast_timeout,
            broadcast_poll_interval: options.broadcast_poll_interval,
        }
    }

    /// Create a client in offline mode: signing works with explicit
    /// [SignerData], chain queries and broadcasting do not.
    pub fn offline(signer: Signer, options: SigningClientOptions) -> SigningClient {
        SigningClient {
            client: None,
            signer,
            amino_types: resolve_amino_types(options.amino_types, &options.prefix),
            broadcast_timeout: options.broadcast_timeout,
            broadcast_poll_interval: options.broadcast_poll_interval,
        }
    }

    /// The underlying chain client.
    pub fn client(&self) -> Result<&Cosmos, Error> {
        self.client.as_ref().ok_or(Error::Offline)
    }

    pub fn amino_types(&self) -> &AminoTypes {
        &self.amino_types
    }

    /// Sign a transaction over the given messages.
    ///
    /// When `signer_data` is `None`, the account sequence/number and chain
    /// id are queried from the chain; an address unknown to the chain fails
    /// with [Error::AccountNotFound] before any signing happens.
    pub async fn sign(
        &self,
        signer_address: &str,
        messages: &[TxMessage],
        fee: &StdFee,
        memo: &str,
        signer_data: Option<SignerData>,
    ) -> Result<TxRaw, Error> {
        let signer_data = match signer_data {
            Some(signer_data) => signer_data,
            None => {
                let client = self.client()?;
                let sequence = client.get_sequence(signer_address).await?;
                let chain_id = client.get_chain_id().await?;
                SignerData {
                    account_number: sequence.account_number,
                    sequence: sequence.sequence,
                    chain_id,
                }
            }
        };
        match &self.signer {
            Signer::Direct(signer) => {
                self.sign_direct(signer.as_ref(), signer_address, messages, fee, memo, signer_data)
                    .await
            }
            Signer::Amino(signer) => {
                self.sign_amino(signer.as_ref(), signer_address, messages, fee, memo, signer_data)
                    .await
            }
        }
    }

    async fn sign_direct(
        &self,
        signer: &dyn DirectSigner,
        signer_address: &str,
        messages: &[TxMessage],
        fee: &StdFee,
        memo: &str,
        signer_data: SignerData,
    ) -> Result<TxRaw, Error> {
        let account = find_account(signer.accounts().await?, signer_address)?;
        let pubkey = encode_pubkey(&encode_secp256k1_pubkey(&account.pubkey)?)?;
        let body_bytes = make_tx_body(messages, memo).encode_to_vec();
        let auth_info_bytes = make_auth_info_bytes(
            pubkey,
            fee.amount.iter().cloned().map(Into::into).collect(),
            parse_gas(&fee.gas)?,
            signer_data.sequence,
            SignMode::Direct,
        );
        let sign_doc = make_sign_doc(
            body_bytes,
            auth_info_bytes,
            signer_data.chain_id,
            signer_data.account_number,
        );
        let response = signer.sign_direct(signer_address, sign_doc).await?;
        // The signer may have modified the doc before signing; the returned
        // doc is the one covered by the signature, so it is what we encode.
        Ok(TxRaw {
            body_bytes: response.signed.body_bytes,
            auth_info_bytes: response.signed.auth_info_bytes,
            signatures: vec![decode_signature(&response.signature.signature)?],
        })
    }

    async fn sign_amino(
        &self,
        signer: &dyn AminoSigner,
        signer_address: &str,
        messages: &[TxMessage],
        fee: &StdFee,
        memo: &str,
        signer_data: SignerData,
    ) -> Result<TxRaw, Error> {
        let account = find_account(signer.accounts().await?, signer_address)?;
        let pubkey = encode_pubkey(&encode_secp256k1_pubkey(&account.pubkey)?)?;
        let msgs = messages
            .iter()
            .map(|msg| self.amino_types.to_amino(msg))
            .collect::<Result<Vec<AminoMsg>, _>>()?;
        let sign_doc = make_amino_sign_doc(
            msgs,
            fee.clone(),
            signer_data.chain_id,
            memo,
            signer_data.account_number,
            signer_data.sequence,
        );
        let response = signer.sign_amino(signer_address, sign_doc).await?;

        // Re-derive the final transaction from the signer's response, not
        // from our input: fee, memo, sequence and even the messages may have
        // been modified before signing.
        let signed = response.signed;
        let signed_messages = signed
            .msgs
            .iter()
            .map(|msg| self.amino_types.from_amino(msg))
            .collect::<Result<Vec<TxMessage>, _>>()?;
        let body_bytes = make_tx_body(&signed_messages, &signed.memo).encode_to_vec();
        let sequence = signed
            .sequence
            .parse()
            .map_err(|_| Error::malformed("signer returned a non-numeric sequence"))?;
        let auth_info_bytes = make_auth_info_bytes(
            pubkey,
            signed.fee.amount.iter().cloned().map(Into::into).collect(),
            parse_gas(&signed.fee.gas)?,
            sequence,
            SignMode::LegacyAminoJson,
        );
        Ok(TxRaw {
            body_bytes,
            auth_info_bytes,
            signatures: vec![decode_signature(&response.signature.signature)?],
        })
    }

    /// Sign, serialize and broadcast in one go, waiting for inclusion.
    pub async fn sign_and_broadcast(
        &self,
        signer_address: &str,
        messages: &[TxMessage],
        fee: &StdFee,
        memo: &str,
    ) -> Result<BroadcastTxResponse, Error> {
        let tx_raw = self.sign(signer_address, messages, fee, memo, None).await?;
        self.client()?
            .broadcast_tx(
                &tx_raw.encode_to_vec(),
                self.broadcast_timeout,
                self.broadcast_poll_interval,
            )
            .await
    }

    /// Sign and broadcast everything collected in a [TxBuilder].
    pub async fn broadcast_tx_builder(
        &self,
        signer_address: &str,
        builder: &crate::txbuilder::TxBuilder,
        fee: &StdFee,
    ) -> Result<BroadcastTxResponse, Error> {
        self.sign_and_broadcast(
            signer_address,
            builder.messages(),
            fee,
            builder.memo().unwrap_or_default(),
        )
        .await
    }

    /// Send coins from `sender` to `recipient`.
    pub async fn send_tokens(
        &self,
        sender: &str,
        recipient: &str,
        amount: Vec<ProtoCoin>,
        fee: &StdFee,
        memo: &str,
    ) -> Result<BroadcastTxResponse, Error> {
        let msg = cosmos_sdk_proto::cosmos::bank::v1beta1::MsgSend {
            from_address: sender.to_owned(),
            to_address: recipient.to_owned(),
            amount,
        };
        self.sign_and_broadcast(sender, &[msg.into()], fee, memo)
            .await
    }

    pub async fn delegate_tokens(
        &self,
        delegator: &str,
        validator: &str,
        amount: ProtoCoin,
        fee: &StdFee,
        memo: &str,
    ) -> Result<BroadcastTxResponse, Error> {
        let msg = cosmos_sdk_proto::cosmos::staking::v1beta1::MsgDelegate {
            delegator_address: delegator.to_owned(),
            validator_address: validator.to_owned(),
            amount: Some(amount),
        };
        self.sign_and_broadcast(delegator, &[msg.into()], fee, memo)
            .await
    }

    pub async fn undelegate_tokens(
        &self,
        delegator: &str,
        validator: &str,
        amount: ProtoCoin,
        fee: &StdFee,
        memo: &str,
    ) -> Result<BroadcastTxResponse, Error> {
        let msg = cosmos_sdk_proto::cosmos::staking::v1beta1::MsgUndelegate {
            delegator_address: delegator.to_owned(),
            validator_address: validator.to_owned(),
            amount: Some(amount),
        };
        self.sign_and_broadcast(delegator, &[msg.into()], fee, memo)
            .await
    }

    pub async fn withdraw_rewards(
        &self,
        delegator: &str,
        validator: &str,
        fee: &StdFee,
        memo: &str,
    ) -> Result<BroadcastTxResponse, Error> {
        let msg = cosmos_sdk_proto::cosmos::distribution::v1beta1::MsgWithdrawDelegatorReward {
            delegator_address: delegator.to_owned(),
            validator_address: validator.to_owned(),
        };
        self.sign_and_broadcast(delegator, &[msg.into()], fee, memo)
            .await
    }
}

fn resolve_amino_types(amino_types: Option<AminoTypes>, prefix: &AddressHrp) -> AminoTypes {
    amino_types.unwrap_or_else(|| AminoTypes::new(prefix.as_str(), Vec::new()))
}

fn find_account(accounts: Vec<AccountData>, signer_address: &str) -> Result<AccountData, Error> {
    accounts
        .into_iter()
        .find(|account| account.address == signer_address)
        .ok_or_else(|| {
            crate::error::SignerError::AccountNotFound {
                address: signer_address.to_owned(),
            }
            .into()
        })
}

fn parse_gas(gas: &str) -> Result<u64, Error> {
    gas.parse().map_err(|_| Error::InvalidGasPrice {
        message: format!("Invalid gas limit: {gas}"),
    })
}

fn decode_signature(signature: &str) -> Result<Vec<u8>, Error> {
    base64::engine::general_purpose::STANDARD
        .decode(signature)
        .map_err(|_| Error::malformed("signer returned invalid base64 signature"))
}
