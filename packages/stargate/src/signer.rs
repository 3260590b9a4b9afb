//! Signer interfaces for the two mutually exclusive signing protocols.
//!
//! A signer is injected into the signing client and either signs canonical
//! protobuf bytes (Direct) or a canonical Amino JSON document (legacy).
//! Which protocol is used is decided once, by which variant of [Signer] the
//! caller constructs, never by runtime probing.

use async_trait::async_trait;
use cosmos_sdk_proto::cosmos::tx::v1beta1::SignDoc;

use crate::amino::{StdSignDoc, StdSignature};
use crate::error::SignerError;

/// The key algorithm backing an account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algo {
    Secp256k1,
    Ed25519,
    Sr25519,
}

/// One account exposed by a signer.
#[derive(Clone, Debug)]
pub struct AccountData {
    /// A printable address (typically bech32 encoded).
    pub address: String,
    pub algo: Algo,
    /// Raw public key bytes.
    pub pubkey: Vec<u8>,
}

/// The response of a Direct signing call.
///
/// `signed` may differ from the input sign doc: some signers (hardware
/// wallets in particular) modify fee, memo or sequence before signing, and
/// the returned document is the one that was actually signed.
#[derive(Clone, Debug)]
pub struct DirectSignResponse {
    pub signed: SignDoc,
    pub signature: StdSignature,
}

/// The response of an Amino signing call. Same contract as
/// [DirectSignResponse]: the returned document is authoritative.
#[derive(Clone, Debug)]
pub struct AminoSignResponse {
    pub signed: StdSignDoc,
    pub signature: StdSignature,
}

/// A signer that signs canonical protobuf sign docs.
#[async_trait]
pub trait DirectSigner: Send + Sync {
    async fn accounts(&self) -> Result<Vec<AccountData>, SignerError>;

    /// Sign the given doc with the key for `signer_address`.
    async fn sign_direct(
        &self,
        signer_address: &str,
        sign_doc: SignDoc,
    ) -> Result<DirectSignResponse, SignerError>;
}

/// A signer that signs canonical Amino JSON sign docs.
#[async_trait]
pub trait AminoSigner: Send + Sync {
    async fn accounts(&self) -> Result<Vec<AccountData>, SignerError>;

    /// Sign the given doc with the key for `signer_address`.
    async fn sign_amino(
        &self,
        signer_address: &str,
        sign_doc: StdSignDoc,
    ) -> Result<AminoSignResponse, SignerError>;
}

/// The two signing capabilities as an explicit sum type.
pub enum Signer {
    Direct(std::sync::Arc<dyn DirectSigner>),
    Amino(std::sync::Arc<dyn AminoSigner>),
}

impl Signer {
    pub async fn accounts(&self) -> Result<Vec<AccountData>, SignerError> {
        match self {
            Signer::Direct(signer) => signer.accounts().await,
            Signer::Amino(signer) => signer.accounts().await,
        }
    }

    /// Find the account for the given address, erroring the way signers do
    /// when asked about an address they don't manage.
    pub async fn account(&self, address: &str) -> Result<AccountData, SignerError> {
        self.accounts()
            .await?
            .into_iter()
            .find(|account| account.address == address)
            .ok_or_else(|| SignerError::AccountNotFound {
                address: address.to_owned(),
            })
    }
}
