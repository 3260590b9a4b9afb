use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use bitcoin::hashes::{ripemd160, sha256, Hash};
use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::{All, Message, Secp256k1};
use bitcoin::util::bip32::{DerivationPath, ExtendedPrivKey, ExtendedPubKey};
use cosmos_sdk_proto::cosmos::tx::v1beta1::SignDoc;
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;
use prost::Message as _;
use rand::Rng;

use crate::address::{Address, AddressHrp, RawAddress};
use crate::amino::{serialize_sign_doc, StdSignDoc, StdSignature};
use crate::error::{SignerError, WalletError};
use crate::pubkey::encode_secp256k1_pubkey;
use crate::signer::{
    AccountData, Algo, AminoSignResponse, AminoSigner, DirectSignResponse, DirectSigner,
};

/// A seed phrase for a wallet
#[derive(Clone)]
pub struct SeedPhrase {
    mnemonic: bip39::Mnemonic,
}

impl SeedPhrase {
    fn random() -> SeedPhrase {
        let mut rng = rand::thread_rng();
        let mut entropy: [u8; 32] = [0; 32];
        for b in &mut entropy {
            *b = rng.gen();
        }
        SeedPhrase {
            mnemonic: bip39::Mnemonic::from_entropy(&entropy)
                .expect("32 bytes of entropy is always a valid 24 word phrase"),
        }
    }
}

impl From<bip39::Mnemonic> for SeedPhrase {
    fn from(mnemonic: bip39::Mnemonic) -> Self {
        SeedPhrase { mnemonic }
    }
}

impl FromStr for SeedPhrase {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mnemonic = s.parse().map_err(|_| WalletError::InvalidPhrase)?;
        Ok(SeedPhrase { mnemonic })
    }
}

/// A private key for a wallet, without a chain-specific address prefix.
#[derive(Clone)]
pub struct RawWallet {
    seed_phrase: SeedPhrase,
    derivation_path: Option<Arc<DerivationPath>>,
}

impl FromStr for RawWallet {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RawWallet::from_phrase(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DerivationPathComponent {
    pub value: u64,
    pub hardened: bool,
}

/// Derivation path description below the fixed `m/44'` purpose level.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DerivationPathConfig {
    components: Vec<DerivationPathComponent>,
}

impl DerivationPathConfig {
    /// The conventional Cosmos Hub path `m/44'/118'/0'/0/index`.
    pub fn cosmos_numbered(index: u64) -> Self {
        DerivationPathConfig {
            components: vec![
                DerivationPathComponent {
                    value: 118,
                    hardened: true,
                },
                DerivationPathComponent {
                    value: 0,
                    hardened: true,
                },
                DerivationPathComponent {
                    value: 0,
                    hardened: false,
                },
                DerivationPathComponent {
                    value: index,
                    hardened: false,
                },
            ],
        }
    }

    pub fn as_derivation_path(&self) -> Arc<DerivationPath> {
        static PATHS: Lazy<Arc<Mutex<HashMap<DerivationPathConfig, Arc<DerivationPath>>>>> =
            Lazy::new(|| Arc::new(Mutex::new(HashMap::new())));
        let mut guard = PATHS.lock();
        match guard.get(self) {
            Some(s) => s.clone(),
            None => {
                let path_str = self.to_string();
                let path = Arc::new(
                    path_str
                        .parse()
                        .expect("Generated derivation path must parse"),
                );
                guard.insert(self.clone(), path);
                guard.get(self).unwrap().clone()
            }
        }
    }
}

impl Display for DerivationPathConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "m/44'")?;
        for component in &self.components {
            write!(f, "/{component}")?
        }
        Ok(())
    }
}

impl Display for DerivationPathComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.hardened {
            write!(f, "{}'", self.value)
        } else {
            write!(f, "{}", self.value)
        }
    }
}

impl RawWallet {
    /// Parse a phrase, optionally preceded by a derivation path like
    /// `m/44'/118'/0'/0/0 <words...>`.
    pub fn from_phrase(phrase: &str) -> Result<Self, WalletError> {
        let (derivation_path, phrase) = if phrase.starts_with("m/44") {
            match phrase.split_once(' ') {
                Some((path, phrase)) => {
                    let path = Arc::new(
                        path.parse()
                            .map_err(|_| WalletError::InvalidDerivationPath(path.to_owned()))?,
                    );
                    (Some(path), phrase)
                }
                None => (None, phrase),
            }
        } else {
            (None, phrase)
        };

        let seed_phrase = SeedPhrase::from_str(phrase)?;
        Ok(RawWallet {
            seed_phrase,
            derivation_path,
        })
    }

    /// Derive the wallet for a chain with the given address prefix.
    pub fn for_chain(&self, hrp: AddressHrp) -> Result<Wallet, WalletError> {
        let secp = global_secp();
        let derivation_path = self
            .derivation_path
            .clone()
            .unwrap_or_else(|| DerivationPathConfig::cosmos_numbered(0).as_derivation_path());

        let root_private_key = ExtendedPrivKey::new_master(
            bitcoin::Network::Bitcoin,
            &self.seed_phrase.mnemonic.to_seed(""),
        )?;
        let privkey = root_private_key.derive_priv(secp, &*derivation_path)?;
        let public_key = ExtendedPubKey::from_priv(secp, &privkey);

        let public_key_bytes = public_key.public_key.serialize();
        let raw_address = address_from_public_key(&public_key_bytes);
        let address = RawAddress::from(raw_address).with_hrp(hrp);

        Ok(Wallet {
            address,
            privkey,
            public_key_bytes,
        })
    }
}

/// A wallet capable of signing on a specific chain, on both the Direct and
/// the legacy Amino path.
#[derive(Clone)]
// Not deriving Copy since this is a pretty large data structure.
pub struct Wallet {
    address: Address,
    privkey: ExtendedPrivKey,
    public_key_bytes: [u8; 33],
}

fn global_secp() -> &'static Secp256k1<All> {
    static CELL: OnceCell<Secp256k1<All>> = OnceCell::new();
    CELL.get_or_init(Secp256k1::new)
}

impl Wallet {
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Generate a random mnemonic phrase
    pub fn generate_phrase() -> String {
        SeedPhrase::random().mnemonic.to_string()
    }

    /// Generate a random wallet
    pub fn generate(hrp: AddressHrp) -> Result<Self, WalletError> {
        RawWallet {
            seed_phrase: SeedPhrase::random(),
            derivation_path: None,
        }
        .for_chain(hrp)
    }

    pub fn from_phrase(phrase: &str, hrp: AddressHrp) -> Result<Self, WalletError> {
        RawWallet::from_phrase(phrase)?.for_chain(hrp)
    }

    pub fn public_key_bytes(&self) -> &[u8] {
        &self.public_key_bytes
    }

    pub fn sign_bytes(&self, msg: &[u8]) -> Signature {
        let msg = sha256::Hash::hash(msg);
        let msg = Message::from_slice(msg.as_ref()).unwrap();
        global_secp().sign_ecdsa(&msg, &self.privkey.private_key)
    }

    fn account_data(&self) -> AccountData {
        AccountData {
            address: self.address.to_string(),
            algo: Algo::Secp256k1,
            pubkey: self.public_key_bytes.to_vec(),
        }
    }

    fn std_signature(&self, message: &[u8]) -> StdSignature {
        let signature = self.sign_bytes(message);
        StdSignature {
            pub_key: encode_secp256k1_pubkey(&self.public_key_bytes)
                .expect("Wallet pubkey is always a compressed secp256k1 key"),
            signature: base64::engine::general_purpose::STANDARD
                .encode(signature.serialize_compact()),
        }
    }

    fn check_address(&self, signer_address: &str) -> Result<(), SignerError> {
        if signer_address == self.address.to_string() {
            Ok(())
        } else {
            Err(SignerError::AccountNotFound {
                address: signer_address.to_owned(),
            })
        }
    }
}

#[async_trait]
impl DirectSigner for Wallet {
    async fn accounts(&self) -> Result<Vec<AccountData>, SignerError> {
        Ok(vec![self.account_data()])
    }

    async fn sign_direct(
        &self,
        signer_address: &str,
        sign_doc: SignDoc,
    ) -> Result<DirectSignResponse, SignerError> {
        self.check_address(signer_address)?;
        let signature = self.std_signature(&sign_doc.encode_to_vec());
        Ok(DirectSignResponse {
            signed: sign_doc,
            signature,
        })
    }
}

#[async_trait]
impl AminoSigner for Wallet {
    async fn accounts(&self) -> Result<Vec<AccountData>, SignerError> {
        Ok(vec![self.account_data()])
    }

    async fn sign_amino(
        &self,
        signer_address: &str,
        sign_doc: StdSignDoc,
    ) -> Result<AminoSignResponse, SignerError> {
        self.check_address(signer_address)?;
        let message = serialize_sign_doc(&sign_doc).map_err(|e| SignerError::Failed {
            message: format!("Could not serialize sign doc: {e}"),
        })?;
        let signature = self.std_signature(&message);
        Ok(AminoSignResponse {
            signed: sign_doc,
            signature,
        })
    }
}

fn address_from_public_key(public_key: &[u8]) -> [u8; 20] {
    let sha = sha256::Hash::hash(public_key);
    ripemd160::Hash::hash(sha.as_ref()).into_inner()
}

impl Display for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The simapp faucet account
    const TEST_PHRASE: &str =
        "economy stock theory fatal elder harbor betray wasp final emotion task crumble \
         siren bottom lizard educate guess current outdoor pair theory focus wife stone";

    #[test]
    fn derives_known_address_and_pubkey() {
        let wallet = Wallet::from_phrase(TEST_PHRASE, AddressHrp::from_static("cosmos")).unwrap();
        assert_eq!(
            wallet.address().to_string(),
            "cosmos1pkptre7fdkl6gfrzlesjjvhxhlc3r4gmmk8rs6"
        );
        assert_eq!(
            base64::engine::general_purpose::STANDARD.encode(wallet.public_key_bytes()),
            "A08EGB7ro1ORuFhjOnZcSgwYlpe0DSFjVNUIkNNQxwKQ"
        );
    }

    #[test]
    fn custom_derivation_path_changes_address() {
        let default = Wallet::from_phrase(TEST_PHRASE, AddressHrp::from_static("cosmos")).unwrap();
        let custom = Wallet::from_phrase(
            &format!("m/44'/118'/0'/0/1 {TEST_PHRASE}"),
            AddressHrp::from_static("cosmos"),
        )
        .unwrap();
        assert_ne!(default.address().to_string(), custom.address().to_string());
    }

    #[test]
    fn generated_phrases_parse_back() {
        let phrase = Wallet::generate_phrase();
        assert_eq!(phrase.split(' ').count(), 24);
        Wallet::from_phrase(&phrase, AddressHrp::from_static("cosmos")).unwrap();
    }

    #[test]
    fn signature_verifies() {
        use bitcoin::secp256k1::PublicKey;

        let wallet = Wallet::from_phrase(TEST_PHRASE, AddressHrp::from_static("cosmos")).unwrap();
        let message = b"hello world";
        let signature = wallet.sign_bytes(message);

        let digest = sha256::Hash::hash(message);
        let msg = Message::from_slice(digest.as_ref()).unwrap();
        let pubkey = PublicKey::from_slice(wallet.public_key_bytes()).unwrap();
        global_secp().verify_ecdsa(&msg, &signature, &pubkey).unwrap();
    }

    #[tokio::test]
    async fn wallet_rejects_foreign_addresses() {
        let wallet = Wallet::from_phrase(TEST_PHRASE, AddressHrp::from_static("cosmos")).unwrap();
        let err = wallet
            .sign_direct(
                "cosmos1pkptre7fdkl6gfrzlesjjvhxhlc3r4gmmk8rs6",
                SignDoc::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SignerError::AccountNotFound { .. }));
    }
}
