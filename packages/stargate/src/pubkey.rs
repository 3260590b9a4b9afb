//! Public key types and the legacy Amino binary/bech32 codec for them.
//!
//! Tendermint's pre-protobuf registry serializes public keys as a fixed
//! 4-byte type prefix, a length byte, and the raw key material. Multisig
//! keys additionally frame every nested key with a tag byte and a varint
//! length. These prefixes are fixed by the protocol, see
//! <https://github.com/tendermint/tendermint/blob/d419fffe18531317c28c29a292ad7d253f6cafdf/docs/spec/blockchain/encoding.md#public-key-cryptography>.

use base64::Engine;
use bech32::{FromBase32, ToBase32};
use serde::de::Visitor;
use serde::ser::SerializeMap;

use crate::error::EncodingError;

/// Amino JSON type tag for secp256k1 keys.
pub const TYPE_SECP256K1: &str = "tendermint/PubKeySecp256k1";
/// Amino JSON type tag for ed25519 keys.
pub const TYPE_ED25519: &str = "tendermint/PubKeyEd25519";
/// Amino JSON type tag for sr25519 keys.
pub const TYPE_SR25519: &str = "tendermint/PubKeySr25519";
/// Amino JSON type tag for multisig threshold keys.
pub const TYPE_MULTISIG_THRESHOLD: &str = "tendermint/PubKeyMultisigThreshold";

// Last byte is the varint-encoded payload length.
const PREFIX_SECP256K1: [u8; 5] = [0xeb, 0x5a, 0xe9, 0x87, 0x21];
const PREFIX_ED25519: [u8; 5] = [0x16, 0x24, 0xde, 0x64, 0x20];
const PREFIX_SR25519: [u8; 5] = [0x0d, 0xfb, 0x10, 0x05, 0x20];
// Variable length, so no length byte in the prefix.
const PREFIX_MULTISIG_THRESHOLD: [u8; 4] = [0x22, 0xc1, 0xf7, 0xe2];

fn base64_engine() -> base64::engine::general_purpose::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

/// A public key in its Amino JSON representation.
///
/// Single-key variants hold the raw key bytes base64-encoded, tagged by the
/// type strings above. The multisig variant holds a threshold and an ordered
/// list of nested keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublicKey {
    /// Compressed secp256k1 key, 33 bytes base64-encoded.
    Secp256k1 { value: String },
    /// Ed25519 key, 32 bytes base64-encoded.
    Ed25519 { value: String },
    /// Sr25519 key, 32 bytes base64-encoded.
    Sr25519 { value: String },
    /// k-of-n threshold key over an ordered list of nested keys.
    MultisigThreshold {
        threshold: u32,
        pubkeys: Vec<PublicKey>,
    },
}

impl PublicKey {
    /// The Amino JSON type tag for this key.
    pub fn type_tag(&self) -> &'static str {
        match self {
            PublicKey::Secp256k1 { .. } => TYPE_SECP256K1,
            PublicKey::Ed25519 { .. } => TYPE_ED25519,
            PublicKey::Sr25519 { .. } => TYPE_SR25519,
            PublicKey::MultisigThreshold { .. } => TYPE_MULTISIG_THRESHOLD,
        }
    }

    /// Raw key bytes for single-key variants.
    pub fn raw_bytes(&self) -> Result<Vec<u8>, EncodingError> {
        match self {
            PublicKey::Secp256k1 { value }
            | PublicKey::Ed25519 { value }
            | PublicKey::Sr25519 { value } => Ok(base64_engine().decode(value)?),
            PublicKey::MultisigThreshold { .. } => Err(EncodingError::UnsupportedPubkeyVariant),
        }
    }
}

/// Build a secp256k1 pubkey from raw compressed SEC1 bytes.
///
/// Requires exactly 33 bytes starting with 0x02 or 0x03.
pub fn encode_secp256k1_pubkey(pubkey: &[u8]) -> Result<PublicKey, EncodingError> {
    if pubkey.len() != 33 || (pubkey[0] != 0x02 && pubkey[0] != 0x03) {
        return Err(EncodingError::InvalidSecp256k1Pubkey);
    }
    Ok(PublicKey::Secp256k1 {
        value: base64_engine().encode(pubkey),
    })
}

/// Decode a pubkey in the Amino binary format to its type/value form.
pub fn decode_amino_pubkey(data: &[u8]) -> Result<PublicKey, EncodingError> {
    if data.starts_with(&PREFIX_SECP256K1) {
        let rest = &data[PREFIX_SECP256K1.len()..];
        if rest.len() != 33 {
            return Err(EncodingError::InvalidPubkeyLength {
                kind: "compressed secp256k1",
                expected: 33,
                actual: rest.len(),
            });
        }
        Ok(PublicKey::Secp256k1 {
            value: base64_engine().encode(rest),
        })
    } else if data.starts_with(&PREFIX_ED25519) {
        let rest = &data[PREFIX_ED25519.len()..];
        if rest.len() != 32 {
            return Err(EncodingError::InvalidPubkeyLength {
                kind: "Ed25519",
                expected: 32,
                actual: rest.len(),
            });
        }
        Ok(PublicKey::Ed25519 {
            value: base64_engine().encode(rest),
        })
    } else if data.starts_with(&PREFIX_SR25519) {
        let rest = &data[PREFIX_SR25519.len()..];
        if rest.len() != 32 {
            return Err(EncodingError::InvalidPubkeyLength {
                kind: "Sr25519",
                expected: 32,
                actual: rest.len(),
            });
        }
        Ok(PublicKey::Sr25519 {
            value: base64_engine().encode(rest),
        })
    } else {
        Err(EncodingError::UnsupportedPubkeyType {
            prefix_hex: hex::encode(&data[..data.len().min(5)]),
        })
    }
}

/// Decode a bech32 pubkey. The human-readable prefix is ignored and discarded.
pub fn decode_bech32_pubkey(bech_encoded: &str) -> Result<PublicKey, EncodingError> {
    let (_hrp, data, _variant) = bech32::decode(bech_encoded)?;
    let data = Vec::<u8>::from_base32(&data)?;
    decode_amino_pubkey(&data)
}

/// Uvarint encoder matching `binary.PutUvarint` from the Go standard library,
/// restricted to a single byte. Multi-byte varints are not implemented, so
/// values over 127 are rejected.
fn encode_uvarint(value: u64) -> Result<u8, EncodingError> {
    if value > 127 {
        return Err(EncodingError::UvarintTooLarge { value });
    }
    Ok(value as u8)
}

/// Encode a public key to binary Amino.
pub fn encode_amino_pubkey(pubkey: &PublicKey) -> Result<Vec<u8>, EncodingError> {
    match pubkey {
        PublicKey::MultisigThreshold { threshold, pubkeys } => {
            let mut out = PREFIX_MULTISIG_THRESHOLD.to_vec();
            out.push(0x08);
            out.push(encode_uvarint(u64::from(*threshold))?);
            for nested in pubkeys {
                let nested = encode_amino_pubkey(nested)?;
                out.push(0x12);
                out.push(encode_uvarint(nested.len() as u64)?);
                out.extend_from_slice(&nested);
            }
            Ok(out)
        }
        PublicKey::Ed25519 { .. } => {
            let mut out = PREFIX_ED25519.to_vec();
            out.extend_from_slice(&pubkey.raw_bytes()?);
            Ok(out)
        }
        PublicKey::Secp256k1 { .. } => {
            let mut out = PREFIX_SECP256K1.to_vec();
            out.extend_from_slice(&pubkey.raw_bytes()?);
            Ok(out)
        }
        PublicKey::Sr25519 { .. } => Err(EncodingError::UnsupportedPubkeyVariant),
    }
}

/// Encode a public key to binary Amino and then to bech32 with the given
/// human-readable prefix.
pub fn encode_bech32_pubkey(pubkey: &PublicKey, prefix: &str) -> Result<String, EncodingError> {
    let data = encode_amino_pubkey(pubkey)?;
    Ok(bech32::encode(prefix, data.to_base32(), bech32::Variant::Bech32)?)
}

impl serde::Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("type", self.type_tag())?;
        match self {
            PublicKey::Secp256k1 { value }
            | PublicKey::Ed25519 { value }
            | PublicKey::Sr25519 { value } => {
                map.serialize_entry("value", value)?;
            }
            PublicKey::MultisigThreshold { threshold, pubkeys } => {
                #[derive(serde::Serialize)]
                struct MultisigValue<'a> {
                    threshold: String,
                    pubkeys: &'a [PublicKey],
                }
                map.serialize_entry(
                    "value",
                    &MultisigValue {
                        threshold: threshold.to_string(),
                        pubkeys,
                    },
                )?;
            }
        }
        map.end()
    }
}

impl<'de> serde::Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_map(PublicKeyVisitor)
    }
}

struct PublicKeyVisitor;

impl<'de> Visitor<'de> for PublicKeyVisitor {
    type Value = PublicKey;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("an Amino pubkey object with type and value fields")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        use serde::de::Error;

        let mut type_tag: Option<String> = None;
        let mut value: Option<serde_json::Value> = None;
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "type" => type_tag = Some(map.next_value()?),
                "value" => value = Some(map.next_value()?),
                other => return Err(A::Error::unknown_field(other, &["type", "value"])),
            }
        }
        let type_tag = type_tag.ok_or_else(|| A::Error::missing_field("type"))?;
        let value = value.ok_or_else(|| A::Error::missing_field("value"))?;

        let single = |value: &serde_json::Value| -> Result<String, A::Error> {
            value
                .as_str()
                .map(|s| s.to_owned())
                .ok_or_else(|| A::Error::custom("pubkey value must be a base64 string"))
        };

        match type_tag.as_str() {
            TYPE_SECP256K1 => Ok(PublicKey::Secp256k1 {
                value: single(&value)?,
            }),
            TYPE_ED25519 => Ok(PublicKey::Ed25519 {
                value: single(&value)?,
            }),
            TYPE_SR25519 => Ok(PublicKey::Sr25519 {
                value: single(&value)?,
            }),
            TYPE_MULTISIG_THRESHOLD => {
                let threshold = value
                    .get("threshold")
                    .and_then(|t| t.as_str())
                    .and_then(|t| t.parse().ok())
                    .ok_or_else(|| A::Error::custom("multisig threshold must be a numeric string"))?;
                let pubkeys = value
                    .get("pubkeys")
                    .cloned()
                    .ok_or_else(|| A::Error::missing_field("pubkeys"))?;
                let pubkeys: Vec<PublicKey> =
                    serde_json::from_value(pubkeys).map_err(A::Error::custom)?;
                Ok(PublicKey::MultisigThreshold { threshold, pubkeys })
            }
            other => Err(A::Error::custom(format!("unknown pubkey type {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECP_BASE64: &str = "AtQaCqFnshaZQp6rIkvAPyzThvCvXSDO+9AzbxVErqJP";

    fn demo_secp_bytes() -> Vec<u8> {
        base64_engine().decode(SECP_BASE64).unwrap()
    }

    #[test]
    fn encode_secp256k1_pubkey_accepts_compressed_keys() {
        let bytes = demo_secp_bytes();
        assert_eq!(bytes.len(), 33);
        let pubkey = encode_secp256k1_pubkey(&bytes).unwrap();
        assert_eq!(
            pubkey,
            PublicKey::Secp256k1 {
                value: SECP_BASE64.to_owned()
            }
        );
    }

    #[test]
    fn encode_secp256k1_pubkey_rejection_boundaries() {
        // 32 bytes
        assert!(encode_secp256k1_pubkey(&demo_secp_bytes()[1..]).is_err());
        // 33 bytes but uncompressed point marker
        let mut uncompressed = demo_secp_bytes();
        uncompressed[0] = 0x04;
        assert!(encode_secp256k1_pubkey(&uncompressed).is_err());
        // 0x02 and 0x03 markers both fine
        let mut with_02 = demo_secp_bytes();
        with_02[0] = 0x02;
        assert!(encode_secp256k1_pubkey(&with_02).is_ok());
        let mut with_03 = demo_secp_bytes();
        with_03[0] = 0x03;
        assert!(encode_secp256k1_pubkey(&with_03).is_ok());
    }

    #[test]
    fn amino_binary_roundtrip_secp256k1() {
        let pubkey = encode_secp256k1_pubkey(&demo_secp_bytes()).unwrap();
        let binary = encode_amino_pubkey(&pubkey).unwrap();
        assert_eq!(&binary[..5], &PREFIX_SECP256K1);
        assert_eq!(binary.len(), 38);
        assert_eq!(decode_amino_pubkey(&binary).unwrap(), pubkey);
    }

    #[test]
    fn amino_binary_roundtrip_ed25519() {
        let raw = [0x11u8; 32];
        let pubkey = PublicKey::Ed25519 {
            value: base64_engine().encode(raw),
        };
        let binary = encode_amino_pubkey(&pubkey).unwrap();
        assert_eq!(&binary[..5], &PREFIX_ED25519);
        assert_eq!(decode_amino_pubkey(&binary).unwrap(), pubkey);
    }

    #[test]
    fn decode_rejects_wrong_payload_length() {
        let mut data = PREFIX_SECP256K1.to_vec();
        data.extend_from_slice(&[0u8; 32]);
        assert!(decode_amino_pubkey(&data).is_err());
    }

    #[test]
    fn decode_reports_unknown_prefix_in_hex() {
        let err = decode_amino_pubkey(&[0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]).unwrap_err();
        match err {
            EncodingError::UnsupportedPubkeyType { prefix_hex } => {
                assert_eq!(prefix_hex, "deadbeef00");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bech32_roundtrip() {
        let pubkey = encode_secp256k1_pubkey(&demo_secp_bytes()).unwrap();
        let encoded = encode_bech32_pubkey(&pubkey, "cosmospub").unwrap();
        assert!(encoded.starts_with("cosmospub1"));
        assert_eq!(decode_bech32_pubkey(&encoded).unwrap(), pubkey);
    }

    fn multisig(threshold: u32, count: usize) -> PublicKey {
        let nested = encode_secp256k1_pubkey(&demo_secp_bytes()).unwrap();
        PublicKey::MultisigThreshold {
            threshold,
            pubkeys: vec![nested; count],
        }
    }

    #[test]
    fn multisig_encoding_layout() {
        let binary = encode_amino_pubkey(&multisig(2, 2)).unwrap();
        assert_eq!(&binary[..4], &PREFIX_MULTISIG_THRESHOLD);
        assert_eq!(binary[4], 0x08);
        assert_eq!(binary[5], 2); // threshold
        assert_eq!(binary[6], 0x12);
        assert_eq!(binary[7], 38); // nested key length
        assert_eq!(&binary[8..13], &PREFIX_SECP256K1);
    }

    #[test]
    fn multisig_threshold_boundary() {
        assert!(encode_amino_pubkey(&multisig(127, 1)).is_ok());
        let err = encode_amino_pubkey(&multisig(128, 1)).unwrap_err();
        match err {
            EncodingError::UvarintTooLarge { value } => assert_eq!(value, 128),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn json_roundtrip_multisig() {
        let pubkey = multisig(3, 2);
        let json = serde_json::to_value(&pubkey).unwrap();
        assert_eq!(json["type"], TYPE_MULTISIG_THRESHOLD);
        assert_eq!(json["value"]["threshold"], "3");
        let back: PublicKey = serde_json::from_value(json).unwrap();
        assert_eq!(back, pubkey);
    }
}
