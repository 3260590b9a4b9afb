use std::{
    convert::TryFrom,
    fmt::{Debug, Display},
    str::FromStr,
};

use bech32::{FromBase32, ToBase32};
use serde::de::Visitor;

use crate::error::EncodingError;

/// The human-readable part of a bech32 address, e.g. `cosmos` or `osmo`.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct AddressHrp(String);

impl AddressHrp {
    /// Construct from a static string, e.g. `AddressHrp::from_static("cosmos")`.
    pub fn from_static(hrp: &'static str) -> Self {
        AddressHrp(hrp.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AddressHrp {
    fn default() -> Self {
        AddressHrp::from_static("cosmos")
    }
}

impl Display for AddressHrp {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AddressHrp {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // bech32 will reject invalid HRPs at encoding time; accept any
        // non-empty lowercase prefix here.
        if s.is_empty() {
            return Err(EncodingError::InvalidBech32(bech32::Error::InvalidLength));
        }
        Ok(AddressHrp(s.to_owned()))
    }
}

/// A raw address value not connected to a specific chain HRP. You usually want [Address].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum RawAddress {
    Twenty { raw_address: [u8; 20] },
    ThirtyTwo { raw_address: [u8; 32] },
}

/// Parse a raw address and its HRP from a string. Supports any Cosmos-compatible chain.
pub fn parse_raw_address(s: &str) -> Result<(String, RawAddress), EncodingError> {
    let (hrp, data, variant) = bech32::decode(s)?;
    match variant {
        bech32::Variant::Bech32 => (),
        bech32::Variant::Bech32m => return Err(EncodingError::InvalidBech32(bech32::Error::InvalidChecksum)),
    }
    let data = Vec::<u8>::from_base32(&data)?;
    let raw_address = RawAddress::try_from(data.as_slice())?;
    Ok((hrp, raw_address))
}

impl AsRef<[u8]> for RawAddress {
    fn as_ref(&self) -> &[u8] {
        match self {
            RawAddress::Twenty { raw_address } => raw_address,
            RawAddress::ThirtyTwo { raw_address } => raw_address,
        }
    }
}

impl From<[u8; 20]> for RawAddress {
    fn from(raw_address: [u8; 20]) -> Self {
        RawAddress::Twenty { raw_address }
    }
}

impl From<[u8; 32]> for RawAddress {
    fn from(raw_address: [u8; 32]) -> Self {
        RawAddress::ThirtyTwo { raw_address }
    }
}

impl TryFrom<&[u8]> for RawAddress {
    type Error = EncodingError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        match value.try_into().ok() {
            Some(raw_address) => Ok(RawAddress::Twenty { raw_address }),
            None => value
                .try_into()
                .map(|raw_address| RawAddress::ThirtyTwo { raw_address })
                .map_err(|_| EncodingError::InvalidBech32(bech32::Error::InvalidLength)),
        }
    }
}

impl RawAddress {
    pub fn with_hrp(self, hrp: AddressHrp) -> Address {
        Address {
            raw_address: self,
            hrp,
        }
    }
}

/// An account address on a Cosmos chain.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Address {
    raw_address: RawAddress,
    hrp: AddressHrp,
}

impl Address {
    pub fn raw(&self) -> &RawAddress {
        &self.raw_address
    }

    pub fn hrp(&self) -> &AddressHrp {
        &self.hrp
    }

    /// Re-express this address with a different HRP.
    pub fn with_hrp(&self, hrp: AddressHrp) -> Self {
        Address {
            raw_address: self.raw_address,
            hrp,
        }
    }
}

impl Display for Address {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        bech32::encode_to_fmt(
            fmt,
            self.hrp.as_str(),
            self.raw_address.to_base32(),
            bech32::Variant::Bech32,
        )
        .expect("Invalid HRP")
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl FromStr for Address {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hrp, raw_address) = parse_raw_address(s)?;
        Ok(Address {
            raw_address,
            hrp: AddressHrp(hrp),
        })
    }
}

impl serde::Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_str(AddressVisitor)
    }
}

struct AddressVisitor;

impl<'de> Visitor<'de> for AddressVisitor {
    type Value = Address;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("Cosmos address")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        v.parse().map_err(E::custom)
    }
}
