//! Gas prices and fee calculation.

use std::fmt::Display;
use std::str::FromStr;

use crate::amino::{Coin, StdFee};
use crate::error::Error;

/// A gas price: the cost of a single unit of gas, typically a fraction of
/// the smallest fee token unit, such as `0.025ucosm`.
#[derive(Clone, Debug, PartialEq)]
pub struct GasPrice {
    pub amount: f64,
    pub denom: String,
}

impl GasPrice {
    pub fn new(amount: f64, denom: impl Into<String>) -> Result<Self, Error> {
        let denom = denom.into();
        check_denom(&denom)?;
        Ok(GasPrice { amount, denom })
    }
}

/// Denom checker for the Cosmos SDK denom pattern: 3 to 128 characters,
/// starting with a letter, followed by letters, digits or `/` (for IBC
/// denoms like `ibc/DEADBEEF...`).
fn check_denom(denom: &str) -> Result<(), Error> {
    if denom.len() < 3 || denom.len() > 128 {
        return Err(Error::InvalidGasPrice {
            message: "Denom must be between 3 and 128 characters".to_owned(),
        });
    }
    let mut chars = denom.chars();
    let first = chars.next().expect("denom is non-empty");
    if !first.is_ascii_alphabetic()
        || !chars.all(|c| c.is_ascii_alphanumeric() || c == '/')
    {
        return Err(Error::InvalidGasPrice {
            message: format!("Invalid denom: {denom}"),
        });
    }
    Ok(())
}

impl FromStr for GasPrice {
    type Err = Error;

    /// Parses a gas price formatted as `<amount><denom>`, e.g. `0.012utoken`.
    fn from_str(gas_price: &str) -> Result<Self, Self::Err> {
        let split = gas_price
            .find(|c: char| c.is_ascii_alphabetic())
            .ok_or_else(|| Error::InvalidGasPrice {
                message: format!("Invalid gas price string: {gas_price}"),
            })?;
        let (amount, denom) = gas_price.split_at(split);
        let amount: f64 = amount.parse().map_err(|_| Error::InvalidGasPrice {
            message: format!("Invalid gas price amount: {amount}"),
        })?;
        GasPrice::new(amount, denom)
    }
}

impl Display for GasPrice {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Compute the fee for a gas limit at a given gas price, rounding the fee
/// amount up.
pub fn calculate_fee(gas_limit: u64, gas_price: &GasPrice) -> StdFee {
    let amount = (gas_price.amount * gas_limit as f64).ceil() as u128;
    StdFee::new(vec![Coin::new(amount, &gas_price.denom)], gas_limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_prices() {
        let price: GasPrice = "0.025ucosm".parse().unwrap();
        assert_eq!(price.amount, 0.025);
        assert_eq!(price.denom, "ucosm");

        let price: GasPrice = "3utest".parse().unwrap();
        assert_eq!(price.amount, 3.0);
        assert_eq!(price.denom, "utest");
    }

    #[test]
    fn rejects_invalid_prices() {
        assert!("".parse::<GasPrice>().is_err());
        assert!("0.025".parse::<GasPrice>().is_err());
        assert!("ucosm".parse::<GasPrice>().is_err());
        // Denom too short
        assert!("0.025uc".parse::<GasPrice>().is_err());
    }

    #[test]
    fn calculates_fees_rounding_up() {
        let price: GasPrice = "0.025ucosm".parse().unwrap();
        let fee = calculate_fee(80_000, &price);
        assert_eq!(fee.gas, "80000");
        assert_eq!(fee.amount, vec![Coin::new(2000u32, "ucosm")]);

        // 0.0001 * 123456 = 12.3456 -> rounds up to 13
        let price: GasPrice = "0.0001ustake".parse().unwrap();
        let fee = calculate_fee(123_456, &price);
        assert_eq!(fee.amount, vec![Coin::new(13u32, "ustake")]);
    }
}
