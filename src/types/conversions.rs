use ethers::types::{Address, I256, U256};
use ethers::utils::to_checksum;
use std::str::FromStr;

// Display names and metadata keys both use the EIP-55 form
pub fn checksum(addr: &Address) -> String {
    to_checksum(addr, None)
}

pub fn string_to_address(s: &str) -> Result<Address, ConversionError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(ConversionError::InvalidAddress("empty string".to_string()));
    }
    Address::from_str(trimmed).map_err(|e| ConversionError::InvalidAddress(format!("{trimmed}: {e}")))
}

/// Reinterprets the two's complement word the ABI decoder hands back for `intN` outputs.
pub fn word_to_i256(value: U256) -> I256 {
    I256::from_raw(value)
}

pub fn u256_to_u64(value: U256) -> Result<u64, ConversionError> {
    if value > U256::from(u64::MAX) {
        return Err(ConversionError::Overflow);
    }
    Ok(value.as_u64())
}

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Overflow in conversion")]
    Overflow,
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_normalizes_lowercase_input() {
        let addr = string_to_address("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        assert_eq!(checksum(&addr), "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
    }

    #[test]
    fn rejects_garbage_addresses() {
        assert!(string_to_address("").is_err());
        assert!(string_to_address("0x1234").is_err());
        assert!(string_to_address("not-an-address").is_err());
    }

    #[test]
    fn u64_conversion_guards_overflow() {
        assert_eq!(u256_to_u64(U256::from(42u64)).unwrap(), 42);
        assert!(u256_to_u64(U256::MAX).is_err());
    }
}
