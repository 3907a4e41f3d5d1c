//! Common types used across the client
//!
//! Participants are identified by 20-byte account addresses.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// 20-byte account address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address (used by the ledger for "no sponsor")
    pub const ZERO: Address = Address([0u8; 20]);

    /// Create an address from bytes
    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Parse from a hex string, with or without the `0x` prefix
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes =
            hex::decode(digits).map_err(|e| CoreError::InvalidAddress(format!("{}: {}", s, e)))?;
        if bytes.len() != 20 {
            return Err(CoreError::InvalidAddress(format!(
                "{}: expected 20 bytes, got {}",
                s,
                bytes.len()
            )));
        }
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Lowercase hex with `0x` prefix
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Check if this is the zero address
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Shortened form for logs and tables (`0x1234…abcd`)
    pub fn short(&self) -> String {
        let full = self.to_hex();
        format!("{}…{}", &full[..6], &full[full.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde helper: raw 18-decimal amounts travel as decimal strings
pub mod amount_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_roundtrip() {
        let s = "0x00000000000000000000000000000000000000ab";
        let addr = Address::from_hex(s).unwrap();
        assert_eq!(addr.to_hex(), s);
        assert_eq!(addr.0[19], 0xab);
        assert!(!addr.is_zero());
    }

    #[test]
    fn test_address_accepts_bare_and_uppercase() {
        let a = Address::from_hex("ABCDEF0000000000000000000000000000000001").unwrap();
        let b = Address::from_hex("0xabcdef0000000000000000000000000000000001").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_address_rejects_bad_length() {
        assert!(Address::from_hex("0x1234").is_err());
        assert!(Address::from_hex("0xzz").is_err());
    }

    #[test]
    fn test_address_serde_as_string() {
        let addr = Address([0x11; 20]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr.to_hex()));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_short_form() {
        let addr = Address([0xab; 20]);
        assert_eq!(addr.short(), "0xabab…abab");
    }
}
