use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Token value in the backing asset's smallest unit.
pub type TokenAmount = u128;

/// A 20-byte account identifier, compatible with EVM addresses.
///
/// Rendered as `0x`-prefixed lowercase hex. Parsing accepts any case, with or
/// without the prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The all-zero address.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Create from raw bytes (must be exactly 20).
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        let arr: [u8; 20] = bytes.try_into().map_err(|_| {
            CoreError::InvalidAddress(format!("expected 20 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let trimmed = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if trimmed.len() != 40 {
            return Err(CoreError::InvalidAddress(format!(
                "expected 40 hex characters, got {}",
                trimmed.len()
            )));
        }
        let bytes = hex::decode(trimmed)
            .map_err(|e| CoreError::InvalidAddress(format!("invalid hex: {}", e)))?;
        Self::from_slice(&bytes)
    }

    /// Raw address bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase `0x`-prefixed hex form.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
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
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A registered service endpoint, keyed by its operator account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostEntry {
    /// Account that operates the endpoint and may pause/unpause it.
    pub operator: Address,
    /// Endpoint URL clients send requests to.
    pub url: String,
    /// Relative routing weight.
    pub weight: u64,
    /// Whether the endpoint is eligible to receive traffic.
    pub active: bool,
}

/// Per-account withdrawal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    /// Set by a request, cleared by a successful withdrawal.
    pub pending: bool,
    /// Unix seconds from which the withdrawal may execute.
    pub ready_at: u64,
}

impl WithdrawalRequest {
    /// Whether a withdrawal may execute at `now` (unix seconds).
    pub fn is_ready(&self, now: u64) -> bool {
        self.pending && now >= self.ready_at
    }
}
