use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{Address, TokenAmount};

/// An off-line payment authorization: `sender` allows `receiver` to redeem up
/// to `amount`, once, under the identity `uuid`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Account whose balance pays for the claim (and who signs it).
    pub sender: Address,
    /// Account allowed to redeem the claim.
    pub receiver: Address,
    /// Maximum cumulative redeemable amount.
    pub amount: TokenAmount,
    /// Opaque claim identifier chosen by the sender.
    pub uuid: String,
}

impl PaymentRecord {
    pub fn new(
        sender: Address,
        receiver: Address,
        amount: TokenAmount,
        uuid: impl Into<String>,
    ) -> Self {
        Self {
            sender,
            receiver,
            amount,
            uuid: uuid.into(),
        }
    }

    /// Structural checks a well-formed record must pass.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.sender.is_zero() {
            return Err(CoreError::MissingField("sender".into()));
        }
        if self.receiver.is_zero() {
            return Err(CoreError::MissingField("receiver".into()));
        }
        if self.uuid.is_empty() {
            return Err(CoreError::MissingField("uuid".into()));
        }
        if self.amount == 0 {
            return Err(CoreError::InvalidAmount("amount must be greater than zero".into()));
        }
        Ok(())
    }

    /// Canonical signing preimage: the tightly packed `(address, address,
    /// uint256, string)` tuple used by EVM clients.
    ///
    /// Layout: sender (20) ‖ receiver (20) ‖ amount as 32-byte big-endian ‖
    /// uuid UTF-8 bytes with no length prefix. Field order and widths are
    /// load-bearing: existing client signatures depend on them.
    pub fn packed_encoding(&self) -> Vec<u8> {
        let uuid_bytes = self.uuid.as_bytes();
        let mut payload = Vec::with_capacity(20 + 20 + 32 + uuid_bytes.len());

        payload.extend_from_slice(self.sender.as_bytes());
        payload.extend_from_slice(self.receiver.as_bytes());

        // uint256: 16 zero bytes, then the u128 value.
        payload.extend_from_slice(&[0u8; 16]);
        payload.extend_from_slice(&self.amount.to_be_bytes());

        payload.extend_from_slice(uuid_bytes);
        payload
    }
}
