use sha3::{Digest, Keccak256};
use tollgate_core::PaymentRecord;

/// Keccak-256 hash (32 bytes).
pub type Hash = [u8; 32];

/// Hash arbitrary data using Keccak-256 (the pre-standard SHA-3 variant used by EVM chains).
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let out = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&out);
    hash
}

/// Digest of a payment record's packed encoding. This is both the message
/// clients sign and the record's replay-protection identity.
pub fn record_digest(record: &PaymentRecord) -> Hash {
    keccak256(&record.packed_encoding())
}

/// Hash `message` the way wallets do for `personal_sign`:
/// `keccak256("\x19Ethereum Signed Message:\n" ‖ len(message) ‖ message)`.
pub fn personal_message_hash(message: &[u8]) -> Hash {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());
    let mut data = Vec::with_capacity(prefix.len() + message.len());
    data.extend_from_slice(prefix.as_bytes());
    data.extend_from_slice(message);
    keccak256(&data)
}
