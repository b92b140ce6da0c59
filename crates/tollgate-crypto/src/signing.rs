use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, Secp256k1};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tollgate_core::{Address, PaymentRecord};

use crate::error::CryptoError;
use crate::hashing::{personal_message_hash, record_digest};
use crate::keys::{address_from_public_key, KeyPair};

/// Half the secp256k1 group order. Signatures with `s` above this are the
/// malleated twin of a canonical signature and are rejected.
const HALF_ORDER: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b, 0x20, 0xa0,
];

/// Recoverable secp256k1 signature in wallet layout: `r ‖ s ‖ v` (65 bytes),
/// `v` normalized to 27/28.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    bytes: [u8; 65],
}

impl Signature {
    /// Parse a 65-byte signature. `v` may be 27/28 or 0/1.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 65 {
            return Err(CryptoError::InvalidSignature(format!(
                "signature must be 65 bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 65];
        arr.copy_from_slice(bytes);
        arr[64] = match arr[64] {
            0 | 1 => arr[64] + 27,
            27 | 28 => arr[64],
            v => {
                return Err(CryptoError::InvalidSignature(format!(
                    "recovery byte must be 0, 1, 27 or 28, got {}",
                    v
                )))
            }
        };
        Ok(Self { bytes: arr })
    }

    /// Decode from hex, with or without `0x`.
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let trimmed = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        let bytes = hex::decode(trimmed)
            .map_err(|e| CryptoError::InvalidSignature(format!("invalid hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    pub fn to_bytes(&self) -> [u8; 65] {
        self.bytes
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.bytes))
    }

    /// Recovery byte (27 or 28).
    pub fn v(&self) -> u8 {
        self.bytes[64]
    }

    fn has_low_s(&self) -> bool {
        self.bytes[32..64] <= HALF_ORDER[..]
    }

    fn to_recoverable(self) -> Result<RecoverableSignature, CryptoError> {
        let recovery_id = RecoveryId::from_i32(i32::from(self.bytes[64] - 27))
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        RecoverableSignature::from_compact(&self.bytes[..64], recovery_id)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// The 32-byte message actually signed for `record`: the personal-message
/// hash of its record digest.
fn signing_message(record: &PaymentRecord) -> Message {
    let digest = record_digest(record);
    Message::from_digest(personal_message_hash(&digest))
}

/// Sign a payment record the way a wallet's `signMessage(recordDigest)` does.
pub fn sign_payment(record: &PaymentRecord, keypair: &KeyPair) -> Signature {
    let secp = Secp256k1::signing_only();
    let sig = secp.sign_ecdsa_recoverable(&signing_message(record), keypair.secret_key());
    let (recovery_id, compact) = sig.serialize_compact();

    let mut bytes = [0u8; 65];
    bytes[..64].copy_from_slice(&compact);
    bytes[64] = 27 + recovery_id.to_i32() as u8;
    Signature { bytes }
}

/// Recover the account that produced `signature` over `record`.
pub fn recover_signer(
    record: &PaymentRecord,
    signature: &Signature,
) -> Result<Address, CryptoError> {
    if !signature.has_low_s() {
        return Err(CryptoError::InvalidSignature("non-canonical s value".into()));
    }
    let recoverable = signature.to_recoverable()?;
    let public_key = Secp256k1::verification_only()
        .recover_ecdsa(&signing_message(record), &recoverable)
        .map_err(|_| CryptoError::RecoveryFailed)?;
    Ok(address_from_public_key(&public_key))
}

/// True iff `signature` (raw 65 bytes) was produced by `record.sender` over
/// this exact record. Pure; never panics on malformed input.
pub fn verify_payment(record: &PaymentRecord, signature: &[u8]) -> bool {
    let result = Signature::from_bytes(signature).and_then(|sig| recover_signer(record, &sig));
    match result {
        Ok(signer) if signer == record.sender => true,
        Ok(signer) => {
            tracing::debug!(
                sender = %record.sender,
                recovered = %signer,
                uuid = %record.uuid,
                "payment signature recovered to a different account"
            );
            false
        }
        Err(e) => {
            tracing::debug!(uuid = %record.uuid, error = %e, "payment signature rejected");
            false
        }
    }
}
