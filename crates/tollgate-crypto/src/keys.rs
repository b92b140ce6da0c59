use rand::rngs::OsRng;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use tollgate_core::Address;
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::hashing::keccak256;

/// secp256k1 key pair used to sign payment records.
pub struct KeyPair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair using OS-provided entropy.
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a 32-byte secret scalar.
    ///
    /// Fails when the seed is zero or not below the curve order.
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, CryptoError> {
        let secret_key = SecretKey::from_slice(seed)
            .map_err(|e| CryptoError::InvalidKey(format!("invalid secret key: {}", e)))?;
        let public_key = PublicKey::from_secret_key(&Secp256k1::signing_only(), &secret_key);
        Ok(Self {
            secret_key,
            public_key,
        })
    }

    /// Create a key pair from raw bytes (32 bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKey(format!(
                "secret key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(bytes);
        let kp = Self::from_seed(&seed);
        seed.zeroize();
        kp
    }

    /// Decode a hex secret key, with or without `0x`.
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let trimmed = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        let mut bytes = hex::decode(trimmed)
            .map_err(|e| CryptoError::InvalidInput(format!("invalid hex: {}", e)))?;
        let kp = Self::from_bytes(&bytes);
        bytes.zeroize();
        kp
    }

    /// The account this key signs for.
    pub fn address(&self) -> Address {
        address_from_public_key(&self.public_key)
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address().to_hex())
            .finish_non_exhaustive()
    }
}

/// Account address for a public key: the last 20 bytes of
/// `keccak256(uncompressed_point[1..])`.
pub fn address_from_public_key(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.serialize_uncompressed();
    let hash = keccak256(&uncompressed[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address(bytes)
}
