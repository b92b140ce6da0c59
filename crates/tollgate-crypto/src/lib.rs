pub mod error;
pub mod keys;
pub mod signing;
pub mod hashing;

pub use error::CryptoError;
pub use keys::{address_from_public_key, KeyPair};
pub use signing::{recover_signer, sign_payment, verify_payment, Signature};
pub use hashing::{keccak256, personal_message_hash, record_digest, Hash};
