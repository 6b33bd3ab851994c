//! psafe-crypto: the cryptographic layer of the Password Safe v3 format
//!
//! ```text
//! passphrase + salt ──SHA-256 × (1 + iterations)──▶ stretched key P'
//!   ├── SHA-256(P') compared against the stored verifier
//!   ├── Twofish-ECB(P') decrypts B1|B2 ──▶ session key K ──▶ Twofish-CBC(K, IV) field blocks
//!   └── Twofish-ECB(P') decrypts B3|B4 ──▶ HMAC key L    ──▶ HMAC-SHA256 over field data
//! ```

pub mod kdf;
pub mod keys;
pub mod mac;
pub mod stream;

pub use kdf::{stretch_key, StretchedKey};
pub use keys::{unwrap_keys, HmacKey, KeyMaterial, SessionKey};
pub use mac::HmacAccumulator;
pub use stream::BlockDecryptor;

/// Size of every key in the format (256-bit)
pub const KEY_SIZE: usize = 32;

/// Twofish block size, and the unit of every field read
pub const BLOCK_SIZE: usize = 16;

/// Size of the key-stretching salt
pub const SALT_SIZE: usize = 32;

/// Size of an HMAC-SHA256 tag
pub const TAG_SIZE: usize = 32;
