//! Key stretching: passphrase + salt → stretched key P'

use psafe_core::{PsafeError, PsafeResult};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

use crate::{KEY_SIZE, SALT_SIZE};

/// The stretched passphrase P'. Zeroized on drop.
#[derive(Clone)]
pub struct StretchedKey {
    bytes: [u8; KEY_SIZE],
}

impl StretchedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// SHA-256(P'), the value stored in the file to check the passphrase.
    pub fn verifier(&self) -> [u8; KEY_SIZE] {
        Sha256::digest(self.bytes).into()
    }

    /// Compares the verifier against the stored one, length first.
    pub fn matches_verifier(&self, expected: &[u8]) -> bool {
        let actual = self.verifier();
        actual.len() == expected.len() && bool::from(actual[..].ct_eq(expected))
    }

    pub fn verify(&self, expected: &[u8]) -> PsafeResult<()> {
        if self.matches_verifier(expected) {
            Ok(())
        } else {
            Err(PsafeError::InvalidPassphrase)
        }
    }
}

impl Drop for StretchedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for StretchedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StretchedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// One byte per character: each char is truncated to its low 8 bits.
pub fn passphrase_bytes(passphrase: &str) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(passphrase.chars().map(|c| c as u32 as u8).collect())
}

/// Stretch a passphrase: `H(passphrase || salt)`, then `iterations` more
/// rounds of `H` over the previous output.
pub fn stretch_key(
    passphrase: &SecretString,
    salt: &[u8; SALT_SIZE],
    iterations: u32,
) -> StretchedKey {
    let encoded = passphrase_bytes(passphrase.expose_secret());

    let mut hasher = Sha256::new();
    hasher.update(encoded.as_slice());
    hasher.update(salt);
    let mut key: [u8; KEY_SIZE] = hasher.finalize().into();

    for _ in 0..iterations {
        key = Sha256::digest(key).into();
    }

    let stretched = StretchedKey::from_bytes(key);
    key.zeroize();
    stretched
}
