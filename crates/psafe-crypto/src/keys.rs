//! Session and HMAC keys, unwrapped from the preamble with Twofish-ECB

use cipher::{Block, BlockDecrypt, KeyInit};
use psafe_core::{PsafeError, PsafeResult};
use twofish::Twofish;
use zeroize::Zeroize;

use crate::kdf::StretchedKey;
use crate::{BLOCK_SIZE, KEY_SIZE};

macro_rules! secret_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            bytes: [u8; KEY_SIZE],
        }

        impl $name {
            pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
                Self { bytes }
            }

            pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
                &self.bytes
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                self.bytes.zeroize();
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("bytes", &"[REDACTED]")
                    .finish()
            }
        }
    };
}

secret_key!(
    /// Key K: decrypts field blocks. Zeroized on drop.
    SessionKey
);

secret_key!(
    /// Key L: authenticates field data. Zeroized on drop.
    HmacKey
);

/// Both keys recovered from the preamble.
#[derive(Debug)]
pub struct KeyMaterial {
    pub session: SessionKey,
    pub hmac: HmacKey,
}

/// Decrypt the wrapped session key (B1|B2) and HMAC key (B3|B4) under P'.
pub fn unwrap_keys(
    stretched: &StretchedKey,
    wrapped_session: &[u8; KEY_SIZE],
    wrapped_hmac: &[u8; KEY_SIZE],
) -> PsafeResult<KeyMaterial> {
    let cipher = Twofish::new_from_slice(stretched.as_bytes())
        .map_err(|e| PsafeError::corrupt(format!("stretched key rejected by Twofish: {e}")))?;

    let session = SessionKey::from_bytes(decrypt_ecb(&cipher, wrapped_session));
    let hmac = HmacKey::from_bytes(decrypt_ecb(&cipher, wrapped_hmac));
    tracing::debug!("session and HMAC keys unwrapped");

    Ok(KeyMaterial { session, hmac })
}

/// Each 16-byte half is an independent ECB block under the same key.
fn decrypt_ecb(cipher: &Twofish, wrapped: &[u8; KEY_SIZE]) -> [u8; KEY_SIZE] {
    let mut out = [0u8; KEY_SIZE];
    for (src, dst) in wrapped
        .chunks_exact(BLOCK_SIZE)
        .zip(out.chunks_exact_mut(BLOCK_SIZE))
    {
        let mut block = Block::<Twofish>::clone_from_slice(src);
        cipher.decrypt_block(&mut block);
        dst.copy_from_slice(&block);
        block.as_mut_slice().zeroize();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cipher::BlockEncrypt;

    fn wrap(stretched: &StretchedKey, key: &[u8; KEY_SIZE]) -> [u8; KEY_SIZE] {
        let cipher = Twofish::new_from_slice(stretched.as_bytes()).unwrap();
        let mut out = [0u8; KEY_SIZE];
        for (src, dst) in key.chunks_exact(BLOCK_SIZE).zip(out.chunks_exact_mut(BLOCK_SIZE)) {
            let mut block = Block::<Twofish>::clone_from_slice(src);
            cipher.encrypt_block(&mut block);
            dst.copy_from_slice(&block);
        }
        out
    }

    #[test]
    fn test_unwrap_recovers_keys() {
        let stretched = StretchedKey::from_bytes([9u8; KEY_SIZE]);
        let session: [u8; KEY_SIZE] = core::array::from_fn(|i| i as u8);
        let hmac: [u8; KEY_SIZE] = core::array::from_fn(|i| 0xff - i as u8);

        let keys = unwrap_keys(&stretched, &wrap(&stretched, &session), &wrap(&stretched, &hmac))
            .unwrap();

        assert_eq!(keys.session.as_bytes(), &session);
        assert_eq!(keys.hmac.as_bytes(), &hmac);
    }

    #[test]
    fn test_halves_are_independent_blocks() {
        // Identical plaintext halves give identical ciphertext halves in ECB.
        let stretched = StretchedKey::from_bytes([1u8; KEY_SIZE]);
        let wrapped = wrap(&stretched, &[0x5a; KEY_SIZE]);
        assert_eq!(wrapped[..BLOCK_SIZE], wrapped[BLOCK_SIZE..]);

        let keys = unwrap_keys(&stretched, &wrapped, &wrapped).unwrap();
        assert_eq!(keys.session.as_bytes(), &[0x5a; KEY_SIZE]);
    }

    #[test]
    fn test_wrong_stretched_key_gives_different_keys() {
        let right = StretchedKey::from_bytes([1u8; KEY_SIZE]);
        let wrong = StretchedKey::from_bytes([2u8; KEY_SIZE]);
        let session = [0x11u8; KEY_SIZE];
        let wrapped = wrap(&right, &session);

        let keys = unwrap_keys(&wrong, &wrapped, &wrapped).unwrap();
        assert_ne!(keys.session.as_bytes(), &session);
    }

    #[test]
    fn test_debug_redacted() {
        let key = SessionKey::from_bytes([0x42; KEY_SIZE]);
        assert_eq!(format!("{key:?}"), "SessionKey { bytes: \"[REDACTED]\" }");
    }
}
