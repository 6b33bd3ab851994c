//! Twofish-CBC decryption, one 16-byte block at a time

use cipher::generic_array::GenericArray;
use cipher::{BlockDecryptMut, KeyIvInit};
use psafe_core::{PsafeError, PsafeResult};
use twofish::Twofish;

use crate::keys::SessionKey;
use crate::BLOCK_SIZE;

type TwofishCbcDec = cbc::Decryptor<Twofish>;

/// Chained decryptor for field blocks.
///
/// The chaining state advances on every call: blocks must be fed in file
/// order, none skipped. Key schedule and chaining state are zeroized on drop.
pub struct BlockDecryptor {
    inner: TwofishCbcDec,
    blocks: u64,
}

impl BlockDecryptor {
    pub fn new(key: &SessionKey, iv: &[u8; BLOCK_SIZE]) -> PsafeResult<Self> {
        let inner = TwofishCbcDec::new_from_slices(key.as_bytes(), iv)
            .map_err(|e| PsafeError::corrupt(format!("initializing field decryptor: {e}")))?;
        Ok(Self { inner, blocks: 0 })
    }

    /// Decrypt `block` in place.
    pub fn decrypt_block(&mut self, block: &mut [u8; BLOCK_SIZE]) {
        self.inner
            .decrypt_block_mut(GenericArray::from_mut_slice(block));
        self.blocks += 1;
    }

    /// Number of blocks decrypted so far.
    pub fn blocks_decrypted(&self) -> u64 {
        self.blocks
    }
}

impl std::fmt::Debug for BlockDecryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockDecryptor")
            .field("state", &"[REDACTED]")
            .field("blocks", &self.blocks)
            .finish()
    }
}
