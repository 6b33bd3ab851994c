//! Running HMAC-SHA256 over field data

use hmac::{Hmac, Mac};
use psafe_core::{PsafeError, PsafeResult};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::keys::HmacKey;
use crate::TAG_SIZE;

type HmacSha256 = Hmac<Sha256>;

/// One keyed hash for the whole database session.
///
/// Fed with field payloads only (never the length/type prefix), in the order
/// fields are decoded. Finalized once; further updates are a misuse.
///
/// The inner keyed state is dropped on finalize but not wiped: `hmac` does
/// not implement `Zeroize`.
pub struct HmacAccumulator {
    mac: Option<HmacSha256>,
    bytes: u64,
}

impl HmacAccumulator {
    pub fn new(key: &HmacKey) -> PsafeResult<Self> {
        let mac = HmacSha256::new_from_slice(key.as_bytes())
            .map_err(|e| PsafeError::corrupt(format!("initializing HMAC: {e}")))?;
        Ok(Self {
            mac: Some(mac),
            bytes: 0,
        })
    }

    pub fn update(&mut self, data: &[u8]) -> PsafeResult<()> {
        let mac = self
            .mac
            .as_mut()
            .ok_or(PsafeError::Misuse("HMAC already finalized"))?;
        mac.update(data);
        self.bytes += data.len() as u64;
        Ok(())
    }

    pub fn finalize(&mut self) -> PsafeResult<[u8; TAG_SIZE]> {
        let mac = self
            .mac
            .take()
            .ok_or(PsafeError::Misuse("HMAC already finalized"))?;
        Ok(mac.finalize().into_bytes().into())
    }

    pub fn is_finalized(&self) -> bool {
        self.mac.is_none()
    }

    /// Total payload bytes authenticated so far.
    pub fn bytes_authenticated(&self) -> u64 {
        self.bytes
    }
}

impl std::fmt::Debug for HmacAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacAccumulator")
            .field("finalized", &self.is_finalized())
            .field("bytes", &self.bytes)
            .finish()
    }
}

/// Constant-time tag comparison; tags of different length never match.
pub fn tags_match(computed: &[u8], stored: &[u8]) -> bool {
    computed.len() == stored.len() && bool::from(computed.ct_eq(stored))
}
