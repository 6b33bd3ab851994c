//! Field framing: 16-byte blocks → (type code, data) pairs

use std::io::Read;

use psafe_core::{le, PsafeError, PsafeResult};
use psafe_crypto::mac::tags_match;
use psafe_crypto::{BlockDecryptor, HmacAccumulator, BLOCK_SIZE, TAG_SIZE};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Unencrypted marker that ends the field stream.
pub const EOF_MARKER: [u8; BLOCK_SIZE] = *b"PWS3-EOFPWS3-EOF";

/// Type code terminating a header or record group.
pub const END_CODE: u8 = 0xff;

/// Data bytes carried by the first block after length(4) and type(1).
const FIRST_BLOCK_DATA: usize = BLOCK_SIZE - 5;

/// Cap on up-front allocation; larger fields grow block by block.
const MAX_PREALLOC: usize = 64 * 1024;

/// One decoded field. The payload is zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Field {
    code: u8,
    data: Vec<u8>,
}

impl Field {
    pub fn new(code: u8, data: Vec<u8>) -> Self {
        Self { code, data }
    }

    pub fn code(&self) -> u8 {
        self.code
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_end(&self) -> bool {
        self.code == END_CODE
    }

    /// Payload as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    /// Payload as a UUID; exactly 16 bytes are required.
    pub fn uuid(&self) -> PsafeResult<Uuid> {
        let bytes: [u8; 16] = self.data.as_slice().try_into().map_err(|_| {
            PsafeError::corrupt(format!("UUID field length wrong: {} bytes", self.data.len()))
        })?;
        Ok(Uuid::from_bytes(bytes))
    }
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("code", &format_args!("{:#04x}", self.code))
            .field("len", &self.data.len())
            .finish()
    }
}

/// Outcome of comparing the computed HMAC with the stored trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HmacStatus {
    Verified,
    Mismatch,
}

pub(crate) fn read_exact<R: Read>(source: &mut R, buf: &mut [u8], what: &'static str) -> PsafeResult<()> {
    source
        .read_exact(buf)
        .map_err(|e| PsafeError::from_read(e, what))
}

/// Pulls fields out of the encrypted block stream.
///
/// Owns the CBC decryptor and the running HMAC; both advance with every
/// field, so fields must be decoded strictly in file order.
#[derive(Debug)]
pub struct FieldDecoder {
    cipher: BlockDecryptor,
    mac: HmacAccumulator,
    fields: u64,
}

impl FieldDecoder {
    pub fn new(cipher: BlockDecryptor, mac: HmacAccumulator) -> Self {
        Self {
            cipher,
            mac,
            fields: 0,
        }
    }

    /// Decode one field, or `None` when the end-of-file marker is reached.
    pub fn next_field<R: Read>(&mut self, source: &mut R) -> PsafeResult<Option<Field>> {
        let mut block = Zeroizing::new([0u8; BLOCK_SIZE]);
        read_exact(source, &mut block[..], "Generic Field")?;
        if *block == EOF_MARKER {
            return Ok(None);
        }
        self.cipher.decrypt_block(&mut block);

        let length = le::i32_le([block[0], block[1], block[2], block[3]]);
        if length < 0 {
            return Err(PsafeError::corrupt(format!("invalid field length {length}")));
        }
        let length = length as usize;
        let code = block[4];

        let first = length.min(FIRST_BLOCK_DATA);
        let mut data = Zeroizing::new(Vec::with_capacity(length.min(MAX_PREALLOC)));
        data.extend_from_slice(&block[5..5 + first]);

        let mut remaining = length - first;
        while remaining > 0 {
            read_exact(source, &mut block[..], "Generic Field")?;
            if *block == EOF_MARKER {
                return Err(PsafeError::corrupt("unexpected end of file marker inside a field"));
            }
            self.cipher.decrypt_block(&mut block);
            let take = remaining.min(BLOCK_SIZE);
            data.extend_from_slice(&block[..take]);
            remaining -= take;
        }

        // Only the data is authenticated, never the length/type prefix.
        self.mac.update(&data)?;
        self.fields += 1;
        tracing::trace!(code, len = length, "field decoded");

        Ok(Some(Field::new(code, std::mem::take(&mut *data))))
    }

    /// Decode fields up to and including the END terminator.
    ///
    /// Returns `None` when the end-of-file marker comes first. A group that
    /// reaches `max_fields` without its terminator is corrupt.
    pub fn next_group<R: Read>(
        &mut self,
        source: &mut R,
        max_fields: usize,
    ) -> PsafeResult<Option<Vec<Field>>> {
        let max_fields = max_fields.max(1);
        let mut fields = Vec::new();
        loop {
            let Some(field) = self.next_field(source)? else {
                if fields.is_empty() {
                    return Ok(None);
                }
                return Err(PsafeError::corrupt("end of file marker in the middle of a record"));
            };
            let end = field.is_end();
            fields.push(field);
            if end {
                return Ok(Some(fields));
            }
            if fields.len() >= max_fields {
                return Err(PsafeError::corrupt(format!(
                    "too many fields in a record (limit {max_fields})"
                )));
            }
        }
    }

    /// Read the stored HMAC after the end-of-file marker and compare it with
    /// the computed one. Finalizes the accumulator.
    pub fn read_trailer<R: Read>(&mut self, source: &mut R) -> PsafeResult<HmacStatus> {
        let mut stored = [0u8; TAG_SIZE];
        read_exact(source, &mut stored, "HMAC")?;
        let computed = self.mac.finalize()?;
        if tags_match(&computed, &stored) {
            Ok(HmacStatus::Verified)
        } else {
            Ok(HmacStatus::Mismatch)
        }
    }

    pub fn fields_decoded(&self) -> u64 {
        self.fields
    }

    pub fn blocks_decrypted(&self) -> u64 {
        self.cipher.blocks_decrypted()
    }

    pub fn bytes_authenticated(&self) -> u64 {
        self.mac.bytes_authenticated()
    }
}
