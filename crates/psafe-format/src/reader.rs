//! Forward-only reader state machine
//!
//! ```text
//! Uninitialized ──set_passphrase──▶ KeysEstablished ──read──▶ HeaderRead
//!                                                                │ read
//!                              Ended ◀──read (EOF marker)── RecordRead ◀─┘
//! ```
//!
//! Any error is terminal: the reader drops its key material and refuses
//! every later call with [`PsafeError::Misuse`].

use std::io::Read;

use psafe_core::{le, HmacPolicy, PsafeError, PsafeResult, ReaderConfig};
use psafe_crypto::{
    stretch_key, unwrap_keys, BlockDecryptor, HmacAccumulator, BLOCK_SIZE, KEY_SIZE, SALT_SIZE,
};
use secrecy::SecretString;
use tracing::{debug, info, warn};

use crate::field::{read_exact, FieldDecoder, HmacStatus};
use crate::header::Header;
use crate::record::Record;

/// Magic bytes at the start of every v3 database.
pub const TAG: [u8; 4] = *b"PWS3";

/// Position of a reader in the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// No passphrase yet; nothing has been read
    Uninitialized,
    /// Preamble consumed, keys unwrapped
    KeysEstablished,
    /// The header group has been decoded
    HeaderRead,
    /// At least one record has been decoded
    RecordRead,
    /// EOF marker and trailer consumed
    Ended,
}

/// What the last successful [`PsafeReader::read`] produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Entity<'a> {
    None,
    Header(&'a Header),
    Record(&'a Record),
    End,
}

#[derive(Debug)]
enum Current {
    None,
    Header(Header),
    Record(Record),
    End,
}

/// Pull-based reader over a PWS3 byte source.
///
/// Owns the source for its lifetime. Holds at most one decoded entity;
/// each `read` replaces it.
#[derive(Debug)]
pub struct PsafeReader<R: Read> {
    source: R,
    config: ReaderConfig,
    state: ReaderState,
    failed: bool,
    decoder: Option<FieldDecoder>,
    current: Current,
    records_read: u64,
    hmac_status: Option<HmacStatus>,
}

impl<R: Read> PsafeReader<R> {
    pub fn new(source: R) -> Self {
        Self::with_config(source, ReaderConfig::default())
    }

    pub fn with_config(source: R, config: ReaderConfig) -> Self {
        Self {
            source,
            config,
            state: ReaderState::Uninitialized,
            failed: false,
            decoder: None,
            current: Current::None,
            records_read: 0,
            hmac_status: None,
        }
    }

    /// Check the tag, derive and verify the stretched key, and unwrap the
    /// session and HMAC keys. A wrong passphrase fails the reader; retrying
    /// needs a fresh reader over a fresh source.
    pub fn set_passphrase(&mut self, passphrase: &SecretString) -> PsafeResult<()> {
        if self.failed {
            return Err(PsafeError::Misuse("an error has already been reported"));
        }
        if self.state != ReaderState::Uninitialized {
            return Err(PsafeError::Misuse("passphrase already set"));
        }
        match self.establish_keys(passphrase) {
            Ok(decoder) => {
                self.decoder = Some(decoder);
                self.state = ReaderState::KeysEstablished;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Advance to the next entity. `Ok(true)` when a header, record or the
    /// end became current; `Ok(false)` once the stream has already ended.
    pub fn read(&mut self) -> PsafeResult<bool> {
        if self.failed {
            return Err(PsafeError::Misuse("an error has already been reported"));
        }
        match self.state {
            ReaderState::Uninitialized => Err(PsafeError::Misuse("no passphrase set")),
            ReaderState::Ended => Ok(false),
            _ => match self.advance() {
                Ok(()) => Ok(true),
                Err(e) => Err(self.fail(e)),
            },
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn entity(&self) -> Entity<'_> {
        match &self.current {
            Current::None => Entity::None,
            Current::Header(header) => Entity::Header(header),
            Current::Record(record) => Entity::Record(record),
            Current::End => Entity::End,
        }
    }

    /// Trailer comparison result; `None` until the end has been reached.
    pub fn hmac_status(&self) -> Option<HmacStatus> {
        self.hmac_status
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Release the source and all key material now.
    pub fn close(self) {
        debug!(state = ?self.state, records = self.records_read, "reader closed");
    }

    fn establish_keys(&mut self, passphrase: &SecretString) -> PsafeResult<FieldDecoder> {
        let mut tag = [0u8; 4];
        read_exact(&mut self.source, &mut tag, "TAG")?;
        if tag != TAG {
            return Err(PsafeError::corrupt("not a Password Safe v3 database (bad tag)"));
        }

        let mut salt = [0u8; SALT_SIZE];
        read_exact(&mut self.source, &mut salt, "SALT")?;
        let mut iter = [0u8; 4];
        read_exact(&mut self.source, &mut iter, "ITER")?;
        let iterations = le::i32_le(iter);
        if iterations < 0 {
            return Err(PsafeError::corrupt(format!(
                "negative key stretching iteration count {iterations}"
            )));
        }
        let mut verifier = [0u8; KEY_SIZE];
        read_exact(&mut self.source, &mut verifier, "H(P')")?;

        debug!(iterations, "stretching passphrase");
        let stretched = stretch_key(passphrase, &salt, iterations as u32);
        stretched.verify(&verifier)?;

        let mut wrapped_session = [0u8; KEY_SIZE];
        read_exact(
            &mut self.source,
            &mut wrapped_session,
            "Encrypted Session Key K (B1|B2)",
        )?;
        let mut wrapped_hmac = [0u8; KEY_SIZE];
        read_exact(
            &mut self.source,
            &mut wrapped_hmac,
            "Encrypted HMAC Key L (B3|B4)",
        )?;
        let mut iv = [0u8; BLOCK_SIZE];
        read_exact(&mut self.source, &mut iv, "IV")?;

        let keys = unwrap_keys(&stretched, &wrapped_session, &wrapped_hmac)?;
        let cipher = BlockDecryptor::new(&keys.session, &iv)?;
        let mac = HmacAccumulator::new(&keys.hmac)?;
        Ok(FieldDecoder::new(cipher, mac))
    }

    fn advance(&mut self) -> PsafeResult<()> {
        let max_fields = self.config.max_fields_per_record;
        let decoder = self
            .decoder
            .as_mut()
            .ok_or(PsafeError::Misuse("key material already released"))?;
        let group = decoder.next_group(&mut self.source, max_fields)?;

        match (self.state, group) {
            (ReaderState::KeysEstablished, None) => {
                Err(PsafeError::corrupt("database has no header"))
            }
            (ReaderState::KeysEstablished, Some(fields)) => {
                self.current = Current::Header(Header::from_fields(fields)?);
                self.state = ReaderState::HeaderRead;
                Ok(())
            }
            (_, Some(fields)) => {
                self.current = Current::Record(Record::from_fields(fields)?);
                self.records_read += 1;
                self.state = ReaderState::RecordRead;
                Ok(())
            }
            (_, None) => self.finish(),
        }
    }

    /// EOF marker consumed: check the trailer and drop the key material.
    fn finish(&mut self) -> PsafeResult<()> {
        let mut decoder = self
            .decoder
            .take()
            .ok_or(PsafeError::Misuse("key material already released"))?;
        let status = decoder.read_trailer(&mut self.source)?;
        debug!(
            fields = decoder.fields_decoded(),
            blocks = decoder.blocks_decrypted(),
            hmac_bytes = decoder.bytes_authenticated(),
            "field stream consumed"
        );
        drop(decoder);
        self.hmac_status = Some(status);

        if status == HmacStatus::Mismatch {
            match self.config.hmac_policy {
                HmacPolicy::Enforce => return Err(PsafeError::HmacMismatch),
                HmacPolicy::Warn => {
                    warn!("HMAC mismatch: database may be corrupt or tampered with");
                }
            }
        }

        self.current = Current::End;
        self.state = ReaderState::Ended;
        info!(records = self.records_read, hmac = ?status, "database read");
        Ok(())
    }

    fn fail(&mut self, err: PsafeError) -> PsafeError {
        self.failed = true;
        self.decoder = None;
        self.current = Current::None;
        debug!(state = ?self.state, "reader failed: {err}");
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psafe_core::ErrorClass;
    use std::io::Cursor;

    /// Tag, salt, iterations and verifier for `passphrase`; no keys follow.
    fn preamble(passphrase: &str, iterations: i32) -> Vec<u8> {
        let salt = [7u8; SALT_SIZE];
        let stretched = stretch_key(
            &SecretString::from(passphrase),
            &salt,
            iterations.max(0) as u32,
        );
        let mut out = TAG.to_vec();
        out.extend_from_slice(&salt);
        out.extend_from_slice(&iterations.to_le_bytes());
        out.extend_from_slice(&stretched.verifier());
        out
    }

    fn reader(bytes: Vec<u8>) -> PsafeReader<Cursor<Vec<u8>>> {
        PsafeReader::new(Cursor::new(bytes))
    }

    #[test]
    fn test_read_without_passphrase_is_misuse() {
        let mut r = reader(Vec::new());
        assert!(matches!(r.read(), Err(PsafeError::Misuse("no passphrase set"))));
        assert_eq!(r.state(), ReaderState::Uninitialized);
        assert_eq!(r.entity(), Entity::None);
    }

    #[test]
    fn test_bad_tag() {
        let mut r = reader(b"PWS2....".to_vec());
        let err = r.set_passphrase(&SecretString::from("x")).unwrap_err();
        assert!(err.to_string().contains("bad tag"), "{err}");
        assert!(matches!(r.read(), Err(PsafeError::Misuse(_))));
    }

    #[test]
    fn test_empty_source_is_short_tag() {
        let mut r = reader(Vec::new());
        let err = r.set_passphrase(&SecretString::from("x")).unwrap_err();
        assert!(matches!(err, PsafeError::ShortRead("TAG")), "{err}");
    }

    #[test]
    fn test_truncated_after_tag() {
        let mut r = reader(TAG.to_vec());
        let err = r.set_passphrase(&SecretString::from("x")).unwrap_err();
        assert!(matches!(err, PsafeError::ShortRead("SALT")), "{err}");
        assert_eq!(err.class(), ErrorClass::Structural);
    }

    #[test]
    fn test_negative_iterations() {
        let mut r = reader(preamble("x", -1));
        let err = r.set_passphrase(&SecretString::from("x")).unwrap_err();
        assert!(matches!(err, PsafeError::Corrupt(_)), "{err}");
    }

    #[test]
    fn test_wrong_passphrase_fails_reader() {
        let mut r = reader(preamble("right", 3));
        let err = r.set_passphrase(&SecretString::from("wrong")).unwrap_err();
        assert!(matches!(err, PsafeError::InvalidPassphrase));
        assert_eq!(err.class(), ErrorClass::Authentication);

        let again = r.set_passphrase(&SecretString::from("right")).unwrap_err();
        assert!(matches!(again, PsafeError::Misuse(_)));
    }

    #[test]
    fn test_right_passphrase_then_missing_keys() {
        let mut r = reader(preamble("right", 3));
        let err = r.set_passphrase(&SecretString::from("right")).unwrap_err();
        assert!(
            matches!(err, PsafeError::ShortRead("Encrypted Session Key K (B1|B2)")),
            "{err}"
        );
    }
}
