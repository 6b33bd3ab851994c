//! Password history sub-format
//!
//! ```text
//! S MM NN { TTTTTTTT LLLL <password> } × NN
//! ```
//! `S` is a decimal status digit, `MM`/`NN` are 2-hex-digit max and count,
//! `TTTTTTTT` an 8-hex-digit epoch time and `LLLL` the 4-hex-digit length
//! (in characters) of the password that follows.

use chrono::{DateTime, Utc};
use psafe_core::{utc_from_unix, PsafeError, PsafeResult};
use zeroize::Zeroizing;

use crate::text::{parse_hex, split_utf16, utf16_len};

/// A password with its change time and expiry; `None` expiry means never.
#[derive(Clone, Default, PartialEq)]
pub struct PasswordEntry {
    pub password: Zeroizing<String>,
    pub modified: Option<DateTime<Utc>>,
    pub expires: Option<DateTime<Utc>>,
}

impl PasswordEntry {
    pub fn new(
        password: impl Into<String>,
        modified: Option<DateTime<Utc>>,
        expires: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            password: Zeroizing::new(password.into()),
            modified,
            expires,
        }
    }

    /// Historical entries never expire.
    pub fn historical(password: impl Into<String>, modified: Option<DateTime<Utc>>) -> Self {
        Self::new(password, modified, None)
    }
}

impl std::fmt::Debug for PasswordEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordEntry")
            .field("password", &"[REDACTED]")
            .field("modified", &self.modified)
            .field("expires", &self.expires)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PasswordHistory {
    pub status: u8,
    pub max_entries: u8,
    pub entries: Vec<PasswordEntry>,
}

impl PasswordHistory {
    /// Decode the textual history. Fewer than 5 characters is an empty
    /// history; otherwise the declared count must be met exactly.
    pub fn parse(serialized: &str) -> PsafeResult<Self> {
        if utf16_len(serialized) < 5 {
            return Ok(Self::default());
        }

        let (status, rest) = take(serialized, 1, "status")?;
        let status = status
            .chars()
            .next()
            .and_then(|c| c.to_digit(10))
            .ok_or_else(|| malformed(format!("status {status:?} is not a decimal digit")))?;
        let (max_entries, rest) = take_hex(rest, 2, "maximum count")?;
        let (count, mut rest) = take_hex(rest, 2, "entry count")?;

        let mut entries = Vec::with_capacity(count as usize);
        for index in 0..count {
            let (changed, r) = take_hex(rest, 8, "change time")?;
            let (length, r) = take_hex(r, 4, "password length")?;
            let (password, r) = split_utf16(r, length as usize).ok_or_else(|| {
                malformed(format!(
                    "entry {index} of {count}: password shorter than {length} UTF-16 units"
                ))
            })?;
            // Hex time is a signed 32-bit value on disk.
            let changed = utc_from_unix(i64::from(changed as i32));
            entries.push(PasswordEntry::historical(password, changed));
            rest = r;
        }

        if !rest.is_empty() {
            return Err(malformed(format!(
                "{} UTF-16 units after the declared {count} entries",
                utf16_len(rest)
            )));
        }

        Ok(Self {
            status: status as u8,
            max_entries: max_entries as u8,
            entries,
        })
    }
}

fn malformed(reason: String) -> PsafeError {
    PsafeError::corrupt(format!("malformed password history: {reason}"))
}

fn take<'a>(s: &'a str, n: usize, what: &str) -> PsafeResult<(&'a str, &'a str)> {
    split_utf16(s, n).ok_or_else(|| malformed(format!("missing {what}")))
}

fn take_hex<'a>(s: &'a str, n: usize, what: &str) -> PsafeResult<(u32, &'a str)> {
    let (digits, rest) = take(s, n, what)?;
    let value = parse_hex(digits)
        .ok_or_else(|| malformed(format!("{what} {digits:?} is not hexadecimal")))?;
    Ok((value, rest))
}
