//! TOTP enrollment URLs embedded in record notes
//!
//! Notes carry a line such as
//! `Strongbox TOTP Auth URL: [otpauth://totp/Example:alice?secret=JBSWY3DPEHPK3PXP&issuer=Example]`.
//! Codes follow RFC 6238 (HOTP over a time counter, RFC 4226 truncation).

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use thiserror::Error;
use zeroize::Zeroizing;

const TOTP_PREFIX: &str = "otpauth://totp/";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OtpError {
    #[error("not an otpauth://totp/ URL")]
    NotTotp,
    #[error("missing secret parameter")]
    MissingSecret,
    #[error("secret is not valid base32")]
    InvalidBase32,
    #[error("unsupported digit count {0}")]
    InvalidDigits(u32),
    #[error("unsupported algorithm {0:?}")]
    UnknownAlgorithm(String),
    #[error("HMAC rejected the secret")]
    InvalidKey,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Algorithm {
    #[default]
    Sha1,
    Sha256,
    Sha512,
}

#[derive(Clone, PartialEq, Eq)]
pub struct TotpConfig {
    /// Text between `otpauth://totp/` and `?`, percent-decoded.
    pub label: String,
    pub issuer: Option<String>,
    secret: Zeroizing<Vec<u8>>,
    pub digits: u32,
    pub period: u64,
    pub algorithm: Algorithm,
}

impl std::fmt::Debug for TotpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TotpConfig")
            .field("label", &self.label)
            .field("issuer", &self.issuer)
            .field("secret", &"[REDACTED]")
            .field("digits", &self.digits)
            .field("period", &self.period)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// The bracketed URL after `marker` in `notes`, if the marker is present
/// and the closing `]` follows it.
pub fn extract_url<'a>(notes: &'a str, marker: &str) -> Option<&'a str> {
    let start = notes.find(marker)? + marker.len();
    let len = notes[start..].find(']')?;
    Some(&notes[start..start + len])
}

impl TotpConfig {
    pub fn from_url(url: &str) -> Result<Self, OtpError> {
        let start = find_ignore_ascii_case(url, TOTP_PREFIX).ok_or(OtpError::NotTotp)?;
        let rest = &url[start + TOTP_PREFIX.len()..];
        let (label, query) = rest.split_once('?').unwrap_or((rest, ""));

        let mut secret = None;
        let mut digits = 6;
        let mut period = 30;
        let mut algorithm = Algorithm::Sha1;
        let mut issuer = None;

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = percent_decode_until_stable(value);
            match key.to_ascii_lowercase().as_str() {
                "secret" => secret = Some(decode_base32(&value)?),
                "digits" => match value.parse::<u32>() {
                    Ok(0) | Err(_) => {}
                    Ok(n @ 1..=10) => digits = n,
                    Ok(n) => return Err(OtpError::InvalidDigits(n)),
                },
                "period" => match value.parse::<u64>() {
                    Ok(p) if p > 0 => period = p,
                    _ => {}
                },
                "algorithm" => {
                    algorithm = match value.to_ascii_uppercase().as_str() {
                        "SHA1" => Algorithm::Sha1,
                        "SHA256" => Algorithm::Sha256,
                        "SHA512" => Algorithm::Sha512,
                        _ => return Err(OtpError::UnknownAlgorithm(value)),
                    }
                }
                "issuer" if !value.is_empty() => issuer = Some(value),
                _ => {}
            }
        }

        Ok(Self {
            label: percent_decode_until_stable(label),
            issuer,
            secret: secret.ok_or(OtpError::MissingSecret)?,
            digits,
            period,
            algorithm,
        })
    }

    /// The code for the period containing `unix_time`.
    pub fn generate_at(&self, unix_time: u64) -> Result<String, OtpError> {
        let counter = unix_time / self.period;
        match self.algorithm {
            Algorithm::Sha1 => hotp::<Hmac<Sha1>>(&self.secret, counter, self.digits),
            Algorithm::Sha256 => hotp::<Hmac<Sha256>>(&self.secret, counter, self.digits),
            Algorithm::Sha512 => hotp::<Hmac<Sha512>>(&self.secret, counter, self.digits),
        }
    }

    /// Seconds until the current code rolls over.
    pub fn remaining(&self, unix_time: u64) -> u64 {
        self.period - unix_time % self.period
    }
}

fn hotp<M: Mac + KeyInit>(secret: &[u8], counter: u64, digits: u32) -> Result<String, OtpError> {
    let mut mac = <M as KeyInit>::new_from_slice(secret).map_err(|_| OtpError::InvalidKey)?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let code = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);
    let code = u64::from(code) % 10u64.pow(digits);
    Ok(format!("{code:0width$}", width = digits as usize))
}

/// RFC 4648 base32; case, spaces and padding are ignored.
fn decode_base32(input: &str) -> Result<Zeroizing<Vec<u8>>, OtpError> {
    const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

    let mut out = Zeroizing::new(Vec::with_capacity(input.len() * 5 / 8));
    let mut bits: u64 = 0;
    let mut count = 0u32;
    for c in input.bytes().filter(|c| !matches!(c, b' ' | b'=')) {
        let value = ALPHABET
            .iter()
            .position(|&a| a == c.to_ascii_uppercase())
            .ok_or(OtpError::InvalidBase32)?;
        bits = (bits << 5) | value as u64;
        count += 5;
        if count >= 8 {
            count -= 8;
            out.push((bits >> count) as u8);
            bits &= (1 << count) - 1;
        }
    }
    if out.is_empty() {
        return Err(OtpError::InvalidBase32);
    }
    Ok(out)
}

/// Percent-decode repeatedly until the value stops changing, so doubly
/// encoded parameters (`%253D`) come out plain.
fn percent_decode_until_stable(input: &str) -> String {
    let mut current = input.to_string();
    loop {
        let next = percent_decode(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle.as_bytes()))
}
