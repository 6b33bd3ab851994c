//! The database header: the first field group after the key preamble

use chrono::{DateTime, Utc};
use psafe_core::{le, utc_from_unix, PsafeError, PsafeResult};
use uuid::Uuid;

use crate::field::Field;
use crate::text::{parse_hex, split_utf16};

/// The only major format version this reader understands.
pub const SUPPORTED_MAJOR_VERSION: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderFieldType {
    Version,
    Uuid,
    NonDefaultPreferences,
    TreeDisplayStatus,
    LastUpdateTime,
    /// Pre-3.x combined user+host field, superseded by the two below.
    LastUpdateUserHost,
    LastUpdateApplication,
    LastUpdateUser,
    LastUpdateHost,
    DatabaseName,
    DatabaseDescription,
    End,
    Unknown(u8),
}

impl From<u8> for HeaderFieldType {
    fn from(code: u8) -> Self {
        match code {
            0x00 => Self::Version,
            0x01 => Self::Uuid,
            0x02 => Self::NonDefaultPreferences,
            0x03 => Self::TreeDisplayStatus,
            0x04 => Self::LastUpdateTime,
            0x05 => Self::LastUpdateUserHost,
            0x06 => Self::LastUpdateApplication,
            0x07 => Self::LastUpdateUser,
            0x08 => Self::LastUpdateHost,
            0x09 => Self::DatabaseName,
            0x0a => Self::DatabaseDescription,
            0xff => Self::End,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    pub major_version: u8,
    pub minor_version: u8,
    pub uuid: Option<Uuid>,
    pub non_default_preferences: Option<String>,
    /// Tree expansion state, one entry per displayed node.
    pub tree_display_status: Vec<bool>,
    pub last_saved_by_user: Option<String>,
    pub last_saved_on_host: Option<String>,
    pub last_saved_by_application: Option<String>,
    pub last_update_time: Option<DateTime<Utc>>,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Fields with codes this reader does not know, kept verbatim.
    pub unknown_fields: Vec<Field>,
}

impl Header {
    pub fn from_fields(fields: Vec<Field>) -> PsafeResult<Self> {
        let mut header = Header::default();
        let mut version_seen = false;
        let mut legacy_user_host = None;
        let mut end_seen = false;

        for field in fields {
            if end_seen {
                return Err(PsafeError::corrupt("the END field must be last in the header"));
            }
            match HeaderFieldType::from(field.code()) {
                HeaderFieldType::Version => {
                    let (minor, major) = parse_version(field.data())?;
                    header.minor_version = minor;
                    header.major_version = major;
                    version_seen = true;
                }
                HeaderFieldType::Uuid => header.uuid = Some(field.uuid()?),
                HeaderFieldType::NonDefaultPreferences => {
                    header.non_default_preferences = Some(field.text())
                }
                HeaderFieldType::TreeDisplayStatus => header
                    .tree_display_status
                    .extend(field.text().chars().map(|c| c == '1')),
                HeaderFieldType::LastUpdateTime => {
                    header.last_update_time = parse_update_time(field.data())?
                }
                HeaderFieldType::LastUpdateUserHost => {
                    legacy_user_host = Some(parse_user_host(&field.text())?)
                }
                HeaderFieldType::LastUpdateApplication => {
                    header.last_saved_by_application = Some(field.text())
                }
                HeaderFieldType::LastUpdateUser => header.last_saved_by_user = Some(field.text()),
                HeaderFieldType::LastUpdateHost => header.last_saved_on_host = Some(field.text()),
                HeaderFieldType::DatabaseName => header.name = Some(field.text()),
                HeaderFieldType::DatabaseDescription => header.description = Some(field.text()),
                HeaderFieldType::End => end_seen = true,
                HeaderFieldType::Unknown(_) => header.unknown_fields.push(field),
            }
        }

        if !version_seen {
            return Err(PsafeError::corrupt("header has no version field"));
        }

        // The separate user/host fields win over the legacy combined one.
        if let Some((user, host)) = legacy_user_host {
            if header.last_saved_by_user.is_none() && header.last_saved_on_host.is_none() {
                header.last_saved_by_user = Some(user);
                header.last_saved_on_host = Some(host);
            }
        }

        tracing::debug!(
            major = header.major_version,
            minor = header.minor_version,
            unknown = header.unknown_fields.len(),
            "header assembled"
        );
        Ok(header)
    }
}

/// Two bytes: minor, then major.
fn parse_version(data: &[u8]) -> PsafeResult<(u8, u8)> {
    let [minor, major, ..] = *data else {
        return Err(PsafeError::corrupt(format!(
            "version field too short: {} bytes",
            data.len()
        )));
    };
    if major != SUPPORTED_MAJOR_VERSION {
        return Err(PsafeError::corrupt(format!(
            "only version {SUPPORTED_MAJOR_VERSION} databases are supported, found {major}.{minor}"
        )));
    }
    Ok((minor, major))
}

/// Four little-endian bytes, or eight hex characters as written by some
/// older releases. Zero is "unset".
fn parse_update_time(data: &[u8]) -> PsafeResult<Option<DateTime<Utc>>> {
    let secs = match data.len() {
        4 => le::u32_le([data[0], data[1], data[2], data[3]]),
        8 => {
            let text = String::from_utf8_lossy(data);
            parse_hex(&text).ok_or_else(|| {
                PsafeError::corrupt(format!("last update time {text:?} is not hexadecimal"))
            })?
        }
        n => {
            return Err(PsafeError::corrupt(format!(
                "last update time must be 4 or 8 bytes, got {n}"
            )))
        }
    };
    Ok(utc_from_unix(i64::from(secs)))
}

/// `LLLL<user><host>`: a 4-hex-digit user length, then user, then host.
fn parse_user_host(text: &str) -> PsafeResult<(String, String)> {
    let invalid = || PsafeError::corrupt(format!("invalid last update user/host field {text:?}"));
    let (len, rest) = split_utf16(text, 4).ok_or_else(invalid)?;
    let len = parse_hex(len).ok_or_else(invalid)?;
    let (user, host) = split_utf16(rest, len as usize).ok_or_else(invalid)?;
    Ok((user.to_string(), host.to_string()))
}
