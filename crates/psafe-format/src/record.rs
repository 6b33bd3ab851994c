//! Password records: one field group per entry

use chrono::{DateTime, Utc};
use psafe_core::{le, utc_from_unix, PsafeError, PsafeResult};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::field::Field;
use crate::history::{PasswordEntry, PasswordHistory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFieldType {
    /// Version 2 combined title/user; never valid in a v3 record.
    Name,
    Uuid,
    Group,
    Title,
    User,
    Notes,
    Password,
    CreationTime,
    PasswordModificationTime,
    LastAccessTime,
    PasswordExpiryTime,
    /// Version 2 policy field; never valid in a v3 record.
    Policy,
    LastModificationTime,
    Url,
    Autotype,
    PasswordHistory,
    End,
    Unknown(u8),
}

impl From<u8> for RecordFieldType {
    fn from(code: u8) -> Self {
        match code {
            0x00 => Self::Name,
            0x01 => Self::Uuid,
            0x02 => Self::Group,
            0x03 => Self::Title,
            0x04 => Self::User,
            0x05 => Self::Notes,
            0x06 => Self::Password,
            0x07 => Self::CreationTime,
            0x08 => Self::PasswordModificationTime,
            0x09 => Self::LastAccessTime,
            0x0a => Self::PasswordExpiryTime,
            0x0b => Self::Policy,
            0x0c => Self::LastModificationTime,
            0x0d => Self::Url,
            0x0e => Self::Autotype,
            0x0f => Self::PasswordHistory,
            0xff => Self::End,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Clone, Default, PartialEq)]
pub struct Record {
    pub uuid: Option<Uuid>,
    /// Dot-separated group path, e.g. `Work.Email`.
    pub group: Option<String>,
    pub title: Option<String>,
    pub user: Option<String>,
    pub notes: Option<String>,
    pub password: Zeroizing<String>,
    pub created: Option<DateTime<Utc>>,
    pub accessed: Option<DateTime<Utc>>,
    /// Last modification of any field.
    pub modified: Option<DateTime<Utc>>,
    pub password_modified: Option<DateTime<Utc>>,
    pub password_expires: Option<DateTime<Utc>>,
    pub url: Option<String>,
    pub autotype: Option<String>,
    pub password_history: Option<PasswordHistory>,
    pub unknown_fields: Vec<Field>,
}

impl Record {
    pub fn from_fields(fields: Vec<Field>) -> PsafeResult<Self> {
        let mut record = Record::default();
        let mut end_seen = false;

        for field in fields {
            if end_seen {
                return Err(PsafeError::corrupt("the END field must be last in a record"));
            }
            match RecordFieldType::from(field.code()) {
                RecordFieldType::Name => {
                    return Err(PsafeError::corrupt(
                        "NAME field is not valid in a version 3 record",
                    ))
                }
                RecordFieldType::Policy => {
                    return Err(PsafeError::corrupt(
                        "POLICY field is not valid in a version 3 record",
                    ))
                }
                RecordFieldType::Uuid => record.uuid = Some(field.uuid()?),
                RecordFieldType::Group => record.group = Some(field.text()),
                RecordFieldType::Title => record.title = Some(field.text()),
                RecordFieldType::User => record.user = Some(field.text()),
                RecordFieldType::Notes => record.notes = Some(field.text()),
                RecordFieldType::Password => record.password = Zeroizing::new(field.text()),
                RecordFieldType::CreationTime => record.created = time(&field, "CTIME")?,
                RecordFieldType::PasswordModificationTime => {
                    record.password_modified = time(&field, "PMTIME")?
                }
                RecordFieldType::LastAccessTime => record.accessed = time(&field, "ATIME")?,
                RecordFieldType::PasswordExpiryTime => {
                    record.password_expires = time(&field, "LTIME")?
                }
                RecordFieldType::LastModificationTime => {
                    record.modified = time(&field, "RMTIME")?
                }
                RecordFieldType::Url => record.url = Some(field.text()),
                RecordFieldType::Autotype => record.autotype = Some(field.text()),
                RecordFieldType::PasswordHistory => {
                    let text = Zeroizing::new(field.text());
                    record.password_history = Some(PasswordHistory::parse(&text)?)
                }
                RecordFieldType::End => end_seen = true,
                RecordFieldType::Unknown(_) => record.unknown_fields.push(field),
            }
        }

        Ok(record)
    }

    /// The live password with its change time and expiry.
    pub fn current_password(&self) -> PasswordEntry {
        PasswordEntry::new(
            self.password.as_str(),
            self.password_modified,
            self.password_expires,
        )
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("uuid", &self.uuid)
            .field("group", &self.group)
            .field("title", &self.title)
            .field("user", &self.user)
            .field("notes", &self.notes.as_ref().map(|_| "[REDACTED]"))
            .field("password", &"[REDACTED]")
            .field("created", &self.created)
            .field("accessed", &self.accessed)
            .field("modified", &self.modified)
            .field("password_modified", &self.password_modified)
            .field("password_expires", &self.password_expires)
            .field("url", &self.url)
            .field("autotype", &self.autotype)
            .field("password_history", &self.password_history)
            .field("unknown_fields", &self.unknown_fields)
            .finish()
    }
}

/// Record times are exactly four bytes, signed. Zero is "unset".
fn time(field: &Field, what: &str) -> PsafeResult<Option<DateTime<Utc>>> {
    let secs = le::i32_le_exact(field.data(), what)?;
    Ok(utc_from_unix(i64::from(secs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::END_CODE;

    fn field(code: u8, data: &[u8]) -> Field {
        Field::new(code, data.to_vec())
    }

    fn end() -> Field {
        field(END_CODE, b"")
    }

    #[test]
    fn test_full_record() {
        let uuid = [0xabu8; 16];
        let record = Record::from_fields(vec![
            field(0x01, &uuid),
            field(0x02, b"Work.Email"),
            field(0x03, b"Mail"),
            field(0x04, b"alice"),
            field(0x05, b"some notes"),
            field(0x06, b"hunter2"),
            field(0x07, &1_000_000_000i32.to_le_bytes()),
            field(0x08, &1_000_000_100i32.to_le_bytes()),
            field(0x09, &1_000_000_200i32.to_le_bytes()),
            field(0x0a, &0i32.to_le_bytes()),
            field(0x0c, &1_000_000_300i32.to_le_bytes()),
            field(0x0d, b"https://mail.example.com"),
            field(0x0e, b"\\u\\t\\p\\n"),
            end(),
        ])
        .unwrap();

        assert_eq!(record.uuid, Some(Uuid::from_bytes(uuid)));
        assert_eq!(record.group.as_deref(), Some("Work.Email"));
        assert_eq!(record.title.as_deref(), Some("Mail"));
        assert_eq!(record.user.as_deref(), Some("alice"));
        assert_eq!(record.notes.as_deref(), Some("some notes"));
        assert_eq!(record.password.as_str(), "hunter2");
        assert_eq!(record.created.unwrap().timestamp(), 1_000_000_000);
        assert_eq!(record.password_modified.unwrap().timestamp(), 1_000_000_100);
        assert_eq!(record.accessed.unwrap().timestamp(), 1_000_000_200);
        assert_eq!(record.password_expires, None);
        assert_eq!(record.modified.unwrap().timestamp(), 1_000_000_300);
        assert_eq!(record.url.as_deref(), Some("https://mail.example.com"));
        assert_eq!(record.autotype.as_deref(), Some("\\u\\t\\p\\n"));
        assert!(record.password_history.is_none());
    }

    #[test]
    fn test_only_end_gives_empty_record() {
        let record = Record::from_fields(vec![end()]).unwrap();
        assert_eq!(record, Record::default());
        assert!(record.password.is_empty());
    }

    #[test]
    fn test_name_and_policy_rejected() {
        for code in [0x00, 0x0b] {
            let err = Record::from_fields(vec![field(code, b"x"), end()]).unwrap_err();
            assert!(matches!(err, PsafeError::Corrupt(_)), "{err}");
        }
    }

    #[test]
    fn test_time_must_be_four_bytes() {
        for code in [0x07, 0x08, 0x09, 0x0a, 0x0c] {
            let err = Record::from_fields(vec![field(code, &[1, 2, 3, 4, 5]), end()]).unwrap_err();
            assert!(err.to_string().contains("32-bit integer"), "{err}");
        }
    }

    #[test]
    fn test_negative_time_before_epoch() {
        let record =
            Record::from_fields(vec![field(0x07, &(-86_400i32).to_le_bytes()), end()]).unwrap();
        assert_eq!(record.created.unwrap().to_rfc3339(), "1969-12-31T00:00:00+00:00");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let record = Record::from_fields(vec![field(0x03, b"caf\xe9"), end()]).unwrap();
        assert_eq!(record.title.as_deref(), Some("caf\u{fffd}"));
    }

    #[test]
    fn test_password_history_parsed() {
        let history = "10201".to_string() + "3b9aca00" + "0003" + "old";
        let record =
            Record::from_fields(vec![field(0x0f, history.as_bytes()), end()]).unwrap();
        let history = record.password_history.unwrap();
        assert_eq!(history.max_entries, 2);
        assert_eq!(history.entries[0].password.as_str(), "old");
    }

    #[test]
    fn test_malformed_password_history_is_corrupt() {
        let err = Record::from_fields(vec![field(0x0f, b"10205zz"), end()]).unwrap_err();
        assert!(matches!(err, PsafeError::Corrupt(_)));
    }

    #[test]
    fn test_current_password() {
        let record = Record::from_fields(vec![
            field(0x06, b"s3cret"),
            field(0x08, &1_000i32.to_le_bytes()),
            field(0x0a, &2_000i32.to_le_bytes()),
            end(),
        ])
        .unwrap();

        let current = record.current_password();
        assert_eq!(current.password.as_str(), "s3cret");
        assert_eq!(current.modified.unwrap().timestamp(), 1_000);
        assert_eq!(current.expires.unwrap().timestamp(), 2_000);
    }

    #[test]
    fn test_unknown_fields_preserved() {
        let record = Record::from_fields(vec![
            field(0x10, b"run command"),
            field(0x03, b"Title"),
            field(0x20, &[9, 9]),
            end(),
        ])
        .unwrap();
        assert_eq!(record.unknown_fields, vec![field(0x10, b"run command"), field(0x20, &[9, 9])]);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let record = Record::from_fields(vec![
            field(0x05, b"pin is 1234"),
            field(0x06, b"hunter2"),
            end(),
        ])
        .unwrap();
        let debug = format!("{record:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("1234"));
    }

    #[test]
    fn test_field_after_end() {
        assert!(Record::from_fields(vec![end(), field(0x03, b"late")]).is_err());
    }
}
