//! Whole-database loading for callers that do not need streaming.

use std::io::Read;

use psafe_core::{PsafeError, PsafeResult, ReaderConfig};
use secrecy::SecretString;

use crate::field::HmacStatus;
use crate::header::Header;
use crate::reader::{Entity, PsafeReader};
use crate::record::Record;

#[derive(Debug, Clone)]
pub struct Database {
    pub header: Header,
    pub records: Vec<Record>,
    pub hmac: HmacStatus,
}

impl Database {
    /// Drive a reader over `source` to the end and collect everything.
    pub fn open<R: Read>(
        source: R,
        passphrase: &SecretString,
        config: &ReaderConfig,
    ) -> PsafeResult<Self> {
        let mut reader = PsafeReader::with_config(source, config.clone());
        reader.set_passphrase(passphrase)?;

        let mut header = None;
        let mut records = Vec::new();
        while reader.read()? {
            match reader.entity() {
                Entity::Header(h) => header = Some(h.clone()),
                Entity::Record(r) => records.push(r.clone()),
                Entity::End | Entity::None => {}
            }
        }

        let header = header.ok_or_else(|| PsafeError::corrupt("database has no header"))?;
        let hmac = reader
            .hmac_status()
            .ok_or(PsafeError::Misuse("reader ended without checking the HMAC"))?;
        reader.close();
        Ok(Self {
            header,
            records,
            hmac,
        })
    }

    /// First record whose title matches exactly.
    pub fn find_by_title(&self, title: &str) -> Option<&Record> {
        self.records
            .iter()
            .find(|r| r.title.as_deref() == Some(title))
    }

    /// Records whose group is `group` or nested below it.
    pub fn in_group<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a Record> + 'a {
        self.records.iter().filter(move |r| {
            r.group.as_deref().is_some_and(|g| {
                g == group || (g.starts_with(group) && g[group.len()..].starts_with('.'))
            })
        })
    }
}
