//! psafe-format: forward-only reader for Password Safe v3 databases
//!
//! Container layout:
//! ```text
//! "PWS3" | salt(32) | iter(4) | H(P')(32) | B1B2(32) | B3B4(32) | IV(16)
//!   | header fields … END | record fields … END | … | "PWS3-EOFPWS3-EOF" | HMAC(32)
//! ```
//!
//! Every field is `length(4, LE) | type(1) | data`, padded to 16-byte
//! Twofish-CBC blocks. The trailing HMAC covers field data only.
//!
//! ```no_run
//! use psafe_format::{Entity, PsafeReader};
//! use secrecy::SecretString;
//!
//! # fn main() -> psafe_core::PsafeResult<()> {
//! let file = std::fs::File::open("safe.psafe3")?;
//! let mut reader = PsafeReader::new(std::io::BufReader::new(file));
//! reader.set_passphrase(&SecretString::from("passphrase"))?;
//! while reader.read()? {
//!     if let Entity::Record(record) = reader.entity() {
//!         println!("{}", record.title.as_deref().unwrap_or_default());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod field;
pub mod header;
pub mod history;
pub mod reader;
pub mod record;
mod text;

pub use database::Database;
pub use field::{Field, FieldDecoder, HmacStatus, END_CODE, EOF_MARKER};
pub use header::{Header, HeaderFieldType, SUPPORTED_MAJOR_VERSION};
pub use history::{PasswordEntry, PasswordHistory};
pub use reader::{Entity, PsafeReader, ReaderState, TAG};
pub use record::{Record, RecordFieldType};
