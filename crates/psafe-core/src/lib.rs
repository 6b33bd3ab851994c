//! psafe-core: shared types for the Password Safe v3 reader
//!
//! - [`error`]: the error type and its structural / authentication / misuse classes
//! - [`config`]: TOML configuration (reader policy, logging, CLI defaults)
//! - [`time`], [`le`]: epoch-second timestamps and little-endian integers

pub mod config;
pub mod error;
pub mod le;
pub mod time;

pub use config::{HmacPolicy, PsafeConfig, ReaderConfig};
pub use error::{ErrorClass, PsafeError, PsafeResult};
pub use time::utc_from_unix;
