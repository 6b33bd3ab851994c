use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PsafeError, PsafeResult};

/// Top-level configuration (loaded from psafe.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PsafeConfig {
    pub reader: ReaderConfig,
    pub log: LogConfig,
    pub cli: CliConfig,
}

impl PsafeConfig {
    /// Load configuration from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> PsafeResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| PsafeError::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_toml(&content)
            .map_err(|e| PsafeError::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// What to do when the trailing HMAC does not match the computed one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HmacPolicy {
    /// Fail the final advance with `HmacMismatch`.
    #[default]
    Enforce,
    /// Log a warning and end the stream normally.
    Warn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Trailer authentication policy (default: enforce)
    pub hmac_policy: HmacPolicy,
    /// Upper bound on fields in one header/record group, terminator included (default: 255)
    pub max_fields_per_record: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            hmac_policy: HmacPolicy::Enforce,
            max_fields_per_record: 255,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Database used when none is given on the command line
    pub default_database: Option<PathBuf>,
    /// Marker in a record's notes that precedes a bracketed otpauth URL
    pub totp_label: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            default_database: None,
            totp_label: "Strongbox TOTP Auth URL: [".into(),
        }
    }
}
