use thiserror::Error;

pub type PsafeResult<T> = Result<T, PsafeError>;

#[derive(Debug, Error)]
pub enum PsafeError {
    /// A fixed-size region of the container ended early.
    #[error("could not read {0} bytes")]
    ShortRead(&'static str),

    #[error("corrupt database: {0}")]
    Corrupt(String),

    #[error("invalid passphrase")]
    InvalidPassphrase,

    #[error("HMAC mismatch: possible file corruption or tampering")]
    HmacMismatch,

    #[error("reader misuse: {0}")]
    Misuse(&'static str),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of [`PsafeError`] for callers that only need to
/// decide between "retry with another passphrase", "file is bad" and "bug".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Structural,
    Authentication,
    Misuse,
    Config,
}

impl PsafeError {
    pub fn corrupt(reason: impl Into<String>) -> Self {
        PsafeError::Corrupt(reason.into())
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            PsafeError::ShortRead(_)
            | PsafeError::Corrupt(_)
            | PsafeError::HmacMismatch
            | PsafeError::Io(_) => ErrorClass::Structural,
            PsafeError::InvalidPassphrase => ErrorClass::Authentication,
            PsafeError::Misuse(_) => ErrorClass::Misuse,
            PsafeError::Config(_) => ErrorClass::Config,
        }
    }

    /// Maps an I/O failure while filling a fixed-size region. End of input
    /// becomes [`PsafeError::ShortRead`]; anything else stays an I/O error.
    pub fn from_read(err: std::io::Error, what: &'static str) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            PsafeError::ShortRead(what)
        } else {
            PsafeError::Io(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes() {
        assert_eq!(PsafeError::ShortRead("SALT").class(), ErrorClass::Structural);
        assert_eq!(PsafeError::corrupt("x").class(), ErrorClass::Structural);
        assert_eq!(PsafeError::HmacMismatch.class(), ErrorClass::Structural);
        assert_eq!(
            PsafeError::InvalidPassphrase.class(),
            ErrorClass::Authentication
        );
        assert_eq!(PsafeError::Misuse("no passphrase").class(), ErrorClass::Misuse);
        assert_eq!(PsafeError::Config("bad".into()).class(), ErrorClass::Config);
    }

    #[test]
    fn test_from_read_eof_is_short_read() {
        let eof = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
        assert!(matches!(
            PsafeError::from_read(eof, "SALT"),
            PsafeError::ShortRead("SALT")
        ));

        let other = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(matches!(
            PsafeError::from_read(other, "SALT"),
            PsafeError::Io(_)
        ));
    }

    #[test]
    fn test_messages() {
        assert_eq!(PsafeError::InvalidPassphrase.to_string(), "invalid passphrase");
        assert_eq!(
            PsafeError::ShortRead("IV").to_string(),
            "could not read IV bytes"
        );
    }
}
