//! Library error type.
//!
//! Every fallible operation in the library reports through [`Error`]; there
//! are no panics on the paths reachable from valid inputs. The variants map
//! one-to-one onto the failure classes of the pipeline:
//!
//! - [`Error::InvalidInput`]: rejected clip or skeleton data (no bones, no
//!   samples, non-finite values, unnormalized rotations).
//! - [`Error::InvalidFormat`]: a compressed buffer that fails validation at
//!   decode time (tag, version, algorithm, CRC, truncation).
//! - [`Error::InvalidConfig`]: inconsistent compression settings.
//! - [`Error::Truncated`]: a clip file that ends or derails mid-document.
//! - [`Error::OutOfRange`]: a quantization target that cannot be
//!   represented; unreachable when the error metric is well formed.

use core::fmt;

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, Error>;

/// All failures reported by the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Clip or skeleton input is unusable.
    InvalidInput(String),
    /// A compressed buffer failed validation.
    InvalidFormat(String),
    /// Compression settings are inconsistent.
    InvalidConfig(String),
    /// A clip file ended unexpectedly or failed to parse.
    Truncated(String),
    /// A value cannot be represented at the requested precision.
    OutOfRange(String),
}

impl Error {
    /// Stable, grep-friendly name of the error class.
    pub fn name(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "InvalidInput",
            Error::InvalidFormat(_) => "InvalidFormat",
            Error::InvalidConfig(_) => "InvalidConfig",
            Error::Truncated(_) => "Truncated",
            Error::OutOfRange(_) => "OutOfRange",
        }
    }

    fn message(&self) -> &str {
        match self {
            Error::InvalidInput(msg)
            | Error::InvalidFormat(msg)
            | Error::InvalidConfig(msg)
            | Error::Truncated(msg)
            | Error::OutOfRange(msg) => msg,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name(), self.message())
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_class_and_message() {
        let err = Error::InvalidFormat("bad tag".to_owned());
        assert_eq!(err.to_string(), "InvalidFormat: bad tag");
        assert_eq!(err.name(), "InvalidFormat");
    }
}
