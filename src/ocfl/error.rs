use core::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::{error, io};

#[cfg(feature = "s3")]
use rusoto_core::region::ParseRegionError;
#[cfg(feature = "s3")]
use rusoto_core::RusotoError;
use thiserror::Error;

use crate::ocfl::{LogicalPath, VersionNum};

pub type Result<T, E = RocflError> = core::result::Result<T, E>;

/// Application errors
#[derive(Error)]
pub enum RocflError {
    #[error("Object {object_id} is corrupt: {message}")]
    CorruptObject { object_id: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("{0}")]
    General(String),

    #[error("File already exists at {0}. Use the force flag if you wish to overwrite.")]
    AlreadyExists(LogicalPath),

    /// The repository or object has been closed and is no longer accepting requests.
    #[error("The repository has been closed")]
    Closed,

    /// Acquiring the per-object write lock timed out.
    #[error("Timed out waiting for a write lock on object {0}")]
    Lock(String),

    /// A copy or move operation partially failed; collects every individual failure.
    #[error("{0}")]
    CopyMoveError(MultiError),

    /// A content file's digest did not match its expected value.
    #[error("{0}")]
    FixityCheck(String),

    /// The object was modified by another process between the time it was read and the time
    /// the current operation attempted to commit its changes.
    #[error("Object {0} was concurrently modified by another process")]
    ObjectOutOfSync(String),

    /// A logical or content path violated an OCFL path constraint (e.g. `.`, `..`, empty
    /// segments, backslashes).
    #[error("Invalid path: {0}")]
    PathConstraint(String),

    /// A version number was malformed or out of sequence.
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// An inventory failed structural or semantic validation.
    #[error("Invalid inventory: {0}")]
    InvalidInventory(String),

    /// An OCFL extension was malformed, unsupported, or misconfigured.
    #[error("Extension error: {0}")]
    Extension(String),

    #[error("{0}")]
    Io(io::Error),

    #[error("{0}")]
    Wrapped(Box<dyn error::Error>),
}

/// Aggregates multiple errors that occurred while processing a batch of independent operations,
/// such as copying or moving several files in one call.
#[derive(Debug)]
pub struct MultiError(pub Vec<String>);

impl Display for MultiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", e)?;
        }
        Ok(())
    }
}

/// Constructs a `RocflError::NotFound` error
pub fn not_found(object_id: &str, version_num: Option<VersionNum>) -> RocflError {
    match version_num {
        Some(version) => RocflError::NotFound(format!("Object {} version {}", object_id, version)),
        None => RocflError::NotFound(format!("Object {}", object_id)),
    }
}

/// Constructs a `RocflError::NotFound` error for a missing logical or content path within a
/// specific object version.
pub fn not_found_path(object_id: &str, version_num: VersionNum, path: &impl Display) -> RocflError {
    RocflError::NotFound(format!(
        "Path {} not found in object {} version {}",
        path, object_id, version_num
    ))
}

impl Debug for RocflError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl From<io::Error> for RocflError {
    fn from(e: io::Error) -> Self {
        RocflError::Io(e)
    }
}

impl From<globset::Error> for RocflError {
    fn from(e: globset::Error) -> Self {
        RocflError::Wrapped(Box::new(e))
    }
}

impl From<serde_json::Error> for RocflError {
    fn from(e: serde_json::Error) -> Self {
        RocflError::Wrapped(Box::new(e))
    }
}

impl From<toml::de::Error> for RocflError {
    fn from(e: toml::de::Error) -> Self {
        RocflError::InvalidConfiguration(e.to_string())
    }
}

impl From<walkdir::Error> for RocflError {
    fn from(e: walkdir::Error) -> Self {
        RocflError::Wrapped(Box::new(e))
    }
}

#[cfg(feature = "s3")]
impl From<ParseRegionError> for RocflError {
    fn from(e: ParseRegionError) -> Self {
        RocflError::Wrapped(Box::new(e))
    }
}

#[cfg(feature = "s3")]
impl<T: error::Error + 'static> From<RusotoError<T>> for RocflError {
    fn from(e: RusotoError<T>) -> Self {
        RocflError::Wrapped(Box::new(e))
    }
}
