use core::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::{error, io};

#[cfg(feature = "s3")]
use rusoto_core::region::ParseRegionError;
#[cfg(feature = "s3")]
use rusoto_core::RusotoError;
use thiserror::Error;

use crate::ocfl::VersionNum;

pub type Result<T, E = RocflError> = core::result::Result<T, E>;

/// The complete error taxonomy surfaced by the engine. Every public fallible operation
/// returns one of these variants; transport-level causes are folded into `StorageError`
/// rather than leaked to callers as third-party types.
#[derive(Error)]
pub enum RocflError {
    /// The requested object or version does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A create-only operation collided with an existing storage entry.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The caller's expected HEAD did not match the observed HEAD.
    #[error("Object {object_id} is out of sync: expected version {expected}, found {actual}")]
    ObjectOutOfSync {
        object_id: String,
        expected: VersionNum,
        actual: VersionNum,
    },

    /// A logical path collided with an existing mapping and `OVERWRITE` was not set.
    #[error("Path {path} already exists in object {object_id}. Use the overwrite option to replace it.")]
    OverwriteConflict { object_id: String, path: String },

    /// A computed digest did not match the expected/declared value.
    #[error("Fixity check failed for {path}: expected {expected}, computed {actual}")]
    FixityMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// The inventory is missing required fields, has broken references, or otherwise
    /// violates one of the invariants in the data model.
    #[error("Invalid inventory for object {object_id}: {message}")]
    InvalidInventory { object_id: String, message: String },

    /// Storage state contradicts what the inventory claims (missing manifest file,
    /// sidecar digest mismatch, and similar).
    #[error("Object {object_id} is corrupt: {message}")]
    CorruptObject { object_id: String, message: String },

    /// A logical or content path was rejected by the active path constraint processor.
    #[error("Path {path} violates constraint '{rule}': {message}")]
    PathConstraintViolation {
        path: String,
        rule: String,
        message: String,
    },

    /// A lock wait exceeded its timeout, or waiting was interrupted.
    #[error("Failed to acquire lock for object {object_id}: {message}")]
    LockContention { object_id: String, message: String },

    /// The repository root has no version marker, the configured layout does not match
    /// what is on disk, or an extension is unsupported.
    #[error("Repository configuration error: {0}")]
    RepositoryConfigurationError(String),

    /// A transport-level I/O failure from the storage backend.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// One or more files touched by a copy/move/rename operation failed.
    #[error("{0}")]
    CopyMoveError(MultiError),

    /// The repository handle has been closed and can no longer be used.
    #[error("This repository has been closed and may no longer be used")]
    Closed,

    #[error("{0}")]
    Io(io::Error),

    #[error("{0}")]
    Wrapped(Box<dyn error::Error + Send + Sync>),
}

/// Aggregates the error messages produced while applying a copy/move/rename operation to
/// several paths, so a partial failure can be reported without aborting the whole batch.
pub struct MultiError(pub Vec<String>);

impl Display for MultiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Failed to copy/move one or more files:")?;
        for error in &self.0 {
            writeln!(f, "  {}", error)?;
        }
        Ok(())
    }
}

/// Constructs a `RocflError::NotFound` error describing an object, optionally scoped to
/// a specific version.
pub fn not_found(object_id: &str, version_num: Option<VersionNum>) -> RocflError {
    match version_num {
        Some(version) => RocflError::NotFound(format!("Object {} version {}", object_id, version)),
        None => RocflError::NotFound(format!("Object {}", object_id)),
    }
}

/// Constructs a `RocflError::NotFound` error describing a logical path missing from a
/// specific object version.
pub fn not_found_path(object_id: &str, version_num: VersionNum, path: impl Display) -> RocflError {
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

impl From<serde_json::Error> for RocflError {
    fn from(e: serde_json::Error) -> Self {
        RocflError::InvalidInventory {
            object_id: String::new(),
            message: e.to_string(),
        }
    }
}

impl From<walkdir::Error> for RocflError {
    fn from(e: walkdir::Error) -> Self {
        RocflError::StorageError(e.to_string())
    }
}

#[cfg(feature = "s3")]
impl From<ParseRegionError> for RocflError {
    fn from(e: ParseRegionError) -> Self {
        RocflError::RepositoryConfigurationError(e.to_string())
    }
}

#[cfg(feature = "s3")]
impl<T: error::Error + 'static> From<RusotoError<T>> for RocflError {
    fn from(e: RusotoError<T>) -> Self {
        RocflError::StorageError(e.to_string())
    }
}
