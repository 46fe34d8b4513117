//! `ocfl-engine` is a storage-agnostic client library for reading and writing
//! repositories that conform to the [Oxford Common File Layout](https://ocfl.io/).
//!
//! It loads and validates inventories, stages new object versions with
//! deduplication and fixity, and commits them atomically to a pluggable storage
//! backend (local filesystem or S3-compatible object store) under per-object
//! locking.
//!
//! ```rust,no_run
//! use ocfl_engine::ocfl::OcflRepo;
//!
//! let repo = OcflRepo::fs_repo("path/to/ocfl/storage/root")?;
//! # Ok::<(), ocfl_engine::ocfl::RocflError>(())
//! ```

pub mod ocfl;

pub use self::ocfl::{
    Diff, DigestAlgorithm, FileDetails, ObjectVersion, ObjectVersionDetails, OcflRepo, Result,
    RocflError, VersionDetails, VersionNum,
};
