//! This library is a storage agnostic abstraction over [OCFL repositories](https://ocfl.io/).
//!
//! Create a new `OcflRepo` as follows:
//!
//! ```rust,no_run
//! use ocfl_engine::ocfl::OcflRepo;
//!
//! let repo = OcflRepo::fs_repo("path/to/ocfl/storage/root").unwrap();
//! ```

pub use self::digest::{DigestAlgorithm, FixityReader};
pub use self::error::{not_found, Result, RocflError};
pub use self::paths::constraints::{ConstraintPreset, PathConstraints};
pub use self::repo::OcflRepo;
pub use self::store::layout::{LayoutExtensionName, StorageLayout};
pub use self::types::*;

mod bimap;
pub mod consts;
mod digest;
mod error;
mod inventory;
mod lock;
mod paths;
mod repo;
mod serde;
pub(crate) mod specs;
mod store;
mod types;
mod util;
