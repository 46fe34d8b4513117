pub const REPO_NAMASTE_FILE_1_0: &str = "0=ocfl_1.0";
pub const REPO_NAMASTE_FILE_1_1: &str = "0=ocfl_1.1";
pub const OBJECT_NAMASTE_FILE_1_0: &str = "0=ocfl_object_1.0";
pub const OBJECT_NAMASTE_FILE_1_1: &str = "0=ocfl_object_1.1";
pub const OBJECT_NAMASTE_FILE_PREFIX: &str = "0=ocfl_object_";

pub const ROCFL_STAGING_EXTENSION: &str = "rocfl-staging";

pub const INVENTORY_FILE: &str = "inventory.json";
pub const INVENTORY_SIDECAR_PREFIX: &str = "inventory.json.";
pub const OCFL_LAYOUT_FILE: &str = "ocfl_layout.json";

pub const OCFL_SPEC_FILE_1_0: &str = "ocfl_1.0.txt";
pub const OCFL_SPEC_FILE_1_1: &str = "ocfl_1.1.txt";
pub const OCFL_EXTENSIONS_SPEC_FILE: &str = "ocfl_extensions_1.0.md";

pub const EXTENSIONS_DIR: &str = "extensions";
pub const EXTENSIONS_CONFIG_FILE: &str = "config.json";

pub const OCFL_OBJECT_VERSION_1_0: &str = "ocfl_object_1.0";
pub const OCFL_OBJECT_VERSION_1_1: &str = "ocfl_object_1.1";

pub const INVENTORY_TYPE_1_0: &str = "https://ocfl.io/1.0/spec/#inventory";
pub const INVENTORY_TYPE_1_1: &str = "https://ocfl.io/1.1/spec/#inventory";
/// Type declaration written into inventories created by this library. New objects target
/// the 1.1 spec; 1.0 inventories are still read and round-tripped.
pub const INVENTORY_TYPE: &str = INVENTORY_TYPE_1_1;

pub const DEFAULT_CONTENT_DIR: &str = "content";

pub const FLAT_DIRECT_LAYOUT_EXTENSION: &str = "0002-flat-direct-storage-layout";
pub const HASHED_NTUPLE_OBJECT_ID_LAYOUT_EXTENSION: &str =
    "0003-hash-and-id-n-tuple-storage-layout";
pub const HASHED_NTUPLE_LAYOUT_EXTENSION: &str = "0004-hashed-n-tuple-storage-layout";
pub const FLAT_OMIT_PREFIX_LAYOUT_EXTENSION: &str = "0006-flat-omit-prefix-storage-layout";
pub const NTUPLE_OMIT_PREFIX_LAYOUT_EXTENSION: &str = "0007-n-tuple-omit-prefix-storage-layout";

pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    FLAT_DIRECT_LAYOUT_EXTENSION,
    HASHED_NTUPLE_OBJECT_ID_LAYOUT_EXTENSION,
    HASHED_NTUPLE_LAYOUT_EXTENSION,
    FLAT_OMIT_PREFIX_LAYOUT_EXTENSION,
    NTUPLE_OMIT_PREFIX_LAYOUT_EXTENSION,
];
