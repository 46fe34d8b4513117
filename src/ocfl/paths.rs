use std::path::{Path, PathBuf};

use crate::ocfl::consts::*;
use crate::ocfl::inventory::Inventory;
use crate::ocfl::{DigestAlgorithm, SpecVersion, VersionNum};

pub use constraints::{ConstraintPreset, PathConstraints};

/// Returns the path to `inventory.json` within the specified directory
pub fn inventory_path<P>(dir: P) -> PathBuf
where
    P: AsRef<Path>,
{
    dir.as_ref().join(INVENTORY_FILE)
}

/// Returns the path to `inventory.json.ALGO` within the specified directory
pub fn sidecar_path<P>(dir: P, algorithm: DigestAlgorithm) -> PathBuf
where
    P: AsRef<Path>,
{
    dir.as_ref().join(sidecar_name(algorithm))
}

/// Returns the name of an inventory sidecar for the specified algorithm
pub fn sidecar_name(algorithm: DigestAlgorithm) -> String {
    format!("{}.{}", INVENTORY_FILE, algorithm)
}

/// Returns the path to an object's namaste file
pub fn object_namaste_path<P>(dir: P, version: SpecVersion) -> PathBuf
where
    P: AsRef<Path>,
{
    dir.as_ref().join(version.object_namaste().filename)
}

/// Returns the path to the version directory within the object root
pub fn version_path<P>(object_root: P, version_num: VersionNum) -> PathBuf
where
    P: AsRef<Path>,
{
    object_root.as_ref().join(version_num.to_string())
}

/// Returns the a version's content directory
pub fn content_path<P>(object_root: P, version_num: VersionNum, inventory: &Inventory) -> PathBuf
where
    P: AsRef<Path>,
{
    let mut version_dir = version_path(object_root, version_num);
    version_dir.push(inventory.defaulted_content_dir());
    version_dir
}

/// Returns the path to the head version's content directory
pub fn head_content_path<P>(object_root: P, inventory: &Inventory) -> PathBuf
where
    P: AsRef<Path>,
{
    content_path(object_root, inventory.head, inventory)
}

/// Returns the path to the `extensions` directory within the specified directory
pub fn extensions_path<P>(dir: P) -> PathBuf
where
    P: AsRef<Path>,
{
    dir.as_ref().join(EXTENSIONS_DIR)
}

/// Returns the path to the root of the staging extension
pub fn staging_extension_path<P>(storage_root: P) -> PathBuf
where
    P: AsRef<Path>,
{
    let mut extensions = extensions_path(storage_root);
    extensions.push(ROCFL_STAGING_EXTENSION);
    extensions
}

/// Returns the path to the `ocfl_layout.json`
pub fn ocfl_layout_path<P>(storage_root: P) -> PathBuf
where
    P: AsRef<Path>,
{
    storage_root.as_ref().join(OCFL_LAYOUT_FILE)
}

/// Returns the path to the OCFL root namaste file
pub fn root_namaste_path<P>(storage_root: P, version: SpecVersion) -> PathBuf
where
    P: AsRef<Path>,
{
    storage_root.as_ref().join(version.root_namaste().filename)
}

/// Returns the path to the OCFL spec file
pub fn ocfl_spec_path<P>(storage_root: P, version: SpecVersion) -> PathBuf
where
    P: AsRef<Path>,
{
    storage_root.as_ref().join(version.spec_filename())
}

/// Returns the path to the OCFL extensions spec file
pub fn ocfl_extensions_spec_path<P>(storage_root: P) -> PathBuf
where
    P: AsRef<Path>,
{
    storage_root.as_ref().join(OCFL_EXTENSIONS_SPEC_FILE)
}

/// Joins two string path parts, inserting at `/` if needed
pub fn join(part1: &str, part2: &str) -> String {
    let mut joined = match part1.ends_with('/') {
        true => part1[..part1.len() - 1].to_string(),
        false => part1.to_string(),
    };

    if !part2.is_empty() {
        if (!joined.is_empty() || part1 == "/") && !part2.starts_with('/') {
            joined.push('/');
        }
        joined.push_str(part2);
    }

    joined
}

/// Joins two string path parts, inserting at `/` if needed, and appends a `/` to the end,
/// if there is not already one
pub fn join_with_trailing_slash(part1: &str, part2: &str) -> String {
    let mut joined = join(part1, part2);

    if !joined.is_empty() && !joined.ends_with('/') {
        joined.push('/');
    }

    joined
}

/// A configurable pipeline of portability predicates applied to logical and content paths,
/// layered on top of the OCFL-spec floor that `InventoryPathInner` always enforces (no `.`,
/// `..`, or empty segments, no leading/trailing `/`).
pub mod constraints {
    use crate::ocfl::{Result, RocflError};

    const WINDOWS_RESERVED_NAMES: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
        "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];

    /// Built-in presets for [`PathConstraints`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ConstraintPreset {
        /// The OCFL-spec floor only. Always satisfied, since `InventoryPathInner` enforces it
        /// independent of any configured preset.
        Minimal,
        /// `Minimal` plus the constraints needed for portability to common Unix filesystems.
        Unix,
        /// `Minimal` plus the constraints needed for portability to Windows filesystems.
        Windows,
        /// `Minimal` plus constraints suited to common cloud object stores.
        Cloud,
        /// The union of `Unix`, `Windows`, and `Cloud` -- the most restrictive preset.
        All,
    }

    /// Whole-path, per-segment, and per-character predicates a logical or content path must
    /// satisfy. Per-character predicates are implemented as a 256-entry bitset; code points
    /// above the ASCII range are handled by the `ascii_only` whole-character fallback.
    #[derive(Debug, Clone)]
    pub struct PathConstraints {
        max_path_bytes: Option<usize>,
        max_segment_bytes: usize,
        max_segment_chars: usize,
        forbid_trailing_space_or_dot: bool,
        forbid_windows_reserved: bool,
        forbidden_chars: Option<[bool; 256]>,
        ascii_only: bool,
    }

    impl PathConstraints {
        /// Builds the named preset.
        pub fn preset(preset: ConstraintPreset) -> Self {
            match preset {
                ConstraintPreset::Minimal => Self::minimal(),
                ConstraintPreset::Unix => Self::unix(),
                ConstraintPreset::Windows => Self::windows(),
                ConstraintPreset::Cloud => Self::cloud(),
                ConstraintPreset::All => Self::all(),
            }
        }

        /// No constraints beyond the OCFL-spec floor.
        pub fn minimal() -> Self {
            Self {
                max_path_bytes: None,
                max_segment_bytes: usize::MAX,
                max_segment_chars: usize::MAX,
                forbid_trailing_space_or_dot: false,
                forbid_windows_reserved: false,
                forbidden_chars: None,
                ascii_only: false,
            }
        }

        pub fn unix() -> Self {
            let mut forbidden = [false; 256];
            forbidden[0] = true;
            Self {
                max_path_bytes: Some(4096),
                max_segment_bytes: 255,
                ..Self::minimal()
            }
            .with_forbidden(forbidden)
        }

        pub fn windows() -> Self {
            let mut forbidden = [false; 256];
            for c in ['<', '>', ':', '"', '|', '?', '*'] {
                forbidden[c as usize] = true;
            }
            for c in 0u8..0x20 {
                forbidden[c as usize] = true;
            }
            Self {
                max_path_bytes: Some(260),
                max_segment_bytes: 255,
                max_segment_chars: 255,
                forbid_trailing_space_or_dot: true,
                forbid_windows_reserved: true,
                ..Self::minimal()
            }
            .with_forbidden(forbidden)
        }

        pub fn cloud() -> Self {
            let mut forbidden = [false; 256];
            for c in 0u8..0x20 {
                forbidden[c as usize] = true;
            }
            forbidden[0x7f] = true;
            Self {
                max_path_bytes: Some(1024),
                max_segment_bytes: 255,
                ascii_only: true,
                ..Self::minimal()
            }
            .with_forbidden(forbidden)
        }

        /// The union of `unix`, `windows`, and `cloud`.
        pub fn all() -> Self {
            let (unix, windows, cloud) = (Self::unix(), Self::windows(), Self::cloud());

            let mut forbidden = [false; 256];
            for i in 0..256 {
                forbidden[i] = unix.forbidden_chars.unwrap()[i]
                    || windows.forbidden_chars.unwrap()[i]
                    || cloud.forbidden_chars.unwrap()[i];
            }

            Self {
                max_path_bytes: [unix.max_path_bytes, windows.max_path_bytes, cloud.max_path_bytes]
                    .into_iter()
                    .flatten()
                    .min(),
                max_segment_bytes: unix
                    .max_segment_bytes
                    .min(windows.max_segment_bytes)
                    .min(cloud.max_segment_bytes),
                max_segment_chars: unix
                    .max_segment_chars
                    .min(windows.max_segment_chars)
                    .min(cloud.max_segment_chars),
                forbid_trailing_space_or_dot: true,
                forbid_windows_reserved: true,
                forbidden_chars: Some(forbidden),
                ascii_only: true,
            }
        }

        fn with_forbidden(mut self, forbidden: [bool; 256]) -> Self {
            self.forbidden_chars = Some(forbidden);
            self
        }

        /// Validates `path` against this pipeline's whole-path, per-segment, and
        /// per-character rules. Callers are expected to have already applied the OCFL-spec
        /// floor (see `InventoryPathInner::try_from`) before reaching this check.
        pub fn check(&self, path: &str) -> Result<()> {
            if let Some(max) = self.max_path_bytes {
                if path.len() > max {
                    return Err(RocflError::PathConstraintViolation {
                        path: path.to_string(),
                        rule: "max-path-length".to_string(),
                        message: format!("path exceeds the maximum of {} bytes", max),
                    });
                }
            }

            for segment in path.split('/').filter(|s| !s.is_empty()) {
                self.check_segment(path, segment)?;
            }

            Ok(())
        }

        fn check_segment(&self, path: &str, segment: &str) -> Result<()> {
            if segment.len() > self.max_segment_bytes {
                return Err(RocflError::PathConstraintViolation {
                    path: path.to_string(),
                    rule: "max-segment-length".to_string(),
                    message: format!(
                        "segment '{}' exceeds the maximum of {} bytes",
                        segment, self.max_segment_bytes
                    ),
                });
            }

            if segment.chars().count() > self.max_segment_chars {
                return Err(RocflError::PathConstraintViolation {
                    path: path.to_string(),
                    rule: "max-segment-chars".to_string(),
                    message: format!(
                        "segment '{}' exceeds the maximum of {} characters",
                        segment, self.max_segment_chars
                    ),
                });
            }

            if self.forbid_trailing_space_or_dot
                && (segment.ends_with(' ') || segment.ends_with('.'))
            {
                return Err(RocflError::PathConstraintViolation {
                    path: path.to_string(),
                    rule: "trailing-space-or-dot".to_string(),
                    message: format!("segment '{}' ends with a space or a dot", segment),
                });
            }

            if self.forbid_windows_reserved {
                let base = segment.split('.').next().unwrap_or(segment);
                if WINDOWS_RESERVED_NAMES
                    .iter()
                    .any(|name| name.eq_ignore_ascii_case(base))
                {
                    return Err(RocflError::PathConstraintViolation {
                        path: path.to_string(),
                        rule: "windows-reserved-name".to_string(),
                        message: format!("segment '{}' is a reserved Windows device name", segment),
                    });
                }
            }

            if self.ascii_only && !segment.is_ascii() {
                return Err(RocflError::PathConstraintViolation {
                    path: path.to_string(),
                    rule: "ascii-only".to_string(),
                    message: format!("segment '{}' contains non-ASCII characters", segment),
                });
            }

            if let Some(forbidden) = &self.forbidden_chars {
                for byte in segment.bytes() {
                    if byte < 128 && forbidden[byte as usize] {
                        return Err(RocflError::PathConstraintViolation {
                            path: path.to_string(),
                            rule: "forbidden-character".to_string(),
                            message: format!(
                                "segment '{}' contains the forbidden character {:?}",
                                segment, byte as char
                            ),
                        });
                    }
                }
            }

            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn minimal_accepts_anything_not_already_rejected() {
            let c = PathConstraints::preset(ConstraintPreset::Minimal);
            assert!(c.check("a/b/c.txt").is_ok());
            assert!(c.check("réservé/日本語.txt").is_ok());
        }

        #[test]
        fn windows_rejects_reserved_device_names() {
            let c = PathConstraints::preset(ConstraintPreset::Windows);
            assert!(c.check("docs/CON.txt").is_err());
            assert!(c.check("docs/con").is_err());
            assert!(c.check("docs/report.txt").is_ok());
        }

        #[test]
        fn windows_rejects_trailing_space_or_dot() {
            let c = PathConstraints::preset(ConstraintPreset::Windows);
            assert!(c.check("docs/report.").is_err());
            assert!(c.check("docs/report ").is_err());
        }

        #[test]
        fn windows_rejects_illegal_characters() {
            let c = PathConstraints::preset(ConstraintPreset::Windows);
            assert!(c.check("docs/a:b.txt").is_err());
            assert!(c.check("docs/a<b>.txt").is_err());
        }

        #[test]
        fn cloud_rejects_non_ascii() {
            let c = PathConstraints::preset(ConstraintPreset::Cloud);
            assert!(c.check("docs/日本語.txt").is_err());
            assert!(c.check("docs/report.txt").is_ok());
        }

        #[test]
        fn all_is_the_union_of_every_preset() {
            let c = PathConstraints::preset(ConstraintPreset::All);
            assert!(c.check("docs/CON.txt").is_err());
            assert!(c.check("docs/日本語.txt").is_err());
            assert!(c.check("docs/a:b.txt").is_err());
            assert!(c.check("docs/perfectly-fine-path.txt").is_ok());
        }

        #[test]
        fn max_path_length_is_enforced() {
            let c = PathConstraints::preset(ConstraintPreset::Windows);
            let long = "a".repeat(300);
            assert!(c.check(&long).is_err());
        }
    }
}
