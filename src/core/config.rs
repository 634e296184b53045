//! Scan configuration model: TOML-deserializable options with defaults.
//!
//! Only the in-memory model and its validation live here; locating and
//! reading a configuration file is the caller's concern.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::errors::{PdError, Result};

/// Default block size: 256 KiB.
pub const DEFAULT_BLOCK_SIZE: u32 = 256 * 1024;

/// Ordering applied to newly discovered files before parity-slot
/// allocation. The sort is stable, so ties keep the walker's order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// By reported physical offset, for sequential parity I/O.
    #[default]
    Physical,
    /// By inode number.
    Inode,
    /// By sub-path, lexicographically.
    Alpha,
    /// Keep the directory traversal order.
    Dir,
}

/// Behavior flags for a scan run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScanOptions {
    pub force_order: SortOrder,
    /// Accept files whose recorded size was non-zero but are now empty.
    pub force_zero: bool,
    /// Accept disks whose previously known content is entirely gone.
    pub force_empty: bool,
    /// Emit machine-readable lines on the log stream.
    pub gui: bool,
    pub verbose: bool,
    /// Command name quoted in recovery guidance messages.
    pub command: String,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            force_order: SortOrder::default(),
            force_zero: false,
            force_empty: false,
            gui: false,
            verbose: false,
            command: "sync".to_string(),
        }
    }
}

/// One protected data disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiskConfig {
    /// Logical name, unique across the array.
    pub name: String,
    /// Absolute root directory of the disk.
    pub dir: PathBuf,
}

/// Full scan configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ScanConfig {
    pub options: ScanOptions,
    pub block_size: u32,
    pub disks: Vec<DiskConfig>,
}

impl ScanConfig {
    /// Parse a configuration from TOML text and validate it.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        if config.block_size == 0 {
            config.block_size = DEFAULT_BLOCK_SIZE;
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(PdError::InvalidConfig {
                details: "block_size must be non-zero".to_string(),
            });
        }
        let mut seen = HashSet::new();
        for disk in &self.disks {
            if disk.name.is_empty() {
                return Err(PdError::InvalidConfig {
                    details: "disk name must not be empty".to_string(),
                });
            }
            if disk.dir.as_os_str().is_empty() {
                return Err(PdError::InvalidConfig {
                    details: format!("disk '{}' has an empty root directory", disk.name),
                });
            }
            if !seen.insert(disk.name.as_str()) {
                return Err(PdError::InvalidConfig {
                    details: format!("duplicate disk name '{}'", disk.name),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let opts = ScanOptions::default();
        assert_eq!(opts.force_order, SortOrder::Physical);
        assert!(!opts.force_zero);
        assert!(!opts.force_empty);
        assert_eq!(opts.command, "sync");
    }

    #[test]
    fn parses_minimal_toml() {
        let config = ScanConfig::from_toml_str("").unwrap();
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
        assert!(config.disks.is_empty());
    }

    #[test]
    fn parses_full_toml() {
        let raw = r#"
            block_size = 131072

            [options]
            force_order = "inode"
            force_zero = true
            verbose = true
            command = "diff"

            [[disks]]
            name = "d1"
            dir = "/mnt/disk1"

            [[disks]]
            name = "d2"
            dir = "/mnt/disk2"
        "#;
        let config = ScanConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.block_size, 131_072);
        assert_eq!(config.options.force_order, SortOrder::Inode);
        assert!(config.options.force_zero);
        assert_eq!(config.options.command, "diff");
        assert_eq!(config.disks.len(), 2);
        assert_eq!(config.disks[1].name, "d2");
    }

    #[test]
    fn rejects_duplicate_disk_names() {
        let raw = r#"
            [[disks]]
            name = "d1"
            dir = "/mnt/a"

            [[disks]]
            name = "d1"
            dir = "/mnt/b"
        "#;
        let err = ScanConfig::from_toml_str(raw).unwrap_err();
        assert_eq!(err.code(), "PD-1001");
        assert!(err.to_string().contains("duplicate disk name"));
    }

    #[test]
    fn rejects_empty_disk_dir() {
        let raw = r#"
            [[disks]]
            name = "d1"
            dir = ""
        "#;
        let err = ScanConfig::from_toml_str(raw).unwrap_err();
        assert_eq!(err.code(), "PD-1001");
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = ScanConfig::from_toml_str("= nope").unwrap_err();
        assert_eq!(err.code(), "PD-1002");
    }

    #[test]
    fn sort_order_roundtrips_through_serde() {
        for (text, order) in [
            ("physical", SortOrder::Physical),
            ("inode", SortOrder::Inode),
            ("alpha", SortOrder::Alpha),
            ("dir", SortOrder::Dir),
        ] {
            let raw = format!("[options]\nforce_order = \"{text}\"");
            let config = ScanConfig::from_toml_str(&raw).unwrap();
            assert_eq!(config.options.force_order, order);
        }
    }
}
