//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use paritydrift::prelude::*;
//! ```

// Core
pub use crate::core::config::{ScanConfig, ScanOptions, SortOrder};
pub use crate::core::errors::{PdError, Result};

// Platform
pub use crate::platform::pal::{FileStat, FsInfo, Platform, UnixPlatform};

// Inventory
pub use crate::inventory::disk::Disk;
pub use crate::inventory::entry::{Block, BlockState, File, Link, LinkKind};

// Scanner
pub use crate::scanner::driver::{run_scan, ScanReport, ScanState};
pub use crate::scanner::filter::{FilterSet, NoFilters, RuleFilter};

// Logger
pub use crate::logger::scanlog::ScanLog;
