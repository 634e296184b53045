//! PD-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, PdError>;

/// Top-level error type for the paritydrift scan core.
///
/// Every variant is fatal for the scan: the driver aborts before any
/// mutated inventory could be persisted by the caller.
#[derive(Debug, Error)]
pub enum PdError {
    #[error("[PD-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[PD-1002] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[PD-2001] filesystem info failure for '{path}': {details}")]
    FsInfo { path: PathBuf, details: String },

    #[error(
        "[PD-2002] error reading directory '{path}': {source}\n\
         You can exclude it with an exclude rule for '/{sub}'"
    )]
    DirRead {
        path: PathBuf,
        sub: String,
        #[source]
        source: std::io::Error,
    },

    #[error("[PD-2003] error in stat of '{path}': {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[PD-2004] error in readlink of '{path}': {details}")]
    ReadLink { path: PathBuf, details: String },

    #[error("[PD-2005] unsupported non-UTF-8 name in directory '{path}'")]
    InvalidName { path: PathBuf },

    #[error(
        "[PD-3001] the file '{path}' has unexpected zero size!\n\
         If this is an expected state you can '{command}' anyway using --force-zero.\n\
         Instead, it's possible that after a kernel crash this file was lost,\n\
         and you should restore it before protecting it again."
    )]
    ZeroSize { path: PathBuf, command: String },

    #[error(
        "[PD-3002] all the files previously present in disk(s) {disks} are now \
         missing or rewritten!\n\
         This could happen when deleting all the files from a disk, or when a \
         disk is not mounted.\n\
         If this is really what you are doing, you can '{command}' anyway using \
         --force-empty."
    )]
    MassRemoval { disks: String, command: String },

    #[error("[PD-3901] internal inconsistency: {details}")]
    Internal { details: String },
}

impl PdError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "PD-1001",
            Self::ConfigParse { .. } => "PD-1002",
            Self::FsInfo { .. } => "PD-2001",
            Self::DirRead { .. } => "PD-2002",
            Self::Stat { .. } => "PD-2003",
            Self::ReadLink { .. } => "PD-2004",
            Self::InvalidName { .. } => "PD-2005",
            Self::ZeroSize { .. } => "PD-3001",
            Self::MassRemoval { .. } => "PD-3002",
            Self::Internal { .. } => "PD-3901",
        }
    }

    /// Convenience constructor for stat errors with a known path.
    #[must_use]
    pub fn stat(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Stat {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for internal invariant violations.
    #[must_use]
    pub fn internal(details: impl Into<String>) -> Self {
        Self::Internal {
            details: details.into(),
        }
    }
}

impl From<toml::de::Error> for PdError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
