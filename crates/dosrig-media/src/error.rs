use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MediaError>;

/// Unified error type for boot-media preparation.
///
/// The harness distinguishes "this machine lacks a fixture" (skip the test)
/// from "the harness or its configuration is broken" (fail loudly). This enum
/// does not make that call itself; it carries enough structure for the fixture
/// layer to make it via [`MediaError::is_environmental`].
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("archive not found or unreadable ({path}): {reason}")]
    ArchiveUnavailable { path: PathBuf, reason: String },

    #[error("member {name:?} not found in archive {archive}")]
    MemberMissing { archive: PathBuf, name: String },

    #[error("sha1 mismatch for {name:?}: expected {expected}, got {actual}")]
    HashMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("no boot block in catalog matches {pattern:?}")]
    BootSectorMissing { pattern: String },

    #[error("{count} boot blocks in catalog match {pattern:?}, want exactly one")]
    BootSectorAmbiguous { pattern: String, count: usize },

    #[error("image formatter {program} not found")]
    FormatterMissing { program: PathBuf },

    #[error("image formatter exited with {status}")]
    FormatterFailed { status: ExitStatus },

    /// I/O failure outside the structured cases above (working directory
    /// missing, rename failed, ...).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// True when the error means the local fixture set is incomplete (missing
    /// archive, missing member, stale checksum, no matching boot asset, no
    /// formatter installed) rather than that the harness misbehaved. Callers
    /// turn environmental errors into skips.
    pub fn is_environmental(&self) -> bool {
        !matches!(
            self,
            MediaError::FormatterFailed { .. } | MediaError::Io(_)
        )
    }
}
