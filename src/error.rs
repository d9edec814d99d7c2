use std::path::PathBuf;
use std::process::ExitStatus;

use dosrig_expect::ExpectError;
use dosrig_media::MediaError;

/// Errors surfaced by fixture orchestration and the builders it drives.
///
/// `is_environmental` splits the variants into two classes: conditions a test
/// converts into a skip (missing local fixtures or tools) and defects that
/// must fail the run.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("required tool {name} is not on PATH")]
    ToolMissing { name: String },

    #[error("command toolkit {path} is unavailable: {reason}")]
    ToolkitUnavailable { path: PathBuf, reason: String },

    #[error("variant carries no staged asset named {name}")]
    AssetMissing { name: String },

    #[error("{stage} exited with {status}")]
    Build {
        stage: &'static str,
        status: ExitStatus,
    },

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Expect(#[from] ExpectError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// True for missing-fixture conditions that skip a test instead of
    /// failing it. Build failures and I/O errors are authoring defects and
    /// always fatal.
    pub fn is_environmental(&self) -> bool {
        match self {
            Self::ToolMissing { .. }
            | Self::ToolkitUnavailable { .. }
            | Self::AssetMissing { .. } => true,
            Self::Media(err) => err.is_environmental(),
            Self::Build { .. } | Self::Expect(_) | Self::Io(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
