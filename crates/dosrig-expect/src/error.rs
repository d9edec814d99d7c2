use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExpectError>;

/// Failures while setting up or feeding a pty session.
///
/// Protocol-level outcomes (pattern not seen in time, stream closed) are not
/// errors; they are [`crate::Wait`] values.
#[derive(Debug, Error)]
pub enum ExpectError {
    #[error("pty setup failed: {0}")]
    Pty(#[source] io::Error),

    #[error("failed to spawn {program:?}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to create transcript {path}: {source}")]
    Transcript {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("pty write failed: {0}")]
    Write(#[source] io::Error),

    #[error("invalid expect pattern: {0}")]
    Pattern(#[from] regex::Error),
}
