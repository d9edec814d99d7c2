use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::error::{HarnessError, Result};

/// Paths and switches the harness reads from the process environment, frozen
/// into one value at startup and threaded through setup explicitly.
#[derive(Debug, Clone)]
pub struct HarnessEnv {
    /// Emulator binary, a bare name resolved on PATH or an explicit path.
    pub emulator: PathBuf,
    /// Directory holding the prebuilt boot-file tarballs.
    pub assets_dir: PathBuf,
    /// Emulator support-file directory, created on demand.
    pub libdir: PathBuf,
    /// Root of the per-test working tree; wiped and recreated each test.
    pub imagedir: PathBuf,
    /// Bundled DOS command toolkit, copied into each fresh working tree.
    pub toolkit_dir: PathBuf,
    /// FAT image formatter, a bare name or an explicit path.
    pub formatter: PathBuf,
    /// Retain per-test logs and transcripts even when the test passes.
    pub keep_artifacts: bool,
}

impl HarnessEnv {
    /// Reads the `DOSRIG_*` variables, falling back to the defaults listed in
    /// the crate docs for any that are unset.
    pub fn from_env() -> Self {
        Self {
            emulator: path_var("DOSRIG_EMULATOR", "dosemu"),
            assets_dir: path_var("DOSRIG_ASSETS_DIR", "test-binaries"),
            libdir: path_var("DOSRIG_LIBDIR", "test-libdir"),
            imagedir: path_var("DOSRIG_IMAGEDIR", "test-imagedir"),
            toolkit_dir: path_var("DOSRIG_TOOLKIT_DIR", "commands"),
            formatter: path_var("DOSRIG_FORMATTER", "mkfatimage16"),
            keep_artifacts: env::var_os("DOSRIG_KEEP_ARTIFACTS").is_some_and(|v| !v.is_empty()),
        }
    }

    /// The guest C: drive directory inside the working tree.
    pub fn workdir(&self) -> PathBuf {
        self.imagedir.join("dXXXXs").join("c")
    }

    /// Sibling directory backing another pass-through drive letter
    /// (`drive_dir('d')` for D:).
    pub fn drive_dir(&self, letter: char) -> PathBuf {
        self.imagedir.join("dXXXXs").join(letter.to_string())
    }
}

fn path_var(name: &str, default: &str) -> PathBuf {
    env::var_os(name)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

/// Resolves a tool on PATH (or verifies an explicit path). Absence is an
/// environmental condition, reported for conversion to a skip.
pub fn require_tool(name: impl AsRef<OsStr>) -> Result<PathBuf> {
    let name = name.as_ref();
    which::which(name).map_err(|_| HarnessError::ToolMissing {
        name: Path::new(name).display().to_string(),
    })
}
