use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Metadata sidecar written next to the retained log and transcript when a
/// test fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    pub test_id: String,
    pub verdict: String,
    pub recorded_at_epoch_secs: u64,
    pub log_file: PathBuf,
    pub transcript_file: PathBuf,
}

impl FailureReport {
    pub fn new(
        test_id: impl Into<String>,
        verdict: impl Into<String>,
        log_file: impl Into<PathBuf>,
        transcript_file: impl Into<PathBuf>,
    ) -> Self {
        let recorded_at_epoch_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            test_id: test_id.into(),
            verdict: verdict.into(),
            recorded_at_epoch_secs,
            log_file: log_file.into(),
            transcript_file: transcript_file.into(),
        }
    }

    pub fn write_sidecar(&self, path: &Path) -> io::Result<()> {
        let bytes = serde_json::to_vec_pretty(self).map_err(io::Error::from)?;
        std::fs::write(path, bytes)
    }
}

/// Dumps a retained sink wrapped in the harness's banner lines, for pasting
/// into a failure report. Unreadable sinks are noted rather than erroring;
/// this only ever runs on an already-failing path.
pub fn dump_sink<W: Write>(out: &mut W, title: &str, path: &Path) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{} {} {}", ">".repeat(28), title, "<".repeat(31))?;
    match std::fs::read(path) {
        Ok(bytes) => out.write_all(String::from_utf8_lossy(&bytes).as_bytes())?,
        Err(err) => writeln!(out, "({} unreadable: {})", path.display(), err)?,
    }
    writeln!(out)?;
    Ok(())
}
