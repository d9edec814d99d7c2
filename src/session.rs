//! The DOS command protocol over a pty session.
//!
//! One session runs one command: wait for the startup banner, wait briefly
//! for the prompt, send the command line, wait for the `rem end` sentinel the
//! scripts all finish with, then report what happened. Timeouts and stream
//! closure are ordinary verdicts here, not errors.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dosrig_expect::{ExpectError, Expector, Wait};
use regex::bytes::Regex;
use tokio::process::Command;

use crate::error::Result;

/// Startup banner printed while the autoexec-equivalent runs its final
/// `system -e` line. Case-insensitive; trailing line breaks are absorbed so
/// the cursor lands after them.
pub const BANNER_PATTERN: &str = r"(?i)(system|unix) -e[\r\n]*";

/// Command prompt. Often already consumed by the banner match, hence the
/// tolerated timeout in [`run_protocol`].
pub const PROMPT_PATTERN: &str = r">[\r\n]*";

/// End-of-script sentinel every driven batch file finishes with.
pub const TERMINATOR: &[u8] = b"rem end";

/// Default `-I` option string: no video output.
pub const DEFAULT_OPTS: &str = "video{none}";

/// Per-state time budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolTimeouts {
    pub banner: Duration,
    pub prompt: Duration,
    pub completion: Duration,
}

impl Default for ProtocolTimeouts {
    fn default() -> Self {
        Self {
            banner: Duration::from_secs(10),
            prompt: Duration::from_secs(1),
            completion: Duration::from_secs(5),
        }
    }
}

impl ProtocolTimeouts {
    pub fn with_completion(mut self, completion: Duration) -> Self {
        self.completion = completion;
        self
    }
}

/// Protocol progress. `TimedOut` and `Eof` are absorbing: once entered, the
/// session only gets torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Spawned,
    AwaitBanner,
    AwaitPrompt,
    CommandSent,
    AwaitTerminator,
    Done,
    TimedOut,
    Eof,
}

/// What one session produced, exactly once per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Captured text: the transcript between the sent command and the
    /// terminator, or the requested output file's contents.
    Success(String),
    Timeout,
    EndOfStream,
}

impl Verdict {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Verdict::Success(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Success(_))
    }
}

/// Renders the way assertions compare: the captured text itself, or the
/// literal failure markers `Timeout` / `EndOfFile` which no DOS transcript
/// produces on its own.
impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Success(text) => f.write_str(text),
            Verdict::Timeout => f.write_str("Timeout"),
            Verdict::EndOfStream => f.write_str("EndOfFile"),
        }
    }
}

/// Fixed launch contract for the emulator child process.
#[derive(Debug, Clone)]
pub struct EmulatorSpawn {
    pub program: PathBuf,
    pub imagedir: PathBuf,
    pub libdir: PathBuf,
    pub logfile: PathBuf,
    pub opts: String,
}

impl EmulatorSpawn {
    /// `-n -f {imagedir}/dosemu.conf --Fimagedir {imagedir} --Flibdir
    /// {libdir} -o {logfile} -I {opts}`.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-n")
            .arg("-f")
            .arg(self.imagedir.join("dosemu.conf"))
            .arg("--Fimagedir")
            .arg(&self.imagedir)
            .arg("--Flibdir")
            .arg(&self.libdir)
            .arg("-o")
            .arg(&self.logfile)
            .arg("-I")
            .arg(&self.opts);
        cmd
    }
}

struct Automaton {
    state: SessionState,
}

impl Automaton {
    fn advance(&mut self, to: SessionState) {
        tracing::debug!(from = ?self.state, to = ?to, "session state");
        self.state = to;
    }
}

/// Spawns `cmd` on a pty and drives the full protocol for `command_line`.
///
/// With `outfile` set, a successful session's verdict carries that file's
/// contents (read after the terminator matched) instead of the transcript
/// capture. The child is forcibly terminated before this returns, whatever
/// the verdict.
pub async fn run_protocol(
    cmd: Command,
    transcript: &Path,
    command_line: &str,
    timeouts: ProtocolTimeouts,
    outfile: Option<&Path>,
) -> Result<Verdict> {
    let banner = Regex::new(BANNER_PATTERN).map_err(ExpectError::from)?;
    let prompt = Regex::new(PROMPT_PATTERN).map_err(ExpectError::from)?;

    let mut automaton = Automaton {
        state: SessionState::Spawned,
    };
    let mut session = Expector::spawn(cmd, transcript).await?;
    let verdict = drive(
        &mut automaton,
        &mut session,
        &banner,
        &prompt,
        command_line,
        timeouts,
        outfile,
    )
    .await;
    session.close().await;
    verdict
}

async fn drive(
    automaton: &mut Automaton,
    session: &mut Expector,
    banner: &Regex,
    prompt: &Regex,
    command_line: &str,
    timeouts: ProtocolTimeouts,
    outfile: Option<&Path>,
) -> Result<Verdict> {
    automaton.advance(SessionState::AwaitBanner);
    match session.expect_regex(banner, timeouts.banner).await {
        Wait::Match(_) => {}
        Wait::Timeout => {
            automaton.advance(SessionState::TimedOut);
            return Ok(Verdict::Timeout);
        }
        Wait::Eof => {
            automaton.advance(SessionState::Eof);
            return Ok(Verdict::EndOfStream);
        }
    }

    automaton.advance(SessionState::AwaitPrompt);
    match session.expect_regex(prompt, timeouts.prompt).await {
        // The banner match may already have consumed the prompt; a quiet
        // second here is not a failure.
        Wait::Match(_) | Wait::Timeout => {}
        Wait::Eof => {
            automaton.advance(SessionState::Eof);
            return Ok(Verdict::EndOfStream);
        }
    }

    automaton.advance(SessionState::CommandSent);
    session.send_line(command_line)?;

    automaton.advance(SessionState::AwaitTerminator);
    match session.expect_literal(TERMINATOR, timeouts.completion).await {
        Wait::Match(m) => {
            automaton.advance(SessionState::Done);
            let text = match outfile {
                None => String::from_utf8_lossy(&m.before).into_owned(),
                Some(path) => {
                    let bytes = tokio::fs::read(path).await?;
                    String::from_utf8_lossy(&bytes).into_owned()
                }
            };
            Ok(Verdict::Success(text))
        }
        Wait::Timeout => {
            automaton.advance(SessionState::TimedOut);
            Ok(Verdict::Timeout)
        }
        Wait::Eof => {
            automaton.advance(SessionState::Eof);
            Ok(Verdict::EndOfStream)
        }
    }
}
