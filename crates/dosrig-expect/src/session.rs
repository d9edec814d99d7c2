use std::path::Path;
use std::time::Duration;

use regex::bytes::Regex;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::buffer::{find_subslice, Hit, OutputBuf, RawWait};
use crate::error::{ExpectError, Result};
use crate::pty::PtyPair;

/// A successful expect: everything between the previous cursor and the match
/// start, plus the matched bytes themselves.
#[derive(Debug)]
pub struct ExpectMatch {
    pub before: Vec<u8>,
    pub matched: Vec<u8>,
}

/// Outcome of one bounded expect call.
#[derive(Debug)]
pub enum Wait {
    Match(ExpectMatch),
    Timeout,
    Eof,
}

/// One child process on a pty, with expect-style waits over its output.
///
/// The expect cursor advances only on matches; a timed-out wait consumes
/// nothing, so the same bytes are still in play for the next call. Every byte
/// the child writes is mirrored to the transcript file before the session can
/// observe it.
pub struct Expector {
    child: Child,
    pty: PtyPair,
    buf: OutputBuf,
    reader: Option<JoinHandle<()>>,
    cursor: usize,
}

impl Expector {
    /// Spawns `cmd` with its stdio bound to a fresh pty and starts the
    /// transcript reader. The child is made a session leader with the pty as
    /// its controlling terminal, like an interactive login would.
    pub async fn spawn(mut cmd: Command, transcript: &Path) -> Result<Self> {
        let program = cmd.as_std().get_program().to_string_lossy().into_owned();

        let mut pty = PtyPair::open().map_err(ExpectError::Pty)?;
        let (stdin, stdout, stderr) = pty.slave_stdio().map_err(ExpectError::Pty)?;
        cmd.stdin(stdin).stdout(stdout).stderr(stderr);
        unsafe {
            cmd.pre_exec(|| {
                if libc::setsid() < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                // Stdio is already dup'ed onto 0..=2; adopt the pty slave on
                // fd 0 as the controlling terminal.
                #[cfg(target_os = "linux")]
                let rc = libc::ioctl(0, libc::TIOCSCTTY, 0);
                #[cfg(target_os = "macos")]
                let rc = libc::ioctl(0, libc::TIOCSCTTY as libc::c_ulong, 0);
                if rc < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let child = cmd
            .spawn()
            .map_err(|source| ExpectError::Spawn { program, source })?;
        pty.release_slave();

        let mirror = std::fs::File::create(transcript).map_err(|source| ExpectError::Transcript {
            path: transcript.to_path_buf(),
            source,
        })?;
        let reader = tokio::fs::File::from_std(pty.reader_file().map_err(ExpectError::Pty)?);

        let buf = OutputBuf::default();
        let reader_task = {
            let buf = buf.clone();
            tokio::spawn(async move { buf.consume_reader(reader, mirror).await })
        };

        Ok(Self {
            child,
            pty,
            buf,
            reader: Some(reader_task),
            cursor: 0,
        })
    }

    /// Waits for `pattern` in the unconsumed output.
    pub async fn expect_regex(&mut self, pattern: &Regex, timeout: Duration) -> Wait {
        let raw = self
            .buf
            .wait_for(
                |tail| {
                    pattern.find(tail).map(|m| Hit {
                        start: m.start(),
                        end: m.end(),
                    })
                },
                self.cursor,
                timeout,
            )
            .await;
        self.finish_wait(raw, pattern.as_str())
    }

    /// Waits for the literal `needle` in the unconsumed output.
    pub async fn expect_literal(&mut self, needle: &[u8], timeout: Duration) -> Wait {
        let raw = self
            .buf
            .wait_for(|tail| find_subslice(tail, needle), self.cursor, timeout)
            .await;
        self.finish_wait(raw, &String::from_utf8_lossy(needle))
    }

    fn finish_wait(&mut self, raw: RawWait, what: &str) -> Wait {
        match raw {
            RawWait::Match {
                before,
                matched,
                end,
            } => {
                tracing::debug!(pattern = what, consumed = end - self.cursor, "expect matched");
                self.cursor = end;
                Wait::Match(ExpectMatch { before, matched })
            }
            RawWait::Timeout => {
                tracing::debug!(pattern = what, "expect timed out");
                Wait::Timeout
            }
            RawWait::Eof => {
                tracing::debug!(pattern = what, "stream closed before match");
                Wait::Eof
            }
        }
    }

    /// Writes `line` plus CR LF to the child in a single write.
    pub fn send_line(&self, line: &str) -> Result<()> {
        let mut bytes = Vec::with_capacity(line.len() + 2);
        bytes.extend_from_slice(line.as_bytes());
        bytes.extend_from_slice(b"\r\n");
        tracing::debug!(line, "sending command");
        self.pty.write_all(&bytes).map_err(ExpectError::Write)
    }

    /// Raw output capture, for diagnostics.
    pub fn output(&self) -> &OutputBuf {
        &self.buf
    }

    /// Forcibly terminates the child and joins the reader. Best effort:
    /// teardown failures are swallowed, never escalated.
    pub async fn close(mut self) {
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
        if let Some(reader) = self.reader.take() {
            let _ = reader.await;
        }
    }
}

impl Drop for Expector {
    fn drop(&mut self) {
        // Best-effort cleanup for panics/timeouts.
        let _ = self.child.start_kill();
    }
}
