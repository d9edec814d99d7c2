use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::sync::{Mutex, Notify};

/// Offsets of a pattern hit inside the capture, relative to the scan start.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Hit {
    pub start: usize,
    pub end: usize,
}

/// Outcome of a bounded wait, with absolute buffer offsets.
#[derive(Debug)]
pub(crate) enum RawWait {
    /// Pattern found; `before`/`matched` are copied out, `end` is the
    /// absolute offset one past the match (the caller's next cursor).
    Match {
        before: Vec<u8>,
        matched: Vec<u8>,
        end: usize,
    },
    Timeout,
    Eof,
}

#[derive(Default)]
struct State {
    bytes: Vec<u8>,
    closed: bool,
}

/// Append-only capture of a child's output, shared between the reader task
/// and the session.
///
/// At most one wait may be in flight at a time (the protocol is strictly
/// sequential), which lets the reader hand wakeups over with `notify_one`:
/// a notification arriving between a scan and the next suspension is stored
/// as a permit instead of being lost.
#[derive(Clone, Default)]
pub struct OutputBuf {
    state: Arc<Mutex<State>>,
    notify: Arc<Notify>,
}

impl OutputBuf {
    /// Drains `reader` into the capture, mirroring every chunk to `mirror`
    /// first. Returns when the stream ends; `EIO` from a pty master after
    /// the child exits counts as end of stream.
    pub async fn consume_reader<R: tokio::io::AsyncRead + Unpin>(
        &self,
        mut reader: R,
        mut mirror: std::fs::File,
    ) {
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    if let Err(err) = mirror.write_all(&chunk[..n]) {
                        tracing::warn!(%err, "transcript write failed");
                    }
                    {
                        let mut state = self.state.lock().await;
                        state.bytes.extend_from_slice(&chunk[..n]);
                    }
                    self.notify.notify_one();
                }
                Err(err) if err.raw_os_error() == Some(libc::EIO) => break,
                Err(err) => {
                    tracing::debug!(%err, "pty read ended");
                    break;
                }
            }
        }
        let _ = mirror.flush();
        self.state.lock().await.closed = true;
        self.notify.notify_one();
    }

    /// Blocks until `find` locates a pattern in the bytes at/after `from`,
    /// the timeout elapses, or the stream is closed with no match in the
    /// remaining bytes. The capture is never consumed; `from` is the
    /// caller's cursor.
    pub(crate) async fn wait_for<F>(&self, find: F, from: usize, timeout: Duration) -> RawWait
    where
        F: Fn(&[u8]) -> Option<Hit>,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let state = self.state.lock().await;
                let tail = state.bytes.get(from..).unwrap_or(&[]);
                if let Some(hit) = find(tail) {
                    return RawWait::Match {
                        before: tail[..hit.start].to_vec(),
                        matched: tail[hit.start..hit.end].to_vec(),
                        end: from + hit.end,
                    };
                }
                if state.closed {
                    return RawWait::Eof;
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return RawWait::Timeout;
            }

            let notified = self.notify.notified();
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }
    }

    /// Everything captured so far, lossily decoded for diagnostics.
    pub fn snapshot_lossy(&self) -> String {
        match self.state.try_lock() {
            Ok(state) => String::from_utf8_lossy(&state.bytes).into_owned(),
            Err(_) => "<capture busy>".to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) async fn push(&self, bytes: &[u8]) {
        self.state.lock().await.bytes.extend_from_slice(bytes);
        self.notify.notify_one();
    }

    #[cfg(test)]
    pub(crate) async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_one();
    }
}

/// First occurrence of `needle` in `haystack`.
pub(crate) fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<Hit> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|win| win == needle)
        .map(|start| Hit {
            start,
            end: start + needle.len(),
        })
}
