//! Pty-attached process driving with expect-style waits.
//!
//! A DOS emulator under test only behaves like the interactive product when
//! its console is a real terminal, so this crate spawns children on a
//! pseudo-terminal rather than pipes. On top of that it provides the one
//! suspension primitive the protocol layer needs: block until a byte pattern
//! appears in the child's output, a deadline passes, or the stream closes,
//! whichever comes first.
//!
//! - [`PtyPair`]: pty allocation, echo suppression, fd handoff to the child
//! - [`OutputBuf`]: shared append-only capture of everything the child wrote
//! - [`Expector`]: spawn/send/expect/teardown around one child process
//!
//! Timeouts and stream closure are ordinary [`Wait`] values, not errors; the
//! caller's state machine decides what they mean. Unix only.

mod buffer;
mod error;
mod pty;
mod session;

pub use buffer::OutputBuf;
pub use error::{ExpectError, Result};
pub use pty::PtyPair;
pub use session::{ExpectMatch, Expector, Wait};
