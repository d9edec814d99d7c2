//! Functional-test harness for a DOS-compatible machine emulator.
//!
//! Per test, the harness wipes and rebuilds a working tree, stages boot files
//! out of hash-verified tarballs, synthesizes disk images and tiny 16-bit DOS
//! programs on demand, boots the emulator on a pty, drives it through a fixed
//! command/response protocol with bounded waits, and classifies the outcome
//! from the captured transcript and side-effect files.
//!
//! Behavior is tuned through environment variables, all optional:
//!
//! - `DOSRIG_EMULATOR` (default `dosemu`): emulator binary, a PATH name or an
//!   explicit path.
//! - `DOSRIG_ASSETS_DIR` (default `test-binaries`): directory of prebuilt
//!   boot-file tarballs.
//! - `DOSRIG_LIBDIR` (default `test-libdir`): emulator support-file
//!   directory, created on demand.
//! - `DOSRIG_IMAGEDIR` (default `test-imagedir`): root of the per-test
//!   working tree.
//! - `DOSRIG_TOOLKIT_DIR` (default `commands`): bundled DOS command toolkit
//!   copied into each working tree.
//! - `DOSRIG_FORMATTER` (default `mkfatimage16`): FAT image formatter.
//! - `DOSRIG_KEEP_ARTIFACTS`: when set non-empty, retain per-test logs and
//!   transcripts even on success.

pub mod artifact;
pub mod asm;
pub mod conf;
pub mod env;
pub mod error;
pub mod fixture;
pub mod report;
pub mod session;
pub mod variant;

pub use conf::ConfigOverlay;
pub use env::HarnessEnv;
pub use error::{HarnessError, Result};
pub use fixture::{skippable, Fixture, RunSpec};
pub use session::{ProtocolTimeouts, SessionState, Verdict};
pub use variant::{BootArchive, OverrideAction, VariantSpec};

pub use dosrig_media::FatClass;
