//! Boot-media preparation for the DOS harness.
//!
//! Tests need three kinds of on-disk fixtures before an emulator session can
//! be spawned, and this crate produces all of them:
//!
//! - [`extract_members`]: pulls named members out of a prebuilt tar archive,
//!   verifying each against an expected SHA-1 before it is trusted
//! - [`FatClass`]: the fixed FAT-class → (tracks, heads) geometry table
//! - [`ImageBuilder`]: drives an external fixed-geometry formatter to turn a
//!   file set (plus an optional boot block) into a `fat{12,16,16B}.img`
//!
//! Everything here reports typed errors upward; whether a failure skips or
//! fails a test is the caller's decision. Most variants describe an
//! incomplete local fixture set rather than a harness defect, see
//! [`MediaError::is_environmental`].

mod archive;
mod error;
mod geometry;
mod image;

pub use archive::{extract_members, ArchiveMember};
pub use error::{MediaError, Result};
pub use geometry::{FatClass, Geometry, SECTOR_SIZE, SECTORS_PER_TRACK};
pub use image::{BootBlock, ImageBuilder, BOOT_BLOCK_NAME};
