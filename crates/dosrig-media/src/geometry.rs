use std::fmt;

/// Sectors per track for every geometry the formatter supports.
pub const SECTORS_PER_TRACK: u32 = 17;

/// Bytes per sector.
pub const SECTOR_SIZE: u32 = 512;

/// FAT class requested by a test.
///
/// Each class implies a fixed legacy geometry; there is no free parameter.
/// `Fat16Big` is the large-disk variant of FAT16 ("16B" in image names).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FatClass {
    Fat12,
    Fat16,
    Fat16Big,
}

/// Track/head counts implied by a [`FatClass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub tracks: u32,
    pub heads: u32,
}

impl Geometry {
    /// Total byte size of a full image with this geometry.
    pub fn image_bytes(self) -> u64 {
        u64::from(self.tracks) * u64::from(self.heads)
            * u64::from(SECTORS_PER_TRACK)
            * u64::from(SECTOR_SIZE)
    }
}

impl FatClass {
    pub const ALL: [FatClass; 3] = [FatClass::Fat12, FatClass::Fat16, FatClass::Fat16Big];

    /// Class label as used in image file names.
    pub fn label(self) -> &'static str {
        match self {
            FatClass::Fat12 => "12",
            FatClass::Fat16 => "16",
            FatClass::Fat16Big => "16B",
        }
    }

    pub fn geometry(self) -> Geometry {
        match self {
            FatClass::Fat12 => Geometry {
                tracks: 306,
                heads: 4,
            },
            FatClass::Fat16 => Geometry {
                tracks: 615,
                heads: 4,
            },
            FatClass::Fat16Big => Geometry {
                tracks: 900,
                heads: 15,
            },
        }
    }

    /// Output image file name, e.g. `fat12.img`.
    pub fn image_name(self) -> String {
        format!("fat{}.img", self.label())
    }

    /// Human-readable name pattern for this class's boot blocks, used in
    /// error messages. Boot-block files are named for a track count in the
    /// class's range, not for the exact formatted track count, so the tracks
    /// position is a wildcard.
    pub fn boot_block_pattern(self) -> String {
        let Geometry { heads, .. } = self.geometry();
        format!("boot-{}-{}-17.blk", self.track_pattern(), heads)
    }

    /// Does `name` denote a boot block usable for this class?
    ///
    /// Accepts `boot-TTT-H-17.blk` where `TTT` is a three-digit track count
    /// in the class's range and `H` is the class's head count.
    pub fn matches_boot_block(self, name: &str) -> bool {
        let Geometry { heads, .. } = self.geometry();
        let suffix = format!("-{heads}-17.blk");
        let tracks = match name
            .strip_prefix("boot-")
            .and_then(|rest| rest.strip_suffix(&suffix))
        {
            Some(t) => t,
            None => return false,
        };
        if tracks.len() != 3 || !tracks.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        match self {
            FatClass::Fat12 => tracks.starts_with('3'),
            FatClass::Fat16 => tracks.starts_with('6'),
            FatClass::Fat16Big => tracks.starts_with('8') || tracks.starts_with('9'),
        }
    }

    fn track_pattern(self) -> &'static str {
        match self {
            FatClass::Fat12 => "3..",
            FatClass::Fat16 => "6..",
            FatClass::Fat16Big => "[89]..",
        }
    }
}

impl fmt::Display for FatClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
