use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::archive::{extract_members, ArchiveMember};
use crate::error::{MediaError, Result};
use crate::geometry::FatClass;

/// File name the selected boot block is staged under inside the source
/// directory; the formatter is always pointed at this name.
pub const BOOT_BLOCK_NAME: &str = "boot.blk";

/// Where to find a boot block: the variant's catalog of candidate members
/// plus the archive they live in.
#[derive(Debug, Clone, Copy)]
pub struct BootBlock<'a> {
    pub archive: &'a Path,
    pub catalog: &'a [ArchiveMember],
}

/// Builds fixed-geometry FAT images by driving an external formatter
/// (`mkfatimage16`-compatible argument contract).
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    formatter: PathBuf,
}

impl ImageBuilder {
    pub fn new(formatter: impl Into<PathBuf>) -> Self {
        Self {
            formatter: formatter.into(),
        }
    }

    /// Produces `fat{class}.img` two levels above `source_dir` from the named
    /// `files` (paths relative to `source_dir`).
    ///
    /// With a [`BootBlock`], exactly one catalog entry must match the class's
    /// geometry; it is extracted into `source_dir`, renamed to
    /// [`BOOT_BLOCK_NAME`], and passed to the formatter via `-b`. The
    /// formatter runs with `source_dir` as its working directory so the
    /// relative member names resolve.
    pub fn build(
        &self,
        class: FatClass,
        files: &[String],
        boot_block: Option<BootBlock<'_>>,
        source_dir: &Path,
    ) -> Result<PathBuf> {
        let geometry = class.geometry();

        let mut args: Vec<String> = vec![
            "-t".into(),
            geometry.tracks.to_string(),
            "-h".into(),
            geometry.heads.to_string(),
            "-f".into(),
            format!("../../{}", class.image_name()),
            "-p".into(),
        ];
        if let Some(source) = boot_block {
            self.stage_boot_block(class, source, source_dir)?;
            args.push("-b".into());
            args.push(BOOT_BLOCK_NAME.into());
        }
        args.extend(files.iter().cloned());

        tracing::debug!(
            formatter = %self.formatter.display(),
            cwd = %source_dir.display(),
            ?args,
            "formatting image"
        );
        let status = Command::new(&self.formatter)
            .args(&args)
            .current_dir(source_dir)
            .status()
            .map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => MediaError::FormatterMissing {
                    program: self.formatter.clone(),
                },
                _ => MediaError::Io(err),
            })?;
        if !status.success() {
            return Err(MediaError::FormatterFailed { status });
        }

        let image_dir = source_dir
            .parent()
            .and_then(Path::parent)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("source dir {} has no grandparent", source_dir.display()),
                )
            })?;
        Ok(image_dir.join(class.image_name()))
    }

    /// Selects the unique catalog entry for `class`, extracts it, and renames
    /// it to [`BOOT_BLOCK_NAME`] inside `source_dir`.
    fn stage_boot_block(
        &self,
        class: FatClass,
        source: BootBlock<'_>,
        source_dir: &Path,
    ) -> Result<()> {
        let matches: Vec<&ArchiveMember> = source
            .catalog
            .iter()
            .filter(|member| class.matches_boot_block(&member.name))
            .collect();
        let selected = match matches.as_slice() {
            [one] => (*one).clone(),
            [] => {
                return Err(MediaError::BootSectorMissing {
                    pattern: class.boot_block_pattern(),
                })
            }
            many => {
                return Err(MediaError::BootSectorAmbiguous {
                    pattern: class.boot_block_pattern(),
                    count: many.len(),
                })
            }
        };
        extract_members(source.archive, std::slice::from_ref(&selected), source_dir)?;
        fs::rename(
            source_dir.join(&selected.name),
            source_dir.join(BOOT_BLOCK_NAME),
        )?;
        tracing::debug!(block = %selected.name, class = %class, "staged boot block");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<ArchiveMember> {
        vec![
            ArchiveMember::new("boot-302-4-17.blk", "00"),
            ArchiveMember::new("boot-603-4-17.blk", "00"),
            ArchiveMember::new("boot-900-15-17.blk", "00"),
        ]
    }

    #[test]
    fn boot_block_selection_requires_exactly_one_match() {
        let tmp = tempfile::tempdir().unwrap();
        let builder = ImageBuilder::new("mkfatimage16");
        let full = catalog();
        let none: Vec<ArchiveMember> = Vec::new();
        let doubled: Vec<ArchiveMember> = full
            .iter()
            .cloned()
            .chain([ArchiveMember::new("boot-306-4-17.blk", "00")])
            .collect();

        let missing = builder
            .stage_boot_block(
                FatClass::Fat12,
                BootBlock {
                    archive: Path::new("unused.tar"),
                    catalog: &none,
                },
                tmp.path(),
            )
            .unwrap_err();
        assert!(matches!(missing, MediaError::BootSectorMissing { .. }), "{missing}");
        assert!(missing.is_environmental());

        let ambiguous = builder
            .stage_boot_block(
                FatClass::Fat12,
                BootBlock {
                    archive: Path::new("unused.tar"),
                    catalog: &doubled,
                },
                tmp.path(),
            )
            .unwrap_err();
        match ambiguous {
            MediaError::BootSectorAmbiguous { count, .. } => assert_eq!(count, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_formatter_is_environmental() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("imagedir/dXXXXs/c");
        fs::create_dir_all(&source).unwrap();
        let builder = ImageBuilder::new(tmp.path().join("no-such-formatter"));
        let err = builder
            .build(FatClass::Fat12, &[], None, &source)
            .unwrap_err();
        assert!(matches!(err, MediaError::FormatterMissing { .. }), "{err}");
        assert!(err.is_environmental());
    }
}
