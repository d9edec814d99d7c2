use std::fs::File;
use std::io;
use std::path::Path;

use sha1::{Digest, Sha1};

use crate::error::{MediaError, Result};

/// A required archive member and its expected content hash (SHA-1, lowercase
/// hex, supplied out of band by the variant metadata).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    pub name: String,
    pub sha1: String,
}

impl ArchiveMember {
    pub fn new(name: impl Into<String>, sha1: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sha1: sha1.into(),
        }
    }
}

/// Extracts every member in `members` from the tar at `archive` into `dest`,
/// then re-reads each extracted file and verifies its SHA-1 against the
/// declared hash.
///
/// Members land at `dest/{name}` (member names are flat file names in the
/// fixture tarballs). Bytes are never handed to the caller unverified: any
/// missing archive, missing member, or hash mismatch is a typed error and the
/// partially extracted files are left behind only for post-mortem inspection.
pub fn extract_members(archive: &Path, members: &[ArchiveMember], dest: &Path) -> Result<()> {
    let file = File::open(archive).map_err(|e| MediaError::ArchiveUnavailable {
        path: archive.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut tar = tar::Archive::new(file);

    let mut remaining: Vec<&ArchiveMember> = members.iter().collect();
    let entries = tar
        .entries()
        .map_err(|e| MediaError::ArchiveUnavailable {
            path: archive.to_path_buf(),
            reason: e.to_string(),
        })?;
    for entry in entries {
        let mut entry = entry.map_err(|e| MediaError::ArchiveUnavailable {
            path: archive.to_path_buf(),
            reason: e.to_string(),
        })?;
        let name = match entry.path() {
            Ok(path) => path.to_string_lossy().into_owned(),
            // An undecodable entry name cannot be one of ours.
            Err(_) => continue,
        };
        let Some(pos) = remaining.iter().position(|m| m.name == name) else {
            continue;
        };
        let member = remaining.swap_remove(pos);
        let out = dest.join(&member.name);
        entry.unpack(&out)?;
        tracing::debug!(member = %member.name, dest = %out.display(), "extracted archive member");
    }

    if let Some(missing) = remaining.first() {
        return Err(MediaError::MemberMissing {
            archive: archive.to_path_buf(),
            name: missing.name.clone(),
        });
    }

    for member in members {
        let actual = sha1_of_file(&dest.join(&member.name))?;
        if actual != member.sha1 {
            return Err(MediaError::HashMismatch {
                name: member.name.clone(),
                expected: member.sha1.clone(),
                actual,
            });
        }
    }
    Ok(())
}

fn sha1_of_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha1::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
