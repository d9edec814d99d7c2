//! Shared helpers for the end-to-end suites: tracing setup, stub external
//! binaries, and hermetic asset tarballs.
#![allow(dead_code)]

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use sha1::{Digest, Sha1};

use dosrig::{HarnessEnv, VariantSpec};
use dosrig_media::ArchiveMember;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn sha1_hex(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}

/// Writes an executable `sh` script and returns its path.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

/// Stub emulator speaking the expect protocol. The template parses `-f` and
/// `-o` from the launch contract, writes a recognizable system-type line to
/// the log, prints the banner and prompt, reads the command line, then runs
/// `after_read` (which sees `$conf`, `$log`, and `$line`).
pub fn protocol_stub(dir: &Path, after_read: &str) -> PathBuf {
    let body = format!(
        r#"conf=/dev/null
log=/dev/null
while [ $# -gt 0 ]; do
  case "$1" in
    -f) conf="$2"; shift 2 ;;
    -o) log="$2"; shift 2 ;;
    *) shift ;;
  esac
done
printf 'system type is FreeDOS\n' > "$log"
printf 'system -e\r\n> '
read line
{after_read}
sleep 10
"#
    );
    write_script(dir, "dosemu-stub", &body)
}

/// Stub FAT formatter honoring the geometry arguments: creates the `-f`
/// target (relative to its working directory) with exactly
/// `tracks * heads * 17 * 512` bytes.
pub fn formatter_stub(dir: &Path) -> PathBuf {
    let body = r#"tracks=0
heads=0
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -t) tracks="$2"; shift 2 ;;
    -h) heads="$2"; shift 2 ;;
    -f) out="$2"; shift 2 ;;
    -b) [ -f "$2" ] || exit 9; shift 2 ;;
    *) shift ;;
  esac
done
[ -n "$out" ] || exit 8
truncate -s $((tracks * heads * 17 * 512)) "$out"
"#;
    write_script(dir, "mkfatimage16-stub", body)
}

/// A harness environment rooted entirely inside `root`, pointing at the
/// given emulator binary.
pub fn hermetic_env(root: &Path, emulator: PathBuf) -> HarnessEnv {
    HarnessEnv {
        emulator,
        assets_dir: root.join("assets"),
        libdir: root.join("libdir"),
        imagedir: root.join("imagedir"),
        toolkit_dir: root.join("commands"),
        formatter: root.join("bin-missing/mkfatimage16"),
        keep_artifacts: false,
    }
}

/// Minimal command toolkit so setup's copy step has something to copy.
pub fn make_toolkit(root: &Path) {
    let dir = root.join("commands");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("comcom32.exe"), b"toolkit binary").unwrap();
}

/// Builds the variant's boot tarball under `root/assets` from fake file
/// bodies, patching the variant's member lists with the real hashes so
/// extraction verifies.
pub fn make_assets(root: &Path, variant: &mut VariantSpec) {
    let assets = root.join("assets");
    fs::create_dir_all(&assets).unwrap();
    let tar_path = assets.join(variant.archive_name().expect("variant needs an archive"));
    let mut builder = tar::Builder::new(fs::File::create(tar_path).unwrap());

    let mut entries: Vec<(String, Vec<u8>)> = Vec::new();
    for member in &variant.boot_files {
        entries.push((member.name.clone(), format!("boot file {}", member.name).into_bytes()));
    }
    for member in &variant.boot_blocks {
        entries.push((member.name.clone(), format!("boot block {}", member.name).into_bytes()));
    }
    for member in &variant.images {
        entries.push((member.name.clone(), format!("floppy {}", member.name).into_bytes()));
    }

    let rehash = |members: &mut Vec<ArchiveMember>, entries: &[(String, Vec<u8>)]| {
        for member in members {
            let (_, bytes) = entries
                .iter()
                .find(|(name, _)| *name == member.name)
                .expect("entry for member");
            member.sha1 = sha1_hex(bytes);
        }
    };
    rehash(&mut variant.boot_files, &entries);
    rehash(&mut variant.boot_blocks, &entries);
    rehash(&mut variant.images, &entries);

    for (name, bytes) in &entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, bytes.as_slice()).unwrap();
    }
    builder.finish().unwrap();
}

static PATH_MUTEX: Mutex<()> = Mutex::new(());

/// Prepends a directory to PATH for the guard's lifetime. Serialized through
/// a lock so concurrent tests never observe each other's PATH.
pub struct PathOverride {
    original: OsString,
    _guard: MutexGuard<'static, ()>,
}

impl PathOverride {
    pub fn prepend(dir: &Path) -> Self {
        let guard = PATH_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let original = std::env::var_os("PATH").unwrap_or_default();
        let mut joined = dir.as_os_str().to_os_string();
        joined.push(":");
        joined.push(&original);
        std::env::set_var("PATH", &joined);
        Self {
            original,
            _guard: guard,
        }
    }

    /// Replaces PATH entirely, so lookups cannot fall through to host tools.
    pub fn replace(dir: &Path) -> Self {
        let guard = PATH_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let original = std::env::var_os("PATH").unwrap_or_default();
        std::env::set_var("PATH", dir);
        Self {
            original,
            _guard: guard,
        }
    }
}

impl Drop for PathOverride {
    fn drop(&mut self) {
        std::env::set_var("PATH", &self.original);
    }
}
