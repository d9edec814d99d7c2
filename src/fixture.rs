//! Per-test orchestration: working-tree reset, boot-file staging, generated
//! startup files, artifact/image builds, and exactly one emulator session.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dosrig_media::{extract_members, BootBlock, FatClass, ImageBuilder};

use crate::artifact::ArtifactBuilder;
use crate::asm::Program;
use crate::conf::ConfigOverlay;
use crate::env::{require_tool, HarnessEnv};
use crate::error::{HarnessError, Result};
use crate::report::{dump_sink, FailureReport};
use crate::session::{run_protocol, EmulatorSpawn, ProtocolTimeouts, Verdict, DEFAULT_OPTS};
use crate::variant::{OverrideAction, VariantSpec};

/// Converts environmental errors into skips: `Ok(None)` plus a
/// `skipping: {reason}` line on stderr. Authoring defects propagate.
pub fn skippable<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_environmental() => {
            eprintln!("skipping: {err}");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// One session request: the command to type, plus everything optional around
/// it. Consumed by [`Fixture::run`].
#[derive(Debug, Clone)]
pub struct RunSpec {
    command: String,
    opts: String,
    config: Option<ConfigOverlay>,
    outfile: Option<String>,
    timeouts: ProtocolTimeouts,
}

impl RunSpec {
    pub fn command(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            opts: DEFAULT_OPTS.to_string(),
            config: None,
            outfile: None,
            timeouts: ProtocolTimeouts::default(),
        }
    }

    /// Replaces the default `-I video{none}` option string.
    pub fn opts(mut self, opts: impl Into<String>) -> Self {
        self.opts = opts.into();
        self
    }

    /// Overlay appended to `dosemu.conf` before the session spawns.
    pub fn config(mut self, overlay: ConfigOverlay) -> Self {
        self.config = Some(overlay);
        self
    }

    /// Capture this workdir file instead of the transcript on success.
    pub fn outfile(mut self, name: impl Into<String>) -> Self {
        self.outfile = Some(name.into());
        self
    }

    pub fn timeouts(mut self, timeouts: ProtocolTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn completion_timeout(mut self, completion: Duration) -> Self {
        self.timeouts = self.timeouts.with_completion(completion);
        self
    }
}

/// One test's exclusive working tree and session sinks.
///
/// Dropping a `Fixture` during a panic retains the emulator log and pty
/// transcript, dumps both to stderr, and writes a JSON sidecar next to them;
/// a clean drop deletes the sinks unless artifact keeping is switched on.
#[derive(Debug)]
pub struct Fixture {
    env: HarnessEnv,
    variant: VariantSpec,
    test_id: String,
    workdir: PathBuf,
    logfile: PathBuf,
    transcript: PathBuf,
    last_verdict: Option<String>,
}

impl Fixture {
    /// Prepares the working tree for `test_id`: wipes the previous tree,
    /// stages the variant's boot files, writes the base configuration and
    /// startup scripts, and copies the command toolkit in.
    ///
    /// Returns `Ok(None)` (after a `skipping:` line) when the variant rules
    /// this test out or a required local fixture is missing.
    pub fn set_up(env: HarnessEnv, variant: VariantSpec, test_id: &str) -> Result<Option<Self>> {
        if let Some(OverrideAction::Skip { reason }) = variant.override_for(test_id) {
            eprintln!("skipping: {test_id}: {reason}");
            return Ok(None);
        }

        fs::create_dir_all(env.libdir.join("dosemu2-cmds-0.2"))?;

        match fs::remove_dir_all(&env.imagedir) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        let workdir = env.workdir();
        fs::create_dir_all(&workdir)?;

        if let Some(archive) = variant.archive_name() {
            let staged = skippable(
                extract_members(
                    &env.assets_dir.join(archive),
                    &variant.boot_files,
                    &workdir,
                )
                .map_err(HarnessError::from),
            )?;
            if staged.is_none() {
                return Ok(None);
            }
        }

        fs::write(env.imagedir.join("dosemu.conf"), "$_lpt1 = \"\"\n")?;

        if skippable(copy_toolkit(&env.toolkit_dir, &workdir.join("dosemu")))?.is_none() {
            return Ok(None);
        }

        fs::write(
            workdir.join(&variant.config_name),
            "lastdrive=Z\r\ndevice=dosemu\\emufs.sys\r\n",
        )?;
        fs::write(
            workdir.join(&variant.autoexec_name),
            "prompt $P$G\r\npath c:\\bin;c:\\gnu;c:\\dosemu\r\nsystem -s DOSEMU_VERSION\r\nsystem -e\r\n",
        )?;
        fs::write(
            workdir.join("version.bat"),
            format!("{}\r\nrem end\r\n", variant.version_probe),
        )?;

        Ok(Some(Self {
            env,
            variant,
            test_id: test_id.to_string(),
            workdir,
            logfile: PathBuf::from(format!("{test_id}.log")),
            transcript: PathBuf::from(format!("{test_id}.xpt")),
            last_verdict: None,
        }))
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn imagedir(&self) -> &Path {
        &self.env.imagedir
    }

    pub fn variant(&self) -> &VariantSpec {
        &self.variant
    }

    pub fn transcript_path(&self) -> &Path {
        &self.transcript
    }

    /// Creates the sibling directory backing drive `letter` and returns it.
    pub fn make_drive(&self, letter: char) -> Result<PathBuf> {
        let dir = self.env.drive_dir(letter);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Writes a batch script with CR LF endings, always terminated by the
    /// `rem end` sentinel line.
    pub fn write_batch(&self, name: &str, lines: &[&str]) -> Result<PathBuf> {
        let mut text = String::new();
        for line in lines {
            text.push_str(line);
            text.push_str("\r\n");
        }
        text.push_str("rem end\r\n");
        self.write_workdir_file(name, text)
    }

    pub fn write_workdir_file(&self, name: &str, contents: impl AsRef<[u8]>) -> Result<PathBuf> {
        let path = self.workdir.join(name);
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn build_com(&self, name: &str, program: &Program) -> Result<PathBuf> {
        ArtifactBuilder::new(&self.workdir).build_com(name, program)
    }

    pub fn build_com_source(&self, name: &str, source: &str) -> Result<PathBuf> {
        ArtifactBuilder::new(&self.workdir).build_com_source(name, source)
    }

    pub fn build_exe(&self, name: &str, source: &str) -> Result<PathBuf> {
        ArtifactBuilder::new(&self.workdir).build_exe(name, source)
    }

    /// Builds `fat{class}.img` in the imagedir from workdir-relative `files`,
    /// staging the variant's matching boot sector first when `boot_block` is
    /// set.
    pub fn build_image(&self, class: FatClass, files: &[&str], boot_block: bool) -> Result<PathBuf> {
        let builder = ImageBuilder::new(self.env.formatter.clone());
        let files: Vec<String> = files.iter().map(|f| f.to_string()).collect();
        let archive;
        let source = if boot_block {
            archive = self.assets_archive()?;
            Some(BootBlock {
                archive: &archive,
                catalog: &self.variant.boot_blocks,
            })
        } else {
            None
        };
        Ok(builder.build(class, &files, source, &self.workdir)?)
    }

    /// Extracts the named bootable floppy image from the variant catalog into
    /// the imagedir, hash-verified.
    pub fn stage_boot_image(&self, name: &str) -> Result<PathBuf> {
        let member = self
            .variant
            .image_member(name)
            .ok_or_else(|| HarnessError::AssetMissing {
                name: name.to_string(),
            })?
            .clone();
        let archive = self.assets_archive()?;
        extract_members(&archive, std::slice::from_ref(&member), &self.env.imagedir)
            .map_err(HarnessError::from)?;
        Ok(self.env.imagedir.join(name))
    }

    fn assets_archive(&self) -> Result<PathBuf> {
        self.variant
            .archive_name()
            .map(|name| self.env.assets_dir.join(name))
            .ok_or_else(|| HarnessError::AssetMissing {
                name: "boot archive".to_string(),
            })
    }

    /// Runs exactly one emulator session for `spec` and classifies it.
    pub async fn run(&mut self, spec: RunSpec) -> Result<Verdict> {
        if let Some(overlay) = &spec.config {
            overlay.append_to(&self.env.imagedir.join("dosemu.conf"))?;
        }
        let program = require_tool(&self.env.emulator)?;
        let spawn = EmulatorSpawn {
            program,
            imagedir: self.env.imagedir.clone(),
            libdir: self.env.libdir.clone(),
            logfile: self.logfile.clone(),
            opts: spec.opts.clone(),
        };
        let outfile = spec.outfile.as_ref().map(|name| self.workdir.join(name));
        let verdict = run_protocol(
            spawn.command(),
            &self.transcript,
            &spec.command,
            spec.timeouts,
            outfile.as_deref(),
        )
        .await?;
        self.last_verdict = Some(match &verdict {
            Verdict::Success(_) => "Success".to_string(),
            other => other.to_string(),
        });
        Ok(verdict)
    }

    /// The emulator-log line identifying the detected DOS flavor, if any.
    pub fn system_type_line(&self) -> Result<Option<String>> {
        let bytes = fs::read(&self.logfile)?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(text
            .lines()
            .find(|line| line.contains("system type is"))
            .map(str::to_string))
    }

    /// True when the transcript shows the pass-through filesystem fell back
    /// to revectoring, i.e. MFS is unusable for this session.
    pub fn redirector_unavailable(&self) -> Result<bool> {
        let bytes = fs::read(&self.transcript)?;
        Ok(String::from_utf8_lossy(&bytes).contains("EMUFS revectoring only"))
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut err = io::stderr().lock();
            let _ = dump_sink(&mut err, "dosemu.log", &self.logfile);
            let _ = dump_sink(&mut err, "expect.log", &self.transcript);
            let verdict = self
                .last_verdict
                .clone()
                .unwrap_or_else(|| "none".to_string());
            let report =
                FailureReport::new(&self.test_id, verdict, &self.logfile, &self.transcript);
            let _ = report.write_sidecar(Path::new(&format!("{}.json", self.test_id)));
        } else if !self.env.keep_artifacts {
            let _ = fs::remove_file(&self.logfile);
            let _ = fs::remove_file(&self.transcript);
        }
    }
}

/// Copies the bundled DOS command toolkit, preserving symlinks. A missing
/// toolkit is environmental; a failure mid-copy is not.
fn copy_toolkit(src: &Path, dest: &Path) -> Result<()> {
    if let Err(err) = fs::symlink_metadata(src) {
        return Err(HarnessError::ToolkitUnavailable {
            path: src.to_path_buf(),
            reason: err.to_string(),
        });
    }
    copy_tree(src, dest)?;
    Ok(())
}

fn copy_tree(src: &Path, dest: &Path) -> io::Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let to = dest.join(entry.file_name());
        if file_type.is_symlink() {
            let target = fs::read_link(entry.path())?;
            std::os::unix::fs::symlink(target, &to)?;
        } else if file_type.is_dir() {
            copy_tree(&entry.path(), &to)?;
        } else {
            fs::copy(entry.path(), &to)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dosrig_media::ArchiveMember;
    use sha1::{Digest, Sha1};

    fn sha1_hex(bytes: &[u8]) -> String {
        hex::encode(Sha1::digest(bytes))
    }

    fn test_env(root: &Path) -> HarnessEnv {
        HarnessEnv {
            emulator: root.join("bin/dosemu"),
            assets_dir: root.join("assets"),
            libdir: root.join("libdir"),
            imagedir: root.join("imagedir"),
            toolkit_dir: root.join("commands"),
            formatter: root.join("bin/mkfatimage16"),
            keep_artifacts: false,
        }
    }

    fn toolkit_with_symlink(root: &Path) {
        let dir = root.join("commands");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("comcom32.exe"), b"toolkit binary").unwrap();
        std::os::unix::fs::symlink("comcom32.exe", dir.join("command.com")).unwrap();
    }

    fn assets_tar(root: &Path, variant: &VariantSpec) -> Vec<ArchiveMember> {
        let assets = root.join("assets");
        fs::create_dir_all(&assets).unwrap();
        let tar_path = assets.join(variant.archive_name().unwrap());
        let mut builder = tar::Builder::new(fs::File::create(tar_path).unwrap());
        let mut members = Vec::new();
        for (name, bytes) in [("kernel.sys", b"kernel bytes".as_slice()), ("command.com", b"shell bytes")] {
            let mut header = tar::Header::new_gnu();
            header.set_size(bytes.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, bytes).unwrap();
            members.push(ArchiveMember::new(name, sha1_hex(bytes)));
        }
        builder.finish().unwrap();
        members
    }

    fn hermetic_variant(root: &Path) -> VariantSpec {
        let mut variant = VariantSpec::frdos120();
        variant.boot_files = assets_tar(root, &variant);
        variant
    }

    #[test]
    fn set_up_stages_boot_files_and_startup_scripts() {
        let tmp = tempfile::tempdir().unwrap();
        toolkit_with_symlink(tmp.path());
        let variant = hermetic_variant(tmp.path());
        let fixture = Fixture::set_up(test_env(tmp.path()), variant, "fixture_setup_case")
            .unwrap()
            .expect("hermetic setup should not skip");

        let workdir = fixture.workdir();
        assert_eq!(fs::read(workdir.join("kernel.sys")).unwrap(), b"kernel bytes");
        assert_eq!(
            fs::read_to_string(workdir.join("config.sys")).unwrap(),
            "lastdrive=Z\r\ndevice=dosemu\\emufs.sys\r\n"
        );
        let autoexec = fs::read_to_string(workdir.join("autoexec.bat")).unwrap();
        assert!(autoexec.starts_with("prompt $P$G\r\n"));
        assert!(autoexec.ends_with("system -e\r\n"));
        assert_eq!(
            fs::read_to_string(workdir.join("version.bat")).unwrap(),
            "ver /r\r\nrem end\r\n"
        );
        assert_eq!(
            fs::read_to_string(fixture.imagedir().join("dosemu.conf")).unwrap(),
            "$_lpt1 = \"\"\n"
        );
        assert!(fixture
            .workdir()
            .join("dosemu/comcom32.exe")
            .exists());
        let link = fs::symlink_metadata(workdir.join("dosemu/command.com")).unwrap();
        assert!(link.file_type().is_symlink());
        assert!(tmp.path().join("libdir/dosemu2-cmds-0.2").is_dir());
    }

    #[test]
    fn set_up_wipes_the_previous_tree() {
        let tmp = tempfile::tempdir().unwrap();
        toolkit_with_symlink(tmp.path());
        let variant = hermetic_variant(tmp.path());
        let env = test_env(tmp.path());

        let stale = env.imagedir.join("dXXXXs/c/stale.txt");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, b"left over").unwrap();

        let _fixture = Fixture::set_up(env, variant, "fixture_wipe_case")
            .unwrap()
            .expect("hermetic setup should not skip");
        assert!(!stale.exists());
    }

    #[test]
    fn overridden_test_skips_before_touching_the_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let variant = VariantSpec::frdos120();
        let env = test_env(tmp.path());
        let fixture =
            Fixture::set_up(env.clone(), variant, "fat_fcb_rename_wild_1").unwrap();
        assert!(fixture.is_none());
        assert!(!env.imagedir.exists());
    }

    #[test]
    fn missing_archive_becomes_a_skip() {
        let tmp = tempfile::tempdir().unwrap();
        toolkit_with_symlink(tmp.path());
        let variant = VariantSpec::frdos120();
        let fixture = Fixture::set_up(test_env(tmp.path()), variant, "fixture_no_archive").unwrap();
        assert!(fixture.is_none());
    }

    #[test]
    fn missing_toolkit_becomes_a_skip() {
        let tmp = tempfile::tempdir().unwrap();
        let variant = hermetic_variant(tmp.path());
        let fixture = Fixture::set_up(test_env(tmp.path()), variant, "fixture_no_toolkit").unwrap();
        assert!(fixture.is_none());
    }

    #[test]
    fn preinstalled_variant_needs_no_archive() {
        let tmp = tempfile::tempdir().unwrap();
        toolkit_with_symlink(tmp.path());
        let fixture = Fixture::set_up(
            test_env(tmp.path()),
            VariantSpec::ppdosgit(),
            "fixture_preinstalled",
        )
        .unwrap()
        .expect("preinstalled variant should set up without assets");
        assert!(fixture.workdir().join("fdppconf.sys").exists());
    }

    #[test]
    fn batch_scripts_end_with_the_terminator() {
        let tmp = tempfile::tempdir().unwrap();
        toolkit_with_symlink(tmp.path());
        let variant = hermetic_variant(tmp.path());
        let fixture = Fixture::set_up(test_env(tmp.path()), variant, "fixture_batch_case")
            .unwrap()
            .expect("hermetic setup should not skip");
        let path = fixture.write_batch("testit.bat", &["d:", "c:\\mfssfn"]).unwrap();
        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "d:\r\nc:\\mfssfn\r\nrem end\r\n"
        );
    }

    #[test]
    fn skippable_passes_fatal_errors_through() {
        let env_err: Result<()> = Err(HarnessError::ToolMissing {
            name: "as".to_string(),
        });
        assert!(matches!(skippable(env_err), Ok(None)));

        let fatal: Result<()> = Err(HarnessError::Io(io::Error::new(
            io::ErrorKind::Other,
            "disk went away",
        )));
        assert!(skippable(fatal).is_err());
    }

    #[test]
    fn run_spec_defaults_match_the_protocol() {
        let spec = RunSpec::command("version.bat");
        assert_eq!(spec.opts, DEFAULT_OPTS);
        assert!(spec.config.is_none());
        assert!(spec.outfile.is_none());
        assert_eq!(spec.timeouts, ProtocolTimeouts::default());
    }
}
