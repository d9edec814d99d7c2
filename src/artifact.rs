use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::asm::Program;
use crate::env::require_tool;
use crate::error::{HarnessError, Result};

const ASSEMBLER: &str = "as";
const LINKER: &str = "gcc";
const OBJCOPY: &str = "objcopy";
const CROSS_COMPILER: &str = "i586-pc-msdosdjgpp-gcc";

/// Linker arguments pinning the code section where a header-less DOS program
/// is loaded, entered at `_start16`.
const FLAT_LINK_ARGS: [&str; 3] = [
    "-static",
    "-Wl,--section-start=.text=0x100,-e,_start16",
    "-nostdlib",
];

/// Builds loadable DOS binaries inside the working directory.
///
/// Both build modes are deterministic for a fixed toolchain: no caching, no
/// retries, each invocation overwrites its own outputs. Tool lookups happen
/// per call so a test that only needs one mode does not depend on the other
/// mode's tools.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactBuilder<'a> {
    workdir: &'a Path,
}

impl<'a> ArtifactBuilder<'a> {
    pub fn new(workdir: &'a Path) -> Self {
        Self { workdir }
    }

    /// Flat binary: assemble, link with the code section at 0x100, then strip
    /// everything but the code section's raw bytes. Produces `{name}.com`.
    pub fn build_com(&self, name: &str, program: &Program) -> Result<PathBuf> {
        self.build_com_source(name, &program.render())
    }

    pub fn build_com_source(&self, name: &str, source: &str) -> Result<PathBuf> {
        let assembler = require_tool(ASSEMBLER)?;
        let linker = require_tool(LINKER)?;
        let objcopy = require_tool(OBJCOPY)?;

        std::fs::write(self.workdir.join(format!("{name}.S")), source)?;

        let mut assemble = Command::new(assembler);
        assemble
            .current_dir(self.workdir)
            .args(["-o", &format!("{name}.o"), &format!("{name}.S")]);
        run_step("assemble", &mut assemble)?;

        let mut link = Command::new(linker);
        link.current_dir(self.workdir)
            .args(FLAT_LINK_ARGS)
            .args(["-o", &format!("{name}.com.elf"), &format!("{name}.o")]);
        run_step("link", &mut link)?;

        let mut extract = Command::new(objcopy);
        extract.current_dir(self.workdir).args([
            "-j",
            ".text",
            "-O",
            "binary",
            &format!("{name}.com.elf"),
            &format!("{name}.com"),
        ]);
        run_step("extract code section", &mut extract)?;

        Ok(self.workdir.join(format!("{name}.com")))
    }

    /// Relocatable executable: one cross-compiler invocation over C source.
    /// Produces `{name}.exe`.
    pub fn build_exe(&self, name: &str, source: &str) -> Result<PathBuf> {
        let compiler = require_tool(CROSS_COMPILER)?;

        std::fs::write(self.workdir.join(format!("{name}.c")), source)?;

        let mut compile = Command::new(compiler);
        compile
            .current_dir(self.workdir)
            .args(["-o", &format!("{name}.exe"), &format!("{name}.c")]);
        run_step("cross compile", &mut compile)?;

        Ok(self.workdir.join(format!("{name}.exe")))
    }
}

/// Runs one build step to completion. A nonzero exit is a fatal authoring
/// defect; a launch failure for a tool that vanished between lookup and exec
/// is reported like any other missing tool.
fn run_step(stage: &'static str, cmd: &mut Command) -> Result<()> {
    tracing::debug!(stage, ?cmd, "running build step");
    let status = cmd.status().map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => HarnessError::ToolMissing {
            name: cmd.get_program().to_string_lossy().into_owned(),
        },
        _ => HarnessError::Io(err),
    })?;
    if !status.success() {
        return Err(HarnessError::Build { stage, status });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonzero_exit_is_a_fatal_build_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut fail = Command::new("sh");
        fail.current_dir(tmp.path()).args(["-c", "exit 3"]);
        let err = run_step("assemble", &mut fail).unwrap_err();
        match err {
            HarnessError::Build { stage, status } => {
                assert_eq!(stage, "assemble");
                assert_eq!(status.code(), Some(3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn build_errors_are_not_environmental() {
        let mut fail = Command::new("sh");
        fail.args(["-c", "exit 1"]);
        let err = run_step("link", &mut fail).unwrap_err();
        assert!(!err.is_environmental());
    }

    #[test]
    fn launch_failure_reports_the_missing_tool() {
        let tmp = tempfile::tempdir().unwrap();
        let mut gone = Command::new(tmp.path().join("vanished-tool"));
        let err = run_step("assemble", &mut gone).unwrap_err();
        assert!(matches!(err, HarnessError::ToolMissing { .. }), "{err}");
        assert!(err.is_environmental());
    }
}
