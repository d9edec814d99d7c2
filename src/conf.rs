use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

/// Ordered `$_name = "value"` assignments appended to the emulator's base
/// configuration before a session spawns.
///
/// Order is preserved and duplicates are kept; the emulator's own reader
/// decides shadowing.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverlay {
    entries: Vec<(String, String)>,
}

impl ConfigOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `$_{key} = "{value}"`. The `$_` prefix is supplied at render
    /// time.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.push((key.into(), value.into()));
        self
    }

    /// Disk-image mount specs for the hard-drive chain.
    pub fn hdimage(self, spec: &str) -> Self {
        self.set("hdimage", spec)
    }

    /// Floppy drive A: source (image path or directory spec).
    pub fn floppy_a(self, spec: &str) -> Self {
        self.set("floppy_a", spec)
    }

    pub fn bootdrive(self, drive: &str) -> Self {
        self.set("bootdrive", drive)
    }

    /// Emulator debug-flag string.
    pub fn debug(self, flags: &str) -> Self {
        self.set("debug", flags)
    }

    pub fn lpt1(self, value: &str) -> Self {
        self.set("lpt1", value)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(&format!("$_{key} = \"{value}\"\n"));
        }
        out
    }

    /// Appends the rendered overlay to `path`, creating the file if needed.
    pub fn append_to(&self, path: &Path) -> io::Result<()> {
        let mut file = OpenOptions::new().append(true).create(true).open(path)?;
        file.write_all(self.render().as_bytes())
    }
}
