use dosrig_media::ArchiveMember;

/// Where a variant's boot files come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootArchive {
    /// `{pretty_name}.tar` under the assets directory.
    PrettyNameTar,
    /// An explicitly named tarball under the assets directory.
    Named(String),
    /// No tarball; the emulator bundle already provides the boot files.
    Preinstalled,
}

/// Per-test directive consulted before setup touches the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideAction {
    Skip { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOverride {
    pub test: String,
    pub action: OverrideAction,
}

/// Everything the harness knows about one DOS flavor: which files boot it,
/// what its banners look like, and which tests it cannot run.
///
/// Immutable once constructed; the fixture takes it by value per test.
#[derive(Debug, Clone)]
pub struct VariantSpec {
    /// Short identifier used in test ids and artifact names.
    pub name: String,
    /// Display name, also the default archive stem.
    pub pretty_name: String,
    pub archive: BootArchive,
    /// Members extracted into the workdir at setup, with expected hashes.
    pub boot_files: Vec<ArchiveMember>,
    /// Boot-sector catalog, one candidate per geometry class.
    pub boot_blocks: Vec<ArchiveMember>,
    /// Bootable floppy-image catalog.
    pub images: Vec<ArchiveMember>,
    /// Config-script file name the kernel reads (`config.sys` family).
    pub config_name: String,
    /// Startup-script file name (`autoexec.bat` family).
    pub autoexec_name: String,
    /// Command whose output carries the kernel version banner.
    pub version_probe: String,
    /// Substring expected in the version probe's output.
    pub expected_version: String,
    /// Substring expected in the emulator log's system-type line.
    pub system_type: String,
    pub overrides: Vec<TestOverride>,
}

impl VariantSpec {
    /// Tarball file name under the assets directory, or `None` when the boot
    /// files are preinstalled.
    pub fn archive_name(&self) -> Option<String> {
        match &self.archive {
            BootArchive::PrettyNameTar => Some(format!("{}.tar", self.pretty_name)),
            BootArchive::Named(name) => Some(name.clone()),
            BootArchive::Preinstalled => None,
        }
    }

    pub fn override_for(&self, test: &str) -> Option<&OverrideAction> {
        self.overrides
            .iter()
            .find(|o| o.test == test)
            .map(|o| &o.action)
    }

    pub fn image_member(&self, name: &str) -> Option<&ArchiveMember> {
        self.images.iter().find(|m| m.name == name)
    }

    /// FreeDOS 1.20 booted from archived kernel and shell binaries.
    pub fn frdos120() -> Self {
        let fcb_rename = |test: &str| TestOverride {
            test: test.to_string(),
            action: OverrideAction::Skip {
                reason: "FCB rename diverges on this kernel".to_string(),
            },
        };
        let mut overrides: Vec<TestOverride> = [
            "fat_fcb_rename_target_exists",
            "fat_fcb_rename_source_missing",
            "fat_fcb_rename_wild_1",
            "fat_fcb_rename_wild_2",
            "fat_fcb_rename_wild_3",
            "mfs_fcb_rename_target_exists",
            "mfs_fcb_rename_source_missing",
            "mfs_fcb_rename_wild_1",
            "mfs_fcb_rename_wild_2",
            "mfs_fcb_rename_wild_3",
            "mfs_fcb_rename_wild_4",
        ]
        .iter()
        .map(|t| fcb_rename(t))
        .collect();
        overrides.push(TestOverride {
            test: "create_new_psp".to_string(),
            action: OverrideAction::Skip {
                reason: "PSP creation diverges on this kernel".to_string(),
            },
        });

        Self {
            name: "frdos120".to_string(),
            pretty_name: "FR-DOS-1.20".to_string(),
            archive: BootArchive::PrettyNameTar,
            boot_files: vec![
                ArchiveMember::new("kernel.sys", "0709f4e7146a8ad9b8acb33fe3fed0f6da9cc6e0"),
                ArchiveMember::new("command.com", "0733db7babadd73a1b98e8983c83b96eacef4e68"),
            ],
            boot_blocks: vec![
                ArchiveMember::new("boot-302-4-17.blk", "8b5cfda502e59b067d1e34e993486440cad1d4f7"),
                ArchiveMember::new("boot-603-4-17.blk", "5c89a0c9c20ba9d581d8bf6969fda88df8ab2d45"),
                ArchiveMember::new("boot-900-15-17.blk", "523f699a79edde098fceee398b15711fac56a807"),
            ],
            images: vec![ArchiveMember::new(
                "boot-floppy.img",
                "c3faba3620c578b6e42a6ef26554cfc9d2ee3258",
            )],
            config_name: "config.sys".to_string(),
            autoexec_name: "autoexec.bat".to_string(),
            version_probe: "ver /r".to_string(),
            expected_version: "FreeDOS kernel 2042".to_string(),
            system_type: "FreeDOS".to_string(),
            overrides,
        }
    }

    /// FDPP development kernel booted from the emulator's own bundle.
    pub fn ppdosgit() -> Self {
        let floppy = |test: &str| TestOverride {
            test: test.to_string(),
            action: OverrideAction::Skip {
                reason: "no boot floppy in the FDPP bundle".to_string(),
            },
        };
        Self {
            name: "ppdosgit".to_string(),
            pretty_name: "PP-DOS-GIT".to_string(),
            archive: BootArchive::Preinstalled,
            boot_files: Vec::new(),
            boot_blocks: Vec::new(),
            images: Vec::new(),
            config_name: "fdppconf.sys".to_string(),
            autoexec_name: "autoexec.bat".to_string(),
            version_probe: "ver /r".to_string(),
            expected_version: "FDPP kernel".to_string(),
            system_type: "FDPP".to_string(),
            overrides: vec![floppy("floppy_img"), floppy("floppy_vfs")],
        }
    }
}
