//! The table of secondary artefacts placed after the primary build.
//!
//! Each [`ArtifactEntry`] names a file relative to the build output root, the
//! directory (relative to the installation root) it lands in, and the mode it
//! gets. The table is data: deployment logic never special-cases an entry.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Name of the tool whose runtime files are deployed.
pub const TOOL_NAME: &str = "rd";

/// Mode for data files, sources and libraries.
pub const DATA_MODE: u32 = 0o644;

/// Mode for stub executables.
pub const EXEC_MODE: u32 = 0o755;

/// Word size an artefact was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchVariant {
    /// The native 64-bit build.
    Primary,
    /// The 32-bit build used for 32-bit tracees.
    Secondary,
}

impl ArchVariant {
    /// Pointer width in bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::Primary => 64,
            Self::Secondary => 32,
        }
    }
}

impl fmt::Display for ArchVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

/// Role an artefact plays at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// Page image mapped into tracees while recording or replaying.
    PageFile,
    /// Preload source or header shipped for reference and rebuilding.
    PreloadSource,
    /// Preload shared library injected into tracees.
    Library,
    /// Stub executable used to exec tracees.
    ExecStub,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::PageFile => "page files",
            Self::PreloadSource => "preload sources",
            Self::Library => "shared libraries",
            Self::ExecStub => "exec stubs",
        };
        f.write_str(label)
    }
}

/// One secondary file to deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArtifactEntry {
    /// Path relative to the build output root.
    pub source: &'static str,
    /// Directory relative to the installation root.
    pub destination: &'static str,
    /// Permission bits applied to the deployed file.
    pub mode: u32,
    /// Runtime role.
    pub kind: ArtifactKind,
    /// Word size, for artefacts built once per architecture.
    pub arch: Option<ArchVariant>,
}

impl ArtifactEntry {
    /// Whether the deployed file carries any execute bit.
    #[must_use]
    pub const fn is_executable(&self) -> bool {
        self.mode & 0o111 != 0
    }

    /// File name the artefact is deployed under.
    #[must_use]
    pub fn file_name(&self) -> &'static str {
        Utf8Path::new(self.source)
            .file_name()
            .unwrap_or(self.source)
    }

    /// Absolute source path under `build_root`.
    #[must_use]
    pub fn source_path(&self, build_root: &Utf8Path) -> Utf8PathBuf {
        build_root.join(self.source)
    }

    /// Absolute destination directory under `root`.
    #[must_use]
    pub fn destination_dir(&self, root: &Utf8Path) -> Utf8PathBuf {
        root.join(self.destination)
    }

    /// Absolute destination file under `root`.
    #[must_use]
    pub fn destination_path(&self, root: &Utf8Path) -> Utf8PathBuf {
        self.destination_dir(root).join(self.file_name())
    }

    /// Role key shared by the two architecture variants of one artefact.
    ///
    /// The 32-bit variant differs from its partner by a `_32` marker, either
    /// as a suffix (`rd_exec_stub_32`) or before the extension
    /// (`librdpreload_32.so`); page files swap `_64` for `_32`.
    #[must_use]
    pub fn role(&self) -> String {
        let name = self.file_name();
        let (stem, ext) = match name.split_once('.') {
            Some((stem, ext)) => (stem, Some(ext)),
            None => (name, None),
        };
        let base = stem
            .replace("_64", "")
            .replace("_32", "");
        match ext {
            Some(ext) => format!("{}/{base}.{ext}", self.destination),
            None => format!("{}/{base}", self.destination),
        }
    }
}

const fn page(source: &'static str, arch: ArchVariant) -> ArtifactEntry {
    ArtifactEntry {
        source,
        destination: "share/rd",
        mode: DATA_MODE,
        kind: ArtifactKind::PageFile,
        arch: Some(arch),
    }
}

const fn preload(source: &'static str) -> ArtifactEntry {
    ArtifactEntry {
        source,
        destination: "share/rd/src/preload",
        mode: DATA_MODE,
        kind: ArtifactKind::PreloadSource,
        arch: None,
    }
}

const fn library(source: &'static str, arch: ArchVariant) -> ArtifactEntry {
    ArtifactEntry {
        source,
        destination: "lib/rd",
        mode: DATA_MODE,
        kind: ArtifactKind::Library,
        arch: Some(arch),
    }
}

const fn stub(source: &'static str, arch: ArchVariant) -> ArtifactEntry {
    ArtifactEntry {
        source,
        destination: "bin",
        mode: EXEC_MODE,
        kind: ArtifactKind::ExecStub,
        arch: Some(arch),
    }
}

/// Every secondary artefact of an rd installation, in deployment order.
pub const RD_ARTIFACTS: &[ArtifactEntry] = &[
    page("share/rd/rd_page_64", ArchVariant::Primary),
    page("share/rd/rd_page_32", ArchVariant::Secondary),
    page("share/rd/rd_page_64_replay", ArchVariant::Primary),
    page("share/rd/rd_page_32_replay", ArchVariant::Secondary),
    preload("src/preload/overrides.c"),
    preload("src/preload/preload_interface.h"),
    preload("src/preload/raw_syscall.S"),
    preload("src/preload/rdcalls.h"),
    preload("src/preload/syscall_hook.S"),
    preload("src/preload/syscallbuf.c"),
    preload("src/preload/syscallbuf.h"),
    library("lib/rd/librdpreload.so", ArchVariant::Primary),
    library("lib/rd/librdpreload_32.so", ArchVariant::Secondary),
    stub("bin/rd_exec_stub", ArchVariant::Primary),
    stub("bin/rd_exec_stub_32", ArchVariant::Secondary),
];

/// An ordered set of artefacts to deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ArtifactEntry>,
}

impl Manifest {
    /// Build a manifest from explicit entries.
    #[must_use]
    pub fn new(entries: Vec<ArtifactEntry>) -> Self {
        Self { entries }
    }

    /// The standard rd manifest.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(RD_ARTIFACTS.to_vec())
    }

    /// Entries in deployment order.
    #[must_use]
    pub fn entries(&self) -> &[ArtifactEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct destination directories, in first-use order.
    #[must_use]
    pub fn destination_dirs(&self) -> Vec<&'static str> {
        let mut dirs: Vec<&'static str> = Vec::new();
        for entry in &self.entries {
            if !dirs.contains(&entry.destination) {
                dirs.push(entry.destination);
            }
        }
        dirs
    }

    /// Roles that carry an architecture variant but lack one of the pair.
    ///
    /// Deployment does not call this; both variants being present is a
    /// property of the table, checked by tests.
    #[must_use]
    pub fn unpaired_roles(&self) -> Vec<String> {
        let mut variants: BTreeMap<String, Vec<ArchVariant>> = BTreeMap::new();
        for entry in &self.entries {
            if let Some(arch) = entry.arch {
                variants.entry(entry.role()).or_default().push(arch);
            }
        }
        variants
            .into_iter()
            .filter(|(_, archs)| {
                !(archs.contains(&ArchVariant::Primary) && archs.contains(&ArchVariant::Secondary))
            })
            .map(|(role, _)| role)
            .collect()
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self::standard()
    }
}
