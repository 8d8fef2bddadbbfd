//! Read-only inspection of an installation root.
//!
//! Reports, for every manifest entry, whether the deployed file is present,
//! carries the expected mode and (when a build output root is known) matches
//! its source. Nothing is written.

use crate::cli::StatusArgs;
use crate::compare::{ComparePolicy, needs_copy};
use crate::error::{DeployError, InstallerError, Result};
use crate::manifest::{ArchVariant, ArtifactEntry, ArtifactKind, Manifest};
use crate::target::configured_root;
use camino::Utf8Path;
use log::trace;
use serde::Serialize;
use std::fmt;
use std::io::Write;

/// State of one deployed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryState {
    /// Present, with the expected mode, and not known to differ from its source.
    Current,
    /// Present but different from the build output.
    Stale,
    /// Present with the wrong permission bits.
    WrongMode,
    /// Not deployed.
    Missing,
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Current => "current",
            Self::Stale => "stale",
            Self::WrongMode => "wrong-mode",
            Self::Missing => "missing",
        };
        f.write_str(label)
    }
}

/// Status of one manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryStatus {
    /// Deployed path.
    pub path: String,
    /// Runtime role.
    pub kind: ArtifactKind,
    /// Word size, when the artefact has variants.
    pub arch: Option<ArchVariant>,
    /// Mode the manifest asks for.
    pub expected_mode: u32,
    /// Mode found on disk, when the file exists.
    pub actual_mode: Option<u32>,
    /// Overall state.
    pub state: EntryState,
}

/// Status of a whole installation root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallationStatus {
    /// Inspected root.
    pub root: String,
    /// One status per manifest entry, in manifest order.
    pub entries: Vec<EntryStatus>,
}

impl InstallationStatus {
    /// Whether every entry is current.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.entries
            .iter()
            .all(|entry| entry.state == EntryState::Current)
    }
}

/// Inspect `root` against `manifest`.
///
/// # Errors
///
/// Returns [`DeployError::Inspect`] if a present file cannot be read.
pub fn inspect(
    root: &Utf8Path,
    build_root: Option<&Utf8Path>,
    manifest: &Manifest,
) -> std::result::Result<InstallationStatus, DeployError> {
    let entries = manifest
        .entries()
        .iter()
        .map(|entry| inspect_entry(root, build_root, entry))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(InstallationStatus {
        root: root.to_string(),
        entries,
    })
}

fn inspect_entry(
    root: &Utf8Path,
    build_root: Option<&Utf8Path>,
    entry: &ArtifactEntry,
) -> std::result::Result<EntryStatus, DeployError> {
    let path = entry.destination_path(root);
    let inspect_failed = |source: std::io::Error| DeployError::Inspect {
        path: path.clone(),
        source,
    };

    let mut status = EntryStatus {
        path: path.to_string(),
        kind: entry.kind,
        arch: entry.arch,
        expected_mode: entry.mode,
        actual_mode: None,
        state: EntryState::Missing,
    };

    if !path.is_file() {
        trace!("{path} missing");
        return Ok(status);
    }

    let actual_mode = file_mode(&path).map_err(inspect_failed)?;
    status.actual_mode = actual_mode;

    let stale = match build_root.map(|dir| entry.source_path(dir)) {
        Some(source) if source.is_file() => {
            needs_copy(&source, &path, ComparePolicy::Content).map_err(inspect_failed)?
        }
        _ => false,
    };

    status.state = if stale {
        EntryState::Stale
    } else if actual_mode.is_some_and(|mode| mode != entry.mode) {
        EntryState::WrongMode
    } else {
        EntryState::Current
    };
    Ok(status)
}

#[cfg(unix)]
fn file_mode(path: &Utf8Path) -> std::io::Result<Option<u32>> {
    use std::os::unix::fs::PermissionsExt;

    Ok(Some(std::fs::metadata(path)?.permissions().mode() & 0o7777))
}

#[cfg(not(unix))]
fn file_mode(_path: &Utf8Path) -> std::io::Result<Option<u32>> {
    Ok(None)
}

/// Format a status report for people.
#[must_use]
pub fn format_human(status: &InstallationStatus) -> String {
    let mut output = format!("Installation root: {}\n\n", status.root);
    for entry in &status.entries {
        output.push_str(&format!("  {:<10} {}\n", entry.state.to_string(), entry.path));
    }
    let current = status
        .entries
        .iter()
        .filter(|entry| entry.state == EntryState::Current)
        .count();
    output.push_str(&format!(
        "\n{current} of {} file(s) current",
        status.entries.len()
    ));
    output
}

/// Format a status report as JSON.
#[must_use]
pub fn format_json(status: &InstallationStatus) -> String {
    serde_json::to_string_pretty(status).unwrap_or_else(|_| "{}".to_owned())
}

/// Run the `status` subcommand.
///
/// # Errors
///
/// Returns an error if no root is configured, a file cannot be inspected, or
/// writing to `stdout` fails.
pub fn run_status(args: &StatusArgs, stdout: &mut dyn Write) -> Result<()> {
    let root = configured_root(args.prefix.as_deref())?;
    let status = inspect(&root, args.build_dir.as_deref(), &Manifest::standard())?;

    let output = if args.json {
        format_json(&status)
    } else {
        format_human(&status)
    };

    writeln!(stdout, "{output}").map_err(|source| InstallerError::WriteFailed { source })?;
    Ok(())
}
