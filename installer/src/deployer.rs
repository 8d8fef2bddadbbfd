//! Placement of manifest entries into the installation root.
//!
//! Each entry is copied only when its destination is missing or differs from
//! the source, and always ends up with the entry's mode. The first failure
//! stops the run: entries before it are complete, entries after it are not
//! attempted.

use crate::compare::{ComparePolicy, needs_copy};
use crate::error::DeployError;
use crate::manifest::{ArtifactEntry, Manifest};
use crate::progress::{Progress, ProgressEvent};
use crate::target::InstallationTarget;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::fs;
use std::io;
use tempfile::NamedTempFile;

/// What happened to one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyAction {
    /// The destination was written.
    Copied,
    /// The destination already matched; only its mode was enforced.
    Unchanged,
}

/// Outcome of one deployed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryOutcome {
    /// Deployed file.
    pub destination: Utf8PathBuf,
    /// Whether the file was written.
    pub action: CopyAction,
}

/// Result of deploying a manifest.
#[derive(Debug)]
pub struct DeploymentResult {
    /// Outcomes of the entries that completed, in manifest order.
    pub outcomes: Vec<EntryOutcome>,
    /// The failure that stopped the run, if any.
    pub first_failure: Option<DeployError>,
}

impl DeploymentResult {
    /// Whether every entry was deployed.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.first_failure.is_none()
    }

    /// Number of entries whose destination was written.
    #[must_use]
    pub fn copied(&self) -> usize {
        self.count(CopyAction::Copied)
    }

    /// Number of entries that were already up to date.
    #[must_use]
    pub fn unchanged(&self) -> usize {
        self.count(CopyAction::Unchanged)
    }

    fn count(&self, action: CopyAction) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.action == action)
            .count()
    }

    /// Convert into a `Result`, keeping the outcomes on success.
    ///
    /// # Errors
    ///
    /// Returns the first failure when the deployment stopped early.
    pub fn into_result(self) -> Result<Vec<EntryOutcome>, DeployError> {
        match self.first_failure {
            Some(err) => Err(err),
            None => Ok(self.outcomes),
        }
    }
}

/// Deploys manifest entries from a build output root into a target.
pub struct Deployer<'a> {
    build_root: &'a Utf8Path,
    target: &'a InstallationTarget,
    policy: ComparePolicy,
}

impl<'a> Deployer<'a> {
    /// Create a deployer reading from `build_root` and writing under `target`.
    #[must_use]
    pub const fn new(
        build_root: &'a Utf8Path,
        target: &'a InstallationTarget,
        policy: ComparePolicy,
    ) -> Self {
        Self {
            build_root,
            target,
            policy,
        }
    }

    /// Deploy every entry in order, stopping at the first failure.
    pub fn deploy(&self, manifest: &Manifest, progress: &mut Progress<'_>) -> DeploymentResult {
        let mut outcomes = Vec::with_capacity(manifest.len());
        let mut current_group = None;

        for entry in manifest.entries() {
            if current_group != Some((entry.kind, entry.destination)) {
                current_group = Some((entry.kind, entry.destination));
                let destination = entry.destination_dir(self.target.root());
                progress.announce(&ProgressEvent::Group {
                    kind: entry.kind,
                    destination: &destination,
                });
            }

            match self.deploy_entry(entry) {
                Ok(outcome) => {
                    let event = match outcome.action {
                        CopyAction::Copied => ProgressEvent::Copied {
                            path: &outcome.destination,
                        },
                        CopyAction::Unchanged => ProgressEvent::Unchanged {
                            path: &outcome.destination,
                        },
                    };
                    progress.announce(&event);
                    outcomes.push(outcome);
                }
                Err(err) => {
                    return DeploymentResult {
                        outcomes,
                        first_failure: Some(err),
                    };
                }
            }
        }

        DeploymentResult {
            outcomes,
            first_failure: None,
        }
    }

    /// Deploy a single entry.
    ///
    /// # Errors
    ///
    /// Returns a [`DeployError`] naming the directory or file that failed.
    pub fn deploy_entry(&self, entry: &ArtifactEntry) -> Result<EntryOutcome, DeployError> {
        let destination_dir = entry.destination_dir(self.target.root());
        fs::create_dir_all(&destination_dir).map_err(|source| DeployError::DirectoryCreate {
            path: destination_dir.clone(),
            source,
        })?;

        let source = entry.source_path(self.build_root);
        if !source.is_file() {
            return Err(DeployError::MissingSource { path: source });
        }

        let destination = destination_dir.join(entry.file_name());
        let changed = needs_copy(&source, &destination, self.policy).map_err(|err| {
            DeployError::Inspect {
                path: destination.clone(),
                source: err,
            }
        })?;

        let action = if changed {
            copy_atomically(&source, &destination_dir, &destination, entry.mode)?;
            debug!("copied {source} to {destination}");
            CopyAction::Copied
        } else {
            set_mode(&destination, entry.mode)?;
            debug!("{destination} is up to date");
            CopyAction::Unchanged
        };

        Ok(EntryOutcome {
            destination,
            action,
        })
    }
}

/// Copy `source` into a temporary file beside `destination`, apply `mode`,
/// then rename it into place so readers never observe a partial file.
fn copy_atomically(
    source: &Utf8Path,
    destination_dir: &Utf8Path,
    destination: &Utf8Path,
    mode: u32,
) -> Result<(), DeployError> {
    let copy_failed = |err: io::Error| DeployError::CopyFailed {
        source_path: source.to_owned(),
        destination: destination.to_owned(),
        source: err,
    };

    let mut staged = NamedTempFile::new_in(destination_dir).map_err(copy_failed)?;
    let mut reader = fs::File::open(source).map_err(copy_failed)?;
    io::copy(&mut reader, staged.as_file_mut()).map_err(copy_failed)?;
    set_staged_mode(staged.as_file(), destination, mode)?;
    staged
        .persist(destination)
        .map_err(|err| copy_failed(err.error))?;
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Utf8Path, mode: u32) -> Result<(), DeployError> {
    use std::os::unix::fs::PermissionsExt;

    let permission_failed = |source: io::Error| DeployError::PermissionFailed {
        path: path.to_owned(),
        mode,
        source,
    };

    let current = fs::metadata(path).map_err(permission_failed)?;
    if current.permissions().mode() & 0o7777 == mode {
        return Ok(());
    }
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(permission_failed)
}

#[cfg(unix)]
fn set_staged_mode(file: &fs::File, destination: &Utf8Path, mode: u32) -> Result<(), DeployError> {
    use std::os::unix::fs::PermissionsExt;

    file.set_permissions(fs::Permissions::from_mode(mode))
        .map_err(|source| DeployError::PermissionFailed {
            path: destination.to_owned(),
            mode,
            source,
        })
}

#[cfg(not(unix))]
fn set_staged_mode(_file: &fs::File, destination: &Utf8Path, mode: u32) -> Result<(), DeployError> {
    debug!("ignoring mode {mode:o} for {destination} on this platform");
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(path: &Utf8Path, mode: u32) -> Result<(), DeployError> {
    debug!("ignoring mode {mode:o} for {path} on this platform");
    Ok(())
}

#[cfg(test)]
#[path = "deployer_tests.rs"]
mod tests;
