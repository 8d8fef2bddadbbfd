//! Installation root resolution.
//!
//! Turns the configured root into an absolute [`InstallationTarget`], creating
//! the directory when it does not exist yet.

use crate::error::ConfigError;
use crate::progress::{Progress, ProgressEvent};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::fs;

/// The validated installation root of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationTarget {
    root: Utf8PathBuf,
    existed_before_run: bool,
}

impl InstallationTarget {
    /// Wrap an already validated root without touching the filesystem.
    #[must_use]
    pub const fn new(root: Utf8PathBuf, existed_before_run: bool) -> Self {
        Self {
            root,
            existed_before_run,
        }
    }

    /// Absolute path of the installation root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Whether the root was already present before this run.
    #[must_use]
    pub const fn existed_before_run(&self) -> bool {
        self.existed_before_run
    }
}

/// Validate the configured root and make it absolute, without touching disk.
///
/// # Errors
///
/// Returns [`ConfigError::MissingTarget`] when the value is absent or blank,
/// [`ConfigError::CurrentDir`] when a relative value cannot be anchored to
/// the current directory, and [`ConfigError::NonUtf8Path`] when the anchored
/// path is not valid UTF-8.
pub fn configured_root(configured: Option<&str>) -> Result<Utf8PathBuf, ConfigError> {
    let raw = configured
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::MissingTarget)?;

    let path = Utf8Path::new(raw);
    if path.is_absolute() {
        return Ok(path.to_owned());
    }

    let absolute = std::path::absolute(path.as_std_path())
        .map_err(|source| ConfigError::CurrentDir { source })?;
    Utf8PathBuf::try_from(absolute).map_err(|err| ConfigError::NonUtf8Path {
        path: err.into_path_buf().display().to_string(),
    })
}

/// Resolve the installation root, creating it when absent.
///
/// The start-of-run event is announced after validation succeeds and before
/// anything is created.
///
/// # Errors
///
/// Returns a [`ConfigError`] when the value is missing, names a non-directory,
/// or the directory cannot be created.
pub fn resolve(
    configured: Option<&str>,
    progress: &mut Progress<'_>,
) -> Result<InstallationTarget, ConfigError> {
    let root = configured_root(configured)?;
    progress.announce(&ProgressEvent::Started { root: &root });

    if root.is_dir() {
        debug!("installation root {root} already exists");
        progress.announce(&ProgressEvent::ExistingTarget { root: &root });
        return Ok(InstallationTarget {
            root,
            existed_before_run: true,
        });
    }

    if root.exists() {
        return Err(ConfigError::NotADirectory { path: root });
    }

    fs::create_dir_all(&root).map_err(|source| ConfigError::CannotCreate {
        path: root.clone(),
        source,
    })?;
    debug!("created installation root {root}");
    progress.announce(&ProgressEvent::CreatedTarget { root: &root });

    Ok(InstallationTarget {
        root,
        existed_before_run: false,
    })
}
