//! Primary build delegation.
//!
//! The rd binary itself is built and installed by `cargo install`; this module
//! wraps that call behind [`PrimaryBuild`] so the rest of the deployment never
//! depends on cargo directly.

use crate::error::BuildError;
use crate::executor::CommandExecutor;
use crate::target::InstallationTarget;
use camino::Utf8PathBuf;
use log::debug;

/// Builds the primary package and installs it into an installation root.
#[cfg_attr(test, mockall::automock)]
pub trait PrimaryBuild {
    /// Build the primary package and install it under `target`.
    ///
    /// # Errors
    ///
    /// Returns a [`BuildError`] if the build tool cannot be run or fails.
    fn build_and_install(&self, target: &InstallationTarget) -> Result<(), BuildError>;
}

/// Cargo profile the primary package is built with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Profile {
    /// Optimised build (`target/release`).
    #[default]
    Release,
    /// Unoptimised build (`target/debug`).
    Debug,
}

impl Profile {
    /// Name of the profile's directory under `target/`.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Release => "release",
            Self::Debug => "debug",
        }
    }
}

/// Configuration for the `cargo install` invocation.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Package directory passed to `--path`.
    pub source_dir: Utf8PathBuf,
    /// Build profile.
    pub profile: Profile,
    /// Number of parallel build jobs (None for cargo default).
    pub jobs: Option<usize>,
    /// Cargo verbosity level (number of `-v` flags).
    pub verbosity: u8,
}

impl BuildConfig {
    /// Arguments passed to `cargo` to install into `root`.
    ///
    /// The install is locked to `Cargo.lock` and forced so that previously
    /// installed binaries are replaced.
    #[must_use]
    pub fn install_args(&self, root: &camino::Utf8Path) -> Vec<String> {
        let mut args = vec![
            "install".to_owned(),
            "--locked".to_owned(),
            "--force".to_owned(),
            "--path".to_owned(),
            self.source_dir.to_string(),
            "--root".to_owned(),
            root.to_string(),
        ];
        if self.profile == Profile::Debug {
            args.push("--debug".to_owned());
        }
        if let Some(jobs) = self.jobs {
            args.push("-j".to_owned());
            args.push(jobs.to_string());
        }
        for _ in 0..self.verbosity {
            args.push("-v".to_owned());
        }
        args
    }
}

/// Installs the primary package with `cargo install`.
pub struct CargoInstall<'a> {
    config: BuildConfig,
    executor: &'a dyn CommandExecutor,
}

impl<'a> CargoInstall<'a> {
    /// Create a cargo-backed build delegate.
    #[must_use]
    pub fn new(config: BuildConfig, executor: &'a dyn CommandExecutor) -> Self {
        Self { config, executor }
    }
}

impl PrimaryBuild for CargoInstall<'_> {
    fn build_and_install(&self, target: &InstallationTarget) -> Result<(), BuildError> {
        let args = self.config.install_args(target.root());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        debug!("running cargo {}", args.join(" "));

        let output = self
            .executor
            .run("cargo", &arg_refs)
            .map_err(|source| BuildError::Spawn {
                program: "cargo".to_owned(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BuildError::InstallFailed {
                status: output.status.to_string(),
                stderr: stderr.trim().to_owned(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
