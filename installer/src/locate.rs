//! Discovery of the package directory and of the primary build's output.
//!
//! The rd build script writes its runtime files to cargo's per-package
//! `OUT_DIR`, whose name carries a hash. When no build directory is given the
//! most recently modified `target/<profile>/build/rd-*/out` is used.

use crate::builder::Profile;
use crate::error::ConfigError;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, trace};
use std::time::SystemTime;

/// Find the nearest directory at or above `start` whose `Cargo.toml` declares
/// a `[package]`.
///
/// # Errors
///
/// Returns [`ConfigError::PackageNotFound`] when no such directory exists.
pub fn find_package_root(start: &Utf8Path) -> Result<Utf8PathBuf, ConfigError> {
    let mut current = Some(start);

    while let Some(dir) = current {
        let cargo_toml = dir.join("Cargo.toml");
        if cargo_toml.is_file() && declares_package(&cargo_toml) {
            debug!("using package root {dir}");
            return Ok(dir.to_owned());
        }
        current = dir.parent();
    }

    Err(ConfigError::PackageNotFound {
        start: start.to_owned(),
    })
}

/// Check if a `Cargo.toml` file contains a `[package]` section.
fn declares_package(cargo_toml: &Utf8Path) -> bool {
    std::fs::read_to_string(cargo_toml)
        .ok()
        .and_then(|contents| contents.parse::<toml::Table>().ok())
        .is_some_and(|table| table.contains_key("package"))
}

/// Glob pattern matching the build script output directories.
#[must_use]
pub fn build_output_pattern(source_dir: &Utf8Path, profile: Profile) -> String {
    let base = source_dir
        .join("target")
        .join(profile.dir_name())
        .join("build");
    format!("{}/rd-*/out", glob::Pattern::escape(base.as_str()))
}

/// Locate the most recently modified build output directory.
///
/// # Errors
///
/// Returns [`ConfigError::BuildOutputNotFound`] when nothing matches.
pub fn locate_build_output(
    source_dir: &Utf8Path,
    profile: Profile,
) -> Result<Utf8PathBuf, ConfigError> {
    let pattern = build_output_pattern(source_dir, profile);
    let not_found = || ConfigError::BuildOutputNotFound {
        pattern: pattern.clone(),
    };

    let candidates = glob::glob(&pattern).map_err(|_| not_found())?;

    let newest = candidates
        .filter_map(std::result::Result::ok)
        .filter(|path| path.is_dir())
        .filter_map(|path| Utf8PathBuf::try_from(path).ok())
        .map(|path| {
            let modified = path
                .metadata()
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            trace!("build output candidate {path}");
            (modified, path)
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, path)| path);

    newest.ok_or_else(not_found)
}
