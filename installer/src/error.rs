//! Error types for the rd deployment tool.
//!
//! Each deployment step has its own error enum so that the failing step can be
//! identified from the variant alone. [`InstallerError`] wraps all of them for
//! the top-level driver and maps each category to a process exit code.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors raised while resolving configuration and input locations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No installation root was configured, or it was empty.
    #[error("no installation root configured; pass --prefix or set PREFIX")]
    MissingTarget,

    /// A configured or discovered path is not valid UTF-8.
    #[error("path is not valid UTF-8: {path}")]
    NonUtf8Path {
        /// Lossy rendering of the offending path.
        path: String,
    },

    /// The installation root exists but is not a directory.
    #[error("installation root {path} exists and is not a directory")]
    NotADirectory {
        /// The configured root.
        path: Utf8PathBuf,
    },

    /// The installation root could not be created.
    #[error("cannot create installation root {path}: {source}")]
    CannotCreate {
        /// The root that could not be created.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The working directory could not be determined.
    #[error("cannot determine the current directory: {source}")]
    CurrentDir {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No `Cargo.toml` declaring a package was found above the start directory.
    #[error("no Cargo package found at or above {start}")]
    PackageNotFound {
        /// Directory the search started from.
        start: Utf8PathBuf,
    },

    /// The build output directory could not be located.
    #[error("no build output found matching {pattern}; pass --build-dir")]
    BuildOutputNotFound {
        /// Glob pattern that was searched.
        pattern: String,
    },
}

/// Errors raised by the primary build delegate.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The build tool could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The build tool ran and reported failure.
    #[error("cargo install failed ({status}): {stderr}")]
    InstallFailed {
        /// Rendered exit status.
        status: String,
        /// Captured standard error, trimmed.
        stderr: String,
    },
}

/// Errors raised while placing manifest entries into the installation root.
#[derive(Debug, Error)]
pub enum DeployError {
    /// A destination directory could not be created.
    #[error("cannot create directory {path}: {source}")]
    DirectoryCreate {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An expected build output is absent.
    #[error("missing build output {path}")]
    MissingSource {
        /// The missing source path.
        path: Utf8PathBuf,
    },

    /// Copying an artefact failed.
    #[error("failed to copy {source_path} to {destination}: {source}")]
    CopyFailed {
        /// Source of the copy.
        source_path: Utf8PathBuf,
        /// Destination of the copy.
        destination: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Setting permission bits on a deployed artefact failed.
    #[error("failed to set mode {mode:o} on {path}: {source}")]
    PermissionFailed {
        /// The deployed file.
        path: Utf8PathBuf,
        /// Requested mode.
        mode: u32,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Reading metadata or contents of an artefact failed.
    #[error("failed to inspect {path}: {source}")]
    Inspect {
        /// The inspected path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can end a deployment run.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// Configuration was missing or invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The primary build failed.
    #[error("build failed: {0}")]
    Build(#[from] BuildError),

    /// Placing secondary artefacts failed.
    #[error("deployment failed: {0}")]
    Deploy(#[from] DeployError),

    /// Failed to write output.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },
}

impl InstallerError {
    /// Process exit code for this error category.
    ///
    /// Configuration errors exit with 2, build failures with 3, deployment
    /// failures with 4, and anything else with 1.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Build(_) => 3,
            Self::Deploy(_) => 4,
            _ => 1,
        }
    }
}

/// Result type alias using [`InstallerError`].
pub type Result<T> = std::result::Result<T, InstallerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn missing_target_mentions_prefix() {
        let msg = ConfigError::MissingTarget.to_string();
        assert!(msg.contains("--prefix"));
        assert!(msg.contains("PREFIX"));
    }

    #[test]
    fn missing_source_names_the_path() {
        let err = InstallerError::from(DeployError::MissingSource {
            path: Utf8PathBuf::from("/build/out/lib/rd/librdpreload.so"),
        });
        let msg = err.to_string();
        assert!(msg.starts_with("deployment failed"));
        assert!(msg.contains("/build/out/lib/rd/librdpreload.so"));
    }

    #[test]
    fn install_failed_includes_stderr() {
        let err = BuildError::InstallFailed {
            status: "exit status: 101".to_owned(),
            stderr: "error: could not compile `rd`".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("101"));
        assert!(msg.contains("could not compile"));
    }

    #[test]
    fn permission_failed_renders_octal_mode() {
        let err = DeployError::PermissionFailed {
            path: Utf8PathBuf::from("/opt/rd/bin/rd_exec_stub"),
            mode: 0o755,
            source: std::io::Error::other("operation not permitted"),
        };
        assert!(err.to_string().contains("mode 755"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[rstest]
    #[case::config(InstallerError::from(ConfigError::MissingTarget), 2)]
    #[case::build(
        InstallerError::from(BuildError::InstallFailed {
            status: "exit status: 1".to_owned(),
            stderr: String::new(),
        }),
        3
    )]
    #[case::deploy(
        InstallerError::from(DeployError::MissingSource { path: Utf8PathBuf::from("x") }),
        4
    )]
    #[case::write(
        InstallerError::WriteFailed { source: std::io::Error::other("closed") },
        1
    )]
    fn exit_code_reflects_category(#[case] err: InstallerError, #[case] expected: i32) {
        assert_eq!(err.exit_code(), expected);
    }
}
