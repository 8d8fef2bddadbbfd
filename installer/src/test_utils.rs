//! Shared test utilities for the deployment crate.
//!
//! Available to unit tests and, through the `test-support` feature, to the
//! behaviour suites under `tests/`.

use crate::builder::PrimaryBuild;
use crate::error::BuildError;
use crate::executor::CommandExecutor;
use crate::manifest::Manifest;
use crate::target::InstallationTarget;
use camino::{Utf8Path, Utf8PathBuf};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with empty stdout and stderr.
pub fn success_output() -> Output {
    Output {
        status: exit_status(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The command to execute (e.g., "cargo").
    pub cmd: &'static str,
    /// The arguments to pass to the command.
    pub args: Vec<String>,
    /// The result to return when this command is invoked.
    pub result: io::Result<Output>,
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Records expected command invocations and returns predefined results,
/// allowing tests to verify command execution without side effects.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
        }
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> io::Result<Output> {
        let mut expected = self.expected.borrow_mut();
        let call = expected.pop_front().expect("unexpected command invocation");

        assert_eq!(call.cmd, cmd);
        assert_eq!(call.args, args);

        call.result
    }
}

/// A primary build that records the roots it installs into.
#[derive(Debug, Default)]
pub struct RecordingBuild {
    roots: RefCell<Vec<Utf8PathBuf>>,
    fail: Cell<bool>,
}

impl RecordingBuild {
    /// A build that always succeeds.
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// A build that always fails with an install error.
    pub fn failing() -> Self {
        let build = Self::default();
        build.fail.set(true);
        build
    }

    /// Roots the build was asked to install into, in call order.
    pub fn roots(&self) -> Vec<Utf8PathBuf> {
        self.roots.borrow().clone()
    }
}

impl PrimaryBuild for RecordingBuild {
    fn build_and_install(&self, target: &InstallationTarget) -> Result<(), BuildError> {
        self.roots.borrow_mut().push(target.root().to_owned());
        if self.fail.get() {
            return Err(BuildError::InstallFailed {
                status: "exit status: 101".to_owned(),
                stderr: "error: could not compile `rd`".to_owned(),
            });
        }
        std::fs::create_dir_all(target.root().join("bin"))
            .and_then(|()| std::fs::write(target.root().join("bin/rd"), b"rd"))
            .map_err(|source| BuildError::Spawn {
                program: "cargo".to_owned(),
                source,
            })
    }
}

/// Write a file for every manifest entry under `build_root`.
///
/// Each file's content names its source path, so different entries never
/// compare equal.
///
/// # Panics
///
/// Panics if a file cannot be written.
pub fn populate_build_output(build_root: &Utf8Path, manifest: &Manifest) {
    for entry in manifest.entries() {
        let path = entry.source_path(build_root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create build output dir");
        }
        std::fs::write(&path, format!("built {}\n", entry.source))
            .expect("failed to write build output");
    }
}

/// Convert a temporary directory path into a UTF-8 path.
///
/// # Panics
///
/// Panics if the path is not valid UTF-8.
pub fn utf8_path(path: &std::path::Path) -> Utf8PathBuf {
    Utf8PathBuf::try_from(path.to_path_buf()).expect("temp dir path not UTF-8")
}
