//! Progress reporting for deployment runs.
//!
//! Progress lines go to an injected writer (stderr in the binary) so that tests
//! can capture them. Write failures are ignored; progress is best effort and
//! never changes the outcome of a run.

use crate::manifest::ArtifactKind;
use camino::Utf8Path;
use std::io::Write;

/// A point in a deployment run worth telling the user about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent<'a> {
    /// The run is starting; emitted before any filesystem mutation.
    Started {
        /// Installation root being provisioned.
        root: &'a Utf8Path,
    },
    /// The installation root already existed.
    ExistingTarget {
        /// Installation root being provisioned.
        root: &'a Utf8Path,
    },
    /// The installation root was created.
    CreatedTarget {
        /// Installation root being provisioned.
        root: &'a Utf8Path,
    },
    /// The primary build is about to run.
    Building {
        /// Package directory handed to the build tool.
        source_dir: &'a Utf8Path,
    },
    /// The primary build was skipped on request.
    BuildSkipped,
    /// Secondary artefacts are about to be deployed.
    Deploying {
        /// Number of manifest entries.
        count: usize,
        /// Build output root the entries are read from.
        build_root: &'a Utf8Path,
    },
    /// The deployer moved on to a new group of artefacts.
    Group {
        /// Kind shared by the following entries.
        kind: ArtifactKind,
        /// Destination directory of the group.
        destination: &'a Utf8Path,
    },
    /// A file was written.
    Copied {
        /// Destination file.
        path: &'a Utf8Path,
    },
    /// A file was already up to date.
    Unchanged {
        /// Destination file.
        path: &'a Utf8Path,
    },
    /// Every step succeeded.
    Completed {
        /// Installation root that was provisioned.
        root: &'a Utf8Path,
        /// Number of files written.
        copied: usize,
        /// Number of files left untouched.
        unchanged: usize,
    },
}

/// Writes progress lines for a run.
pub struct Progress<'w> {
    sink: &'w mut dyn Write,
    quiet: bool,
}

impl<'w> Progress<'w> {
    /// Create a reporter writing to `sink`; `quiet` suppresses every line.
    pub fn new(sink: &'w mut dyn Write, quiet: bool) -> Self {
        Self { sink, quiet }
    }

    /// Report an event.
    pub fn announce(&mut self, event: &ProgressEvent<'_>) {
        if self.quiet {
            return;
        }
        match *event {
            ProgressEvent::Started { root } => {
                write_stderr_line(self.sink, format!("Deploying rd to {root}"));
            }
            ProgressEvent::ExistingTarget { root } => {
                write_stderr_line(self.sink, format!("Installing into existing directory {root}"));
                write_stderr_line(
                    self.sink,
                    "Warning: existing subdirectories will be populated, not cleared",
                );
            }
            ProgressEvent::CreatedTarget { root } => {
                write_stderr_line(self.sink, format!("Created installation root {root}"));
            }
            ProgressEvent::Building { source_dir } => {
                write_stderr_line(
                    self.sink,
                    format!("Building and installing rd from {source_dir}..."),
                );
            }
            ProgressEvent::BuildSkipped => {
                write_stderr_line(self.sink, "Skipping primary build (--skip-build)");
            }
            ProgressEvent::Deploying { count, build_root } => {
                write_stderr_line(self.sink, "");
                write_stderr_line(
                    self.sink,
                    format!("Deploying {count} runtime file(s) from {build_root}..."),
                );
            }
            ProgressEvent::Group { kind, destination } => {
                write_stderr_line(self.sink, format!("  {kind} -> {destination}"));
            }
            ProgressEvent::Copied { path } => {
                write_stderr_line(self.sink, format!("    installed {path}"));
            }
            ProgressEvent::Unchanged { path } => {
                write_stderr_line(self.sink, format!("    unchanged {path}"));
            }
            ProgressEvent::Completed {
                root,
                copied,
                unchanged,
            } => {
                write_stderr_line(self.sink, "");
                write_stderr_line(self.sink, success_message(root, copied, unchanged));
            }
        }
    }
}

/// Format the completion message.
#[must_use]
pub fn success_message(root: &Utf8Path, copied: usize, unchanged: usize) -> String {
    format!("Successfully deployed rd to {root} ({copied} installed, {unchanged} unchanged)")
}

/// Write a line to `stderr`, ignoring failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}
