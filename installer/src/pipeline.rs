//! Deployment orchestration.
//!
//! Sequences target resolution, the primary build, build output discovery and
//! manifest deployment. Every step returns a `Result` and the first failure
//! ends the run; files already deployed are left in place.

use crate::builder::{PrimaryBuild, Profile};
use crate::compare::ComparePolicy;
use crate::deployer::{CopyAction, Deployer, EntryOutcome};
use crate::error::Result;
use crate::locate::{build_output_pattern, locate_build_output};
use crate::manifest::Manifest;
use crate::progress::{Progress, ProgressEvent};
use crate::target::{self, configured_root};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;

/// Inputs of one deployment run.
#[derive(Debug, Clone, Copy)]
pub struct DeployRequest<'a> {
    /// Configured installation root, as given by the user.
    pub prefix: Option<&'a str>,
    /// Package directory of the primary build.
    pub source_dir: &'a Utf8Path,
    /// Explicit build output root; discovered under `source_dir` when absent.
    pub build_dir: Option<&'a Utf8Path>,
    /// Profile the primary package is built with.
    pub profile: Profile,
    /// Freshness policy for existing destinations.
    pub policy: ComparePolicy,
    /// Artefacts to deploy.
    pub manifest: &'a Manifest,
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentSummary {
    /// Installation root that was provisioned.
    pub root: Utf8PathBuf,
    /// Build output root the artefacts were read from.
    pub build_root: Utf8PathBuf,
    /// Per-entry outcomes in manifest order.
    pub outcomes: Vec<EntryOutcome>,
}

impl DeploymentSummary {
    /// Number of files written.
    #[must_use]
    pub fn copied(&self) -> usize {
        self.count(CopyAction::Copied)
    }

    /// Number of files that were already up to date.
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
}

/// Run a full deployment.
///
/// `build` is `None` when the primary build is skipped.
///
/// # Errors
///
/// Returns the first configuration, build or deployment error encountered.
pub fn run_deployment(
    request: &DeployRequest<'_>,
    build: Option<&dyn PrimaryBuild>,
    progress: &mut Progress<'_>,
) -> Result<DeploymentSummary> {
    let target = target::resolve(request.prefix, progress)?;

    match build {
        Some(build) => {
            progress.announce(&ProgressEvent::Building {
                source_dir: request.source_dir,
            });
            build.build_and_install(&target)?;
        }
        None => progress.announce(&ProgressEvent::BuildSkipped),
    }

    let build_root = match request.build_dir {
        Some(dir) => dir.to_owned(),
        None => locate_build_output(request.source_dir, request.profile)?,
    };
    debug!("reading build output from {build_root}");

    progress.announce(&ProgressEvent::Deploying {
        count: request.manifest.len(),
        build_root: &build_root,
    });
    let outcomes = Deployer::new(&build_root, &target, request.policy)
        .deploy(request.manifest, progress)
        .into_result()?;

    let summary = DeploymentSummary {
        root: target.root().to_owned(),
        build_root,
        outcomes,
    };
    progress.announce(&ProgressEvent::Completed {
        root: &summary.root,
        copied: summary.copied(),
        unchanged: summary.unchanged(),
    });
    Ok(summary)
}

/// Describe what a run would do, without touching the filesystem.
///
/// # Errors
///
/// Returns a configuration error when the installation root is missing.
pub fn describe_plan(
    request: &DeployRequest<'_>,
    build_command: Option<&[String]>,
) -> Result<String> {
    let root = configured_root(request.prefix)?;
    let build_root = request.build_dir.map_or_else(
        || build_output_pattern(request.source_dir, request.profile),
        ToString::to_string,
    );

    let mut lines = vec![
        "Dry run - no files will be modified".to_owned(),
        String::new(),
        format!("Installation root: {root}"),
        format!("Package directory: {}", request.source_dir),
        format!("Build output: {build_root}"),
        format!("Compare policy: {:?}", request.policy),
    ];
    match build_command {
        Some(args) => lines.push(format!("Build command: cargo {}", args.join(" "))),
        None => lines.push("Build command: skipped".to_owned()),
    }

    lines.push(String::new());
    lines.push("Files to deploy:".to_owned());
    for entry in request.manifest.entries() {
        lines.push(format!(
            "  {} ({:o})",
            entry.destination_path(&root),
            entry.mode
        ));
    }

    Ok(lines.join("\n"))
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
