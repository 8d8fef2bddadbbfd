//! CLI argument definitions for the rd deployment tool.
//!
//! Kept apart from the entrypoint so the argument surface can be parsed and
//! tested without running a deployment.

use crate::builder::{BuildConfig, Profile};
use crate::compare::ComparePolicy;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// Build rd and deploy its runtime files into an installation root.
#[derive(Parser, Debug)]
#[command(name = "rd-deploy")]
#[command(version, about)]
#[command(long_about = concat!(
    "Build rd and deploy its runtime files into an installation root.\n\n",
    "The rd binary is built and installed with `cargo install`. The files rd ",
    "needs at run time (page images, preload sources, preload libraries and ",
    "exec stubs) are then copied from the build output into the same root, ",
    "with the permissions rd expects.\n\n",
    "Files that already match their build output are left untouched, so ",
    "repeated runs are cheap.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Build and deploy into /opt/rd:\n",
    "    $ rd-deploy --prefix /opt/rd\n\n",
    "  Deploy an existing build without rebuilding:\n",
    "    $ rd-deploy --prefix /opt/rd --skip-build\n\n",
    "  Check an installation:\n",
    "    $ rd-deploy status --prefix /opt/rd\n\n",
    "  Preview without touching the filesystem:\n",
    "    $ rd-deploy --prefix /opt/rd --dry-run",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Deploy arguments (used when no subcommand is given).
    #[command(flatten)]
    pub deploy: DeployArgs,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build and deploy (default when no subcommand given).
    Deploy(DeployArgs),

    /// Report the state of an installation root.
    Status(StatusArgs),
}

/// Arguments for the deploy command.
#[derive(Parser, Debug, Clone)]
pub struct DeployArgs {
    /// Installation root.
    #[arg(long, env = "PREFIX", value_name = "DIR")]
    pub prefix: Option<String>,

    /// Package directory of rd [default: nearest Cargo.toml package].
    #[arg(long, value_name = "DIR")]
    pub source_dir: Option<Utf8PathBuf>,

    /// Build output root holding the runtime files [default: discovered].
    #[arg(long, value_name = "DIR")]
    pub build_dir: Option<Utf8PathBuf>,

    /// Build with the debug profile instead of release.
    #[arg(long)]
    pub debug: bool,

    /// Number of parallel cargo build jobs.
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Increase cargo output verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,

    /// Deploy existing build output without running cargo.
    #[arg(long)]
    pub skip_build: bool,

    /// Show the plan and exit without building or copying.
    #[arg(long)]
    pub dry_run: bool,

    /// How existing files are judged up to date.
    #[arg(long, value_enum, default_value_t = ComparePolicy::Content)]
    pub compare: ComparePolicy,
}

/// Arguments for the status command.
#[derive(Parser, Debug, Clone, Default)]
pub struct StatusArgs {
    /// Installation root to inspect.
    #[arg(long, env = "PREFIX", value_name = "DIR")]
    pub prefix: Option<String>,

    /// Build output root to compare against.
    #[arg(long, value_name = "DIR")]
    pub build_dir: Option<Utf8PathBuf>,

    /// Output in JSON format for scripting.
    #[arg(long)]
    pub json: bool,
}

impl DeployArgs {
    /// Build profile selected by `--debug`.
    #[must_use]
    pub const fn profile(&self) -> Profile {
        if self.debug {
            Profile::Debug
        } else {
            Profile::Release
        }
    }

    /// Cargo configuration for the package in `source_dir`.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8PathBuf;
    /// use rd_deploy::cli::DeployArgs;
    ///
    /// let args = DeployArgs { jobs: Some(4), ..DeployArgs::default() };
    /// let config = args.build_config(Utf8PathBuf::from("/src/rd"));
    /// assert_eq!(config.jobs, Some(4));
    /// ```
    #[must_use]
    pub fn build_config(&self, source_dir: Utf8PathBuf) -> BuildConfig {
        BuildConfig {
            source_dir,
            profile: self.profile(),
            jobs: self.jobs,
            verbosity: self.verbosity,
        }
    }
}

impl Default for DeployArgs {
    /// Creates a `DeployArgs` with no root configured and every flag off.
    ///
    /// # Examples
    ///
    /// ```
    /// use rd_deploy::cli::DeployArgs;
    ///
    /// let args = DeployArgs::default();
    /// assert!(args.prefix.is_none());
    /// assert!(!args.skip_build);
    /// ```
    fn default() -> Self {
        Self {
            prefix: None,
            source_dir: None,
            build_dir: None,
            debug: false,
            jobs: None,
            verbosity: 0,
            quiet: false,
            skip_build: false,
            dry_run: false,
            compare: ComparePolicy::Content,
        }
    }
}

impl Cli {
    /// Returns the effective deploy arguments.
    ///
    /// A `deploy` subcommand wins over the flattened top-level flags. When
    /// `status` is active the flattened defaults are returned; check
    /// `self.command` first if that case matters.
    #[must_use]
    pub fn deploy_args(&self) -> &DeployArgs {
        match &self.command {
            Some(Command::Deploy(args)) => args,
            Some(Command::Status(_)) | None => &self.deploy,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
