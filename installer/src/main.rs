//! rd deployment CLI entrypoint.
//!
//! Builds rd with `cargo install` and deploys its runtime files into the
//! configured installation root, or reports the state of an existing root.

use camino::Utf8PathBuf;
use clap::Parser;
use rd_deploy::builder::{CargoInstall, PrimaryBuild};
use rd_deploy::cli::{Cli, Command, DeployArgs};
use rd_deploy::error::{ConfigError, Result};
use rd_deploy::executor::SystemCommandExecutor;
use rd_deploy::locate::find_package_root;
use rd_deploy::manifest::Manifest;
use rd_deploy::pipeline::{DeployRequest, describe_plan, run_deployment};
use rd_deploy::progress::{Progress, write_stderr_line};
use rd_deploy::status::run_status;
use rd_deploy::target::configured_root;
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<()> {
    match &cli.command {
        Some(Command::Status(args)) => run_status(args, stdout),
        Some(Command::Deploy(_)) | None => run_deploy(cli.deploy_args(), stderr),
    }
}

fn run_deploy(args: &DeployArgs, stderr: &mut dyn Write) -> Result<()> {
    let root = configured_root(args.prefix.as_deref())?;
    let source_dir = resolve_source_dir(args)?;
    let manifest = Manifest::standard();
    let request = DeployRequest {
        prefix: args.prefix.as_deref(),
        source_dir: &source_dir,
        build_dir: args.build_dir.as_deref(),
        profile: args.profile(),
        policy: args.compare,
        manifest: &manifest,
    };
    let config = args.build_config(source_dir.clone());

    if args.dry_run {
        let build_command = if args.skip_build {
            None
        } else {
            Some(config.install_args(&root))
        };
        let plan = describe_plan(&request, build_command.as_deref())?;
        write_stderr_line(stderr, plan);
        return Ok(());
    }

    let executor = SystemCommandExecutor;
    let cargo = CargoInstall::new(config, &executor);
    let build: Option<&dyn PrimaryBuild> = if args.skip_build {
        None
    } else {
        Some(&cargo)
    };

    let mut progress = Progress::new(stderr, args.quiet);
    run_deployment(&request, build, &mut progress)?;
    Ok(())
}

/// Package directory to build from.
///
/// Falls back to the nearest package above the working directory. When
/// nothing is built and the build output is given explicitly, the package is
/// never consulted and the working directory is used as is.
fn resolve_source_dir(args: &DeployArgs) -> Result<Utf8PathBuf> {
    if let Some(dir) = &args.source_dir {
        return Ok(dir.clone());
    }

    let cwd = std::env::current_dir().map_err(|source| ConfigError::CurrentDir { source })?;
    let cwd = Utf8PathBuf::try_from(cwd).map_err(|err| ConfigError::NonUtf8Path {
        path: err.into_path_buf().display().to_string(),
    })?;

    if args.skip_build && args.build_dir.is_some() {
        return Ok(cwd);
    }
    Ok(find_package_root(&cwd)?)
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            let code = err.exit_code();
            write_stderr_line(stderr, format!("error: {err}"));
            code
        }
    }
}
