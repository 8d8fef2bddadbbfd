//! Behaviour-driven tests for deploying rd runtime files.
//!
//! These scenarios drive the library pipeline end to end against a temporary
//! build output and installation root.

use camino::{Utf8Path, Utf8PathBuf};
use rd_deploy::builder::{BuildConfig, CargoInstall, PrimaryBuild, Profile};
use rd_deploy::compare::ComparePolicy;
use rd_deploy::error::{ConfigError, DeployError, InstallerError};
use rd_deploy::manifest::{ArchVariant, ArtifactKind, Manifest, RD_ARTIFACTS};
use rd_deploy::pipeline::{DeployRequest, DeploymentSummary, run_deployment};
use rd_deploy::progress::Progress;
use rd_deploy::test_utils::{
    ExpectedCall, RecordingBuild, StubExecutor, populate_build_output, success_output, utf8_path,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Deploy world
// ---------------------------------------------------------------------------

#[derive(Default)]
struct DeployWorld {
    base: RefCell<Utf8PathBuf>,
    build_root: RefCell<Utf8PathBuf>,
    root: RefCell<Utf8PathBuf>,
    prefix: RefCell<Option<String>>,
    manifest: RefCell<Manifest>,
    build: RecordingBuild,
    executor: RefCell<Option<StubExecutor>>,
    result: RefCell<Option<Result<DeploymentSummary, InstallerError>>>,
    // Keep temp_dir alive for the lifetime of the scenario.
    _temp_dir: RefCell<Option<TempDir>>,
}

impl DeployWorld {
    fn run(&self, build: Option<&dyn PrimaryBuild>) -> Result<DeploymentSummary, InstallerError> {
        let base = self.base.borrow();
        let build_root = self.build_root.borrow();
        let prefix = self.prefix.borrow();
        let manifest = self.manifest.borrow();
        let request = DeployRequest {
            prefix: prefix.as_deref(),
            source_dir: &base,
            build_dir: Some(build_root.as_path()),
            profile: Profile::Release,
            policy: ComparePolicy::Content,
            manifest: &manifest,
        };
        let mut sink = Vec::new();
        let mut progress = Progress::new(&mut sink, true);
        run_deployment(&request, build, &mut progress)
    }

    fn build_config(&self) -> BuildConfig {
        BuildConfig {
            source_dir: self.base.borrow().clone(),
            profile: Profile::Release,
            jobs: None,
            verbosity: 0,
        }
    }

    fn root(&self) -> Utf8PathBuf {
        self.root.borrow().clone()
    }

    fn deployed(&self, source: &str) -> bool {
        RD_ARTIFACTS
            .iter()
            .find(|entry| entry.source == source)
            .is_some_and(|entry| entry.destination_path(&self.root()).is_file())
    }
}

#[fixture]
fn deploy_world() -> DeployWorld {
    DeployWorld::default()
}

#[given("a completed rd build output")]
fn given_build_output(deploy_world: &DeployWorld) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let base = utf8_path(temp_dir.path());
    let build_root = base.join("target/release/build/rd-5f1e2d3c/out");
    let root = base.join("prefix");
    populate_build_output(&build_root, &Manifest::standard());

    deploy_world.prefix.replace(Some(root.to_string()));
    deploy_world.base.replace(base);
    deploy_world.build_root.replace(build_root);
    deploy_world.root.replace(root);
    deploy_world._temp_dir.replace(Some(temp_dir));
}

#[given("no installation root is configured")]
fn given_no_root(deploy_world: &DeployWorld) {
    deploy_world.prefix.replace(None);
}

#[given("the installation root already holds a deployment")]
fn given_existing_deployment(deploy_world: &DeployWorld) {
    deploy_world.run(None).expect("initial deployment failed");
}

#[given("only preload sources are deployed")]
fn given_preload_only(deploy_world: &DeployWorld) {
    let entries = RD_ARTIFACTS
        .iter()
        .copied()
        .filter(|entry| entry.kind == ArtifactKind::PreloadSource)
        .collect();
    deploy_world.manifest.replace(Manifest::new(entries));
}

#[given("the third preload source is missing from the build output")]
fn given_third_preload_missing(deploy_world: &DeployWorld) {
    let manifest = deploy_world.manifest.borrow();
    let third = manifest.entries().get(2).expect("manifest too short");
    std::fs::remove_file(third.source_path(&deploy_world.build_root.borrow()))
        .expect("failed to remove source");
}

#[given("cargo is expected to install rd into the root")]
fn given_cargo_expected(deploy_world: &DeployWorld) {
    let args = deploy_world.build_config().install_args(&deploy_world.root());
    deploy_world
        .executor
        .replace(Some(StubExecutor::new(vec![ExpectedCall {
            cmd: "cargo",
            args,
            result: Ok(success_output()),
        }])));
}

#[when("the deployment runs")]
fn when_deployment_runs(deploy_world: &DeployWorld) {
    let result = deploy_world.run(Some(&deploy_world.build));
    deploy_world.result.replace(Some(result));
}

#[when("the deployment runs with the cargo build")]
fn when_deployment_runs_with_cargo(deploy_world: &DeployWorld) {
    let executor = deploy_world.executor.borrow();
    let executor = executor.as_ref().expect("executor not set");
    let cargo = CargoInstall::new(deploy_world.build_config(), executor);
    let result = deploy_world.run(Some(&cargo));
    deploy_world.result.replace(Some(result));
}

#[then("the deployment succeeds")]
fn then_deployment_succeeds(deploy_world: &DeployWorld) {
    let result = deploy_world.result.borrow();
    let result = result.as_ref().expect("result not set");
    assert!(result.is_ok(), "expected success, got {result:?}");
}

#[then("the installation root has the standard layout")]
fn then_standard_layout(deploy_world: &DeployWorld) {
    let root = deploy_world.root();
    for dir in Manifest::standard().destination_dirs() {
        assert!(root.join(dir).is_dir(), "{dir} missing");
    }
    assert_eq!(deploy_world.build.roots(), vec![root.clone()]);
    assert!(root.join("bin/rd").is_file());
}

#[then("every runtime file is present under the root")]
fn then_every_file_present(deploy_world: &DeployWorld) {
    for entry in RD_ARTIFACTS {
        assert!(deploy_world.deployed(entry.source), "{} missing", entry.source);
    }
}

#[then("no files are copied")]
fn then_no_files_copied(deploy_world: &DeployWorld) {
    let result = deploy_world.result.borrow();
    let summary = result
        .as_ref()
        .expect("result not set")
        .as_ref()
        .expect("deployment failed");
    assert_eq!(summary.copied(), 0);
    assert_eq!(summary.unchanged(), RD_ARTIFACTS.len());
}

#[then("the deployment fails with a configuration error")]
fn then_config_error(deploy_world: &DeployWorld) {
    let result = deploy_world.result.borrow();
    let result = result.as_ref().expect("result not set");
    assert!(
        matches!(result, Err(InstallerError::Config(ConfigError::MissingTarget))),
        "expected MissingTarget, got {result:?}"
    );
}

#[then("the primary build is never started")]
fn then_build_not_started(deploy_world: &DeployWorld) {
    assert!(deploy_world.build.roots().is_empty());
}

#[then("nothing is created under the workspace")]
fn then_nothing_created(deploy_world: &DeployWorld) {
    assert!(!deploy_world.root().exists());
}

#[then("the deployment fails naming the missing source")]
fn then_fails_naming_source(deploy_world: &DeployWorld) {
    let result = deploy_world.result.borrow();
    match result.as_ref().expect("result not set") {
        Err(InstallerError::Deploy(DeployError::MissingSource { path })) => {
            assert!(path.ends_with("src/preload/raw_syscall.S"), "unexpected path {path}");
        }
        other => panic!("expected MissingSource, got {other:?}"),
    }
}

#[then("only the first two preload sources are deployed")]
fn then_first_two_deployed(deploy_world: &DeployWorld) {
    let manifest = deploy_world.manifest.borrow();
    for (index, entry) in manifest.entries().iter().enumerate() {
        assert_eq!(
            deploy_world.deployed(entry.source),
            index < 2,
            "unexpected state for {}",
            entry.source
        );
    }
}

#[cfg(unix)]
#[then("exec stubs have mode 0755 and every other file has mode 0644")]
fn then_modes_follow_kind(deploy_world: &DeployWorld) {
    for entry in RD_ARTIFACTS {
        let expected = if entry.kind == ArtifactKind::ExecStub {
            0o755
        } else {
            0o644
        };
        assert_eq!(
            mode_of(&entry.destination_path(&deploy_world.root())),
            expected,
            "wrong mode on {}",
            entry.source
        );
    }
}

#[cfg(unix)]
fn mode_of(path: &Utf8Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .expect("failed to stat deployed file")
        .permissions()
        .mode()
        & 0o7777
}

#[then("both word sizes of each library and stub are deployed")]
fn then_both_word_sizes(deploy_world: &DeployWorld) {
    for kind in [ArtifactKind::Library, ArtifactKind::ExecStub] {
        for arch in [ArchVariant::Primary, ArchVariant::Secondary] {
            let entry = RD_ARTIFACTS
                .iter()
                .find(|entry| entry.kind == kind && entry.arch == Some(arch))
                .expect("manifest lacks variant");
            assert!(deploy_world.deployed(entry.source), "{arch} {kind} missing");
        }
    }
}

#[then("cargo was invoked exactly as expected")]
fn then_cargo_invoked(deploy_world: &DeployWorld) {
    let executor = deploy_world.executor.borrow();
    executor
        .as_ref()
        .expect("executor not set")
        .assert_finished();
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(path = "tests/features/deploy.feature", index = 0)]
fn scenario_fresh_install(deploy_world: DeployWorld) {
    let _ = deploy_world;
}

#[scenario(path = "tests/features/deploy.feature", index = 1)]
fn scenario_redeploy_is_idempotent(deploy_world: DeployWorld) {
    let _ = deploy_world;
}

#[scenario(path = "tests/features/deploy.feature", index = 2)]
fn scenario_missing_root_aborts(deploy_world: DeployWorld) {
    let _ = deploy_world;
}

#[scenario(path = "tests/features/deploy.feature", index = 3)]
fn scenario_missing_source_stops_deployment(deploy_world: DeployWorld) {
    let _ = deploy_world;
}

#[cfg(unix)]
#[scenario(path = "tests/features/deploy.feature", index = 4)]
fn scenario_modes_follow_kind(deploy_world: DeployWorld) {
    let _ = deploy_world;
}

#[scenario(path = "tests/features/deploy.feature", index = 5)]
fn scenario_both_word_sizes(deploy_world: DeployWorld) {
    let _ = deploy_world;
}

#[scenario(path = "tests/features/deploy.feature", index = 6)]
fn scenario_cargo_install_delegation(deploy_world: DeployWorld) {
    let _ = deploy_world;
}
