mod common;

use common::{
    DummyFormat, FakeTools, Project, RecordingReporter, executable_bytes, tar_gz, write, zip,
};
use kodegen_bundler_create::bundler::{
    CreatePipeline, Error, HostEnvironment, Outcome, PathIndex, RunStatus, Stage,
};
use std::sync::atomic::Ordering;

fn outcome(summary: &kodegen_bundler_create::bundler::RunSummary, app: &str, stage: Stage) -> Option<Outcome> {
    summary
        .actions_for(app)
        .find(|record| record.stage == stage)
        .map(|record| record.outcome.clone())
}

#[tokio::test]
async fn creates_a_complete_bundle() {
    let project = Project::new(&["first"]);
    let env = project.env(|_| {});
    let format = DummyFormat::default();
    let reporter = RecordingReporter::default();

    let summary = CreatePipeline::new(&format, &env, &reporter)
        .run(vec![project.app("first")])
        .await
        .unwrap();

    assert_eq!(summary.status(), RunStatus::Success);
    assert_eq!(summary.status().exit_code(), 0);
    assert!(summary.app("first").unwrap().checksum.is_some());
    assert_eq!(reporter.finished.load(Ordering::SeqCst), 1);
    assert_eq!(reporter.records.lock().unwrap().len(), summary.actions.len());

    let bundle = project.bundle_dir("first");
    let rendered = std::fs::read_to_string(bundle.join("first app.txt")).unwrap();
    assert!(rendered.starts_with("first app 0.0.1\n"));
    assert!(bundle.join("path/to/app/first/app.py").is_file());
    assert!(bundle.join("path/to/app/first-0.0.1.dist-info/METADATA").is_file());
    assert!(!bundle.join("path/to/app/tests").exists());
    assert!(bundle.join("path/to/support/runtime/VERSION").is_file());

    let index = PathIndex::load(&bundle).await.unwrap().unwrap();
    assert_eq!(index.support_revision().unwrap(), Some(37));
    assert_eq!(project.downloader.calls(), 1);
    let url = &project.downloader.urls()[0];
    assert_eq!(url.path(), "/support");
    assert_eq!(
        url.query(),
        Some("platform=Tester&version=3.12&arch=x86_64&revision=37")
    );

    // No requirements means no installer run.
    assert!(project.subprocess.commands_for("python3").is_empty());
    assert_eq!(outcome(&summary, "first", Stage::InstallStubBinary), None);
}

#[tokio::test]
async fn rerun_skips_generation_and_support_download() {
    let project = Project::new(&["first"]);
    let env = project.env(|_| {});
    let format = DummyFormat::default();
    let reporter = RecordingReporter::default();
    let pipeline = CreatePipeline::new(&format, &env, &reporter);

    pipeline.run(vec![project.app("first")]).await.unwrap();
    assert_eq!(project.downloader.calls(), 1);

    // The second run needs a fresh environment: tool verification is per run.
    let env = project.env(|_| {});
    let summary = CreatePipeline::new(&format, &env, &reporter)
        .run(vec![project.app("first")])
        .await
        .unwrap();

    assert_eq!(summary.status(), RunStatus::Success);
    assert_eq!(project.downloader.calls(), 1);
    assert!(matches!(
        outcome(&summary, "first", Stage::GenerateAppTemplate),
        Some(Outcome::Skipped(_))
    ));
    assert!(matches!(
        outcome(&summary, "first", Stage::InstallAppSupportPackage),
        Some(Outcome::Skipped(_))
    ));
    assert_eq!(
        outcome(&summary, "first", Stage::InstallAppCode),
        Some(Outcome::Completed)
    );
}

#[tokio::test]
async fn changed_revision_fetches_exactly_once() {
    let project = Project::new(&["first"]);
    let format = DummyFormat::default();
    let reporter = RecordingReporter::default();

    let env = project.env(|_| {});
    CreatePipeline::new(&format, &env, &reporter)
        .run(vec![project.app("first")])
        .await
        .unwrap();

    let mut app = project.app("first");
    app.support_revision = Some(38);
    let env = project.env(|_| {});
    CreatePipeline::new(&format, &env, &reporter)
        .run(vec![app])
        .await
        .unwrap();

    assert_eq!(project.downloader.calls(), 2);
    let index = PathIndex::load(&project.bundle_dir("first")).await.unwrap().unwrap();
    assert_eq!(index.support_revision().unwrap(), Some(38));
}

#[tokio::test]
async fn test_mode_reinstall_adds_test_sources() {
    let project = Project::new(&["first", "second"]);
    let format = DummyFormat::default();
    let reporter = RecordingReporter::default();

    let env = project.env(|_| {});
    CreatePipeline::new(&format, &env, &reporter)
        .run(vec![project.app("first")])
        .await
        .unwrap();

    let env = project.env(|options| options.test_mode = true);
    let summary = CreatePipeline::new(&format, &env, &reporter)
        .run(vec![project.app("first")])
        .await
        .unwrap();
    assert_eq!(summary.status(), RunStatus::Success);

    let app_path = project.bundle_dir("first").join("path/to/app");
    assert!(app_path.join("first/app.py").is_file());
    assert!(app_path.join("tests/first.py").is_file());
    assert!(!app_path.join("second").exists());
}

#[tokio::test]
async fn reinstall_removes_code_from_earlier_runs() {
    let project = Project::new(&["first"]);
    let format = DummyFormat::default();
    let reporter = RecordingReporter::default();

    let env = project.env(|_| {});
    CreatePipeline::new(&format, &env, &reporter)
        .run(vec![project.app("first")])
        .await
        .unwrap();

    let app_path = project.bundle_dir("first").join("path/to/app");
    write(&app_path, "second/app.py", "# second\n");
    write(&app_path, "stale.py", "# stale\n");

    let env = project.env(|options| options.test_mode = true);
    let summary = CreatePipeline::new(&format, &env, &reporter)
        .run(vec![project.app("first")])
        .await
        .unwrap();

    assert_eq!(summary.status(), RunStatus::Success);
    assert!(!app_path.join("second").exists());
    assert!(!app_path.join("stale.py").exists());
    assert!(app_path.join("first/app.py").is_file());
    assert!(app_path.join("tests/first.py").is_file());
}

#[tokio::test]
async fn failing_app_does_not_stop_the_next() {
    let project = Project::new(&["first", "second"]);
    let env = project.env(|_| {});
    let format = DummyFormat::default();
    let reporter = RecordingReporter::default();

    let mut second = project.app("second");
    second.template = Some("missing-template".into());

    let summary = CreatePipeline::new(&format, &env, &reporter)
        .run(vec![project.app("first"), second])
        .await
        .unwrap();

    assert_eq!(summary.status(), RunStatus::Mixed);
    assert_eq!(summary.status().exit_code(), 1);
    assert!(
        outcome(&summary, "first", Stage::CleanupAppContent).is_some_and(|o| !o.is_failure())
    );
    assert!(summary.app("first").unwrap().succeeded());

    let report = summary.app("second").unwrap();
    let (stage, error) = report.failure.clone().unwrap();
    assert_eq!(stage, Stage::VerifyAppTemplate);
    assert!(error.contains("missing-template"));
    assert_eq!(outcome(&summary, "second", Stage::GenerateAppTemplate), None);
    assert!(!project.bundle_dir("second").exists());
}

#[tokio::test]
async fn unsupported_host_ends_the_run() {
    let project = Project::new(&["first"]);
    let mut env = project.env(|_| {});
    env.host = HostEnvironment::new("Plan9", "x86_64", ["Linux"]);
    let format = DummyFormat::default();
    let reporter = RecordingReporter::default();

    let result = CreatePipeline::new(&format, &env, &reporter)
        .run(vec![project.app("first")])
        .await;

    let error = result.unwrap_err();
    assert!(matches!(error, Error::HostUnsupported { .. }));
    assert!(!project.root().join("build").exists());
    let records = reporter.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].outcome.is_failure());
}

#[tokio::test]
async fn missing_runtime_ends_the_run() {
    let project = Project::new(&["first"]);
    let env = project.env_with_tools(FakeTools::default(), |_| {});
    let format = DummyFormat::default();
    let reporter = RecordingReporter::default();

    let result = CreatePipeline::new(&format, &env, &reporter)
        .run(vec![project.app("first")])
        .await;

    match result {
        Err(Error::MissingTool { tool, .. }) => assert_eq!(tool, "python3"),
        other => panic!("expected MissingTool, got {other:?}"),
    }
}

#[tokio::test]
async fn tools_are_probed_once_per_run() {
    let project = Project::new(&["first", "second"]);
    let tools = FakeTools::default().with("python3", "Python 3.12.1");
    let probes = tools.probes();
    let env = project.env_with_tools(tools, |_| {});
    let format = DummyFormat::default();
    let reporter = RecordingReporter::default();

    let summary = CreatePipeline::new(&format, &env, &reporter)
        .run(vec![project.app("first"), project.app("second")])
        .await
        .unwrap();

    assert_eq!(summary.status(), RunStatus::Success);
    assert_eq!(probes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn requirements_go_through_the_runtime_installer() {
    let project = Project::new(&["first"]);
    let env = project.env(|_| {});
    let format = DummyFormat::default();
    let reporter = RecordingReporter::default();

    let mut app = project.app("first");
    app.requires = vec!["dep-one".into(), "dep-two>=2".into()];
    app.requirement_installer_args = vec!["--no-cache-dir".into()];

    let summary = CreatePipeline::new(&format, &env, &reporter)
        .run(vec![app])
        .await
        .unwrap();
    assert_eq!(summary.status(), RunStatus::Success);

    let runs = project.subprocess.commands_for("python3");
    assert_eq!(runs.len(), 1);
    let args = &runs[0];
    assert_eq!(&args[..5], &["-m", "pip", "install", "--upgrade", "--no-user"]);
    assert_eq!(args[5], "--target");
    assert!(args[6].ends_with("path/to/app_packages"));
    assert_eq!(&args[7..], &["--no-cache-dir", "dep-one", "dep-two>=2"]);
}

#[tokio::test]
async fn test_mode_installs_test_requirements() {
    let project = Project::new(&["first"]);
    let env = project.env(|options| options.test_mode = true);
    let format = DummyFormat::default();
    let reporter = RecordingReporter::default();

    let mut app = project.app("first");
    app.requires = vec!["dep-one".into(), "shared".into()];
    app.test_requires = vec!["pytest".into(), "shared".into()];

    let summary = CreatePipeline::new(&format, &env, &reporter)
        .run(vec![app])
        .await
        .unwrap();
    assert_eq!(summary.status(), RunStatus::Success);

    let runs = project.subprocess.commands_for("python3");
    assert_eq!(runs.len(), 1);
    assert_eq!(&runs[0][7..], &["dep-one", "shared", "pytest"]);
}

#[tokio::test]
async fn requirements_file_template_gets_files_instead_of_an_install() {
    let project = Project::new(&["first"]);
    write(
        project.root(),
        "template/content/bundle-index.toml",
        "[paths]\napp_path = \"path/to/app\"\napp_requirements_path = \"path/to/requirements.txt\"\napp_requirement_installer_args_path = \"path/to/pip-options.txt\"\nsupport_path = \"path/to/support\"\n",
    );
    let env = project.env(|_| {});
    let format = DummyFormat::default();
    let reporter = RecordingReporter::default();

    let mut app = project.app("first");
    app.requires = vec!["dep-one".into(), "./vendor/widget".into()];
    app.requirement_installer_args = vec!["--no-cache-dir".into(), "--pre".into()];

    let summary = CreatePipeline::new(&format, &env, &reporter)
        .run(vec![app])
        .await
        .unwrap();
    assert_eq!(summary.status(), RunStatus::Success);
    assert_eq!(
        outcome(&summary, "first", Stage::InstallAppRequirements),
        Some(Outcome::Completed)
    );
    assert!(project.subprocess.commands_for("python3").is_empty());

    let bundle = project.bundle_dir("first");
    let requirements = std::fs::read_to_string(bundle.join("path/to/requirements.txt")).unwrap();
    assert_eq!(
        requirements,
        format!("dep-one\n{}\n", project.root().join("vendor/widget").display())
    );
    let options = std::fs::read_to_string(bundle.join("path/to/pip-options.txt")).unwrap();
    assert_eq!(options, "--no-cache-dir\n--pre\n");
    assert!(!bundle.join("path/to/app_packages").exists());
}

#[tokio::test]
async fn dropping_all_requirements_clears_installed_packages() {
    let project = Project::new(&["first"]);
    let format = DummyFormat::default();
    let reporter = RecordingReporter::default();

    let env = project.env(|_| {});
    let summary = CreatePipeline::new(&format, &env, &reporter)
        .run(vec![project.app("first")])
        .await
        .unwrap();
    assert!(matches!(
        outcome(&summary, "first", Stage::InstallAppRequirements),
        Some(Outcome::Skipped(_))
    ));

    let packages = project.bundle_dir("first").join("path/to/app_packages");
    write(&packages, "dep_one/__init__.py", "");

    let env = project.env(|_| {});
    let summary = CreatePipeline::new(&format, &env, &reporter)
        .run(vec![project.app("first")])
        .await
        .unwrap();

    assert_eq!(
        outcome(&summary, "first", Stage::InstallAppRequirements),
        Some(Outcome::Completed)
    );
    assert!(packages.is_dir());
    assert!(!packages.join("dep_one").exists());
    assert!(project.subprocess.commands_for("python3").is_empty());
}

#[tokio::test]
async fn installer_failure_stops_the_app() {
    let project = Project::new(&["first"]);
    project.subprocess.fail("python3");
    let env = project.env(|_| {});
    let format = DummyFormat::default();
    let reporter = RecordingReporter::default();

    let mut app = project.app("first");
    app.requires = vec!["dep-one".into()];

    let summary = CreatePipeline::new(&format, &env, &reporter)
        .run(vec![app])
        .await
        .unwrap();

    assert_eq!(summary.status(), RunStatus::Failed);
    let (stage, error) = summary.app("first").unwrap().failure.clone().unwrap();
    assert_eq!(stage, Stage::InstallAppRequirements);
    assert!(error.contains("scripted failure"));
    assert_eq!(outcome(&summary, "first", Stage::InstallAppCode), None);
}

#[tokio::test]
async fn corrupt_support_package_fails_the_app() {
    let project = Project::new(&["first"]);
    project.downloader.serve("support", b"this is not an archive".to_vec());
    let env = project.env(|_| {});
    let format = DummyFormat::default();
    let reporter = RecordingReporter::default();

    let summary = CreatePipeline::new(&format, &env, &reporter)
        .run(vec![project.app("first")])
        .await
        .unwrap();

    let (stage, error) = summary.app("first").unwrap().failure.clone().unwrap();
    assert_eq!(stage, Stage::InstallAppSupportPackage);
    assert!(error.contains("corrupt"), "{error}");

    let index = PathIndex::load(&project.bundle_dir("first")).await.unwrap().unwrap();
    assert_eq!(index.support_revision().unwrap(), None);
}

#[tokio::test]
async fn failed_upgrade_forgets_the_old_support_revision() {
    let project = Project::new(&["first"]);
    let format = DummyFormat::default();
    let reporter = RecordingReporter::default();

    let env = project.env(|_| {});
    CreatePipeline::new(&format, &env, &reporter)
        .run(vec![project.app("first")])
        .await
        .unwrap();
    let bundle = project.bundle_dir("first");
    let index = PathIndex::load(&bundle).await.unwrap().unwrap();
    assert_eq!(index.support_revision().unwrap(), Some(37));

    project.downloader.serve("support", b"truncated".to_vec());
    let mut app = project.app("first");
    app.support_revision = Some(38);
    let env = project.env(|_| {});
    let summary = CreatePipeline::new(&format, &env, &reporter)
        .run(vec![app])
        .await
        .unwrap();
    assert_eq!(summary.status(), RunStatus::Failed);

    let index = PathIndex::load(&bundle).await.unwrap().unwrap();
    assert_eq!(index.support_revision().unwrap(), None);

    // Asking for the old revision again installs it rather than trusting the tree.
    project
        .downloader
        .serve("support", tar_gz(&[("runtime/VERSION", b"3.12")]));
    let env = project.env(|_| {});
    let summary = CreatePipeline::new(&format, &env, &reporter)
        .run(vec![project.app("first")])
        .await
        .unwrap();
    assert_eq!(
        outcome(&summary, "first", Stage::InstallAppSupportPackage),
        Some(Outcome::Completed)
    );
    assert_eq!(project.downloader.calls(), 3);
    let index = PathIndex::load(&bundle).await.unwrap().unwrap();
    assert_eq!(index.support_revision().unwrap(), Some(37));
}

#[tokio::test]
async fn template_without_index_gets_the_layout_index() {
    let project = Project::new(&["first"]);
    std::fs::remove_file(project.root().join("template/content/bundle-index.toml")).unwrap();
    let format = DummyFormat::default();
    let reporter = RecordingReporter::default();

    let env = project.env(|_| {});
    let summary = CreatePipeline::new(&format, &env, &reporter)
        .run(vec![project.app("first")])
        .await
        .unwrap();
    assert_eq!(summary.status(), RunStatus::Success);

    let bundle = project.bundle_dir("first");
    let index = PathIndex::load(&bundle).await.unwrap().unwrap();
    assert_eq!(index.app_path().unwrap(), bundle.join("path/to/app"));

    let env = project.env(|_| {});
    let summary = CreatePipeline::new(&format, &env, &reporter)
        .run(vec![project.app("first")])
        .await
        .unwrap();
    assert!(matches!(
        outcome(&summary, "first", Stage::GenerateAppTemplate),
        Some(Outcome::Skipped(_))
    ));
}

#[tokio::test]
async fn stub_binary_is_installed_and_tracked() {
    let project = Project::new(&["first"]);
    project
        .downloader
        .serve("stub", zip(&[("GUI-Stub", &executable_bytes())]));
    let env = project.env(|_| {});
    let format = DummyFormat {
        stub: true,
        ..DummyFormat::default()
    };
    let reporter = RecordingReporter::default();

    let summary = CreatePipeline::new(&format, &env, &reporter)
        .run(vec![project.app("first")])
        .await
        .unwrap();

    assert_eq!(summary.status(), RunStatus::Success);
    let bundle = project.bundle_dir("first");
    assert!(bundle.join("first app.bin").is_file());
    let index = PathIndex::load(&bundle).await.unwrap().unwrap();
    assert_eq!(index.stub_binary_revision().unwrap(), Some(2));
    assert_eq!(
        outcome(&summary, "first", Stage::InstallStubBinary),
        Some(Outcome::Completed)
    );
}

#[tokio::test]
async fn unparseable_stub_is_corrupt() {
    let project = Project::new(&["first"]);
    project
        .downloader
        .serve("stub", zip(&[("GUI-Stub", b"#!/bin/sh\necho stub\n")]));
    let env = project.env(|_| {});
    let format = DummyFormat {
        stub: true,
        ..DummyFormat::default()
    };
    let reporter = RecordingReporter::default();

    let summary = CreatePipeline::new(&format, &env, &reporter)
        .run(vec![project.app("first")])
        .await
        .unwrap();

    let (stage, error) = summary.app("first").unwrap().failure.clone().unwrap();
    assert_eq!(stage, Stage::InstallStubBinary);
    assert!(error.contains("stub binary"), "{error}");
    assert!(!project.bundle_dir("first").join("first app.bin").exists());
}

#[tokio::test]
async fn rejected_stub_upgrade_keeps_the_installed_binary() {
    let project = Project::new(&["first"]);
    project
        .downloader
        .serve("stub", zip(&[("GUI-Stub", &executable_bytes())]));
    let format = DummyFormat {
        stub: true,
        ..DummyFormat::default()
    };
    let reporter = RecordingReporter::default();

    let env = project.env(|_| {});
    CreatePipeline::new(&format, &env, &reporter)
        .run(vec![project.app("first")])
        .await
        .unwrap();

    project
        .downloader
        .serve("stub", zip(&[("GUI-Stub", b"#!/bin/sh\necho stub\n")]));
    let mut app = project.app("first");
    app.stub_binary_revision = Some(3);
    let env = project.env(|_| {});
    let summary = CreatePipeline::new(&format, &env, &reporter)
        .run(vec![app])
        .await
        .unwrap();
    assert_eq!(summary.status(), RunStatus::Failed);

    let bundle = project.bundle_dir("first");
    assert!(bundle.join("first app.bin").is_file());
    let index = PathIndex::load(&bundle).await.unwrap().unwrap();
    assert_eq!(index.stub_binary_revision().unwrap(), Some(2));
}

#[tokio::test]
async fn permissions_reach_the_template() {
    let project = Project::new(&["first"]);
    let env = project.env(|_| {});
    let format = DummyFormat::default();
    let reporter = RecordingReporter::default();

    let mut app = project.app("first");
    app.permission.insert("camera".into(), "for scanning".into());
    app.permission.insert("microphone".into(), String::new());

    CreatePipeline::new(&format, &env, &reporter)
        .run(vec![app])
        .await
        .unwrap();

    let rendered =
        std::fs::read_to_string(project.bundle_dir("first").join("first app.txt")).unwrap();
    assert!(rendered.contains("DUMMY_CAMERA=for scanning"));
    assert!(!rendered.contains("DUMMY_MICROPHONE"));
}

#[tokio::test]
async fn regenerate_replaces_the_bundle() {
    let project = Project::new(&["first"]);
    let format = DummyFormat::default();
    let reporter = RecordingReporter::default();

    let env = project.env(|_| {});
    CreatePipeline::new(&format, &env, &reporter)
        .run(vec![project.app("first")])
        .await
        .unwrap();
    let stray = project.bundle_dir("first").join("stray.txt");
    std::fs::write(&stray, "left over").unwrap();

    let env = project.env(|options| options.regenerate = true);
    let summary = CreatePipeline::new(&format, &env, &reporter)
        .run(vec![project.app("first")])
        .await
        .unwrap();

    assert_eq!(summary.status(), RunStatus::Success);
    assert!(!stray.exists());
    // The fresh index has no revision, so the support package comes back.
    assert_eq!(project.downloader.calls(), 2);
}

#[tokio::test]
async fn custom_local_support_package_is_always_reinstalled() {
    let project = Project::new(&["first"]);
    std::fs::write(
        project.root().join("custom-support.tar.gz"),
        tar_gz(&[("lib/custom.txt", b"custom")]),
    )
    .unwrap();
    let format = DummyFormat::default();
    let reporter = RecordingReporter::default();

    let mut app = project.app("first");
    app.support_package = Some("custom-support.tar.gz".into());

    for _ in 0..2 {
        let env = project.env(|_| {});
        let summary = CreatePipeline::new(&format, &env, &reporter)
            .run(vec![app.clone()])
            .await
            .unwrap();
        assert_eq!(
            outcome(&summary, "first", Stage::InstallAppSupportPackage),
            Some(Outcome::Completed)
        );
    }

    assert_eq!(project.downloader.calls(), 0);
    let bundle = project.bundle_dir("first");
    assert!(bundle.join("path/to/support/lib/custom.txt").is_file());
    let index = PathIndex::load(&bundle).await.unwrap().unwrap();
    assert_eq!(index.support_revision().unwrap(), None);
}
