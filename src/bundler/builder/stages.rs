//! Default stage implementations.
//!
//! [`OutputFormat`](crate::bundler::platform::OutputFormat) stage methods
//! call these unless a format overrides them. Each one checks at the start
//! whether it has anything to do.

use super::gate;
use crate::bundler::{
    context::BundleContext,
    error::Result,
    index::PathIndex,
    install::{self, RequirementInstaller},
    platform::{AppStage, Progress},
    stub::StubBinaryManager,
    support::SupportPackageManager,
    template::GenerateMode,
};

/// Whether the bundle directory exists with a usable path index.
pub async fn bundle_is_current(stage: &AppStage<'_>) -> bool {
    if !stage.bundle_dir.is_dir() {
        return false;
    }
    match PathIndex::load(&stage.bundle_dir).await {
        Ok(Some(index)) => index.app_path().is_ok(),
        _ => false,
    }
}

/// Expands the template into the bundle directory.
///
/// Skipped when a valid bundle exists and regeneration was not requested.
/// The format's layout stands in for a path index the template does not ship.
pub async fn generate_app_template(stage: &AppStage<'_>) -> Result<Progress> {
    let regenerate = stage.env.options.regenerate;
    if !regenerate && bundle_is_current(stage).await {
        log::info!(
            "Bundle for {} already exists at {}; skipping generation",
            stage.app.app_name,
            stage.bundle_dir.display()
        );
        return Ok(Progress::Skipped("bundle already exists".into()));
    }

    let template = gate::app_template(stage).await?;
    let context = BundleContext::build(stage.app, &stage.env.host, stage.format);
    let mode = if regenerate {
        GenerateMode::Regenerate
    } else {
        GenerateMode::Fresh
    };
    template
        .generate(
            &context.into_value(),
            &stage.bundle_dir,
            mode,
            &stage.format.bundle_layout(stage.app),
        )
        .await?;
    Ok(Progress::Done)
}

pub async fn install_app_support_package(stage: &AppStage<'_>) -> Result<Progress> {
    if !stage.format.uses_support_package() {
        return Ok(Progress::Skipped("format uses no support package".into()));
    }
    let env = stage.env;
    SupportPackageManager::new(
        env.downloader.as_ref(),
        &env.options.support_registry,
        &env.data_path,
        &env.base_path,
    )
    .ensure_installed(stage.app, &env.host, stage.format, &stage.bundle_dir)
    .await
}

pub async fn install_app_requirements(stage: &AppStage<'_>) -> Result<Progress> {
    let env = stage.env;
    let layout = stage.format.bundle_layout(stage.app);
    RequirementInstaller::new(env.subprocess.as_ref(), &env.options.runtime, &env.base_path)
        .install(stage.app, &stage.bundle_dir, layout.app_packages_path.as_deref())
        .await
}

pub async fn install_app_code(stage: &AppStage<'_>) -> Result<Progress> {
    install::install_app_code(stage.app, &stage.bundle_dir, &stage.env.base_path).await
}

pub async fn install_app_resources(stage: &AppStage<'_>) -> Result<Progress> {
    let resources = stage.format.resources(stage.app, &stage.bundle_dir);
    install::install_resources(&resources, &stage.env.base_path).await
}

pub async fn install_stub_binary(stage: &AppStage<'_>) -> Result<Progress> {
    if !stage.format.uses_stub_binary() {
        return Ok(Progress::Skipped("format compiles its binary".into()));
    }
    let env = stage.env;
    StubBinaryManager::new(
        env.downloader.as_ref(),
        &env.options.support_registry,
        &env.data_path,
    )
    .ensure_installed(stage.app, &env.host, stage.format, &stage.bundle_dir)
    .await
}

pub async fn cleanup_app_content(stage: &AppStage<'_>) -> Result<Progress> {
    let patterns = stage.format.cleanup_paths(stage.app);
    install::cleanup(&stage.bundle_dir, &patterns).await
}
