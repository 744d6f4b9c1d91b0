//! Verification gate.
//!
//! Run-wide checks (`verify_host`, `verify_tools`) abort the whole run;
//! per-app checks (`finalize_app_config`, `verify_app_template`,
//! `verify_app_tools`) abort only the app they are checking. Nothing here
//! writes to a bundle directory.

use super::{PipelineEnv, tool_detection::ToolRequirement};
use crate::bundler::{
    error::{Context, Error, Result},
    platform::{AppStage, OutputFormat, Progress},
    settings::{AppConfig, HostEnvironment},
    template::{ResolvedTemplate, TemplateSource},
};

/// Default branch checked out for remote templates.
pub const DEFAULT_TEMPLATE_BRANCH: &str = "main";

/// Fails with [`Error::HostUnsupported`] unless the host OS is one the
/// format supports.
pub fn verify_host(host: &HostEnvironment, format: &dyn OutputFormat) -> Result<Progress> {
    if !host.is_supported() {
        return Err(Error::HostUnsupported {
            host_os: host.host_os.clone(),
            format: format.description(),
            supported: host
                .supported_host_os
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
        });
    }
    log::debug!("Host {} supports {}", host.host_os, format.description());
    Ok(Progress::Done)
}

/// Verifies the runtime and every tool the format needs for the whole run.
///
/// Verified tools stay cached in `env.tools` for the rest of the run.
pub async fn verify_tools(env: &PipelineEnv, format: &dyn OutputFormat) -> Result<Progress> {
    let mut requirements = vec![runtime_requirement(env)];
    requirements.extend(format.required_tools());

    for requirement in &requirements {
        env.tools.verify(requirement).await?;
    }
    Ok(Progress::Done)
}

/// Resolves tool-dependent defaults for one app. Runs once per app.
///
/// Fills in the runtime version tag from the verified runtime and applies the
/// run's test mode.
pub fn finalize_app_config(app: &mut AppConfig, env: &PipelineEnv) -> Result<Progress> {
    if app.is_finalized() {
        return Err(Error::GenericError(format!(
            "{} has already been finalized",
            app.app_name
        )));
    }

    let tag = env
        .tools
        .get(&env.options.runtime)
        .and_then(|runtime| runtime.version_tag());
    if env.options.test_mode {
        app.test_mode = true;
    }
    app.finalize(tag);

    match &app.runtime_version_tag {
        Some(tag) => log::debug!("{} targets runtime {}", app.app_name, tag),
        None => log::warn!("Unable to determine the runtime version for {}", app.app_name),
    }
    Ok(Progress::Done)
}

/// Template source for an app: its own, else the format's default from the
/// template registry.
pub fn template_source(stage: &AppStage<'_>) -> TemplateSource {
    match &stage.app.template {
        Some(template) => TemplateSource::parse(template, &stage.env.base_path),
        None => TemplateSource::parse(
            &format!(
                "{}/{}",
                stage.env.options.template_registry,
                stage.format.default_template()
            ),
            &stage.env.base_path,
        ),
    }
}

/// Resolves (and for remote templates, clones or refreshes) the app's template.
pub async fn resolve_template(stage: &AppStage<'_>) -> Result<ResolvedTemplate> {
    let source = template_source(stage);
    if source.is_remote() {
        stage
            .env
            .tools
            .verify(&ToolRequirement::new("git").with_hint("Install git to use remote templates"))
            .await?;
    }
    let branch = stage
        .app
        .template_branch
        .as_deref()
        .unwrap_or(DEFAULT_TEMPLATE_BRANCH);
    ResolvedTemplate::resolve(
        source,
        branch,
        &stage.env.data_path.join("templates"),
        stage.env.subprocess.as_ref(),
    )
    .await
}

/// Resolves the app's template and checks it supports this format and host.
///
/// The resolved template is kept on the stage for generation.
pub async fn verify_app_template(stage: &AppStage<'_>) -> Result<Progress> {
    let template = resolve_template(stage).await?;
    template.check_supports(stage.format.output_format(), &stage.env.host.host_os)?;
    log::debug!("Template {} supports {}", template.source, stage.format.description());
    // Keeps an earlier resolution if a format already stored one.
    let _ = stage.template.set(template);
    Ok(Progress::Done)
}

/// Returns the template resolved by [`verify_app_template`], resolving it
/// now if that stage was replaced by a format.
pub async fn app_template<'s>(stage: &'s AppStage<'_>) -> Result<&'s ResolvedTemplate> {
    if stage.template.get().is_none() {
        let template = resolve_template(stage).await?;
        let _ = stage.template.set(template);
    }
    stage
        .template
        .get()
        .context("template was not resolved")
}

/// Verifies tools this app needs beyond the run-wide ones.
pub async fn verify_app_tools(stage: &AppStage<'_>) -> Result<Progress> {
    let requirements = stage.format.app_tools(stage.app);
    if requirements.is_empty() {
        return Ok(Progress::Skipped("no app-specific tools".into()));
    }
    for requirement in &requirements {
        stage.env.tools.verify(requirement).await?;
    }
    Ok(Progress::Done)
}

fn runtime_requirement(env: &PipelineEnv) -> ToolRequirement {
    ToolRequirement::new(env.options.runtime.clone())
        .with_hint("Install the app runtime, or pass --runtime")
}
