//! App code installation.

use crate::{
    bail,
    bundler::{
        error::{ErrorExt, Result},
        index::PathIndex,
        platform::Progress,
        settings::AppConfig,
        utils::fs,
    },
};
use std::path::Path;

/// Name of the installer recorded in the dist-info `INSTALLER` file.
const INSTALLER_NAME: &str = "kodegen-bundler";

/// Copies the app's sources into `app_path`, replacing whatever a previous
/// run installed, and writes the app's dist-info metadata next to them.
pub async fn install_app_code(app: &AppConfig, bundle_dir: &Path, base_path: &Path) -> Result<Progress> {
    let index = PathIndex::load_required(bundle_dir).await?;
    let app_path = index.app_path()?;

    log::info!("Installing app code for {}", app.app_name);
    fs::create_dir_all(&app_path, true).await?;

    let sources = app.all_sources();
    if sources.is_empty() {
        log::warn!("{} declares no sources", app.app_name);
    }
    for source in &sources {
        let original = base_path.join(source);
        let Some(name) = original.file_name() else {
            bail!("Invalid source path {}", source);
        };
        if !original.exists() {
            bail!(
                "Source {} for {} does not exist at {}",
                source,
                app.app_name,
                original.display()
            );
        }
        let target = app_path.join(name);
        log::debug!("Copying {} to {}", original.display(), target.display());
        fs::copy_path(&original, &target).await?;
    }

    write_dist_info(app, &app_path).await?;

    log::info!("✓ Installed {} source(s) into {}", sources.len(), app_path.display());
    Ok(Progress::Done)
}

/// Writes `<module_name>-<version>.dist-info/{INSTALLER,METADATA}`.
async fn write_dist_info(app: &AppConfig, app_path: &Path) -> Result<()> {
    let dist_info = app_path.join(format!("{}-{}.dist-info", app.module_name(), app.version));
    fs::create_dir_all(&dist_info, true).await?;

    let installer = dist_info.join("INSTALLER");
    tokio::fs::write(&installer, format!("{INSTALLER_NAME}\n"))
        .await
        .fs_context("writing", &installer)?;

    let metadata = dist_info.join("METADATA");
    tokio::fs::write(&metadata, metadata_content(app))
        .await
        .fs_context("writing", &metadata)?;
    Ok(())
}

fn metadata_content(app: &AppConfig) -> String {
    let mut lines = vec![
        "Metadata-Version: 2.1".to_string(),
        format!("Name: {}", app.app_name),
        format!("Formal-Name: {}", app.formal_name()),
        format!("App-ID: {}", app.bundle_identifier()),
        format!("Version: {}", app.version),
    ];
    if let Some(url) = &app.url {
        lines.push(format!("Home-page: {url}"));
        lines.push(format!("Download-URL: {url}"));
    }
    if let Some(author) = &app.author {
        lines.push(format!("Author: {author}"));
    }
    if let Some(email) = &app.author_email {
        lines.push(format!("Author-email: {email}"));
    }
    lines.push(format!("Summary: {}", app.description));
    lines.join("\n") + "\n"
}
