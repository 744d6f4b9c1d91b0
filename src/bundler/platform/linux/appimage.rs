//! AppImage bundles - portable Linux applications.
//!
//! The bundle holds an `AppDir` tree (`usr/app`, `usr/app_packages`,
//! `usr/python`) that a later packaging step turns into a single
//! `.AppImage` file. The launcher is compiled by that step, so no stub
//! binary is installed here.

use crate::bundler::{
    index::BundleLayout,
    install::ResourceCopy,
    platform::OutputFormat,
    settings::{AppConfig, Arch, HostEnvironment},
};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};

const SUPPORT_REVISION: u64 = 1;

/// Icon sizes installed into the hicolor theme.
pub const ICON_SIZES: &[u32] = &[16, 32, 64, 128, 256, 512];

/// Linux AppImage output format.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppImage;

impl AppImage {
    fn app_dir(app: &AppConfig) -> String {
        format!("{}.AppDir", app.formal_name())
    }
}

/// Maps a host architecture name to the AppImage spelling.
pub fn appimage_arch(host_arch: &str) -> Option<&'static str> {
    match Arch::parse(host_arch)? {
        Arch::X86_64 => Some("x86_64"),
        Arch::X86 => Some("i386"),
        Arch::AArch64 => Some("aarch64"),
        _ => None,
    }
}

/// freedesktop.org desktop entry for the app.
pub fn desktop_entry(app: &AppConfig) -> String {
    let mut entry = String::from("[Desktop Entry]\nType=Application\n");
    entry.push_str(&format!("Name={}\n", app.formal_name()));
    entry.push_str(&format!("Exec={}\n", app.bundle_identifier()));
    entry.push_str(&format!("Icon={}\n", app.bundle_identifier()));
    if !app.description.is_empty() {
        entry.push_str(&format!("Comment={}\n", app.description));
    }
    entry.push_str(&format!("Terminal={}\n", app.console_app));
    entry
}

#[async_trait::async_trait]
impl OutputFormat for AppImage {
    fn platform(&self) -> &str {
        "linux"
    }

    fn output_format(&self) -> &str {
        "AppImage"
    }

    fn supported_host_os(&self) -> &[&str] {
        &["Linux"]
    }

    fn bundle_layout(&self, app: &AppConfig) -> BundleLayout {
        let usr = format!("{}/usr", Self::app_dir(app));
        BundleLayout {
            app_path: format!("{usr}/app"),
            app_packages_path: Some(format!("{usr}/app_packages")),
            support_path: Some(format!("{usr}/python")),
        }
    }

    fn binary_path(&self, app: &AppConfig, bundle_dir: &Path, host: &HostEnvironment) -> PathBuf {
        let arch = appimage_arch(&host.host_arch).unwrap_or(host.host_arch.as_str());
        bundle_dir.join(format!(
            "{}-{}-{}.AppImage",
            app.formal_name().replace(' ', "_"),
            app.version,
            arch
        ))
    }

    fn template_context(&self, app: &AppConfig, host: &HostEnvironment) -> Map<String, Value> {
        let mut context = Map::new();
        context.insert("desktop_entry".into(), json!(desktop_entry(app)));
        match appimage_arch(&host.host_arch) {
            Some(arch) => {
                context.insert("appimage_arch".into(), json!(arch));
            }
            None => log::warn!("No AppImage architecture name for {}", host.host_arch),
        }
        context
    }

    fn support_revision(&self) -> Option<u64> {
        Some(SUPPORT_REVISION)
    }

    fn resources(&self, app: &AppConfig, bundle_dir: &Path) -> Vec<ResourceCopy> {
        let Some(icon) = &app.icon else {
            return Vec::new();
        };
        let icons = bundle_dir
            .join(Self::app_dir(app))
            .join("usr/share/icons/hicolor");
        ICON_SIZES
            .iter()
            .map(|&size| ResourceCopy {
                role: "icon",
                source_prefix: icon.clone(),
                size: Some(size),
                extension: "png",
                target: icons
                    .join(format!("{size}x{size}"))
                    .join("apps")
                    .join(format!("{}.png", app.bundle_identifier())),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> AppConfig {
        toml::from_str(
            r#"
            app_name = "first-app"
            formal_name = "First App"
            bundle = "com.example"
            version = "0.0.1"
            description = "The first app"
            icon = "icons/first"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn arch_names() {
        assert_eq!(appimage_arch("x86_64"), Some("x86_64"));
        assert_eq!(appimage_arch("i686"), Some("i386"));
        assert_eq!(appimage_arch("arm64"), Some("aarch64"));
        assert_eq!(appimage_arch("riscv64"), None);
    }

    #[test]
    fn binary_name_uses_arch_and_version() {
        let host = HostEnvironment::new("Linux", "aarch64", ["Linux"]);
        assert_eq!(
            AppImage.binary_path(&app(), Path::new("/b"), &host),
            PathBuf::from("/b/First_App-0.0.1-aarch64.AppImage")
        );
    }

    #[test]
    fn icons_cover_every_size() {
        let resources = AppImage.resources(&app(), Path::new("/b"));
        assert_eq!(resources.len(), ICON_SIZES.len());
        assert_eq!(
            resources[0].target,
            PathBuf::from("/b/First App.AppDir/usr/share/icons/hicolor/16x16/apps/com.example.first-app.png")
        );
        assert_eq!(resources[0].source(Path::new("/p")), PathBuf::from("/p/icons/first-16.png"));
    }

    #[test]
    fn desktop_entry_fields() {
        let entry = desktop_entry(&app());
        assert!(entry.starts_with("[Desktop Entry]\n"));
        assert!(entry.contains("Name=First App\n"));
        assert!(entry.contains("Comment=The first app\n"));
        assert!(entry.contains("Terminal=false\n"));
    }
}
