//! Windows app folders.
//!
//! The executable is a prebuilt stub copied next to the app code under
//! `src/`. The runtime lives in `src/runtime` so reinstalling it never
//! touches the app itself.

use crate::bundler::{
    index::BundleLayout,
    install::ResourceCopy,
    platform::OutputFormat,
    settings::{AppConfig, Arch, HostEnvironment},
    stub::executable_name,
    utils::ArchiveFormat,
};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const SUPPORT_REVISION: u64 = 1;
const STUB_BINARY_REVISION: u64 = 1;

/// Windows app folder output format.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsApp;

/// Maps an architecture to the name Windows installers use.
pub fn map_arch(arch: Arch) -> Option<&'static str> {
    match arch {
        Arch::X86_64 => Some("x64"),
        Arch::X86 => Some("x86"),
        Arch::AArch64 => Some("arm64"),
        _ => None,
    }
}

/// Normalizes a version to exactly four numeric parts.
///
/// Each part keeps its leading digits only, so `1.2rc1` becomes `1.2.0.0`.
/// Parts past the fourth are dropped.
pub fn version_quad(version: &str) -> String {
    let mut parts: Vec<String> = version
        .split('.')
        .take(4)
        .map(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            if digits.is_empty() { "0".to_string() } else { digits }
        })
        .collect();
    parts.resize(4, "0".to_string());
    parts.join(".")
}

#[async_trait::async_trait]
impl OutputFormat for WindowsApp {
    fn platform(&self) -> &str {
        "windows"
    }

    fn output_format(&self) -> &str {
        "app"
    }

    fn supported_host_os(&self) -> &[&str] {
        &["Windows"]
    }

    fn bundle_layout(&self, _app: &AppConfig) -> BundleLayout {
        BundleLayout {
            app_path: "src/app".into(),
            app_packages_path: Some("src/app_packages".into()),
            support_path: Some("src/runtime".into()),
        }
    }

    fn binary_path(&self, app: &AppConfig, bundle_dir: &Path, host: &HostEnvironment) -> PathBuf {
        bundle_dir
            .join("src")
            .join(executable_name(app.formal_name(), host))
    }

    fn template_context(&self, app: &AppConfig, host: &HostEnvironment) -> Map<String, Value> {
        let mut context = Map::new();
        context.insert("version_quad".into(), json!(version_quad(&app.version)));
        // Stable across runs so upgrades replace the previous install.
        let guid = Uuid::new_v5(&Uuid::NAMESPACE_DNS, app.bundle_identifier().as_bytes());
        context.insert("guid".into(), json!(guid.to_string()));
        if let Some(arch) = Arch::parse(&host.host_arch).and_then(map_arch) {
            context.insert("win_arch".into(), json!(arch));
        }
        context
    }

    fn support_revision(&self) -> Option<u64> {
        Some(SUPPORT_REVISION)
    }

    fn support_archive_format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn uses_stub_binary(&self) -> bool {
        true
    }

    fn stub_binary_revision(&self) -> Option<u64> {
        Some(STUB_BINARY_REVISION)
    }

    fn resources(&self, app: &AppConfig, bundle_dir: &Path) -> Vec<ResourceCopy> {
        let Some(icon) = &app.icon else {
            return Vec::new();
        };
        vec![ResourceCopy {
            role: "icon",
            source_prefix: icon.clone(),
            size: None,
            extension: "ico",
            target: bundle_dir.join("src").join("icon.ico"),
        }]
    }
}
