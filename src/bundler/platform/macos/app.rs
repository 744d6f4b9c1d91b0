//! macOS `.app` bundles.
//!
//! The app launcher is a prebuilt stub; the runtime comes from a support
//! package. Permissions are split into `Info.plist` usage descriptions
//! (`info`) and code signing entitlements (`entitlements`).

use crate::bundler::{
    index::BundleLayout,
    install::ResourceCopy,
    permissions::{PermissionRules, PermissionSet},
    platform::OutputFormat,
    settings::{AppConfig, HostEnvironment},
};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};

/// Support package revision used when the app pins none.
const SUPPORT_REVISION: u64 = 1;

/// Stub binary revision used when the app pins none.
const STUB_BINARY_REVISION: u64 = 1;

/// Oldest macOS release the bundles target.
const MIN_OS_VERSION: &str = "11.0";

const LOCATION_ENTITLEMENT: &str = "com.apple.security.personal-information.location";

/// macOS `.app` output format.
#[derive(Debug, Default, Clone, Copy)]
pub struct MacOsApp;

impl MacOsApp {
    fn app_dir(app: &AppConfig) -> String {
        format!("{}.app", app.formal_name())
    }
}

/// macOS permission spelling.
#[derive(Debug, Default, Clone, Copy)]
pub struct MacOsPermissions;

impl PermissionRules for MacOsPermissions {
    fn permission_key(&self, permission: &str) -> Option<String> {
        let key = match permission {
            "camera" => "NSCameraUsageDescription",
            "microphone" => "NSMicrophoneUsageDescription",
            "coarse_location" | "fine_location" | "background_location" => {
                "NSLocationUsageDescription"
            }
            "photo_library" => "NSPhotoLibraryUsageDescription",
            _ => return None,
        };
        Some(key.to_string())
    }

    fn implied_requests(&self, permission: &str) -> Vec<(String, Value)> {
        let entitlement = match permission {
            "camera" => "com.apple.security.device.camera",
            "microphone" => "com.apple.security.device.microphone",
            "coarse_location" | "fine_location" | "background_location" => LOCATION_ENTITLEMENT,
            "photo_library" => "com.apple.security.personal-information.photo_library",
            _ => return Vec::new(),
        };
        vec![(entitlement.to_string(), json!(true))]
    }

    fn default_requests(&self) -> Vec<(String, Value)> {
        vec![
            (
                "com.apple.security.cs.allow-unsigned-executable-memory".into(),
                json!(true),
            ),
            (
                "com.apple.security.cs.disable-library-validation".into(),
                json!(true),
            ),
        ]
    }
}

#[async_trait::async_trait]
impl OutputFormat for MacOsApp {
    fn platform(&self) -> &str {
        "macOS"
    }

    fn output_format(&self) -> &str {
        "app"
    }

    fn supported_host_os(&self) -> &[&str] {
        &["Darwin"]
    }

    fn bundle_layout(&self, app: &AppConfig) -> BundleLayout {
        let resources = format!("{}/Contents/Resources", Self::app_dir(app));
        BundleLayout {
            app_path: format!("{resources}/app"),
            app_packages_path: Some(format!("{resources}/app_packages")),
            support_path: Some(format!("{}/Contents/Resources/support", Self::app_dir(app))),
        }
    }

    fn binary_path(&self, app: &AppConfig, bundle_dir: &Path, _host: &HostEnvironment) -> PathBuf {
        bundle_dir
            .join(Self::app_dir(app))
            .join("Contents")
            .join("MacOS")
            .join(app.formal_name())
    }

    fn template_context(&self, _app: &AppConfig, _host: &HostEnvironment) -> Map<String, Value> {
        let mut context = Map::new();
        context.insert("min_os_version".into(), json!(MIN_OS_VERSION));
        context
    }

    fn permission_rules(&self) -> Option<&dyn PermissionRules> {
        Some(&MacOsPermissions)
    }

    fn permissions_context(&self, _app: &AppConfig, permissions: &PermissionSet) -> Map<String, Value> {
        let mut context = Map::new();
        context.insert("info".into(), json!(permissions.permissions));
        context.insert("entitlements".into(), json!(permissions.requests));
        context
    }

    fn support_revision(&self) -> Option<u64> {
        Some(SUPPORT_REVISION)
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
            extension: "icns",
            target: bundle_dir
                .join(Self::app_dir(app))
                .join("Contents")
                .join("Resources")
                .join(format!("{}.icns", app.app_name)),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::permissions::build_permissions;

    fn app(permission: &[(&str, &str)]) -> AppConfig {
        let mut app: AppConfig = toml::from_str(
            r#"
            app_name = "first"
            formal_name = "First App"
            bundle = "com.example"
            version = "0.0.1"
            description = "The first app"
            "#,
        )
        .unwrap();
        app.permission = permission
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        app
    }

    fn context(app: &AppConfig) -> Map<String, Value> {
        MacOsApp.permissions_context(app, &build_permissions(app, &MacOsPermissions))
    }

    #[test]
    fn no_permissions_keeps_default_entitlements() {
        let context = context(&app(&[]));
        assert_eq!(context["info"], json!({}));
        assert_eq!(
            context["entitlements"],
            json!({
                "com.apple.security.cs.allow-unsigned-executable-memory": true,
                "com.apple.security.cs.disable-library-validation": true,
            })
        );
    }

    #[test]
    fn background_location_wins() {
        let context = context(&app(&[
            ("coarse_location", "roughly"),
            ("fine_location", "exactly"),
            ("background_location", "always"),
        ]));
        assert_eq!(context["info"], json!({"NSLocationUsageDescription": "always"}));
        assert_eq!(context["entitlements"][LOCATION_ENTITLEMENT], json!(true));
    }

    #[test]
    fn platform_keys_override_cross_platform() {
        let mut app = app(&[
            ("fine_location", "I need to know where you are"),
            ("NSLocationUsageDescription", "Platform specific"),
        ]);
        app.request.insert(LOCATION_ENTITLEMENT.into(), json!(false));
        let context = context(&app);
        assert_eq!(
            context["info"],
            json!({"NSLocationUsageDescription": "Platform specific"})
        );
        assert_eq!(context["entitlements"][LOCATION_ENTITLEMENT], json!(false));
    }

    #[test]
    fn binary_lives_in_contents_macos() {
        let host = HostEnvironment::new("Darwin", "arm64", ["Darwin"]);
        let app = app(&[]);
        assert_eq!(
            MacOsApp.binary_path(&app, Path::new("/b"), &host),
            PathBuf::from("/b/First App.app/Contents/MacOS/First App")
        );
    }
}
