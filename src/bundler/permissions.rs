//! Cross-platform permission mapping.
//!
//! Apps declare permissions once, by cross-platform name, with a
//! human-readable justification:
//!
//! ```toml
//! [app.scanner.permission]
//! camera = "Scanning documents"
//! fine_location = "Tagging scans with where they were taken"
//! NSCustomKey = "Passed through verbatim"
//! ```
//!
//! Each output format supplies [`PermissionRules`] that say how a
//! cross-platform permission is spelled on that platform and which capability
//! requests it implies. [`build_permissions`] applies the rules.
//!
//! Precedence, lowest to highest:
//!
//! 1. the format's default requests
//! 2. requests implied by granted permissions
//! 3. the app's explicit `request` table
//!
//! Implied requests supplement the explicit ones and never replace them.
//! Permissions with an empty justification are not granted.

use crate::bundler::settings::AppConfig;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Permission names with a platform-neutral meaning.
///
/// Order matters: when several of them map to the same platform key, the
/// later one wins, so background location beats fine beats coarse.
pub const CROSS_PLATFORM_PERMISSIONS: &[&str] = &[
    "camera",
    "microphone",
    "coarse_location",
    "fine_location",
    "background_location",
    "photo_library",
];

/// How one output format represents permissions.
pub trait PermissionRules: Send + Sync {
    /// Platform key for a cross-platform permission, or `None` if the
    /// platform has no equivalent.
    fn permission_key(&self, permission: &str) -> Option<String>;

    /// Capability requests implied by granting `permission`.
    fn implied_requests(&self, _permission: &str) -> Vec<(String, Value)> {
        Vec::new()
    }

    /// Requests present whether or not any permission is granted.
    fn default_requests(&self) -> Vec<(String, Value)> {
        Vec::new()
    }
}

/// Cross-platform and custom permissions declared by an app.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclaredPermissions {
    /// Cross-platform permission → justification, in declaration order of
    /// [`CROSS_PLATFORM_PERMISSIONS`]. Empty justifications are kept here.
    pub cross_platform: Vec<(&'static str, String)>,
    /// Platform-specific keys, passed through verbatim.
    pub custom: BTreeMap<String, String>,
}

impl DeclaredPermissions {
    /// Splits an app's permission table into cross-platform and custom keys.
    pub fn from_app(app: &AppConfig) -> Self {
        let cross_platform = CROSS_PLATFORM_PERMISSIONS
            .iter()
            .filter_map(|name| app.permission.get(*name).map(|j| (*name, j.clone())))
            .collect();
        let custom = app
            .permission
            .iter()
            .filter(|(name, _)| !CROSS_PLATFORM_PERMISSIONS.contains(&name.as_str()))
            .map(|(name, justification)| (name.clone(), justification.clone()))
            .collect();
        Self {
            cross_platform,
            custom,
        }
    }

    /// Justification for a granted cross-platform permission.
    pub fn granted(&self, permission: &str) -> Option<&str> {
        self.cross_platform
            .iter()
            .find(|(name, justification)| *name == permission && !justification.is_empty())
            .map(|(_, justification)| justification.as_str())
    }
}

/// Platform permissions and capability requests for one app.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PermissionSet {
    /// Platform permission key → justification.
    pub permissions: BTreeMap<String, String>,
    /// Capability request key → value.
    pub requests: BTreeMap<String, Value>,
}

impl PermissionSet {
    /// Whether nothing was granted or requested.
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty() && self.requests.is_empty()
    }
}

/// Applies `rules` to an app's declared permissions and requests.
pub fn build_permissions(app: &AppConfig, rules: &dyn PermissionRules) -> PermissionSet {
    let declared = DeclaredPermissions::from_app(app);
    let mut set = PermissionSet::default();

    set.requests.extend(rules.default_requests());

    for (name, justification) in &declared.cross_platform {
        if justification.is_empty() {
            log::debug!("Permission {} has no justification; not granted", name);
            continue;
        }
        match rules.permission_key(name) {
            Some(key) => {
                set.permissions.insert(key, justification.clone());
            }
            None => log::debug!("Permission {} has no platform equivalent", name),
        }
        set.requests.extend(rules.implied_requests(name));
    }

    // Platform-specific keys override mapped cross-platform ones.
    for (key, justification) in declared.custom {
        if !justification.is_empty() {
            set.permissions.insert(key, justification);
        }
    }

    for (key, value) in &app.request {
        set.requests.insert(key.clone(), value.clone());
    }

    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Lighting;

    impl PermissionRules for Lighting {
        fn permission_key(&self, permission: &str) -> Option<String> {
            Some(format!("DUMMY_{}", permission.to_uppercase()))
        }

        fn implied_requests(&self, permission: &str) -> Vec<(String, Value)> {
            match permission {
                "camera" => vec![("good.lighting".into(), json!(true))],
                _ => Vec::new(),
            }
        }
    }

    fn app(permission: &[(&str, &str)], request: &[(&str, Value)]) -> AppConfig {
        let mut app: AppConfig = toml::from_str(
            r#"
            app_name = "first"
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
        app.request = request
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        app
    }

    #[test]
    fn empty_justification_is_not_granted() {
        let app = app(&[("camera", "for scanning"), ("microphone", "")], &[]);
        let set = build_permissions(&app, &Lighting);

        assert_eq!(
            set.permissions,
            BTreeMap::from([("DUMMY_CAMERA".to_string(), "for scanning".to_string())])
        );
        assert_eq!(set.requests.get("good.lighting"), Some(&json!(true)));
    }

    #[test]
    fn explicit_request_beats_implied() {
        let app = app(
            &[("camera", "for scanning")],
            &[("good.lighting", json!(false))],
        );
        let set = build_permissions(&app, &Lighting);
        assert_eq!(set.requests.get("good.lighting"), Some(&json!(false)));
    }

    #[test]
    fn custom_keys_pass_through() {
        let app = app(&[("NSCustomThing", "custom")], &[]);
        let set = build_permissions(&app, &Lighting);
        assert_eq!(set.permissions.get("NSCustomThing").map(String::as_str), Some("custom"));
        assert!(set.requests.is_empty());
    }
}
