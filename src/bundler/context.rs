//! Template context assembly.
//!
//! The context is rebuilt for every generation from the app, the host and the
//! output format, handed to the template engine, and dropped.

use crate::bundler::{
    permissions::build_permissions,
    platform::OutputFormat,
    settings::{AppConfig, HostEnvironment, License},
};
use chrono::Datelike;
use serde_json::{Map, Value, json};

/// Key → value mapping a template is rendered against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BundleContext(Map<String, Value>);

impl BundleContext {
    /// Builds the context for one app.
    ///
    /// Layers, later ones overriding earlier keys: app and host values, the
    /// format's own context, then the format's permission context.
    pub fn build(app: &AppConfig, host: &HostEnvironment, format: &dyn OutputFormat) -> Self {
        let mut context = Map::new();

        context.insert("app_name".into(), json!(app.app_name));
        context.insert("formal_name".into(), json!(app.formal_name()));
        context.insert("module_name".into(), json!(app.module_name()));
        context.insert("bundle_name".into(), json!(app.bundle_name()));
        context.insert("class_name".into(), json!(app.class_name()));
        context.insert("bundle".into(), json!(app.bundle));
        context.insert("bundle_identifier".into(), json!(app.bundle_identifier()));
        context.insert("package_name".into(), json!(app.package_name()));
        context.insert("version".into(), json!(app.version));
        context.insert("description".into(), json!(app.description));
        context.insert("url".into(), json!(app.url));
        context.insert("author".into(), json!(app.author));
        context.insert("author_email".into(), json!(app.author_email));
        context.insert(
            "license".into(),
            match &app.license {
                License::File(file) => json!({ "file": file }),
                License::Text(text) => json!({ "text": text }),
            },
        );
        context.insert("console_app".into(), json!(app.console_app));
        context.insert("test_mode".into(), json!(app.test_mode));
        context.insert("main_module".into(), json!(app.main_module()));
        context.insert("runtime_version".into(), json!(app.runtime_version_tag));
        context.insert("host_os".into(), json!(host.host_os));
        context.insert("host_arch".into(), json!(host.host_arch));
        context.insert("platform".into(), json!(format.platform()));
        context.insert("format".into(), json!(format.output_format()));
        context.insert("year".into(), json!(chrono::Utc::now().year()));

        context.extend(format.template_context(app, host));

        let permissions = match format.permission_rules() {
            Some(rules) => format.permissions_context(app, &build_permissions(app, rules)),
            None => Map::new(),
        };
        context.extend(permissions);

        Self(context)
    }

    /// Looks up a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Adds or replaces a key.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Converts to a JSON object for rendering.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}
