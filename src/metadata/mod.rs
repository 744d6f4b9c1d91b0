//! Project configuration loading from a single `Bundle.toml`.
//!
//! A project file has a `[project]` table of settings shared by every app,
//! and one `[app.<name>]` table per app. Each app table may hold a
//! `[app.<name>.<platform>]` table, which may in turn hold a
//! `[app.<name>.<platform>.<format>]` table. The configuration for an app is
//! the merge of all four layers, with later layers taking precedence.

use crate::bundler::{AppConfig, Error};
use crate::error::Result;
use regex::Regex;
use std::{
    path::Path,
    sync::LazyLock,
};
use toml::{Table, Value};

/// Default project configuration file name.
pub const CONFIG_FILENAME: &str = "Bundle.toml";

/// Keys whose lists accumulate across layers instead of being replaced.
const LIST_KEYS: &[&str] = &["requires", "sources", "test_requires", "test_sources"];

/// Keys whose tables merge key by key across layers.
const MERGED_TABLE_KEYS: &[&str] = &["permission", "request"];

/// Table-valued keys that are data rather than nested sections.
const DATA_TABLE_KEYS: &[&str] = &["permission", "request", "license"];

/// Words that cannot be used as app names.
const RESERVED_WORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "false", "finally", "for", "from", "global", "if", "import", "in", "is",
    "lambda", "none", "nonlocal", "not", "or", "pass", "raise", "return", "true", "try", "while",
    "with", "yield", "abstract", "boolean", "byte", "case", "catch", "char", "const", "default",
    "do", "double", "enum", "extends", "final", "float", "goto", "implements", "instanceof",
    "int", "interface", "long", "native", "new", "null", "package", "private", "protected",
    "public", "short", "static", "super", "switch", "synchronized", "this", "throw", "throws",
    "transient", "void", "volatile",
];

static APP_NAME_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9._-]*[a-zA-Z0-9])$").ok());

static BUNDLE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9-]+(\.[a-zA-Z0-9-]+)+$").ok());

static VERSION_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^([1-9][0-9]*!)?(0|[1-9][0-9]*)(\.(0|[1-9][0-9]*))*",
        r"((a|b|rc)(0|[1-9][0-9]*))?",
        r"(\.post(0|[1-9][0-9]*))?",
        r"(\.dev(0|[1-9][0-9]*))?$",
    ))
    .ok()
});

fn matches(pattern: &LazyLock<Option<Regex>>, text: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(text))
}

/// Merged project configuration for one platform and output format.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    /// The `[project]` table as written.
    pub project: Table,
    /// Every app, in name order.
    pub apps: Vec<AppConfig>,
}

impl ProjectConfig {
    /// Keeps only the named apps, in the order given.
    ///
    /// An empty filter keeps every app. Naming an app the project does not
    /// declare is a configuration error.
    pub fn select(self, names: &[String]) -> Result<Vec<AppConfig>> {
        if names.is_empty() {
            return Ok(self.apps);
        }
        let mut apps = self.apps;
        names
            .iter()
            .map(|name| {
                let position = apps
                    .iter()
                    .position(|app| &app.app_name == name)
                    .ok_or_else(|| config_error(format!("Project has no app named {name:?}")))?;
                Ok(apps.remove(position))
            })
            .collect()
    }
}

/// Reads and merges the project file at `path`.
pub fn load_project(path: &Path, platform: &str, format: &str) -> Result<ProjectConfig> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| config_error(format!("Unable to read {}: {}", path.display(), e)))?;
    parse_project(&text, platform, format)
}

/// Parses and merges project configuration text.
pub fn parse_project(text: &str, platform: &str, format: &str) -> Result<ProjectConfig> {
    let mut document: Table = text
        .parse()
        .map_err(|e| config_error(format!("Invalid project configuration: {e}")))?;

    let mut project = match document.remove("project") {
        Some(Value::Table(table)) => table,
        Some(_) => return Err(config_error("[project] must be a table".into())),
        None => Table::new(),
    };
    upgrade_license(&mut project, "the project");

    let apps = match document.remove("app") {
        Some(Value::Table(apps)) if !apps.is_empty() => apps,
        _ => return Err(config_error("No apps defined in the project configuration".into())),
    };

    let mut configs = Vec::with_capacity(apps.len());
    for (name, data) in apps {
        let Value::Table(data) = data else {
            return Err(config_error(format!("[app.{name}] must be a table")));
        };
        configs.push(app_config(&project, &name, data, platform, format)?);
    }

    Ok(ProjectConfig {
        project,
        apps: configs,
    })
}

/// Merges `data` into `config`.
///
/// List keys accumulate and `permission`/`request` merge per key; every
/// other key replaces the earlier value.
pub fn merge_config(config: &mut Table, mut data: Table) {
    for key in LIST_KEYS {
        if let Some(Value::Array(values)) = data.remove(*key) {
            match config.get_mut(*key) {
                Some(Value::Array(existing)) => existing.extend(values),
                _ => {
                    config.insert(key.to_string(), Value::Array(values));
                }
            }
        }
    }
    for key in MERGED_TABLE_KEYS {
        if let Some(Value::Table(values)) = data.remove(*key) {
            match config.get_mut(*key) {
                Some(Value::Table(existing)) => existing.extend(values),
                _ => {
                    config.insert(key.to_string(), Value::Table(values));
                }
            }
        }
    }
    config.extend(data);
}

fn app_config(
    project: &Table,
    name: &str,
    mut data: Table,
    platform: &str,
    format: &str,
) -> Result<AppConfig> {
    upgrade_license(&mut data, name);
    let platform_data = take_section(&mut data, platform).map(|mut platform_data| {
        let format_data = take_section(&mut platform_data, format);
        drop_sections(&mut platform_data);
        if let Some(format_data) = format_data {
            merge_config(&mut platform_data, format_data);
        }
        platform_data
    });
    drop_sections(&mut data);

    let mut config = project.clone();
    config.insert("app_name".into(), Value::String(name.to_string()));
    merge_config(&mut config, data);
    if let Some(platform_data) = platform_data {
        merge_config(&mut config, platform_data);
    }

    if let Some(Value::String(description)) = config.get_mut("description") {
        if let Some(first) = description.lines().next() {
            *description = first.trim().to_string();
        }
    }

    let app: AppConfig = Value::Table(config)
        .try_into()
        .map_err(|e| config_error(format!("Invalid configuration for {name:?}: {e}")))?;
    validate_app(&app).map_err(config_error)?;
    Ok(app)
}

/// Removes the section named `name` (case-insensitively) from `table`.
fn take_section(table: &mut Table, name: &str) -> Option<Table> {
    let key = table
        .iter()
        .find(|(key, value)| value.is_table() && key.eq_ignore_ascii_case(name))
        .map(|(key, _)| key.clone())?;
    match table.remove(&key) {
        Some(Value::Table(section)) => Some(section),
        _ => None,
    }
}

/// Drops nested sections for other platforms and formats.
fn drop_sections(table: &mut Table) {
    let sections: Vec<String> = table
        .iter()
        .filter(|(key, value)| value.is_table() && !DATA_TABLE_KEYS.contains(&key.as_str()))
        .map(|(key, _)| key.clone())
        .collect();
    for key in sections {
        table.remove(&key);
    }
}

/// A plain string license names the license; treat it as `license.file`.
fn upgrade_license(table: &mut Table, section: &str) {
    if let Some(Value::String(license)) = table.get("license") {
        log::warn!(
            "License for {} is given as a string ({:?}); use license.file or license.text",
            section,
            license
        );
        let mut file = Table::new();
        file.insert("file".into(), Value::String("LICENSE".into()));
        table.insert("license".into(), Value::Table(file));
    }
}

/// Checks the app's identity fields.
pub fn validate_app(app: &AppConfig) -> std::result::Result<(), String> {
    if !is_valid_app_name(&app.app_name) {
        return Err(format!(
            "{:?} is not a valid app name. App names may only include letters, numbers, \
             '-' and '_', must start and end with a letter or number, and must not be a \
             reserved word.",
            app.app_name
        ));
    }
    if !matches(&BUNDLE_RE, &app.bundle) {
        return Err(format!(
            "{:?} is not a valid bundle identifier. The bundle must contain at least 2 \
             dot-separated sections of letters, numbers and hyphens.",
            app.bundle
        ));
    }
    if !matches(&VERSION_RE, &app.version) {
        return Err(format!(
            "Version number for {:?} ({}) is not a canonical version",
            app.app_name, app.version
        ));
    }

    if !app.sources.is_empty() {
        let mut modules: Vec<&str> = app
            .sources
            .iter()
            .map(|source| source.rsplit('/').next().unwrap_or(source))
            .collect();
        modules.sort_unstable();
        modules.dedup();
        if modules.len() != app.sources.len() {
            return Err(format!(
                "The sources list for {:?} contains duplicated package names",
                app.app_name
            ));
        }
        let module = app.module_name();
        if !modules.contains(&module.as_str()) {
            return Err(format!(
                "The sources list for {:?} does not include a package named {:?}",
                app.app_name, module
            ));
        }
    }

    if let Some(url) = &app.url {
        match url::Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => {}
            _ => return Err(format!("{url:?} is not a valid website URL")),
        }
    }
    Ok(())
}

/// Whether `name` is usable as an app name.
pub fn is_valid_app_name(name: &str) -> bool {
    matches(&APP_NAME_RE, name) && !RESERVED_WORDS.contains(&name.to_lowercase().as_str())
}

fn config_error(message: String) -> crate::error::BundlerError {
    Error::Config(message).into()
}
