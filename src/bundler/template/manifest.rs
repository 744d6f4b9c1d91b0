//! `template.toml`: what a template supports and how to expand it.
//!
//! ```toml
//! formats = ["app"]
//! host_os = ["Darwin"]
//! copy_without_render = ["**/*.png", "**/*.icns"]
//! ```

use crate::bundler::error::{Error, ErrorExt, Result};
use serde::Deserialize;
use std::path::Path;

/// Manifest file name at the template root.
pub const MANIFEST_FILENAME: &str = "template.toml";

/// Directory under the template root holding the tree to expand.
pub const CONTENT_DIR: &str = "content";

/// Parsed `template.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct TemplateManifest {
    /// Output formats the template can produce.
    #[serde(default)]
    pub formats: Vec<String>,

    /// Host OS identifiers the template works on. Empty means any.
    #[serde(default)]
    pub host_os: Vec<String>,

    /// Globs (relative to `content/`) copied byte for byte instead of rendered.
    #[serde(default)]
    pub copy_without_render: Vec<String>,
}

impl TemplateManifest {
    /// Reads the manifest at the root of a template checkout.
    pub async fn load(template_root: &Path) -> Result<Self> {
        let path = template_root.join(MANIFEST_FILENAME);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::TemplateUnsupported {
                    template: template_root.display().to_string(),
                    reason: format!("no {MANIFEST_FILENAME} manifest"),
                });
            }
            Err(e) => return Err(e).fs_context("reading template manifest", &path),
        };
        toml::from_str(&content).map_err(|e| Error::TemplateUnsupported {
            template: template_root.display().to_string(),
            reason: format!("invalid {MANIFEST_FILENAME}: {e}"),
        })
    }

    /// Checks the template declares support for `format` on `host_os`.
    pub fn check_supports(&self, template: &str, format: &str, host_os: &str) -> Result<()> {
        if !self.formats.iter().any(|f| f.eq_ignore_ascii_case(format)) {
            return Err(Error::TemplateUnsupported {
                template: template.to_string(),
                reason: format!(
                    "it does not support the {} format (supported: {})",
                    format,
                    self.formats.join(", ")
                ),
            });
        }
        if !self.host_os.is_empty() && !self.host_os.iter().any(|os| os == host_os) {
            return Err(Error::TemplateUnsupported {
                template: template.to_string(),
                reason: format!(
                    "it cannot be used on {} (supported: {})",
                    host_os,
                    self.host_os.join(", ")
                ),
            });
        }
        Ok(())
    }
}
