//! Template engine adapter.
//!
//! A template is a directory with a [`manifest::MANIFEST_FILENAME`] at its
//! root and the tree to expand under [`manifest::CONTENT_DIR`]. Expansion
//! renders into a scratch directory next to the bundle and moves it into
//! place, so a failed render never leaves a half-written bundle behind.

pub mod manifest;
mod render;
pub mod source;

pub use manifest::TemplateManifest;
pub use render::render_tree;
pub use source::TemplateSource;

use crate::bundler::{
    error::{Error, ErrorExt, Result},
    index::{BundleLayout, PathIndex},
    utils::{Subprocess, fs},
};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Whether generation may replace an existing bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateMode {
    /// Fail with [`Error::BundleExists`] if the bundle directory exists.
    Fresh,
    /// Replace an existing bundle directory.
    Regenerate,
}

/// A template checked out on disk with its manifest loaded.
#[derive(Debug, Clone)]
pub struct ResolvedTemplate {
    /// Where the template came from.
    pub source: TemplateSource,
    /// Template checkout root.
    pub root: PathBuf,
    /// Parsed manifest.
    pub manifest: TemplateManifest,
}

impl ResolvedTemplate {
    /// Resolves `source` (cloning or refreshing remote templates under
    /// `cache_root`) and loads its manifest.
    pub async fn resolve(
        source: TemplateSource,
        branch: &str,
        cache_root: &Path,
        git: &dyn Subprocess,
    ) -> Result<Self> {
        let root = source.resolve(branch, cache_root, git).await?;
        let manifest = TemplateManifest::load(&root).await?;
        Ok(Self {
            source,
            root,
            manifest,
        })
    }

    /// Checks the template supports `format` on `host_os`.
    pub fn check_supports(&self, format: &str, host_os: &str) -> Result<()> {
        self.manifest
            .check_supports(&self.source.to_string(), format, host_os)
    }

    /// Directory holding the tree to expand.
    pub fn content_dir(&self) -> PathBuf {
        self.root.join(manifest::CONTENT_DIR)
    }

    /// Expands the template into `bundle_dir`.
    ///
    /// The bundle only appears once it is complete, path index included. If
    /// the template ships no index, one is written from `layout`.
    pub async fn generate(
        &self,
        context: &Value,
        bundle_dir: &Path,
        mode: GenerateMode,
        layout: &BundleLayout,
    ) -> Result<()> {
        let exists = bundle_dir.exists();
        if exists && mode == GenerateMode::Fresh {
            return Err(Error::BundleExists {
                path: bundle_dir.to_path_buf(),
            });
        }

        let scratch = scratch_dir(bundle_dir);
        if let Some(parent) = scratch.parent() {
            fs::create_dir_all(parent, false).await?;
        }

        log::info!("Generating bundle from template {}", self.source);
        let files = match self.expand_into(context, &scratch, layout).await {
            Ok(files) => files,
            Err(e) => {
                fs::remove_dir_all(&scratch).await?;
                return Err(e);
            }
        };

        if exists {
            log::info!("Removing old bundle at {}", bundle_dir.display());
            fs::remove_dir_all(bundle_dir).await?;
        }
        tokio::fs::rename(&scratch, bundle_dir)
            .await
            .fs_context("moving generated bundle into place", bundle_dir)?;

        log::info!("✓ Generated {} files in {}", files, bundle_dir.display());
        Ok(())
    }

    /// Renders the content tree into `dest` and makes sure it has a path index.
    async fn expand_into(&self, context: &Value, dest: &Path, layout: &BundleLayout) -> Result<usize> {
        let content = self.content_dir();
        if !content.is_dir() {
            return Err(Error::TemplateUnsupported {
                template: self.source.to_string(),
                reason: format!("no {}/ directory", manifest::CONTENT_DIR),
            });
        }

        let patterns = self
            .manifest
            .copy_without_render
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| Error::TemplateUnsupported {
                    template: self.source.to_string(),
                    reason: format!("invalid copy_without_render pattern {p}: {e}"),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let files = {
            let dest = dest.to_path_buf();
            let context = context.clone();
            tokio::task::spawn_blocking(move || render_tree(&content, &dest, &context, &patterns))
                .await
                .map_err(|e| Error::GenericError(format!("Template render task panicked: {}", e)))??
        };

        if PathIndex::load(dest).await?.is_none() {
            log::debug!("Template wrote no path index; using the format layout");
            layout.to_index(dest).save().await?;
        }
        Ok(files)
    }
}

fn scratch_dir(bundle_dir: &Path) -> PathBuf {
    let name = bundle_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bundle".into());
    bundle_dir.with_file_name(format!(".{}.partial-{}", name, uuid::Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::index::INDEX_FILENAME;
    use serde_json::json;

    fn template(root: &Path) -> ResolvedTemplate {
        ResolvedTemplate {
            source: TemplateSource::Local(root.to_path_buf()),
            root: root.to_path_buf(),
            manifest: TemplateManifest {
                formats: vec!["dummy".into()],
                ..TemplateManifest::default()
            },
        }
    }

    fn layout() -> BundleLayout {
        BundleLayout {
            app_path: "app".into(),
            app_packages_path: None,
            support_path: Some("support".into()),
        }
    }

    #[tokio::test]
    async fn layout_index_is_part_of_the_expanded_tree() {
        let source = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(source.path().join("content")).unwrap();
        std::fs::write(source.path().join("content/README"), "{{name}}").unwrap();
        let dest = tempfile::tempdir().unwrap();

        let files = template(source.path())
            .expand_into(&json!({"name": "first"}), dest.path(), &layout())
            .await
            .unwrap();

        assert_eq!(files, 1);
        let index = PathIndex::load(dest.path()).await.unwrap().unwrap();
        assert_eq!(index.app_path().unwrap(), dest.path().join("app"));
    }

    #[tokio::test]
    async fn shipped_index_is_kept() {
        let source = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(source.path().join("content")).unwrap();
        std::fs::write(
            source.path().join("content").join(INDEX_FILENAME),
            "[paths]\napp_path = \"shipped/app\"\n",
        )
        .unwrap();
        let out = tempfile::tempdir().unwrap();
        let bundle = out.path().join("bundle");

        template(source.path())
            .generate(&json!({}), &bundle, GenerateMode::Fresh, &layout())
            .await
            .unwrap();

        let index = PathIndex::load(&bundle).await.unwrap().unwrap();
        assert_eq!(index.app_path().unwrap(), bundle.join("shipped/app"));
        let leftovers: Vec<_> = std::fs::read_dir(out.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty());
    }
}
