//! Path index: the per-bundle ledger of where the template put things.
//!
//! The index lives at [`INDEX_FILENAME`] in the bundle directory and holds a
//! `[paths]` table:
//!
//! ```toml
//! [paths]
//! app_path = "src/app"
//! app_packages_path = "src/app_packages"
//! support_path = "support"
//! support_revision = 37
//! ```
//!
//! Paths are bundle-relative strings, revisions are integers. Edits go through
//! [`toml_edit`], so keys this version does not know about, comments and
//! formatting survive a rewrite untouched.

use crate::bundler::error::{Error, ErrorExt, Result};
use std::path::{Path, PathBuf};
use toml_edit::{DocumentMut, Item, Table, value};

/// File name of the path index inside a bundle directory.
pub const INDEX_FILENAME: &str = "bundle-index.toml";

const PATHS: &str = "paths";

/// Keys of the `[paths]` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKey {
    /// Location of the copied app code. Required.
    AppPath,
    /// Install target for third-party requirements.
    AppPackagesPath,
    /// Requirements file written instead of installing.
    AppRequirementsPath,
    /// Installer arguments file written next to the requirements file.
    AppRequirementInstallerArgsPath,
    /// Extraction target for the support package.
    SupportPath,
    /// Installed support package revision.
    SupportRevision,
    /// Installed stub binary revision.
    StubBinaryRevision,
}

impl IndexKey {
    /// Key name as written in the index file.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppPath => "app_path",
            Self::AppPackagesPath => "app_packages_path",
            Self::AppRequirementsPath => "app_requirements_path",
            Self::AppRequirementInstallerArgsPath => "app_requirement_installer_args_path",
            Self::SupportPath => "support_path",
            Self::SupportRevision => "support_revision",
            Self::StubBinaryRevision => "stub_binary_revision",
        }
    }
}

/// Where a format's template puts things, used to write an index when the
/// template did not ship one and to pick defaults for optional keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleLayout {
    /// Bundle-relative app code location.
    pub app_path: String,
    /// Bundle-relative requirement install target.
    pub app_packages_path: Option<String>,
    /// Bundle-relative support package location.
    pub support_path: Option<String>,
}

impl BundleLayout {
    /// Builds an index recording this layout.
    pub fn to_index(&self, bundle_dir: &Path) -> PathIndex {
        let mut index = PathIndex::new(bundle_dir);
        index.set_path(IndexKey::AppPath, &self.app_path);
        if let Some(packages) = &self.app_packages_path {
            index.set_path(IndexKey::AppPackagesPath, packages);
        }
        if let Some(support) = &self.support_path {
            index.set_path(IndexKey::SupportPath, support);
        }
        index
    }
}

/// A loaded (or freshly created) path index.
#[derive(Debug, Clone)]
pub struct PathIndex {
    bundle_dir: PathBuf,
    document: DocumentMut,
}

impl PathIndex {
    /// Location of the index file for a bundle.
    pub fn index_path(bundle_dir: &Path) -> PathBuf {
        bundle_dir.join(INDEX_FILENAME)
    }

    /// Creates an empty index for a bundle. Nothing is written until [`save`](Self::save).
    pub fn new(bundle_dir: &Path) -> Self {
        let mut document = DocumentMut::new();
        document.insert(PATHS, Item::Table(Table::new()));
        Self {
            bundle_dir: bundle_dir.to_path_buf(),
            document,
        }
    }

    /// Loads the index, or `None` if the bundle has no index yet.
    pub async fn load(bundle_dir: &Path) -> Result<Option<Self>> {
        let path = Self::index_path(bundle_dir);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).fs_context("reading path index", &path),
        };
        let document = content
            .parse::<DocumentMut>()
            .map_err(|e| Error::InvalidIndex {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        if let Some(paths) = document.get(PATHS) {
            if !paths.is_table_like() {
                return Err(Error::InvalidIndex {
                    path,
                    reason: format!("`{PATHS}` is not a table"),
                });
            }
        }
        Ok(Some(Self {
            bundle_dir: bundle_dir.to_path_buf(),
            document,
        }))
    }

    /// Loads the index, failing if the template has never been generated.
    pub async fn load_required(bundle_dir: &Path) -> Result<Self> {
        Self::load(bundle_dir)
            .await?
            .ok_or_else(|| Error::InvalidIndex {
                path: Self::index_path(bundle_dir),
                reason: "no path index; the app template has not been generated".into(),
            })
    }

    /// Writes the index back to the bundle.
    ///
    /// The document is written to a scratch file and renamed into place, so
    /// an interrupted save leaves the previous index intact.
    pub async fn save(&self) -> Result<()> {
        let path = Self::index_path(&self.bundle_dir);
        let scratch = path.with_extension("toml.partial");
        tokio::fs::write(&scratch, self.document.to_string())
            .await
            .fs_context("writing path index", &scratch)?;
        tokio::fs::rename(&scratch, &path)
            .await
            .fs_context("replacing path index", &path)?;
        Ok(())
    }

    /// Re-reads the on-disk index, applies `edit`, and writes it back.
    ///
    /// Use this from installer stages so edits merge with whatever an earlier
    /// stage recorded.
    pub async fn update<F>(bundle_dir: &Path, edit: F) -> Result<Self>
    where
        F: FnOnce(&mut PathIndex) -> Result<()>,
    {
        let mut index = Self::load_required(bundle_dir).await?;
        edit(&mut index)?;
        index.save().await?;
        Ok(index)
    }

    /// Bundle directory this index belongs to.
    pub fn bundle_dir(&self) -> &Path {
        &self.bundle_dir
    }

    /// Location of the app code. Required.
    pub fn app_path(&self) -> Result<PathBuf> {
        self.path(IndexKey::AppPath)?
            .ok_or_else(|| self.missing(IndexKey::AppPath))
    }

    /// Requirement install target, if the template declares one.
    pub fn app_packages_path(&self) -> Result<Option<PathBuf>> {
        self.path(IndexKey::AppPackagesPath)
    }

    /// Requirements file location, if the template declares one.
    pub fn app_requirements_path(&self) -> Result<Option<PathBuf>> {
        self.path(IndexKey::AppRequirementsPath)
    }

    /// Installer arguments file location, if the template declares one.
    pub fn app_requirement_installer_args_path(&self) -> Result<Option<PathBuf>> {
        self.path(IndexKey::AppRequirementInstallerArgsPath)
    }

    /// Support package location; `None` if never chosen.
    pub fn support_path(&self) -> Result<Option<PathBuf>> {
        self.path(IndexKey::SupportPath)
    }

    /// Installed support revision; `None` means unset (never installed).
    pub fn support_revision(&self) -> Result<Option<u64>> {
        self.revision(IndexKey::SupportRevision)
    }

    /// Installed stub binary revision; `None` means unset (never installed).
    pub fn stub_binary_revision(&self) -> Result<Option<u64>> {
        self.revision(IndexKey::StubBinaryRevision)
    }

    /// Resolves a path key against the bundle directory.
    pub fn path(&self, key: IndexKey) -> Result<Option<PathBuf>> {
        Ok(self.raw_str(key)?.map(|rel| self.bundle_dir.join(rel)))
    }

    /// Raw bundle-relative string for a path key.
    pub fn raw_str(&self, key: IndexKey) -> Result<Option<&str>> {
        match self.item(key.as_str()) {
            None => Ok(None),
            Some(item) => item
                .as_str()
                .map(Some)
                .ok_or_else(|| self.mistyped(key, "a string")),
        }
    }

    /// Reads a revision key.
    pub fn revision(&self, key: IndexKey) -> Result<Option<u64>> {
        match self.item(key.as_str()) {
            None => Ok(None),
            Some(item) => item
                .as_integer()
                .and_then(|n| u64::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| self.mistyped(key, "a non-negative integer")),
        }
    }

    /// Records a bundle-relative path.
    pub fn set_path(&mut self, key: IndexKey, relative: &str) {
        self.paths_mut().insert(key.as_str(), value(relative));
    }

    /// Records a revision.
    pub fn set_revision(&mut self, key: IndexKey, revision: u64) {
        let revision = i64::try_from(revision).unwrap_or(i64::MAX);
        self.paths_mut().insert(key.as_str(), value(revision));
    }

    /// Removes a key, returning whether it was present.
    pub fn remove(&mut self, key: IndexKey) -> bool {
        self.paths_mut().remove(key.as_str()).is_some()
    }

    /// Converts an absolute path inside the bundle to the relative form stored in the index.
    pub fn relative_to_bundle(&self, path: &Path) -> Result<String> {
        let relative = path.strip_prefix(&self.bundle_dir)?;
        Ok(relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"))
    }

    fn item(&self, key: &str) -> Option<&Item> {
        self.document
            .get(PATHS)
            .and_then(Item::as_table_like)
            .and_then(|paths| paths.get(key))
    }

    fn paths_mut(&mut self) -> &mut dyn toml_edit::TableLike {
        let item = self
            .document
            .as_table_mut()
            .entry(PATHS)
            .or_insert(Item::Table(Table::new()));
        if !item.is_table_like() {
            *item = Item::Table(Table::new());
        }
        match item.as_table_like_mut() {
            Some(paths) => paths,
            None => unreachable!("`paths` was just made a table"),
        }
    }

    fn missing(&self, key: IndexKey) -> Error {
        Error::MissingIndexKey {
            key: key.as_str().into(),
            index: Self::index_path(&self.bundle_dir),
        }
    }

    fn mistyped(&self, key: IndexKey, expected: &str) -> Error {
        Error::InvalidIndex {
            path: Self::index_path(&self.bundle_dir),
            reason: format!("`{}` must be {expected}", key.as_str()),
        }
    }
}
