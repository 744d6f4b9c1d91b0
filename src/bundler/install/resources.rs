//! Icon and splash installation.
//!
//! Formats describe the files they want as [`ResourceCopy`] entries; the
//! source is found from the app's configured prefix plus an optional size
//! suffix and the extension (`icons/app-256.png`).

use crate::bundler::{error::Result, platform::Progress, utils::fs};
use std::path::{Path, PathBuf};

/// One auxiliary file the format wants in the bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceCopy {
    /// What the file is, for messages ("icon", "splash").
    pub role: &'static str,
    /// Configured path prefix, relative to the project root.
    pub source_prefix: String,
    /// Pixel size variant, appended as `-<size>` to the prefix.
    pub size: Option<u32>,
    /// File extension without the dot.
    pub extension: &'static str,
    /// Destination inside the bundle.
    pub target: PathBuf,
}

impl ResourceCopy {
    /// Source file for this resource, relative to `base_path`.
    pub fn source(&self, base_path: &Path) -> PathBuf {
        let name = match self.size {
            Some(size) => format!("{}-{}.{}", self.source_prefix, size, self.extension),
            None => format!("{}.{}", self.source_prefix, self.extension),
        };
        base_path.join(name)
    }

    fn label(&self) -> String {
        match self.size {
            Some(size) => format!("{}x{} {}", size, size, self.role),
            None => self.role.to_string(),
        }
    }
}

/// Copies resources into the bundle.
///
/// A missing source is reported and skipped; the default template resource
/// stays in place. PNG variants with a declared size are checked for their
/// actual dimensions.
pub async fn install_resources(resources: &[ResourceCopy], base_path: &Path) -> Result<Progress> {
    if resources.is_empty() {
        return Ok(Progress::Skipped("format declares no resources".into()));
    }

    let mut installed = 0;
    for resource in resources {
        let source = resource.source(base_path);
        if !source.is_file() {
            log::warn!(
                "Unable to find {} at {}; using the template default",
                resource.label(),
                source.display()
            );
            continue;
        }

        if let (Some(size), "png") = (resource.size, resource.extension) {
            check_dimensions(&source, size, resource.role);
        }

        log::debug!("Installing {} from {}", resource.label(), source.display());
        fs::copy_file(&source, &resource.target).await?;
        installed += 1;
    }

    if installed == 0 {
        return Ok(Progress::Skipped("no resource files found".into()));
    }
    log::info!("✓ Installed {} resource file(s)", installed);
    Ok(Progress::Done)
}

fn check_dimensions(source: &Path, size: u32, role: &str) {
    match image::image_dimensions(source) {
        Ok((width, height)) if width == size && height == size => {}
        Ok((width, height)) => log::warn!(
            "{} {} is {}x{}, expected {}x{}",
            role,
            source.display(),
            width,
            height,
            size,
            size
        ),
        Err(e) => log::warn!("Unable to read {} {}: {}", role, source.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_name_includes_size() {
        let icon = ResourceCopy {
            role: "icon",
            source_prefix: "icons/first".into(),
            size: Some(256),
            extension: "png",
            target: PathBuf::from("/bundle/icon.png"),
        };
        assert_eq!(icon.source(Path::new("/p")), PathBuf::from("/p/icons/first-256.png"));
    }
}
