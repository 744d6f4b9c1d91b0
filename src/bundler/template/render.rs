//! Handlebars expansion of a template tree.

use crate::bundler::error::{Error, ErrorExt, Result};
use handlebars::Handlebars;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Expands `source` into `dest`.
///
/// Directory names, file names and UTF-8 file contents are rendered against
/// `context`. Files matching one of `verbatim` (relative to `source`), and
/// files that are not UTF-8, are copied byte for byte. Unix permission bits
/// are carried over.
pub fn render_tree(
    source: &Path,
    dest: &Path,
    context: &Value,
    verbatim: &[glob::Pattern],
) -> Result<usize> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);

    std::fs::create_dir_all(dest).fs_context("creating directory", dest)?;

    let mut files = 0;
    for entry in walkdir::WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let relative = entry.path().strip_prefix(source)?;
        let target = dest.join(render_path(&handlebars, relative, context)?);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).fs_context("creating directory", &target)?;
            continue;
        }

        let bytes = std::fs::read(entry.path()).fs_context("reading template file", entry.path())?;
        let copy_verbatim = verbatim.iter().any(|p| p.matches_path(relative));
        let output = match String::from_utf8(bytes) {
            Ok(text) if !copy_verbatim => handlebars
                .render_template(&text, context)
                .map_err(|e| Error::Template {
                    name: relative.display().to_string(),
                    reason: e.to_string(),
                })?
                .into_bytes(),
            Ok(text) => text.into_bytes(),
            Err(e) => e.into_bytes(),
        };

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).fs_context("creating directory", parent)?;
        }
        std::fs::write(&target, output).fs_context("writing rendered file", &target)?;

        let permissions = entry
            .metadata()?
            .permissions();
        std::fs::set_permissions(&target, permissions).fs_context("setting permissions on", &target)?;
        files += 1;
    }

    Ok(files)
}

fn render_path(handlebars: &Handlebars<'_>, relative: &Path, context: &Value) -> Result<PathBuf> {
    relative
        .components()
        .map(|component| {
            let name = component.as_os_str().to_string_lossy();
            if !name.contains("{{") {
                return Ok(name.into_owned());
            }
            handlebars
                .render_template(&name, context)
                .map_err(|e| Error::Template {
                    name: relative.display().to_string(),
                    reason: e.to_string(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_names_and_contents() {
        let source = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let nested = source.path().join("{{ formal_name }}.app");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("Info.txt"), "id={{ bundle_identifier }}").unwrap();
        std::fs::write(source.path().join("raw.txt"), "{{ untouched }}").unwrap();

        let patterns = vec![glob::Pattern::new("raw.txt").unwrap()];
        let context = json!({"formal_name": "First App", "bundle_identifier": "com.example.first"});
        let count = render_tree(source.path(), dest.path(), &context, &patterns).unwrap();

        assert_eq!(count, 2);
        assert_eq!(
            std::fs::read_to_string(dest.path().join("First App.app/Info.txt")).unwrap(),
            "id=com.example.first"
        );
        assert_eq!(
            std::fs::read_to_string(dest.path().join("raw.txt")).unwrap(),
            "{{ untouched }}"
        );
    }
}
