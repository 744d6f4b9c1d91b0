//! Linux output formats.

mod appimage;

pub use appimage::{AppImage, appimage_arch, desktop_entry};
