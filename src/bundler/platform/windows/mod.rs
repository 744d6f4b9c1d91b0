//! Windows output formats.

mod app;

pub use app::{WindowsApp, map_arch, version_quad};
