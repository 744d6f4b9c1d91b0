//! macOS output formats.

mod app;

pub use app::{MacOsApp, MacOsPermissions};
