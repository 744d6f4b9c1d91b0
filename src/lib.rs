//! Bundle creation for platform-native apps.
//!
//! Turns a project configuration into one bundle directory per app:
//! - macOS `.app` bundles
//! - Windows app folders
//! - Linux AppImage `AppDir` trees
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod bundler;
pub mod cli;
pub mod error;
pub mod metadata;

// Re-export commonly used types
pub use error::{BundlerError, CliError, Result};
