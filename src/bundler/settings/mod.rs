//! Configuration structures for bundle creation.
//!
//! App configuration, host description and architecture names used across
//! the pipeline.

mod app;
mod arch;
mod host;

pub use app::{AppConfig, License};
pub use arch::Arch;
pub use host::{HostEnvironment, os_identifier};
