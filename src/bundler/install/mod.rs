//! Dependency and resource installation stages.

mod cleanup;
mod code;
mod requirements;
mod resources;

pub use cleanup::cleanup;
pub use code::install_app_code;
pub use requirements::{DEFAULT_APP_PACKAGES_PATH, RequirementInstaller};
pub use resources::{ResourceCopy, install_resources};
