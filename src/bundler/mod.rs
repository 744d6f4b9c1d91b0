//! Bundle creation pipeline.
//!
//! Turns an app's configuration into a bundle directory ready to build:
//! verify the host and tools, expand the format's template, then install the
//! support package, requirements, app code, resources and stub binary.
//!
//! # Module Organization
//!
//! - [`builder`] - verification gate, tool cache and the per-app pipeline
//! - [`context`] - template context assembly
//! - [`index`] - the per-bundle path index
//! - [`install`] - requirement, code, resource and cleanup stages
//! - [`permissions`] - cross-platform permission mapping
//! - [`platform`] - output formats
//! - [`support`] / [`stub`] - versioned prebuilt artifacts
//! - [`template`] - template resolution and expansion

pub mod builder;
pub mod context;
pub mod error;
pub mod index;
pub mod install;
pub mod permissions;
pub mod platform;
pub mod settings;
pub mod stub;
pub mod support;
pub mod template;
pub mod utils;

pub use builder::{
    ActionRecord, AppReport, CreatePipeline, Outcome, PipelineEnv, PipelineOptions, Reporter,
    RunStatus, RunSummary, Stage, ToolCache,
};
pub use error::{Error, Result};
pub use index::{BundleLayout, IndexKey, PathIndex};
pub use platform::{AppStage, OutputFormat, Progress};
pub use settings::{AppConfig, Arch, HostEnvironment, License};
