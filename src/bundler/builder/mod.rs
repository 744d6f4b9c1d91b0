//! Pipeline orchestration and coordination.
//!
//! This module provides the [`CreatePipeline`] that turns app configurations
//! into bundle directories for one output format.
//!
//! # Overview
//!
//! For the run as a whole:
//! 1. `verify_host` - the host OS must be one the format supports
//! 2. `verify_tools` - the runtime and the format's tools must be present
//!
//! Then, for each app in turn:
//! 1. `finalize_app_config` - resolve tool-dependent defaults
//! 2. `verify_app_template` / `verify_app_tools`
//! 3. `generate_app_template` - skipped when the bundle already exists
//! 4. support package, requirements, code, resources, stub binary
//! 5. `cleanup_app_content`
//!
//! # Example
//!
//! ```no_run
//! use kodegen_bundler_create::bundler::{
//!     CreatePipeline, PipelineEnv, builder::LogReporter, platform,
//! };
//!
//! # async fn example(env: PipelineEnv, apps: Vec<kodegen_bundler_create::bundler::AppConfig>)
//! #     -> kodegen_bundler_create::bundler::Result<()> {
//! let format = platform::lookup("linux", "appimage").expect("shipped format");
//! let summary = CreatePipeline::new(format.as_ref(), &env, &LogReporter)
//!     .run(apps)
//!     .await?;
//! println!("{:?}", summary.status());
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`actions`] - stage records, run summary and the reporter sink
//! - [`gate`] - host, tool and per-app template verification
//! - [`orchestrator`] - the [`CreatePipeline`] itself
//! - [`stages`] - default stage implementations
//! - [`tool_detection`] - run-scoped tool verification cache

pub mod actions;
pub mod gate;
pub mod orchestrator;
pub mod stages;
pub mod tool_detection;

pub use actions::{
    ActionRecord, AppReport, LogReporter, Outcome, Reporter, RunStatus, RunSummary, Stage,
};
pub use orchestrator::{APP_STAGES, CreatePipeline, PipelineEnv, PipelineOptions};
pub use tool_detection::{
    SystemToolProvider, Tool, ToolCache, ToolProvider, ToolRequirement, VerifiedTool,
};
