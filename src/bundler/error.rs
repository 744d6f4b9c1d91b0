//! Error types for bundle creation.
//!
//! Every failure names the resource it is about (tool, template, index key,
//! package URL, path) so the pipeline can surface it next to the stage and app
//! that raised it.

use std::{fmt::Display, io, path::PathBuf};

/// Result type alias for bundle creation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while creating a bundle.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The running host OS is not supported by the output format.
    #[error("{format} bundles cannot be created on {host_os}; supported host OS: {supported}")]
    HostUnsupported {
        /// Host OS identifier (e.g. "Linux")
        host_os: String,
        /// Output format label (e.g. "macOS app")
        format: String,
        /// Comma separated list of supported host OS identifiers
        supported: String,
    },

    /// A required external tool is absent or unverifiable.
    #[error("required tool `{tool}` is not available: {reason}")]
    MissingTool {
        /// Tool name
        tool: String,
        /// Why verification failed
        reason: String,
    },

    /// The template does not declare support for the format or host.
    #[error("template {template} is not supported: {reason}")]
    TemplateUnsupported {
        /// Template source
        template: String,
        /// What is unsupported
        reason: String,
    },

    /// A remote template could not be fetched.
    #[error("unable to fetch template {template}: {reason}")]
    TemplateNetwork {
        /// Template source
        template: String,
        /// Underlying failure
        reason: String,
    },

    /// The bundle directory exists and regeneration was not requested.
    #[error("bundle already exists at {}; regenerate to replace it", path.display())]
    BundleExists {
        /// Existing bundle directory
        path: PathBuf,
    },

    /// A required key is missing from the path index.
    #[error("path index {} does not define `{key}`", index.display())]
    MissingIndexKey {
        /// Missing key
        key: String,
        /// Index file
        index: PathBuf,
    },

    /// The path index could not be parsed or has a badly typed key.
    #[error("path index {} is invalid: {reason}", path.display())]
    InvalidIndex {
        /// Index file
        path: PathBuf,
        /// Parse or type failure
        reason: String,
    },

    /// A support package failed checksum or format validation.
    #[error("support package {package} is corrupt: {reason}")]
    CorruptSupportPackage {
        /// Package URL or path
        package: String,
        /// Validation failure
        reason: String,
    },

    /// A stub binary archive is missing its executable or the executable is unparseable.
    #[error("stub binary {package} is corrupt: {reason}")]
    CorruptStubBinary {
        /// Package URL or path
        package: String,
        /// Validation failure
        reason: String,
    },

    /// A download failed.
    #[error("unable to download {url}: {reason}")]
    Fetch {
        /// URL being fetched
        url: String,
        /// Underlying failure
        reason: String,
    },

    /// The requirement installer failed.
    #[error("unable to install requirements for {app}: {reason}")]
    RequirementsInstall {
        /// App name
        app: String,
        /// Installer output or failure
        reason: String,
    },

    /// Invalid project or app configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A command could not be spawned.
    #[error("failed to run `{command}`: {error}")]
    CommandFailed {
        /// Command line
        command: String,
        /// Spawn error
        error: io::Error,
    },

    /// A command or download exceeded its timeout.
    #[error("`{command}` timed out after {seconds}s")]
    Timeout {
        /// Command line or URL
        command: String,
        /// Timeout in seconds
        seconds: u64,
    },

    /// Filesystem failure with the operation and path involved.
    #[error("{context} {}: {error}", path.display())]
    Fs {
        /// Operation being performed
        context: &'static str,
        /// Path involved
        path: PathBuf,
        /// Underlying error
        error: io::Error,
    },

    /// Bare I/O failure.
    #[error(transparent)]
    IoError(#[from] io::Error),

    /// Template rendering failure.
    #[error("failed to render {name}: {reason}")]
    Template {
        /// Template file or name being rendered
        name: String,
        /// Handlebars error
        reason: String,
    },

    /// Catch-all error with a message.
    #[error("{0}")]
    GenericError(String),

    /// An error wrapped with additional context.
    #[error("{context}: {source}")]
    Context {
        /// Context message
        context: String,
        /// Wrapped error
        source: Box<Error>,
    },
}

impl From<walkdir::Error> for Error {
    fn from(error: walkdir::Error) -> Self {
        let path = error.path().map(PathBuf::from).unwrap_or_default();
        match error.into_io_error() {
            Some(error) => Self::Fs {
                context: "walking",
                path,
                error,
            },
            None => Self::GenericError(format!("filesystem loop at {}", path.display())),
        }
    }
}

impl From<std::path::StripPrefixError> for Error {
    fn from(error: std::path::StripPrefixError) -> Self {
        Self::GenericError(error.to_string())
    }
}

/// Attach context messages to results and options.
pub trait Context<T> {
    /// Wrap the error (or `None`) with a message.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static;

    /// Wrap the error (or `None`) with a lazily built message.
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> Context<T> for Result<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|e| Error::Context {
            context: context.to_string(),
            source: Box::new(e),
        })
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::Context {
            context: f().to_string(),
            source: Box::new(e),
        })
    }
}

impl<T> Context<T> for Option<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.ok_or_else(|| Error::GenericError(context.to_string()))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| Error::GenericError(f().to_string()))
    }
}

/// Attach the operation and path to I/O errors.
pub trait ErrorExt<T> {
    /// Convert an I/O error into [`Error::Fs`].
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, io::Error> {
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.into(),
            error,
        })
    }
}

/// Return early with a [`Error::GenericError`] built from a format string.
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::bundler::Error::GenericError(format!($msg)))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::bundler::Error::GenericError(format!($fmt, $($arg)*)))
    };
}
