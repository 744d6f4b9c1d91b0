//! Shared utilities: filesystem, downloads, subprocesses, archives, checksums.

pub mod archive;
pub mod checksum;
pub mod fs;
pub mod http;
pub mod process;

pub use archive::{ArchiveError, ArchiveFormat};
pub use http::{Downloader, HttpDownloader};
pub use process::{CommandOutput, Subprocess, TokioSubprocess};
