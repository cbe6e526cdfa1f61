//! benchkit library
//!
//! Installs a catalog of GPU benchmarking and tuning applications through
//! the system package manager, falling back to direct-download installers.

pub mod archive;
pub mod catalog;
pub mod cli;
pub mod elevation;
pub mod error;
pub mod fallback;
pub mod orchestrator;
pub mod package_manager;
pub mod process_guard;
pub mod transcript;

// Re-export main types for convenience
pub use catalog::{AppDescriptor, Catalog};
pub use elevation::{check_elevation, Elevation};
pub use error::{BenchkitError, Result};
pub use fallback::{FallbackInstaller, FallbackRequest, UrlInstaller};
pub use orchestrator::{
    EntryReport, FailureReason, InstallMethod, Orchestrator, Outcome, PlannedAction, PlannedEntry,
    RunReport,
};
pub use package_manager::{PackageManager, Winget};
pub use process_guard::{ChildRegistry, CommandProcessGroup, ProcessGuard};
pub use transcript::{FileTranscript, MemoryTranscript, NoticeLevel, Transcript};
