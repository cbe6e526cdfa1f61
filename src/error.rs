//! Error handling module for benchkit
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Per-entry failures are converted to outcomes by the orchestrator; these
//! types describe what went wrong inside a single attempt.

use thiserror::Error;

/// Main error type for benchkit
#[derive(Error, Debug)]
pub enum BenchkitError {
    /// IO errors (scratch directories, log file, downloaded artifacts)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog errors (loading, validation)
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Package manager invocation errors (spawn failure, unreadable output)
    #[error("Package manager error: {0}")]
    PackageManager(String),

    /// HTTP transport errors and non-success statuses
    #[error("Download failed: {0}")]
    Download(String),

    /// Archive could not be opened or extracted
    #[error("Archive error: {0}")]
    Archive(String),

    /// Archive extracted fine but held nothing that looks like an installer
    #[error("No installer found in archive: {0}")]
    NoInstaller(String),

    /// Installer process could not be started or waited on
    #[error("Failed to launch installer: {0}")]
    Launch(String),
}

/// Result type alias for benchkit operations
pub type Result<T> = std::result::Result<T, BenchkitError>;

// Convenient error constructors
impl BenchkitError {
    /// Create a catalog error
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    /// Create a package manager error
    pub fn package_manager(msg: impl Into<String>) -> Self {
        Self::PackageManager(msg.into())
    }

    /// Create a download error
    pub fn download(msg: impl Into<String>) -> Self {
        Self::Download(msg.into())
    }

    /// Create a missing-installer error
    pub fn no_installer(msg: impl Into<String>) -> Self {
        Self::NoInstaller(msg.into())
    }

    /// Create a launch error
    pub fn launch(msg: impl Into<String>) -> Self {
        Self::Launch(msg.into())
    }
}

impl From<zip::result::ZipError> for BenchkitError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Archive(err.to_string())
    }
}

impl From<ureq::Error> for BenchkitError {
    fn from(err: ureq::Error) -> Self {
        Self::Download(err.to_string())
    }
}
