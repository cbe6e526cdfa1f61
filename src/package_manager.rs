//! Package-manager adapter
//!
//! The orchestrator talks to the system package manager through the
//! [`PackageManager`] trait. Backends implement three primitives (availability
//! probe, exact-id installed query, a single install attempt); the shared
//! policy lives in the provided methods:
//!
//! - errors from a query count as "not installed";
//! - a pinned install that fails is retried exactly once without the pin;
//! - install failures are return values, never errors.
//!
//! [`Winget`] is the production backend.

use crate::error::{BenchkitError, Result};
use crate::process_guard::CommandProcessGroup;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

/// Access to a system package manager.
pub trait PackageManager {
    /// Human-readable backend name for notices
    fn name(&self) -> &str;

    /// True if the package manager CLI is reachable on this system
    fn check_available(&self) -> bool;

    /// Query the installed-package listing for an exact id
    fn query_installed(&self, package_id: &str) -> Result<bool>;

    /// One install attempt; `Ok(true)` iff the package manager reported success
    fn install_once(&self, package_id: &str, version: Option<&str>) -> Result<bool>;

    /// Refresh package sources before a run
    fn refresh_sources(&self) -> Result<()> {
        Ok(())
    }

    /// Installed-state check that never fails: errors mean "not installed"
    fn is_installed(&self, package_id: &str) -> bool {
        match self.query_installed(package_id) {
            Ok(installed) => installed,
            Err(e) => {
                tracing::warn!("Installed-state query for {} failed: {}", package_id, e);
                false
            }
        }
    }

    /// Install `package_id`, pinned to `version` when given.
    ///
    /// If the pinned attempt fails, retries once for the latest version.
    /// At most two attempts; returns true iff one of them succeeded.
    fn install(&self, package_id: &str, version: Option<&str>) -> bool {
        let first = attempt(self, package_id, version);
        if first {
            return true;
        }

        match version {
            Some(pinned) => {
                tracing::warn!(
                    "Pinned install of {} {} failed, retrying with latest version",
                    package_id,
                    pinned
                );
                attempt(self, package_id, None)
            }
            None => false,
        }
    }
}

fn attempt<P: PackageManager + ?Sized>(pm: &P, package_id: &str, version: Option<&str>) -> bool {
    match pm.install_once(package_id, version) {
        Ok(success) => success,
        Err(e) => {
            tracing::warn!("Install attempt for {} failed: {}", package_id, e);
            false
        }
    }
}

/// winget exit codes that mean the package is already in the requested state
/// (APPINSTALLER_CLI_ERROR_UPDATE_NOT_APPLICABLE, ..._PACKAGE_ALREADY_INSTALLED)
const ALREADY_SATISFIED_CODES: &[u32] = &[0x8A15_002B, 0x8A15_0061];

/// The Windows Package Manager command-line client.
#[derive(Debug, Clone)]
pub struct Winget {
    program: PathBuf,
    source: String,
}

impl Winget {
    pub const DEFAULT_PROGRAM: &'static str = "winget";
    /// The single trusted source queried and installed from
    pub const TRUSTED_SOURCE: &'static str = "winget";

    pub fn new() -> Self {
        Self::with_program(Self::DEFAULT_PROGRAM)
    }

    /// Use a specific winget executable (name on PATH or a full path)
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            source: Self::TRUSTED_SOURCE.to_string(),
        }
    }

    fn list_args(&self, package_id: &str) -> Vec<String> {
        vec![
            "list".to_string(),
            "--id".to_string(),
            package_id.to_string(),
            "--exact".to_string(),
            "--source".to_string(),
            self.source.clone(),
            "--accept-source-agreements".to_string(),
            "--disable-interactivity".to_string(),
        ]
    }

    fn install_args(&self, package_id: &str, version: Option<&str>) -> Vec<String> {
        let mut args = vec![
            "install".to_string(),
            "--id".to_string(),
            package_id.to_string(),
            "--exact".to_string(),
            "--source".to_string(),
            self.source.clone(),
            "--silent".to_string(),
            "--accept-package-agreements".to_string(),
            "--accept-source-agreements".to_string(),
            "--disable-interactivity".to_string(),
        ];
        if let Some(version) = version {
            args.push("--version".to_string());
            args.push(version.to_string());
        }
        args
    }

    fn run(&self, args: &[String]) -> Result<Output> {
        tracing::debug!("Running {} {}", self.program.display(), args.join(" "));

        Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .in_new_process_group()
            .output()
            .map_err(|e| {
                BenchkitError::package_manager(format!(
                    "failed to run {}: {}",
                    self.program.display(),
                    e
                ))
            })
    }
}

impl Default for Winget {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageManager for Winget {
    fn name(&self) -> &str {
        "winget"
    }

    fn check_available(&self) -> bool {
        match which::which(&self.program) {
            Ok(path) => {
                tracing::debug!("Found winget at {}", path.display());
                true
            }
            Err(e) => {
                tracing::debug!("winget not reachable: {}", e);
                false
            }
        }
    }

    fn query_installed(&self, package_id: &str) -> Result<bool> {
        let output = self.run(&self.list_args(package_id))?;
        if !output.status.success() {
            tracing::debug!(
                "winget list for {} exited with {:?}",
                package_id,
                output.status.code()
            );
            return Ok(false);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(listing_contains(&stdout, package_id))
    }

    fn install_once(&self, package_id: &str, version: Option<&str>) -> Result<bool> {
        tracing::info!(
            "winget install {} ({})",
            package_id,
            version.unwrap_or("latest")
        );

        let output = self.run(&self.install_args(package_id, version))?;
        if output.status.success() || is_already_satisfied(output.status.code()) {
            return Ok(true);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::warn!(
            "winget install {} exited with {:?}: {} {}",
            package_id,
            output.status.code(),
            stdout.trim(),
            stderr.trim()
        );
        Ok(false)
    }

    fn refresh_sources(&self) -> Result<()> {
        let output = self.run(&[
            "source".to_string(),
            "update".to_string(),
            "--name".to_string(),
            self.source.clone(),
        ])?;
        if output.status.success() {
            Ok(())
        } else {
            Err(BenchkitError::package_manager(format!(
                "source update exited with {:?}",
                output.status.code()
            )))
        }
    }
}

/// An exact id match somewhere in the listing table, ignoring case
fn listing_contains(listing: &str, package_id: &str) -> bool {
    let wanted = package_id.to_ascii_lowercase();
    listing.lines().any(|line| {
        line.split_whitespace()
            .any(|column| column.to_ascii_lowercase() == wanted)
    })
}

fn is_already_satisfied(code: Option<i32>) -> bool {
    code.map(|c| ALREADY_SATISFIED_CODES.contains(&(c as u32)))
        .unwrap_or(false)
}
