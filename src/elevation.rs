//! Pre-flight privilege check
//!
//! Silent installers need administrator rights. benchkit never re-launches
//! itself; it checks once at startup and reports one of three states so the
//! caller decides what to do.

#[cfg(windows)]
use std::process::{Command, Stdio};
use strum::Display;

/// Environment variable that skips the elevation precondition
pub const SKIP_ELEVATION_ENV: &str = "BENCHKIT_SKIP_ELEVATION_CHECK";

/// Result of the privilege precondition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Elevation {
    /// Running as root / an elevated administrator
    #[strum(serialize = "already privileged")]
    AlreadyPrivileged,
    /// Not privileged, but the OS offers a way to elevate
    #[strum(serialize = "needs elevation")]
    NeedsElevation,
    /// Not privileged and no elevation mechanism was found
    #[strum(serialize = "cannot elevate")]
    CannotElevate,
}

impl Elevation {
    pub fn is_privileged(self) -> bool {
        self == Elevation::AlreadyPrivileged
    }

    /// One-line instruction for the operator
    pub fn advice(self) -> &'static str {
        match self {
            Elevation::AlreadyPrivileged => "running with administrator rights",
            #[cfg(windows)]
            Elevation::NeedsElevation => {
                "re-run benchkit from an elevated (Run as administrator) terminal"
            }
            #[cfg(not(windows))]
            Elevation::NeedsElevation => "re-run benchkit with sudo",
            Elevation::CannotElevate => {
                "administrator rights are required but no elevation mechanism is available"
            }
        }
    }
}

/// Determine the current privilege state
#[cfg(unix)]
pub fn check_elevation() -> Elevation {
    if nix::unistd::geteuid().is_root() {
        Elevation::AlreadyPrivileged
    } else if which::which("sudo").is_ok() {
        Elevation::NeedsElevation
    } else {
        Elevation::CannotElevate
    }
}

/// Determine the current privilege state.
///
/// `net session` only succeeds from an elevated token.
#[cfg(windows)]
pub fn check_elevation() -> Elevation {
    let status = Command::new("net")
        .arg("session")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    classify_probe(status.map(|s| s.success()))
}

#[cfg(not(any(unix, windows)))]
pub fn check_elevation() -> Elevation {
    Elevation::CannotElevate
}

#[cfg_attr(not(windows), allow(dead_code))]
fn classify_probe(probe: std::io::Result<bool>) -> Elevation {
    match probe {
        Ok(true) => Elevation::AlreadyPrivileged,
        Ok(false) => Elevation::NeedsElevation,
        Err(e) => {
            tracing::debug!("Elevation probe could not run: {}", e);
            Elevation::CannotElevate
        }
    }
}

/// Honour `BENCHKIT_SKIP_ELEVATION_CHECK=1` (or `true`)
pub fn should_skip_elevation_check() -> bool {
    skip_requested(std::env::var(SKIP_ELEVATION_ENV).ok().as_deref())
}

fn skip_requested(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        Some(v) => v == "1" || v.eq_ignore_ascii_case("true"),
        None => false,
    }
}
