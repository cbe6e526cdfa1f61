//! Main control loop: resolve every catalog entry in order.
//!
//! Each entry goes through the same steps, strictly one after another:
//!
//! 1. already installed according to the package manager → done, no side effects
//! 2. package-manager install (pinned, then unpinned once)
//! 3. direct-download fallback, only if step 2 did not succeed
//! 4. record the outcome and move on
//!
//! A failure in one entry never stops the run, and nothing done for earlier
//! entries is rolled back.

use crate::catalog::AppDescriptor;
use crate::fallback::{FallbackInstaller, FallbackRequest};
use crate::package_manager::PackageManager;
use crate::transcript::Transcript;
use strum::Display;

/// How an application ended up installed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum InstallMethod {
    #[strum(serialize = "package manager")]
    PackageManager,
    #[strum(serialize = "direct download")]
    Fallback,
}

/// Why an entry could not be installed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum FailureReason {
    #[strum(serialize = "no package id and no fallback URL")]
    Unactionable,
    #[strum(serialize = "package manager unavailable and no fallback URL")]
    PackageManagerUnavailable,
    #[strum(serialize = "package manager install failed and no fallback URL")]
    PackageManagerFailed,
    #[strum(serialize = "fallback installer failed")]
    FallbackFailed,
}

/// Final state of one catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    AlreadyInstalled,
    Installed(InstallMethod),
    Failed(FailureReason),
}

impl Outcome {
    /// Already present counts as success
    pub fn is_success(self) -> bool {
        !matches!(self, Outcome::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryReport {
    pub name: String,
    pub outcome: Outcome,
}

/// Ordered per-entry outcomes of one run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunReport {
    pub package_manager_available: bool,
    pub entries: Vec<EntryReport>,
}

impl RunReport {
    pub fn outcomes(&self) -> Vec<Outcome> {
        self.entries.iter().map(|e| e.outcome).collect()
    }

    pub fn installed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, Outcome::Installed(_)))
            .count()
    }

    pub fn already_installed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome == Outcome::AlreadyInstalled)
            .count()
    }

    pub fn failed(&self) -> Vec<&EntryReport> {
        self.entries
            .iter()
            .filter(|e| !e.outcome.is_success())
            .collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.entries.iter().all(|e| e.outcome.is_success())
    }
}

/// What a run would do for an entry (dry-run)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PlannedAction {
    #[strum(serialize = "skip (already installed)")]
    Skip,
    #[strum(serialize = "install via package manager")]
    PackageManager,
    #[strum(serialize = "install via package manager, fall back to download")]
    PackageManagerThenFallback,
    #[strum(serialize = "install from direct download")]
    Fallback,
    #[strum(serialize = "cannot install")]
    Unactionable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEntry {
    pub name: String,
    pub action: PlannedAction,
}

/// Drives installation of a list of applications.
pub struct Orchestrator<P, F> {
    package_manager: P,
    fallback: F,
    refresh_sources: bool,
}

impl<P: PackageManager, F: FallbackInstaller> Orchestrator<P, F> {
    pub fn new(package_manager: P, fallback: F) -> Self {
        Self {
            package_manager,
            fallback,
            refresh_sources: false,
        }
    }

    /// Refresh package-manager sources once before the first entry
    pub fn with_source_refresh(mut self, refresh: bool) -> Self {
        self.refresh_sources = refresh;
        self
    }

    pub fn package_manager(&self) -> &P {
        &self.package_manager
    }

    pub fn fallback(&self) -> &F {
        &self.fallback
    }

    pub fn into_parts(self) -> (P, F) {
        (self.package_manager, self.fallback)
    }

    /// Install every entry in order and report what happened
    pub fn run(&self, entries: &[AppDescriptor], transcript: &mut dyn Transcript) -> RunReport {
        let available = self.probe_package_manager(transcript);

        if available && self.refresh_sources {
            if let Err(e) = self.package_manager.refresh_sources() {
                transcript.warn(&format!(
                    "Could not refresh {} sources: {}",
                    self.package_manager.name(),
                    e
                ));
            }
        }

        let total = entries.len();
        let mut report = RunReport {
            package_manager_available: available,
            entries: Vec::with_capacity(total),
        };

        for (index, entry) in entries.iter().enumerate() {
            let _span = tracing::info_span!("entry", name = %entry.name).entered();
            transcript.info(&format!("[{}/{}] {}", index + 1, total, entry.name));

            let outcome = self.resolve(entry, available, transcript);
            self.announce(entry, outcome, transcript);

            report.entries.push(EntryReport {
                name: entry.name.clone(),
                outcome,
            });
        }

        self.summarize(&report, transcript);
        report
    }

    /// Work out what `run` would do without installing anything.
    /// Only the read-only installed-state query is performed.
    pub fn plan(
        &self,
        entries: &[AppDescriptor],
        transcript: &mut dyn Transcript,
    ) -> Vec<PlannedEntry> {
        let available = self.probe_package_manager(transcript);

        entries
            .iter()
            .map(|entry| {
                let via_pm = available && entry.package_id().is_some();
                let action = match (via_pm, entry.fallback_url().is_some()) {
                    (true, _)
                        if entry
                            .package_id()
                            .map(|id| self.package_manager.is_installed(id))
                            .unwrap_or(false) =>
                    {
                        PlannedAction::Skip
                    }
                    (true, true) => PlannedAction::PackageManagerThenFallback,
                    (true, false) => PlannedAction::PackageManager,
                    (false, true) => PlannedAction::Fallback,
                    (false, false) => PlannedAction::Unactionable,
                };
                transcript.info(&format!("{}: {}", entry.name, action));
                PlannedEntry {
                    name: entry.name.clone(),
                    action,
                }
            })
            .collect()
    }

    fn probe_package_manager(&self, transcript: &mut dyn Transcript) -> bool {
        let available = self.package_manager.check_available();
        if available {
            tracing::info!("{} is available", self.package_manager.name());
        } else {
            transcript.warn(&format!(
                "{} is not available; only direct-download fallbacks will be attempted",
                self.package_manager.name()
            ));
        }
        available
    }

    fn resolve(
        &self,
        entry: &AppDescriptor,
        pm_available: bool,
        transcript: &mut dyn Transcript,
    ) -> Outcome {
        if !entry.is_actionable() {
            return Outcome::Failed(FailureReason::Unactionable);
        }

        let package_id = entry.package_id().filter(|_| pm_available);

        if let Some(id) = package_id {
            if self.package_manager.is_installed(id) {
                return Outcome::AlreadyInstalled;
            }

            if self.package_manager.install(id, entry.version()) {
                return Outcome::Installed(InstallMethod::PackageManager);
            }

            transcript.warn(&format!(
                "{}: {} could not install {}",
                entry.name,
                self.package_manager.name(),
                id
            ));
        }

        let url = match entry.fallback_url() {
            Some(url) => url,
            None if entry.package_id().is_some() && !pm_available => {
                return Outcome::Failed(FailureReason::PackageManagerUnavailable)
            }
            None => return Outcome::Failed(FailureReason::PackageManagerFailed),
        };

        let request = FallbackRequest {
            url,
            silent_args: entry.silent_args(),
            file_name: entry.file_name(),
        };

        match self.fallback.install_from_url(&request) {
            Ok(true) => Outcome::Installed(InstallMethod::Fallback),
            Ok(false) => {
                transcript.warn(&format!(
                    "{}: installer from {} exited with an error",
                    entry.name, url
                ));
                Outcome::Failed(FailureReason::FallbackFailed)
            }
            Err(e) => {
                transcript.warn(&format!("{}: fallback from {} failed: {}", entry.name, url, e));
                Outcome::Failed(FailureReason::FallbackFailed)
            }
        }
    }

    fn announce(&self, entry: &AppDescriptor, outcome: Outcome, transcript: &mut dyn Transcript) {
        match outcome {
            Outcome::AlreadyInstalled => {
                transcript.success(&format!("{}: already installed", entry.name))
            }
            Outcome::Installed(method) => {
                transcript.success(&format!("{}: installed via {}", entry.name, method))
            }
            Outcome::Failed(reason) => {
                transcript.failure(&format!("{}: failed ({})", entry.name, reason))
            }
        }
    }

    fn summarize(&self, report: &RunReport, transcript: &mut dyn Transcript) {
        let failed = report.failed();
        transcript.info(&format!(
            "Finished: {} installed, {} already present, {} failed",
            report.installed_count(),
            report.already_installed_count(),
            failed.len()
        ));

        if !failed.is_empty() {
            let names: Vec<&str> = failed.iter().map(|e| e.name.as_str()).collect();
            transcript.failure(&format!("Failed: {}", names.join(", ")));
        }

        if let Some(path) = transcript.location().map(|p| p.display().to_string()) {
            transcript.info(&format!("Log file: {}", path));
        }
    }
}
