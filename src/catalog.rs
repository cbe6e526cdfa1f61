//! Application catalog: what gets installed, and in which order.
//!
//! The catalog is an ordered, immutable list of [`AppDescriptor`] values.
//! Iteration preserves insertion order; entries are never reordered or
//! deduplicated. A catalog is validated once when it is constructed, so the
//! orchestrator only ever sees well-formed entries when it runs from a
//! [`Catalog`].

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::BenchkitError;

/// One application the toolkit should end up with.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDescriptor {
    /// Display label used in notices and the log
    pub name: String,
    /// Identifier in the package manager's namespace (e.g. `TechPowerUp.GPU-Z`)
    #[serde(default)]
    pub package_id: Option<String>,
    /// Exact version to pin; latest when absent
    #[serde(default)]
    pub version: Option<String>,
    /// Direct download URL for an executable, installer package, or archive
    #[serde(default)]
    pub fallback_url: Option<String>,
    /// Flags that make the fallback installer run unattended
    #[serde(default)]
    pub silent_args: Option<String>,
    /// Filename to save the download as, instead of the URL's last segment
    #[serde(default)]
    pub file_name: Option<String>,
}

impl AppDescriptor {
    /// Create a descriptor with only a name set
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_package(mut self, package_id: impl Into<String>) -> Self {
        self.package_id = Some(package_id.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_fallback(mut self, url: impl Into<String>, silent_args: Option<&str>) -> Self {
        self.fallback_url = Some(url.into());
        self.silent_args = silent_args.map(str::to_string);
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Package id, treating a blank string as absent
    pub fn package_id(&self) -> Option<&str> {
        non_blank(self.package_id.as_deref())
    }

    /// Pinned version, treating a blank string as absent
    pub fn version(&self) -> Option<&str> {
        non_blank(self.version.as_deref())
    }

    /// Fallback URL, treating a blank string as absent
    pub fn fallback_url(&self) -> Option<&str> {
        non_blank(self.fallback_url.as_deref())
    }

    /// Silent installer arguments, treating a blank string as absent
    pub fn silent_args(&self) -> Option<&str> {
        non_blank(self.silent_args.as_deref())
    }

    /// Explicit download filename, treating a blank string as absent
    pub fn file_name(&self) -> Option<&str> {
        non_blank(self.file_name.as_deref())
    }

    /// True if at least one installation strategy applies to this entry
    pub fn is_actionable(&self) -> bool {
        self.package_id().is_some() || self.fallback_url().is_some()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Validated, ordered list of applications to install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<AppDescriptor>,
}

impl Catalog {
    /// Build a catalog, rejecting malformed entries
    pub fn new(entries: Vec<AppDescriptor>) -> std::result::Result<Self, BenchkitError> {
        let catalog = Self { entries };
        catalog.validate()?;
        Ok(catalog)
    }

    /// The compiled-in GPU benchmarking and tuning toolkit
    pub fn builtin() -> Self {
        Self {
            entries: builtin_entries(),
        }
    }

    /// Load a catalog from a JSON array of descriptors
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read catalog from {:?}", path.as_ref()))?;

        let entries: Vec<AppDescriptor> =
            serde_json::from_str(&content).context("Failed to parse catalog JSON")?;

        let catalog = Self::new(entries)
            .with_context(|| format!("Invalid catalog in {:?}", path.as_ref()))?;

        Ok(catalog)
    }

    /// Check every entry: non-empty name, at least one strategy, http(s) URL
    pub fn validate(&self) -> std::result::Result<(), BenchkitError> {
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.name.trim().is_empty() {
                return Err(BenchkitError::catalog(format!(
                    "entry {} has an empty name",
                    index
                )));
            }

            if !entry.is_actionable() {
                return Err(BenchkitError::catalog(format!(
                    "entry {} ({}) has neither a package id nor a fallback URL",
                    index, entry.name
                )));
            }

            if let Some(url) = entry.fallback_url() {
                let lower = url.to_ascii_lowercase();
                if !lower.starts_with("http://") && !lower.starts_with("https://") {
                    return Err(BenchkitError::catalog(format!(
                        "entry {} ({}) has a fallback URL that is not http(s): {}",
                        index, entry.name, url
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AppDescriptor> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[AppDescriptor] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a AppDescriptor;
    type IntoIter = std::slice::Iter<'a, AppDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn builtin_entries() -> Vec<AppDescriptor> {
    vec![
        AppDescriptor::new("GPU-Z").with_package("TechPowerUp.GPU-Z"),
        AppDescriptor::new("CPU-Z").with_package("CPUID.CPU-Z"),
        AppDescriptor::new("HWiNFO").with_package("REALiX.HWiNFO"),
        AppDescriptor::new("MSI Afterburner")
            .with_package("Guru3D.Afterburner")
            .with_version("4.6.5")
            .with_fallback(
                "https://download.msi.com/uti_exe/vga/MSIAfterburnerSetup.zip",
                Some("/S"),
            ),
        AppDescriptor::new("RivaTuner Statistics Server").with_package("Guru3D.RTSS"),
        AppDescriptor::new("FurMark").with_package("Geeks3D.FurMark.2"),
        AppDescriptor::new("OCCT").with_package("OCBase.OCCT.Personal"),
        AppDescriptor::new("Unigine Heaven").with_package("Unigine.HeavenBenchmark"),
        AppDescriptor::new("Unigine Superposition").with_package("Unigine.SuperpositionBenchmark"),
        AppDescriptor::new("Cinebench R23").with_package("Maxon.CinebenchR23"),
        AppDescriptor::new("Display Driver Uninstaller")
            .with_package("Wagnardsoft.DisplayDriverUninstaller"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = Catalog::builtin();
        assert!(!catalog.is_empty());
        assert!(catalog.validate().is_ok());
    }

    #[test]
    fn test_builtin_fallbacks_run_unattended() {
        // A fallback without silent flags would open an interactive window
        // and stall the run until someone closes it.
        for entry in &Catalog::builtin() {
            if entry.fallback_url().is_some() {
                assert!(
                    entry.silent_args().is_some(),
                    "{} has a fallback without silent arguments",
                    entry.name
                );
            }
        }
    }

    #[test]
    fn test_iteration_is_restartable() {
        let catalog = Catalog::builtin();
        let first: Vec<&str> = catalog.iter().map(|e| e.name.as_str()).collect();
        let second: Vec<&str> = catalog.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), catalog.len());
    }

    #[test]
    fn test_insertion_order_and_duplicates_preserved() {
        let catalog = Catalog::new(vec![
            AppDescriptor::new("B").with_package("Vendor.B"),
            AppDescriptor::new("A").with_package("Vendor.A"),
            AppDescriptor::new("B").with_package("Vendor.B"),
        ])
        .unwrap();

        let names: Vec<&str> = catalog.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "B"]);
    }

    #[test]
    fn test_validation_empty_name() {
        let err = Catalog::new(vec![AppDescriptor::new("  ").with_package("Vendor.X")])
            .unwrap_err();
        assert!(err.to_string().contains("empty name"));
    }

    #[test]
    fn test_validation_unactionable_entry() {
        let err = Catalog::new(vec![
            AppDescriptor::new("Fine").with_package("Vendor.Fine"),
            AppDescriptor::new("Nothing"),
        ])
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("entry 1"));
        assert!(msg.contains("Nothing"));
    }

    #[test]
    fn test_validation_blank_fields_count_as_absent() {
        let mut entry = AppDescriptor::new("Blank");
        entry.package_id = Some(String::new());
        entry.fallback_url = Some("   ".to_string());
        assert!(!entry.is_actionable());
        assert!(Catalog::new(vec![entry]).is_err());
    }

    #[test]
    fn test_validation_rejects_non_http_url() {
        let err = Catalog::new(vec![
            AppDescriptor::new("Local").with_fallback("file:///tmp/setup.exe", None)
        ])
        .unwrap_err();
        assert!(err.to_string().contains("not http(s)"));
    }

    #[test]
    fn test_load_from_file_camel_case_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"name": "GPU-Z", "packageId": "TechPowerUp.GPU-Z"}},
                {{"name": "Tool", "fallbackUrl": "https://example.com/tool.zip", "silentArgs": "/S", "fileName": "tool.zip"}}
            ]"#
        )
        .unwrap();

        let catalog = Catalog::load_from_file(file.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.entries()[0].package_id(), Some("TechPowerUp.GPU-Z"));
        assert_eq!(catalog.entries()[1].silent_args(), Some("/S"));
        assert_eq!(catalog.entries()[1].file_name(), Some("tool.zip"));
        assert_eq!(catalog.entries()[1].version(), None);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Catalog::load_from_file("/nonexistent/benchkit/catalog.json");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let result = Catalog::load_from_file(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_rejects_invalid_entry() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"name": "Ghost"}}]"#).unwrap();
        let err = Catalog::load_from_file(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("neither a package id nor a fallback URL"));
    }
}
