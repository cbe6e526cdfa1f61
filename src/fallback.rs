//! Direct-download fallback installer
//!
//! Used when the package manager cannot provide an application. The flow is
//! download → (extract if archive) → run silently → check exit code, all
//! inside a fresh scratch directory that is removed afterwards.

use crate::archive;
use crate::error::{BenchkitError, Result};
use crate::process_guard;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Everything needed to install one application from a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackRequest<'a> {
    pub url: &'a str,
    pub silent_args: Option<&'a str>,
    /// Save the download under this name instead of the URL's last segment
    pub file_name: Option<&'a str>,
}

/// Installs an application from a direct download URL.
pub trait FallbackInstaller {
    /// `Ok(true)` iff the installer ran and exited with code zero
    fn install_from_url(&self, request: &FallbackRequest<'_>) -> Result<bool>;
}

/// HTTP(S) download plus local execution
#[derive(Debug, Clone)]
pub struct UrlInstaller {
    user_agent: String,
}

impl UrlInstaller {
    pub fn new() -> Self {
        Self {
            user_agent: format!("benchkit/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Stream `url` into `dest`, returning the number of bytes written
    pub fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        tracing::info!("Downloading {} -> {:?}", url, dest);

        let response = ureq::get(url)
            .header("User-Agent", self.user_agent.as_str())
            .call()?;

        let mut reader = response.into_body().into_reader();
        let mut file = File::create(dest)?;
        let bytes = io::copy(&mut reader, &mut file)
            .map_err(|e| BenchkitError::download(format!("{}: {}", url, e)))?;

        tracing::debug!("Downloaded {} bytes from {}", bytes, url);
        Ok(bytes)
    }
}

impl Default for UrlInstaller {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackInstaller for UrlInstaller {
    fn install_from_url(&self, request: &FallbackRequest<'_>) -> Result<bool> {
        let file_name = match request.file_name {
            Some(name) => validate_file_name(name)?,
            None => file_name_from_url(request.url).ok_or_else(|| {
                BenchkitError::download(format!(
                    "cannot derive a filename from {}; set fileName in the catalog",
                    request.url
                ))
            })?,
        };

        let scratch = tempfile::Builder::new().prefix("benchkit-").tempdir()?;
        tracing::debug!("Scratch directory {:?}", scratch.path());

        let artifact = scratch.path().join(&file_name);
        self.download(request.url, &artifact)?;

        install_artifact(&artifact, request.silent_args)
    }
}

/// Resolve and run a downloaded artifact.
///
/// Archives are extracted next to the artifact and the largest installer
/// inside is run (see [`archive::select_installer`]).
pub fn install_artifact(artifact: &Path, silent_args: Option<&str>) -> Result<bool> {
    let installer = if archive::is_archive(artifact) {
        let extract_dir = artifact.with_extension("extracted");
        archive::extract_zip(artifact, &extract_dir)?;
        archive::select_installer(&extract_dir)?
    } else {
        artifact.to_path_buf()
    };

    run_installer(&installer, silent_args)
}

/// Launch an installer with its silent arguments and wait for it to exit
pub fn run_installer(installer: &Path, silent_args: Option<&str>) -> Result<bool> {
    let mut cmd = installer_command(installer)?;
    apply_silent_args(&mut cmd, silent_args)?;
    // An installer in its own process group that reads the terminal is
    // stopped by SIGTTIN and never exits
    cmd.stdin(Stdio::null());
    if let Some(dir) = installer.parent() {
        cmd.current_dir(dir);
    }

    tracing::info!(
        "Running installer {:?} {}",
        installer,
        silent_args.unwrap_or("")
    );

    let status = process_guard::run_registered(&mut cmd)
        .map_err(|e| BenchkitError::launch(format!("{}: {}", installer.display(), e)))?;

    if !status.success() {
        tracing::warn!("Installer {:?} exited with {:?}", installer, status.code());
    }
    Ok(status.success())
}

fn installer_command(installer: &Path) -> Result<Command> {
    let is_msi = installer
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("msi"))
        .unwrap_or(false);

    if is_msi {
        let mut cmd = Command::new("msiexec");
        cmd.arg("/i").arg(installer);
        return Ok(cmd);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(installer, std::fs::Permissions::from_mode(0o755))?;
    }

    Ok(Command::new(installer))
}

/// Windows installers parse their own command line, so the string is passed
/// through verbatim there; elsewhere it is split with shell quoting rules.
#[cfg(windows)]
fn apply_silent_args(cmd: &mut Command, silent_args: Option<&str>) -> Result<()> {
    use std::os::windows::process::CommandExt;

    if let Some(args) = silent_args {
        cmd.raw_arg(args);
    }
    Ok(())
}

#[cfg(not(windows))]
fn apply_silent_args(cmd: &mut Command, silent_args: Option<&str>) -> Result<()> {
    if let Some(args) = silent_args {
        let parts = shell_words::split(args).map_err(|e| {
            BenchkitError::launch(format!("invalid silent arguments {:?}: {}", args, e))
        })?;
        cmd.args(parts);
    }
    Ok(())
}

/// Last path segment of a URL, without query or fragment
pub fn file_name_from_url(url: &str) -> Option<String> {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment.split('?').next().unwrap_or(without_fragment);
    let after_scheme = match without_query.find("://") {
        Some(pos) => &without_query[pos + 3..],
        None => without_query,
    };

    let (_, path) = after_scheme.split_once('/')?;
    let name = path.rsplit('/').next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

fn validate_file_name(name: &str) -> Result<String> {
    let candidate = PathBuf::from(name.trim());
    match candidate.file_name() {
        Some(base) if base == candidate.as_os_str() => Ok(base.to_string_lossy().into_owned()),
        _ => Err(BenchkitError::download(format!(
            "fileName must be a plain file name: {:?}",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://download.msi.com/uti_exe/vga/MSIAfterburnerSetup.zip"),
            Some("MSIAfterburnerSetup.zip".to_string())
        );
        assert_eq!(
            file_name_from_url("https://example.com/dl/setup.exe?token=abc#frag"),
            Some("setup.exe".to_string())
        );
        assert_eq!(file_name_from_url("https://example.com/"), None);
        assert_eq!(file_name_from_url("https://example.com"), None);
    }

    #[test]
    fn test_validate_file_name() {
        assert_eq!(validate_file_name("setup.exe").unwrap(), "setup.exe");
        assert!(validate_file_name("../setup.exe").is_err());
        assert!(validate_file_name("dir/setup.exe").is_err());
        assert!(validate_file_name("").is_err());
    }

    #[test]
    fn test_run_installer_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_installer(&dir.path().join("missing.exe"), None);
        assert!(result.is_err());
    }

    #[cfg(unix)]
    fn write_script(path: &Path, body: &str) {
        std::fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_run_installer_passes_silent_args() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("args.txt");
        let script = dir.path().join("setup.sh");
        write_script(&script, &format!("echo \"$@\" > '{}'", marker.display()));

        assert!(run_installer(&script, Some("/S --dir 'C:/Program Files/Tool'")).unwrap());
        let recorded = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(recorded.trim(), "/S --dir C:/Program Files/Tool");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_run_installer_stdin_is_null_device() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("setup.sh");
        write_script(
            &script,
            "[ \"$(readlink /proc/$$/fd/0)\" = /dev/null ] || exit 9\nif read answer; then exit 5; fi",
        );

        assert!(run_installer(&script, None).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_installer_nonzero_exit_is_false() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("setup.sh");
        write_script(&script, "exit 1603");

        assert!(!run_installer(&script, None).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_install_artifact_runs_largest_installer_from_archive() {
        use std::io::Write;
        use zip::write::FileOptions;

        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran.txt");
        let zip_path = dir.path().join("bundle.zip");

        let big = format!(
            "#!/bin/sh\necho big > '{}'\n# {}\n",
            marker.display(),
            "x".repeat(4096)
        );
        let small = format!("#!/bin/sh\necho small > '{}'\n", marker.display());

        let mut zip = zip::ZipWriter::new(File::create(&zip_path).unwrap());
        zip.start_file("tool/redist.sh", FileOptions::default()).unwrap();
        zip.write_all(small.as_bytes()).unwrap();
        zip.start_file("tool/setup.sh", FileOptions::default()).unwrap();
        zip.write_all(big.as_bytes()).unwrap();
        zip.finish().unwrap();

        assert!(install_artifact(&zip_path, None).unwrap());
        assert_eq!(std::fs::read_to_string(&marker).unwrap().trim(), "big");
    }

    #[test]
    fn test_install_artifact_archive_without_installer() {
        use std::io::Write;
        use zip::write::FileOptions;

        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("docs.zip");
        let mut zip = zip::ZipWriter::new(File::create(&zip_path).unwrap());
        zip.start_file("README.txt", FileOptions::default()).unwrap();
        zip.write_all(b"no installers here").unwrap();
        zip.finish().unwrap();

        let err = install_artifact(&zip_path, None).unwrap_err();
        assert!(matches!(err, BenchkitError::NoInstaller(_)));
    }

    #[test]
    fn test_unreachable_url_is_download_error() {
        let installer = UrlInstaller::new();
        let request = FallbackRequest {
            url: "http://127.0.0.1:9/setup.exe",
            silent_args: None,
            file_name: None,
        };
        let err = installer.install_from_url(&request).unwrap_err();
        assert!(matches!(err, BenchkitError::Download(_)));
    }
}
