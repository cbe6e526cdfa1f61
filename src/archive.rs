//! ZIP extraction and installer selection for downloaded archives.

use crate::error::{BenchkitError, Result};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// Archive formats we can unpack (ZIP only)
pub const ARCHIVE_EXTENSIONS: &[&str] = &["zip"];

/// Extensions treated as installer-like when picking from an archive
#[cfg(windows)]
pub const INSTALLER_EXTENSIONS: &[&str] = &["exe", "msi"];
#[cfg(not(windows))]
pub const INSTALLER_EXTENSIONS: &[&str] = &["exe", "msi", "sh", "run"];

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// True if the artifact should be unpacked before running
pub fn is_archive(path: &Path) -> bool {
    has_extension(path, ARCHIVE_EXTENSIONS)
}

/// True if the file looks like something we can launch as an installer
pub fn is_installer(path: &Path) -> bool {
    has_extension(path, INSTALLER_EXTENSIONS)
}

/// Extract a ZIP archive into `dest_dir`.
///
/// Entries whose paths would escape `dest_dir` are skipped, as is macOS
/// resource-fork metadata.
pub fn extract_zip(zip_path: &Path, dest_dir: &Path) -> Result<()> {
    tracing::debug!("Extracting {:?} to {:?}", zip_path, dest_dir);
    fs::create_dir_all(dest_dir)?;

    let file = File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;

        let relative = match entry.enclosed_name() {
            Some(path) => path.to_owned(),
            None => {
                tracing::warn!("Skipping unsafe archive path: {}", entry.name());
                continue;
            }
        };

        let relative_str = relative.to_string_lossy();
        if relative_str.contains("__MACOSX") || relative_str.contains(".DS_Store") {
            continue;
        }

        let out_path = dest_dir.join(&relative);
        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out_file = File::create(&out_path)?;
        io::copy(&mut entry, &mut out_file)?;
    }

    Ok(())
}

/// Pick the installer to run from an extracted archive.
///
/// Policy: the largest installer-like file wins, ties going to the first
/// path in sorted order. This is a heuristic; an archive that ships several
/// installers (e.g. a main setup plus a redistributable) can select the
/// wrong one.
pub fn select_installer(dir: &Path) -> Result<PathBuf> {
    let mut candidates = Vec::new();
    collect_installers(dir, &mut candidates)?;
    candidates.sort();

    let mut best: Option<(u64, PathBuf)> = None;
    for path in candidates {
        let size = fs::metadata(&path)?.len();
        match &best {
            Some((best_size, _)) if size <= *best_size => {}
            _ => best = Some((size, path)),
        }
    }

    match best {
        Some((size, path)) => {
            tracing::debug!("Selected installer {:?} ({} bytes)", path, size);
            Ok(path)
        }
        None => Err(BenchkitError::no_installer(dir.display().to_string())),
    }
}

fn collect_installers(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_installers(&path, out)?;
        } else if file_type.is_file() && is_installer(&path) {
            out.push(path);
        }
    }
    Ok(())
}
