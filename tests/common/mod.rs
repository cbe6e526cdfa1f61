//! Shared fixtures for integration tests: recording fakes for the adapter
//! traits, a fake winget script, and a loopback HTTP server.

#![allow(dead_code)]

use benchkit::error::{BenchkitError, Result};
use benchkit::{FallbackInstaller, FallbackRequest, PackageManager};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};

// =============================================================================
// Recording fakes
// =============================================================================

/// How the fake package manager treats one package id
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageBehavior {
    pub installed: bool,
    pub query_errors: bool,
    pub pinned_ok: bool,
    pub latest_ok: bool,
    pub install_errors: bool,
}

#[derive(Default)]
pub struct RecordingPm {
    pub available: bool,
    pub packages: HashMap<String, PackageBehavior>,
    pub queries: RefCell<Vec<String>>,
    pub installs: RefCell<Vec<(String, Option<String>)>>,
}

impl RecordingPm {
    pub fn available() -> Self {
        Self {
            available: true,
            ..Self::default()
        }
    }

    pub fn with_package(mut self, id: &str, behavior: PackageBehavior) -> Self {
        self.packages.insert(id.to_string(), behavior);
        self
    }

    pub fn install_calls_for(&self, id: &str) -> usize {
        self.installs.borrow().iter().filter(|(i, _)| i == id).count()
    }
}

impl PackageManager for RecordingPm {
    fn name(&self) -> &str {
        "recording-pm"
    }

    fn check_available(&self) -> bool {
        self.available
    }

    fn query_installed(&self, package_id: &str) -> Result<bool> {
        self.queries.borrow_mut().push(package_id.to_string());
        let behavior = self.packages.get(package_id).copied().unwrap_or_default();
        if behavior.query_errors {
            return Err(BenchkitError::package_manager("listing timed out"));
        }
        Ok(behavior.installed)
    }

    fn install_once(&self, package_id: &str, version: Option<&str>) -> Result<bool> {
        self.installs
            .borrow_mut()
            .push((package_id.to_string(), version.map(str::to_string)));
        let behavior = self.packages.get(package_id).copied().unwrap_or_default();
        if behavior.install_errors {
            return Err(BenchkitError::package_manager("process crashed"));
        }
        Ok(match version {
            Some(_) => behavior.pinned_ok,
            None => behavior.latest_ok,
        })
    }
}

/// Result the fake fallback installer gives for a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackBehavior {
    Succeeds,
    ExitsNonZero,
    TransportError,
    NoInstallerInArchive,
}

#[derive(Default)]
pub struct RecordingFallback {
    pub urls: HashMap<String, FallbackBehavior>,
    pub calls: RefCell<Vec<String>>,
}

impl RecordingFallback {
    pub fn with_url(mut self, url: &str, behavior: FallbackBehavior) -> Self {
        self.urls.insert(url.to_string(), behavior);
        self
    }
}

impl FallbackInstaller for RecordingFallback {
    fn install_from_url(&self, request: &FallbackRequest<'_>) -> Result<bool> {
        self.calls.borrow_mut().push(request.url.to_string());
        match self
            .urls
            .get(request.url)
            .copied()
            .unwrap_or(FallbackBehavior::Succeeds)
        {
            FallbackBehavior::Succeeds => Ok(true),
            FallbackBehavior::ExitsNonZero => Ok(false),
            FallbackBehavior::TransportError => {
                Err(BenchkitError::download("connection reset by peer"))
            }
            FallbackBehavior::NoInstallerInArchive => {
                Err(BenchkitError::no_installer("bundle.zip"))
            }
        }
    }
}

// =============================================================================
// Fake winget executable (Unix only)
// =============================================================================

/// Write a shell script that answers like winget.
///
/// `list` succeeds only for ids in `installed`; `install` fails with
/// `pinned_exit` when `--version` is passed and succeeds otherwise. Every
/// invocation is appended to the returned log file.
#[cfg(unix)]
pub fn fake_winget(dir: &Path, installed: &[&str], pinned_exit: i32) -> (PathBuf, PathBuf) {
    use std::os::unix::fs::PermissionsExt;

    let log = dir.join("winget-calls.log");
    let script = dir.join("winget");
    let body = format!(
        r#"#!/bin/sh
echo "$*" >> '{log}'
case "$1" in
  list)
    for id in __none__ {installed}; do
      if [ "$3" = "$id" ]; then
        echo "Name   Id   Version"
        echo "Tool   $id   1.0"
        exit 0
      fi
    done
    echo "No installed package found matching input criteria."
    exit 1
    ;;
  install)
    case "$*" in
      *--version*) exit {pinned_exit} ;;
    esac
    exit 0
    ;;
  source)
    exit 0
    ;;
esac
exit 2
"#,
        log = log.display(),
        installed = installed.join(" "),
        pinned_exit = pinned_exit,
    );

    std::fs::write(&script, body).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    (script, log)
}

/// Lines recorded by [`fake_winget`], one per invocation
pub fn recorded_calls(log: &Path) -> Vec<String> {
    std::fs::read_to_string(log)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

// =============================================================================
// Loopback HTTP server
// =============================================================================

/// One canned response
pub struct Route {
    pub path: &'static str,
    pub status: u16,
    pub body: Vec<u8>,
}

impl Route {
    pub fn ok(path: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            path,
            status: 200,
            body: body.into(),
        }
    }
}

/// Serve `routes` on 127.0.0.1 from a background thread; returns the base URL.
/// Unknown paths get a 404.
pub fn serve(routes: Vec<Route>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut request_line = String::new();
            if reader.read_line(&mut request_line).is_err() {
                continue;
            }
            loop {
                let mut header = String::new();
                match reader.read_line(&mut header) {
                    Ok(0) => break,
                    Ok(_) if header == "\r\n" || header == "\n" => break,
                    Ok(_) => continue,
                    Err(_) => break,
                }
            }

            let path = request_line.split_whitespace().nth(1).unwrap_or("/");
            let (status, body): (u16, &[u8]) = match routes.iter().find(|r| r.path == path) {
                Some(route) => (route.status, &route.body),
                None => (404, b"not found"),
            };
            let reason = if status == 200 { "OK" } else { "Error" };

            let head = format!(
                "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
                status,
                reason,
                body.len()
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(body);
            let _ = stream.flush();
        }
    });

    format!("http://{}", addr)
}

/// Build a ZIP archive in memory from `(name, contents)` pairs
pub fn zip_bytes(files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    use zip::write::FileOptions;

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut cursor);
        for (name, contents) in files {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(contents).unwrap();
        }
        zip.finish().unwrap();
    }
    cursor.into_inner()
}
