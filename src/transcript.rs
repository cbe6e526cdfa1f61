//! User-facing transcript of a run.
//!
//! Every notice shown on the console is mirrored, timestamped, into an
//! append-only log file. The transcript is opened once at process start and
//! passed to the orchestrator; dropping it flushes and closes the file on
//! every exit path.
//!
//! Diagnostics (command lines, HTTP statuses, exit codes) go through
//! `tracing` instead and are not part of the transcript.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use strum::Display;

/// Default log filename, placed in the system temp directory
pub const DEFAULT_LOG_NAME: &str = "benchkit-install.log";

/// Well-known log location used when `--log-file` is not given
pub fn default_log_path() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_LOG_NAME)
}

/// Severity tag attached to each notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum NoticeLevel {
    Info,
    Success,
    Warn,
    Failure,
}

impl NoticeLevel {
    fn console_marker(self) -> &'static str {
        match self {
            NoticeLevel::Info => "•",
            NoticeLevel::Success => "✓",
            NoticeLevel::Warn => "!",
            NoticeLevel::Failure => "✗",
        }
    }
}

/// Sink for user-facing notices.
pub trait Transcript {
    /// Record one notice
    fn notice(&mut self, level: NoticeLevel, message: &str);

    /// Where the persistent copy lives, if there is one
    fn location(&self) -> Option<&Path> {
        None
    }

    fn info(&mut self, message: &str) {
        self.notice(NoticeLevel::Info, message);
    }

    fn success(&mut self, message: &str) {
        self.notice(NoticeLevel::Success, message);
    }

    fn warn(&mut self, message: &str) {
        self.notice(NoticeLevel::Warn, message);
    }

    fn failure(&mut self, message: &str) {
        self.notice(NoticeLevel::Failure, message);
    }
}

/// Console output mirrored into an append-only log file.
pub struct FileTranscript {
    path: PathBuf,
    writer: BufWriter<File>,
    echo: bool,
}

impl FileTranscript {
    /// Open (or create) the log file for appending and echo notices to the console
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_echo(path, true)
    }

    /// Open the log file, optionally without console echo
    pub fn open_with_echo<P: AsRef<Path>>(path: P, echo: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {:?}", parent))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {:?}", path))?;

        let mut transcript = Self {
            path,
            writer: BufWriter::new(file),
            echo,
        };
        transcript.append_line(&format!(
            "===== benchkit {} session started =====",
            env!("CARGO_PKG_VERSION")
        ));
        Ok(transcript)
    }

    fn append_line(&mut self, line: &str) {
        let result = writeln!(self.writer, "{}", stamped(line)).and_then(|_| self.writer.flush());
        if let Err(e) = result {
            tracing::warn!("Failed to append to log file {:?}: {}", self.path, e);
        }
    }
}

impl Transcript for FileTranscript {
    fn notice(&mut self, level: NoticeLevel, message: &str) {
        if self.echo {
            match level {
                NoticeLevel::Info | NoticeLevel::Success => {
                    println!("{} {}", level.console_marker(), message)
                }
                NoticeLevel::Warn | NoticeLevel::Failure => {
                    eprintln!("{} {}", level.console_marker(), message)
                }
            }
        }
        self.append_line(&format!("[{}] {}", level, message));
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

impl Drop for FileTranscript {
    fn drop(&mut self) {
        self.append_line("===== session closed =====");
    }
}

fn stamped(line: &str) -> String {
    format!("[{}] {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"), line)
}

/// Close a log whose [`FileTranscript`] will not get to run its `Drop`
/// because the process is exiting from a signal handler.
pub fn record_interrupt(path: &Path, signal_name: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(
        file,
        "{}",
        stamped(&format!("===== session interrupted by {} =====", signal_name))
    )
}

/// In-memory transcript, used by tests and dry runs that need the notices back.
#[derive(Debug, Default)]
pub struct MemoryTranscript {
    pub notices: Vec<(NoticeLevel, String)>,
}

impl MemoryTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages recorded at a given level, in order
    pub fn messages(&self, level: NoticeLevel) -> Vec<&str> {
        self.notices
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.as_str())
            .collect()
    }
}

impl Transcript for MemoryTranscript {
    fn notice(&mut self, level: NoticeLevel, message: &str) {
        self.notices.push((level, message.to_string()));
    }
}
