use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// benchkit - installs a GPU benchmarking and tuning toolkit
#[derive(Parser, Debug)]
#[command(name = "benchkit")]
#[command(about = "Installs GPU benchmarking and tuning tools via winget, with direct-download fallbacks")]
#[command(version)]
pub struct Cli {
    /// Show what would be installed without installing anything.
    ///
    /// Only the read-only "is it installed?" query runs against the package
    /// manager; nothing is downloaded or executed.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// JSON catalog to use instead of the built-in toolkit
    #[arg(long, global = true, value_name = "PATH")]
    pub catalog: Option<PathBuf>,

    /// Append the run transcript to this file (default: <temp>/benchkit-install.log)
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Do not require administrator rights before installing
    #[arg(long, global = true)]
    pub skip_elevation_check: bool,

    /// winget executable to use (name on PATH or full path)
    #[arg(long, global = true, value_name = "PROGRAM", default_value = "winget")]
    pub winget: PathBuf,

    /// Increase diagnostic output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Install every catalog entry (default)
    Install,
    /// Print the catalog in installation order
    List,
    /// Validate a catalog file
    Validate {
        /// Path to the catalog JSON file
        #[arg(value_name = "CATALOG")]
        path: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Subcommand to run, defaulting to `install`
    pub fn resolved_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Install)
    }
}
