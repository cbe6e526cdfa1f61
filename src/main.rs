//! benchkit - main entry point

use anyhow::{Context, Result};
use std::process::ExitCode;
use tracing::{debug, error, info, warn};

use benchkit::cli::{Cli, Commands};
use benchkit::elevation;
use benchkit::process_guard::{self, ProcessGuard};
use benchkit::transcript::{self, record_interrupt, FileTranscript, Transcript};
use benchkit::{Catalog, Orchestrator, UrlInstaller, Winget};

/// Initialize diagnostics; `RUST_LOG` wins over `-v`
fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);
    debug!("CLI arguments parsed: {:?}", cli);

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("✗ {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    match cli.resolved_command() {
        Commands::Validate { path } => {
            info!("Validating catalog file: {:?}", path);
            let catalog = Catalog::load_from_file(&path)?;
            println!(
                "✓ Catalog is valid: {} ({} entries)",
                path.display(),
                catalog.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::List => {
            let catalog = load_catalog(cli)?;
            print_catalog(&catalog);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Install => install(cli),
    }
}

fn load_catalog(cli: &Cli) -> Result<Catalog> {
    match &cli.catalog {
        Some(path) => {
            info!("Loading catalog from {:?}", path);
            Catalog::load_from_file(path)
        }
        None => Ok(Catalog::builtin()),
    }
}

fn print_catalog(catalog: &Catalog) {
    for (index, entry) in catalog.iter().enumerate() {
        let source = match (entry.package_id(), entry.fallback_url()) {
            (Some(id), Some(_)) => format!("{} (+ download fallback)", id),
            (Some(id), None) => id.to_string(),
            (None, Some(url)) => url.to_string(),
            (None, None) => "-".to_string(),
        };
        let version = entry.version().unwrap_or("latest");
        println!("{:>2}. {:<30} {:<10} {}", index + 1, entry.name, version, source);
    }
}

fn install(cli: &Cli) -> Result<ExitCode> {
    let catalog = load_catalog(cli)?;

    let log_path = cli
        .log_file
        .clone()
        .unwrap_or_else(transcript::default_log_path);
    let mut transcript = FileTranscript::open(&log_path)
        .with_context(|| format!("Cannot start transcript at {}", log_path.display()))?;

    if !cli.dry_run {
        let skip = cli.skip_elevation_check || elevation::should_skip_elevation_check();
        if skip {
            warn!("Elevation check skipped");
        } else {
            let state = elevation::check_elevation();
            info!("Elevation state: {}", state);
            if !state.is_privileged() {
                transcript.failure(&format!(
                    "Administrator rights required ({}): {}",
                    state,
                    state.advice()
                ));
                return Ok(ExitCode::from(2));
            }
        }
    }

    let interrupted_log = log_path.clone();
    let on_interrupt = move |signal: &str| {
        if let Err(e) = record_interrupt(&interrupted_log, signal) {
            warn!("Failed to record interruption in {:?}: {}", interrupted_log, e);
        }
    };
    if let Err(e) = process_guard::init_signal_handlers(on_interrupt) {
        warn!("Failed to initialize signal handlers: {}", e);
    }
    let _guard = ProcessGuard::new();

    let orchestrator = Orchestrator::new(Winget::with_program(&cli.winget), UrlInstaller::new())
        .with_source_refresh(!cli.dry_run);

    if cli.dry_run {
        transcript.info(&format!(
            "Dry run: {} catalog entries, nothing will be installed",
            catalog.len()
        ));
        orchestrator.plan(catalog.entries(), &mut transcript);
        return Ok(ExitCode::SUCCESS);
    }

    transcript.info(&format!("Installing {} applications", catalog.len()));
    let report = orchestrator.run(catalog.entries(), &mut transcript);

    if report.all_succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}
