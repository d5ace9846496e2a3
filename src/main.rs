use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fixcap::fixture::{inspect_file, load_document, repair_file, FixtureStatus, InspectError};
use fixcap::util::paths::{display_path, relative_to, source_stem, unit_label};
use fixcap::{discover_sources, CaptureConfig};

/// Inspect and maintain captured call fixtures
#[derive(Parser, Debug)]
#[command(name = "fixcap", version, subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Directory configuration is resolved from (nearest fixcap.toml)
    #[arg(short = 'C', long, value_name = "DIR", global = true)]
    dir: Option<PathBuf>,

    /// Explicit configuration file
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write an example fixcap.toml
    Init,
    /// List the sources that would be instrumented and where they record
    Units,
    /// Report the state of fixture files
    Check {
        /// Files to check (defaults to everything under destdir)
        paths: Vec<PathBuf>,
    },
    /// Close fixture files a stopped recorder left without a footer
    Repair {
        paths: Vec<PathBuf>,
    },
    /// Print the records of one fixture file
    Show {
        path: PathBuf,
        /// Print the parsed document as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let start = match &cli.dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("cannot determine current directory")?,
    };

    match cli.command {
        Command::Init => init(&start),
        Command::Units => units(&load_config(&cli.config, &start)?),
        Command::Check { paths } => {
            let config = load_config(&cli.config, &start)?;
            check(targets(paths, &config), &start).await
        }
        Command::Repair { paths } => {
            let config = load_config(&cli.config, &start)?;
            repair(&targets(paths, &config), &start)
        }
        Command::Show { path, json } => show(&path, json),
    }
}

fn load_config(explicit: &Option<PathBuf>, start: &Path) -> Result<CaptureConfig> {
    let mut config = match explicit {
        Some(path) => CaptureConfig::load_from(path)?,
        None => return Ok(CaptureConfig::resolve(start)?),
    };
    config.apply_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}

fn targets(paths: Vec<PathBuf>, config: &CaptureConfig) -> Vec<PathBuf> {
    if paths.is_empty() {
        fixcap::fixture::inspect::fixture_files(&config.destdir)
    } else {
        paths
    }
}

fn init(dir: &Path) -> Result<ExitCode> {
    match CaptureConfig::write_example(dir)? {
        Some(path) => println!("wrote {}", path.display()),
        None => println!("{} already exists", dir.join(fixcap::config::CONFIG_FILE_NAME).display()),
    }
    Ok(ExitCode::SUCCESS)
}

fn units(config: &CaptureConfig) -> Result<ExitCode> {
    let sources = discover_sources(&config.srcdir, &config.extensions)
        .with_context(|| format!("cannot scan {}", config.srcdir.display()))?;
    if !config.is_recording() {
        eprintln!("capture mode is off; nothing will be recorded");
    }
    for source in &sources {
        let relative = relative_to(source, &config.srcdir);
        let dest = match relative.parent() {
            Some(parent) => config.destdir.join(parent),
            None => config.destdir.clone(),
        };
        println!(
            "{}\t{}",
            unit_label(&relative),
            dest.join(format!("{}.<date>.json", source_stem(&relative))).display()
        );
    }
    Ok(ExitCode::SUCCESS)
}

async fn check(paths: Vec<PathBuf>, base: &Path) -> Result<ExitCode> {
    let tasks = paths.into_iter().map(|path| {
        tokio::task::spawn_blocking(move || {
            let status = inspect_file(&path);
            (path, status)
        })
    });
    let results = futures::future::join_all(tasks).await;

    let mut corrupt = 0usize;
    for joined in results {
        let (path, status) = joined.context("inspection task panicked")?;
        let shown = display_path(&path, Some(base));
        match status {
            Ok(FixtureStatus::Corrupt(reason)) => {
                corrupt += 1;
                println!("corrupt\t{shown}\t{reason}");
            }
            Ok(status) => {
                let count = status.document().map_or(0, |doc| doc.tests.len());
                println!("{}\t{shown}\t{count} records", status.label());
            }
            Err(err) => {
                corrupt += 1;
                println!("unreadable\t{shown}\t{err}");
            }
        }
    }

    Ok(if corrupt > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn repair(paths: &[PathBuf], base: &Path) -> Result<ExitCode> {
    let mut failed = false;
    for path in paths {
        let shown = display_path(path, Some(base));
        match repair_file(path) {
            Ok(true) => println!("repaired\t{shown}"),
            Ok(false) => println!("ok\t{shown}"),
            Err(err @ InspectError::Corrupt { .. }) => {
                failed = true;
                eprintln!("skipped\t{shown}\t{err}");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn show(path: &Path, json: bool) -> Result<ExitCode> {
    let doc = load_document(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("{} ({} records)", doc.require, doc.tests.len());
    for record in &doc.tests {
        let call = if record.request.construct {
            format!("new({})", args(&record.request.payload))
        } else {
            format!("{}({})", record.request.method, args(&record.request.payload))
        };
        let arrow = if record.output.is_error() { "!!" } else { "=>" };
        println!("  {call} {arrow} {}", record.output.value());
    }
    Ok(ExitCode::SUCCESS)
}

fn args(payload: &[serde_json::Value]) -> String {
    payload
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
