//! CLI entry point for vscod.

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vscod_core::marketplace::Endpoints;
use vscod_core::{
    BinarySpec, Build, ConfigDocument, Orchestrator, Platform, ProcessExit, RunReport, Settings,
};

mod cli;
mod progress;

use cli::{Args, Command, DownloadTarget, ListOptsArgs};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    init_tracing(&args);
    debug!(?args, "CLI arguments parsed");

    match run(args).await {
        Ok(exit) => ExitCode::from(exit.code()),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(ProcessExit::Failure.code())
        }
    }
}

/// Priority: `RUST_LOG` env var > quiet flag > verbose flag > default (info).
fn init_tracing(args: &Args) {
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .try_init();
}

async fn run(args: Args) -> Result<ProcessExit> {
    let settings_base = Settings {
        concurrency: usize::from(args.concurrency),
        connect_timeout_secs: args.connect_timeout,
        read_timeout_secs: args.read_timeout,
        endpoints: Endpoints::new(&args.marketplace_url, &args.update_url),
        ..Settings::default()
    };

    let (document, output_dir) = match args.command {
        Command::ListOpts(opts) => {
            print_options(&opts);
            return Ok(ProcessExit::Success);
        }
        Command::Download { target } => match target {
            DownloadTarget::Config { config, output } => {
                let document = ConfigDocument::from_path(&config)
                    .with_context(|| format!("invalid configuration {}", config.display()))?;
                (document, output.output)
            }
            DownloadTarget::Extensions { ids, output } => {
                (ConfigDocument::from_extension_ids(ids.as_slice())?, output.output)
            }
            DownloadTarget::Editor {
                platforms,
                build,
                release,
                output,
            } => {
                let specs = platforms
                    .iter()
                    .map(|platform| BinarySpec::new(platform.as_str(), build.as_str(), &release))
                    .collect();
                (ConfigDocument::from_binary_specs(specs), output.output)
            }
        },
    };

    let settings = Settings {
        output_dir,
        ..settings_base
    };
    let tasks = Orchestrator::plan(&document)?;
    if tasks.is_empty() {
        info!("Configuration contains nothing to download");
        return Ok(ProcessExit::Success);
    }

    let cancel = CancellationToken::new();
    let orchestrator = Orchestrator::new(settings)?.with_cancellation(cancel.clone());
    let cancel_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling outstanding downloads");
            cancel_signal.cancel();
        }
    });

    let total = tasks.len();
    info!(
        tasks = total,
        output_dir = %orchestrator.settings().output_dir.display(),
        "vscod starting"
    );

    let use_spinner = progress::should_use_spinner(
        io::stderr().is_terminal(),
        args.quiet,
        progress::is_dumb_terminal(),
    );
    let (progress_handle, progress_stop) =
        progress::spawn_progress_ui(use_spinner, orchestrator.stats(), total);

    let report = orchestrator.run_tasks(tasks).await;

    progress_stop.store(true, Ordering::SeqCst);
    if let Some(handle) = progress_handle {
        let _ = handle.await;
    }

    print_summary(&report, args.quiet);

    if report.was_cancelled() || cancel.is_cancelled() {
        warn!("Interrupted. Run again to fetch what is missing.");
        return Ok(ProcessExit::Failure);
    }
    Ok(report.exit_outcome())
}

fn print_options(opts: &ListOptsArgs) {
    let show_all = !opts.platforms && !opts.builds;
    if opts.platforms || show_all {
        println!("Platforms:");
        for platform in Platform::ALL {
            println!("  {:<20} {}", platform.as_str(), platform.label());
        }
    }
    if opts.builds || show_all {
        println!("Builds:");
        for build in Build::ALL {
            println!("  {:<20} {}", build.as_str(), build.label());
        }
    }
}

fn print_summary(report: &RunReport, quiet: bool) {
    if !quiet {
        println!(
            "Downloaded {}, already present {}, failed {} (of {})",
            report.succeeded(),
            report.skipped(),
            report.failed(),
            report.total()
        );
    }
    for (result, error) in report.failures() {
        eprintln!(
            "  failed: {} -> {}: {error}",
            result.task.descriptor.identifier(),
            result.task.destination_display()
        );
    }
}
