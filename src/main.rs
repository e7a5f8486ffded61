mod cli;
mod config;
mod driver;
mod error;
mod fasta;
mod launch;
mod naming;
mod scheduler;
mod state_machine;
mod ui;
mod window;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cli::{Cli, Command, RunArgs};
use config::BatchConfig;
use driver::{AssumeYes, BatchOptions, prepare, write_report};
use launch::ProcessLauncher;
use scheduler::NoProgress;
use ui::{BatchProgress, TerminalConfirm};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

// Respects RUST_LOG; otherwise info, or debug with --verbose.
fn init_tracing(verbose: bool) {
    let default = if verbose { "iprbatch=debug" } else { "iprbatch=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Count { fasta_file } => {
            let count = fasta::count_records(&fasta_file)
                .with_context(|| format!("failed to read {}", fasta_file.display()))?;
            println!("{count}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Run(args) => run_batch(args).await,
    }
}

async fn run_batch(args: RunArgs) -> Result<ExitCode> {
    let config = BatchConfig::load().context("failed to load configuration")?;
    let options = BatchOptions::resolve(&args, &config)?;

    let prepared = if args.yes {
        prepare(options, &mut AssumeYes)?
    } else {
        prepare(options, &mut TerminalConfirm::new())?
    };
    let Some(prepared) = prepared else {
        println!("Aborted, nothing was submitted.");
        return Ok(ExitCode::SUCCESS);
    };
    println!("FASTA file contains {} records.", prepared.total_records());

    if args.dry_run {
        for (ordinal, name) in prepared.dry_run()? {
            println!("{ordinal}\t{name}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let launcher = ProcessLauncher::new(config.quiet_jobs);
    let report = if console::user_attended() {
        let progress = BatchProgress::start(prepared.expected_jobs());
        let result = prepared.execute(launcher, &progress).await;
        progress.finish();
        result?
    } else {
        prepared.execute(launcher, &NoProgress).await?
    };

    ui::print_summary(&report);
    if let Some(path) = &args.report {
        write_report(path, &report)?;
    }

    if args.fail_on_error && !report.all_succeeded() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
