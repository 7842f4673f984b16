// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use conveyor_belt::cli::OperationArgs;
use conveyor_belt::utils::logging::{format_error, format_warning};
use conveyor_belt::{Config, ConveyorProcessor, JsonLinesSink, LineSource, build_info};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "conveyor-belt")]
#[command(about = "Filter, decorate and reshape a stream of JSON records", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(flatten)]
    operations: OperationArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print build information and exit
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Version) = cli.command {
        println!("{}", build_info::info());
        return Ok(());
    }

    conveyor_belt::utils::logging::init_logger(cli.color, cli.verbose);

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let operations = cli
        .operations
        .build_operations()
        .context("Invalid operation arguments")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping pipeline");
            on_interrupt.cancel();
        }
    });

    let source = LineSource::stdin();
    let sink = JsonLinesSink::stdout().with_pretty(config.output.pretty);

    let mut processor = ConveyorProcessor::new(config.pipeline.clone());
    let result = processor
        .process(&cancel, source, sink, &operations)
        .await;

    report_errors(&processor, cli.color);

    result.context("Pipeline failed")?;
    info!("Done");

    Ok(())
}

fn report_errors(processor: &ConveyorProcessor, colored_output: bool) {
    let errors = processor.errors();
    if errors.is_empty() {
        return;
    }

    colored::control::set_override(colored_output);

    eprintln!(
        "{}",
        format_warning(&format!("{} record(s) failed during processing", errors.len()))
    );
    for entry in errors {
        eprintln!("{}", format_error(&entry.to_string()));
    }
}
