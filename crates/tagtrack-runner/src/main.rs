//! `tagtrack`: ground station for the remote tag detector.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use crossbeam_channel::{select, tick};
use tagtrack_runner::{init_logging, ConfigOverrides, Runner, RunnerConfig, RunnerResult};
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about = "Upload tags to a remote detector and monitor its pulses")]
struct Args {
    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Tag catalog file
    #[arg(long)]
    tags: Option<PathBuf>,
    /// Local address for the tunnel socket
    #[arg(long)]
    bind: Option<String>,
    /// Telemetry link address (learned from traffic when omitted)
    #[arg(long)]
    remote: Option<String>,
    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
    /// Pulses required for confirmation
    #[arg(long)]
    k: Option<u32>,
    /// False alarm probability as a percentage
    #[arg(long)]
    false_alarm_percent: Option<f64>,
    /// Print session events as JSON lines on stdout
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> RunnerResult<()> {
    let mut config = match &args.config {
        Some(path) => RunnerConfig::load(path)?,
        None => RunnerConfig::default(),
    };
    config.apply(ConfigOverrides {
        tag_file: args.tags,
        bind: args.bind,
        remote: args.remote,
        k: args.k,
        false_alarm_percent: args.false_alarm_percent,
        json_events: args.json.then_some(true),
    });

    tagtrack_control::describe_metrics();

    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })?;

    let runner = Runner::start(&config)?;
    info!("Runner: session started on {}", runner.transport().local_addr()?);
    let status = tick(config.status_interval());

    loop {
        select! {
            recv(shutdown_rx) -> _ => {
                info!("Runner: shutting down");
                break;
            }
            recv(status) -> _ => {
                if runner.is_finished() {
                    break;
                }
                runner.board().print();
            }
        }
    }

    runner.stop()
}
