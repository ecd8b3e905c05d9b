#![forbid(unsafe_code)]

mod config;
mod error;
mod evaluate;
mod telemetry;
mod trace;

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use crate::trace::{PcapTraceSource, TextTraceSource, TraceSource};

/// Large-Flow Detector evaluation harness: runs the configured detectors
/// over a packet trace and reports false-positive/false-negative and
/// overuse-damage statistics against an exact sliding-window oracle.
#[derive(Parser, Debug)]
#[command(author, version, about = "Large-Flow Detector evaluator")]
struct Cli {
    /// Path to the JSON experiment configuration.
    config: PathBuf,

    /// Suppress the per-detector report and only print the exit status.
    #[arg(long)]
    quiet: bool,
}

fn main() {
    telemetry::init_tracing();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            error!(%err, "evaluation failed");
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> error::Result<()> {
    let cfg = config::load_from_path(&cli.config)?;
    info!(exp_name = %cfg.exp_name, detectors = ?cfg.run_config.detectors_to_evaluate, "configuration loaded");

    let mut source: Box<dyn TraceSource> = if let Some(txt) = &cfg.traffic_config.txt_trace_file {
        Box::new(TextTraceSource::open(txt)?)
    } else {
        let pcap = cfg.traffic_config.pcap_file.as_ref().expect("validated by config::load_from_path");
        let time_file = cfg.traffic_config.time_file.as_ref().expect("validated by config::load_from_path");
        Box::new(PcapTraceSource::open(pcap, time_file)?)
    };

    let mut metrics = telemetry::EvalMetrics::new();
    let reports = evaluate::run(&cfg, source.as_mut(), &mut metrics)
        .map_err(|e| error::LfdError::Io(e))?;

    if !cli.quiet {
        for report in &reports {
            info!(
                detector = ?report.detector,
                false_positives = report.false_positives,
                false_negatives = report.false_negatives,
                overuse_damage_bytes = report.overuse_damage_bytes,
                false_positive_damage_bytes = report.false_positive_damage_bytes,
                flows_seen = report.flows_seen,
                packets_seen = report.packets_seen,
                "evaluation report"
            );
        }
        if cfg.telemetry.metrics_enabled {
            println!("{}", metrics.render());
        }
    }

    Ok(())
}
