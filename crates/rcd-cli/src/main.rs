// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rcd_cli::{
    JsonLinesSink, RunOptions, load_instances_csv, load_json, run_stream, write_instances_csv,
    write_json_output,
};
use rcd_core::{EventSink, RcdError};
use rcd_eval::{RecurringStreamGenerator, StreamConfig};
use rcd_online::EnsembleConfig;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Recurring concept drift ensemble runner.
#[derive(Parser, Debug)]
#[command(name = "rcd", version, about = "Recurring concept drift ensemble", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the ensemble test-then-train over a CSV stream and print a JSON report.
    Run(RunArgs),
    /// Write a synthetic recurring-concept stream as CSV.
    Synth(SynthArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Headered CSV; the last column is the label unless `--label-column` is set.
    #[arg(long, value_name = "FILE")]
    input: PathBuf,

    /// Ensemble configuration as JSON; missing fields take their defaults.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "NAME")]
    label_column: Option<String>,

    /// Write every drift event as JSON lines.
    #[arg(long, value_name = "FILE")]
    events: Option<PathBuf>,

    /// Report destination; stdout when absent.
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    #[arg(long, default_value_t = 500)]
    curve_window: usize,

    /// Comma-separated zero-based indices of known drifts, for detection metrics.
    #[arg(long, value_delimiter = ',')]
    drift_points: Option<Vec<usize>>,

    /// Overrides `workers` from the config.
    #[arg(long)]
    workers: Option<usize>,

    /// Overrides `seed` from the config.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct SynthArgs {
    #[arg(long, value_name = "FILE")]
    output: PathBuf,

    /// Stream configuration as JSON; flags below override its fields.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long)]
    features: Option<usize>,

    #[arg(long)]
    concepts: Option<usize>,

    /// Comma-separated concept id per segment, e.g. `0,1,0,1`.
    #[arg(long, value_delimiter = ',')]
    schedule: Option<Vec<usize>>,

    #[arg(long)]
    segment_length: Option<usize>,

    /// Label flip probability in [0, 0.5).
    #[arg(long)]
    noise: Option<f64>,

    #[arg(long)]
    shift: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,

    /// Also write the drift points as a JSON array.
    #[arg(long, value_name = "FILE")]
    drift_points_output: Option<PathBuf>,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorPayload,
}

#[derive(Serialize)]
struct ErrorPayload {
    code: String,
    message: String,
}

#[derive(Serialize)]
struct SynthSummary<'a> {
    output: &'a Path,
    instances: usize,
    drift_points: Vec<usize>,
    config: &'a StreamConfig,
}

fn main() {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let result = match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Synth(args) => handle_synth(args),
    };
    if let Err(err) = result {
        emit_structured_error(&err);
        process::exit(1);
    }
}

fn handle_run(args: RunArgs) -> Result<()> {
    let mut config = match args.config.as_deref() {
        Some(path) => {
            info!(path = %path.display(), "loading ensemble configuration");
            load_json::<EnsembleConfig>(path)?
        }
        None => EnsembleConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    let instances = load_instances_csv(&args.input, args.label_column.as_deref())?;
    info!(
        path = %args.input.display(),
        instances = instances.len(),
        "loaded stream"
    );

    let sink = args
        .events
        .as_deref()
        .map(JsonLinesSink::create)
        .transpose()?
        .map(Arc::new);
    let options = RunOptions {
        curve_window: args.curve_window,
        drift_points: args.drift_points,
    };
    let report = run_stream(
        config,
        instances,
        &options,
        sink.clone().map(|sink| sink as Arc<dyn EventSink>),
    )?;

    if let Some(sink) = sink {
        let sink = Arc::try_unwrap(sink)
            .map_err(|_| anyhow::anyhow!("event log is still shared after the run"))?;
        sink.finish()?;
    }
    write_json_output(&report, args.output.as_deref())
}

fn handle_synth(args: SynthArgs) -> Result<()> {
    let mut config = match args.config.as_deref() {
        Some(path) => load_json::<StreamConfig>(path)?,
        None => StreamConfig::default(),
    };
    if let Some(features) = args.features {
        config.num_features = features;
    }
    if let Some(concepts) = args.concepts {
        config.num_concepts = concepts;
    }
    if let Some(schedule) = args.schedule {
        config.schedule = schedule;
    }
    if let Some(segment_length) = args.segment_length {
        config.segment_length = segment_length;
    }
    if let Some(noise) = args.noise {
        config.label_noise = noise;
    }
    if let Some(shift) = args.shift {
        config.concept_shift = shift;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    let generator =
        RecurringStreamGenerator::new(config.clone()).context("invalid stream configuration")?;
    let drift_points = generator.drift_points();
    let instances: Vec<_> = generator.collect();

    let file = File::create(&args.output)
        .with_context(|| format!("failed to create '{}'", args.output.display()))?;
    write_instances_csv(BufWriter::new(file), &instances)?;
    if let Some(path) = args.drift_points_output.as_deref() {
        write_json_output(&drift_points, Some(path))?;
    }
    info!(
        path = %args.output.display(),
        instances = instances.len(),
        drifts = drift_points.len(),
        "wrote synthetic stream"
    );

    write_json_output(
        &SynthSummary {
            output: &args.output,
            instances: instances.len(),
            drift_points,
            config: &config,
        },
        None,
    )
}

fn error_code(err: &anyhow::Error) -> &'static str {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<RcdError>())
        .map_or("cli_error", RcdError::code)
}

fn emit_structured_error(err: &anyhow::Error) {
    let payload = ErrorEnvelope {
        error: ErrorPayload {
            code: error_code(err).to_string(),
            message: format!("{err:#}"),
        },
    };

    match serde_json::to_string(&payload) {
        Ok(encoded) => eprintln!("{encoded}"),
        Err(_) => eprintln!(
            "{{\"error\":{{\"code\":\"{}\",\"message\":\"failed to encode error\"}}}}",
            payload.error.code
        ),
    }
}
