// pulse-sim - synthetic session driver CLI
//
// Runs the full measurement pipeline against synthesized PPG traces, or a
// one-shot batch estimate over recorded intensity values, without any
// camera hardware.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use pulse_meter::config::PulseConfig;
use pulse_meter::session::MeasurementSession;
use pulse_meter::testing::{ambient_trace, finger_trace, TraceSpec};
use pulse_meter::BatchEstimator;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("pulse-sim error: {err:?}");
            ExitCode::from(1)
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "pulse-sim", about = "Synthetic PPG measurement simulator")]
struct Cli {
    /// Optional JSON config file; defaults are used when absent.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn execute(self) -> Result<()> {
        pulse_meter::init_logging();
        let config = match &self.config {
            Some(path) => PulseConfig::load_from_file(path),
            None => PulseConfig::default(),
        };
        match self.command {
            Command::Run(args) => run_command(config, args),
            Command::Estimate(args) => estimate_command(config, args),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a full synthetic session and print the terminal result.
    Run(RunArgs),
    /// Batch-estimate BPM from a JSON array of intensity values.
    Estimate(EstimateArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Simulated heart rate in BPM.
    #[arg(long, default_value_t = 72.0)]
    bpm: f32,
    /// Simulated camera frame rate in Hz.
    #[arg(long, default_value_t = 30.0)]
    fps: f32,
    /// Length of the finger-on trace in seconds.
    #[arg(long, default_value_t = 15.0)]
    duration_s: f32,
    /// Uniform noise amplitude added to the trace.
    #[arg(long, default_value_t = 0.3)]
    noise: f32,
    /// RNG seed for the trace.
    #[arg(long, default_value_t = 7)]
    seed: u64,
}

#[derive(Args, Debug)]
struct EstimateArgs {
    /// JSON file containing an array of intensity values.
    #[arg(long)]
    input: PathBuf,
    /// Sample rate the values were recorded at (Hz).
    #[arg(long, default_value_t = 30.0)]
    fps: f32,
}

fn run_command(config: PulseConfig, args: RunArgs) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to build runtime")?;

    runtime.block_on(async move {
        let session = Arc::new(MeasurementSession::new(config));
        let mut states = session.channels().subscribe_states();
        let mut estimates = session.channels().subscribe_estimates();
        let latch = session.beat_latch();

        session.start().context("failed to start session")?;

        let ambient = ambient_trace(35, 120.0, args.fps, 0);
        let spec = TraceSpec {
            bpm: args.bpm,
            sample_rate: args.fps,
            duration_s: args.duration_s,
            noise: args.noise,
            seed: args.seed,
            start_ms: (35.0 * 1000.0 / args.fps) as i64,
            ..TraceSpec::default()
        };
        let trace = finger_trace(&spec);

        let mut beats = 0u32;
        for sample in ambient.iter().chain(trace.iter()) {
            session.push_sample(*sample);

            while let Ok(state) = states.try_recv() {
                println!("state: {state:?}");
            }
            while let Ok(estimate) = estimates.try_recv() {
                println!(
                    "estimate: {} BPM (reliable: {})",
                    estimate.value, estimate.reliable
                );
            }
            // The presentation side consumes beats exactly once each.
            if let Some(beat) = latch.take() {
                beats += 1;
                println!("beat #{beats} at {} ms", beat.timestamp_ms);
            }

            if session.result().is_some() {
                break;
            }
        }

        if session.result().is_none() {
            // Trace exhausted without completing; finalize with what we have.
            session.cancel().context("failed to cancel session")?;
        }

        let result = session
            .result()
            .context("session produced no terminal result")?;
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("failed to encode result")?
        );
        Ok(())
    })
}

fn estimate_command(config: PulseConfig, args: EstimateArgs) -> Result<()> {
    let contents = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {:?}", args.input))?;
    let values: Vec<f32> =
        serde_json::from_str(&contents).context("input must be a JSON array of numbers")?;
    if values.is_empty() {
        bail!("input contains no samples");
    }

    let estimator = BatchEstimator::new(config.conditioning, config.peaks);
    let estimate = estimator.estimate(&values, args.fps);

    println!(
        "{}",
        serde_json::json!({
            "bpm": estimate.bpm,
            "peaks": estimate.peak_count,
            "intervals": estimate.intervals,
            "relaxed": estimate.relaxed,
        })
    );
    Ok(())
}
