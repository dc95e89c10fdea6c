//! triage: batch and single-sample command line for the vitals pipeline.
//!
//! Subcommands:
//! - `run`: full pipeline over a vitals CSV, writing the decision CSV
//! - `fit-baseline`: fit baseline statistics from a feature CSV
//! - `drift`: compare a feature CSV with the stored baseline
//! - `score`: real-time assessment of one HR/SpO2 reading
//! - `simulate`: write a seeded synthetic vitals run

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use triage_compute::io;
use triage_compute::{
    detect_drift, inject_drift, BaselineStats, Pipeline, RealtimeScorer, RealtimeVitals, SyntheticRun,
};
use triage_core::Config;
use triage_rules::TriageRules;

// ── CLI ─────────────────────────────────────────────────────────────

/// Ambulance vitals triage: features, anomaly scoring, risk and drift.
#[derive(Parser, Debug)]
#[command(name = "triage", version, about)]
struct Cli {
    /// Directory of YAML rule documents (defaults to `$TRIAGE_DATA_DIR/rules`).
    #[arg(long, env = "TRIAGE_RULES_DIR", global = true)]
    rules_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the batch pipeline over a vitals CSV.
    Run {
        /// Raw vitals CSV.
        input: PathBuf,

        /// Decision CSV to write.
        #[arg(long, short, default_value = "final_decision.csv")]
        output: PathBuf,

        /// Also write the extracted features to this CSV.
        #[arg(long)]
        features_out: Option<PathBuf>,

        /// Apply the motion-artifact filter before feature extraction.
        #[arg(long)]
        clean: bool,
    },

    /// Fit baseline statistics from a feature CSV.
    FitBaseline {
        /// Feature CSV (for example the output of `run --features-out`).
        input: PathBuf,

        /// Where to store the statistics (defaults to `$TRIAGE_BASELINE_PATH`).
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Check a feature CSV for drift against the stored baseline.
    Drift {
        /// Feature CSV to check.
        input: PathBuf,

        /// Baseline statistics (defaults to `$TRIAGE_BASELINE_PATH`).
        #[arg(long)]
        baseline: Option<PathBuf>,

        /// z-score above which a column counts as drifted (defaults to the rules).
        #[arg(long)]
        threshold: Option<f64>,

        /// Multiply this column before checking, to confirm detection works.
        #[arg(long)]
        inject: Option<String>,

        /// Factor used with `--inject`.
        #[arg(long, default_value_t = 3.0)]
        factor: f64,
    },

    /// Score a single HR/SpO2 reading and print the assessment as JSON.
    Score {
        #[arg(long)]
        heart_rate: f64,

        #[arg(long)]
        spo2: f64,
    },

    /// Write a seeded synthetic run (normal, distress, recovery) as vitals CSV.
    Simulate {
        #[arg(long, short, default_value = "synthetic_ambulance_vitals.csv")]
        output: PathBuf,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Minutes per phase.
        #[arg(long, default_value_t = 10)]
        phase_minutes: usize,
    },
}

fn load_rules(dir: &Path) -> Result<TriageRules> {
    TriageRules::load(dir).with_context(|| format!("failed to load rules from {}", dir.display()))
}

fn main() -> Result<()> {
    triage_core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_summary();
    let rules_dir = cli.rules_dir.unwrap_or_else(|| config.storage.rules_dir.clone());

    match cli.command {
        Command::Run {
            input,
            output,
            features_out,
            clean,
        } => {
            let rules = load_rules(&rules_dir)?;
            let samples = io::read_vitals_path(&input)
                .with_context(|| format!("failed to read vitals from {}", input.display()))?;

            let mut pipeline = Pipeline::new(rules);
            if clean {
                pipeline = pipeline.with_artifact_filter();
            }
            let report = pipeline.run(&samples).context("pipeline run failed")?;

            io::write_decisions_path(&output, &report.rows)
                .with_context(|| format!("failed to write {}", output.display()))?;
            if let Some(path) = features_out {
                io::write_frame_path(&path, &report.feature_frame()?)
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }
            info!(
                run_id = %report.run_id,
                rows = report.rows.len(),
                final_alerts = report.final_alerts(),
                output = %output.display(),
                "run finished"
            );
        }

        Command::FitBaseline { input, output } => {
            let path = output.unwrap_or_else(|| config.storage.baseline_path.clone());
            let frame = io::read_frame_path(&input)
                .with_context(|| format!("failed to read features from {}", input.display()))?;
            if frame.is_empty() {
                bail!("{} has no rows to fit a baseline on", input.display());
            }
            BaselineStats::fit(&frame)
                .save(&path)
                .with_context(|| format!("failed to save baseline to {}", path.display()))?;
        }

        Command::Drift {
            input,
            baseline,
            threshold,
            inject,
            factor,
        } => {
            let path = baseline.unwrap_or_else(|| config.storage.baseline_path.clone());
            let stats = BaselineStats::load(&path)
                .with_context(|| format!("failed to load baseline from {}", path.display()))?;
            let threshold = match threshold {
                Some(t) => t,
                None => load_rules(&rules_dir)?.scoring.drift.z_threshold,
            };

            let mut frame = io::read_frame_path(&input)
                .with_context(|| format!("failed to read features from {}", input.display()))?;
            if let Some(column) = inject {
                warn!(column = %column, factor, "injecting synthetic drift");
                frame = inject_drift(&frame, &column, factor)?;
            }

            let report = detect_drift(&frame, &stats, threshold);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Score { heart_rate, spo2 } => {
            let rules = load_rules(&rules_dir)?;
            let assessment = RealtimeScorer::new(&rules.scoring.realtime).assess(RealtimeVitals {
                heart_rate_bpm: heart_rate,
                spo2_percent: spo2,
            });
            println!("{}", serde_json::to_string_pretty(&assessment)?);
        }

        Command::Simulate {
            output,
            seed,
            phase_minutes,
        } => {
            let samples = SyntheticRun {
                seed,
                phase_seconds: phase_minutes * 60,
                ..SyntheticRun::default()
            }
            .generate()
            .context("failed to generate synthetic run")?;
            io::write_vitals_path(&output, &samples)
                .with_context(|| format!("failed to write {}", output.display()))?;
        }
    }

    Ok(())
}
