use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use penmark_dtw::{Alignment, CostFunction, DEFAULT_RADIUS};
use penmark_io::{
    DEFAULT_COLUMNS, DEFAULT_PEN_COLUMN, DatasetIndex, ExperimentName, ResultWriter, SampleFile,
    SignatureReader, SignerId, VerificationEntry,
};
use penmark_verify::{
    BaselineMode, CalibrationConfig, CalibrationFold, DEFAULT_STEEPNESS, Decision, FallbackPolicy,
    SignerModel, VerifierConfig, decide,
};

#[derive(Parser)]
#[command(name = "penmark")]
#[command(about = "Online signature verification by elastic template matching")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducible dataset partitioning
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// How HWR rows become points.
#[derive(Args, Debug, Clone)]
struct ReaderArgs {
    /// Zero-based columns read as point coordinates
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_COLUMNS)]
    columns: Vec<usize>,

    /// Per-column weights applied at ingestion (defaults to 1 for each column)
    #[arg(long, value_delimiter = ',')]
    weights: Option<Vec<f64>>,

    /// Zero-based column holding the pen channel (0 = lifted)
    #[arg(long, default_value_t = DEFAULT_PEN_COLUMN)]
    pen_column: usize,
}

/// Template and threshold tuning.
#[derive(Args, Debug, Clone)]
struct ModelArgs {
    /// What to score against when no stroke template matches: "global" or "indeterminate"
    #[arg(long, default_value = "global")]
    fallback: String,

    /// Enrollment baseline: "resubstitution" or "leave-one-out"
    #[arg(long, default_value = "resubstitution")]
    baseline: String,

    /// Local cost: "squared" or "absolute"
    #[arg(long, default_value = "squared")]
    cost: String,

    /// FastDTW search radius used while building templates
    #[arg(long, default_value_t = DEFAULT_RADIUS)]
    radius: usize,

    /// Score probes with FastDTW instead of full DTW
    #[arg(long, default_value_t = false)]
    fast_scoring: bool,

    /// Steepness of the consistency-to-weight sigmoid
    #[arg(long, default_value_t = DEFAULT_STEEPNESS)]
    steepness: f64,
}

#[derive(Subcommand)]
enum Command {
    /// Build a signer model from genuine samples
    Enroll {
        /// Genuine HWR files of one signer
        #[arg(long, num_args = 1.., required = true)]
        files: Vec<PathBuf>,

        /// Where to save the trained model
        #[arg(long)]
        model: PathBuf,

        #[command(flatten)]
        reader: ReaderArgs,

        #[command(flatten)]
        tuning: ModelArgs,
    },

    /// Accept or reject probe signatures against a saved model
    Verify {
        /// Path to a model saved by `enroll`
        #[arg(long)]
        model: PathBuf,

        /// Probe HWR files
        #[arg(long, num_args = 1.., required = true)]
        files: Vec<PathBuf>,

        /// Tolerance in standard deviations above the enrollment average
        #[arg(long, default_value_t = 2.0, allow_negative_numbers = true)]
        k: f64,

        /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        #[command(flatten)]
        reader: ReaderArgs,
    },

    /// Sweep the tolerance over held-out folds to find the equal-error point
    Calibrate {
        /// Dataset root containing `genuine/` and `forgery/`
        #[arg(long)]
        data: PathBuf,

        /// Genuine probes held out per fold
        #[arg(long)]
        test_size: usize,

        /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// First tolerance in the sweep
        #[arg(long, default_value_t = 2.0, allow_negative_numbers = true)]
        k_start: f64,

        /// Last tolerance in the sweep
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        k_end: f64,

        /// Distance between swept tolerances
        #[arg(long, default_value_t = 0.1)]
        k_step: f64,

        #[command(flatten)]
        reader: ReaderArgs,

        #[command(flatten)]
        tuning: ModelArgs,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct EnrollOutput {
    model: PathBuf,
    n_enrolled: usize,
    stroke_counts: Vec<usize>,
    average_distance: f64,
    distance_deviation: f64,
}

#[derive(Serialize)]
struct VerifyOutput {
    experiment: String,
    k: f64,
    threshold: f64,
    n_probes: usize,
    n_accepted: usize,
    n_indeterminate: usize,
}

#[derive(Serialize)]
struct CalibrateOutput {
    experiment: String,
    n_signers: usize,
    n_folds: usize,
    eer_k: f64,
    eer_frr: f64,
    eer_far: f64,
}

fn build_reader(args: &ReaderArgs) -> Result<SignatureReader> {
    let weights = args
        .weights
        .clone()
        .unwrap_or_else(|| vec![1.0; args.columns.len()]);
    let reader = SignatureReader::new(args.columns.clone(), weights)
        .context("invalid reader columns")?
        .with_pen_column(args.pen_column);
    Ok(reader)
}

fn parse_fallback(s: &str) -> Result<FallbackPolicy> {
    match s {
        "global" => Ok(FallbackPolicy::GlobalPrototype),
        "indeterminate" => Ok(FallbackPolicy::Indeterminate),
        other => anyhow::bail!("unknown fallback: {other} (expected global or indeterminate)"),
    }
}

fn parse_baseline(s: &str) -> Result<BaselineMode> {
    match s {
        "resubstitution" => Ok(BaselineMode::Resubstitution),
        "leave-one-out" => Ok(BaselineMode::LeaveOneOut),
        other => {
            anyhow::bail!("unknown baseline: {other} (expected resubstitution or leave-one-out)")
        }
    }
}

fn parse_cost(s: &str) -> Result<CostFunction> {
    match s {
        "squared" => Ok(CostFunction::SquaredDifference),
        "absolute" => Ok(CostFunction::AbsoluteDifference),
        other => anyhow::bail!("unknown cost: {other} (expected squared or absolute)"),
    }
}

fn build_config(dim: usize, tuning: &ModelArgs) -> Result<VerifierConfig> {
    let scoring = if tuning.fast_scoring {
        Alignment::Fast {
            radius: tuning.radius,
        }
    } else {
        Alignment::Full
    };
    Ok(VerifierConfig::uniform(dim)?
        .with_cost(parse_cost(&tuning.cost)?)
        .with_template_alignment(Alignment::Fast {
            radius: tuning.radius,
        })
        .with_scoring_alignment(scoring)
        .with_fallback(parse_fallback(&tuning.fallback)?)
        .with_baseline(parse_baseline(&tuning.baseline)?)
        .with_steepness(tuning.steepness))
}

fn paths<'a>(samples: impl IntoIterator<Item = &'a SampleFile>) -> Vec<&'a Path> {
    samples.into_iter().map(|s| s.path()).collect()
}

/// Build one calibration fold per partition of `signer`'s genuine samples.
fn signer_folds(
    index: &DatasetIndex,
    signer: &SignerId,
    reader: &SignatureReader,
    config: &VerifierConfig,
    test_size: usize,
    seed: u64,
) -> Result<Vec<CalibrationFold>> {
    let forgeries = reader
        .read_all(&paths(index.forgeries(signer)))
        .with_context(|| format!("failed to read forgeries of signer {signer}"))?;

    index
        .folds(signer, test_size, seed)?
        .into_iter()
        .map(|fold| -> Result<CalibrationFold> {
            let enrollment = reader.read_all(&paths(&fold.enrollment))?;
            let probes = reader.read_all(&paths(&fold.probes))?;
            let model = SignerModel::build(config.clone(), &enrollment)
                .with_context(|| format!("failed to train signer {signer}"))?;
            Ok(CalibrationFold::new(model, probes, forgeries.clone()))
        })
        .collect()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Enroll {
            files,
            model,
            reader,
            tuning,
        } => {
            let reader = build_reader(&reader)?;
            let config = build_config(reader.dim(), &tuning)?;

            // Read enrollment samples
            let signatures = reader
                .read_all(&files)
                .context("failed to read enrollment signatures")?;
            info!(n = signatures.len(), "enrollment signatures loaded");

            // Train and persist
            let trained = SignerModel::build(config, &signatures).context("enrollment failed")?;
            trained
                .save(&model)
                .with_context(|| format!("failed to save model to {}", model.display()))?;

            let output = EnrollOutput {
                model,
                n_enrolled: signatures.len(),
                stroke_counts: trained.stroke_counts().collect(),
                average_distance: trained.average_distance(),
                distance_deviation: trained.distance_deviation(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Verify {
            model,
            files,
            k,
            experiment,
            output_dir,
            reader,
        } => {
            let experiment_name = ExperimentName::new(experiment.clone())?;
            let reader = build_reader(&reader)?;

            let trained = SignerModel::load(&model)
                .with_context(|| format!("failed to load model from {}", model.display()))?;
            let threshold = trained.threshold(k)?;

            // Score each probe
            let entries = files
                .iter()
                .map(|path| -> Result<VerificationEntry> {
                    let probe = reader.read(path)?;
                    let distance = trained
                        .calc_distance_from(&probe)
                        .with_context(|| format!("failed to score {}", path.display()))?;
                    Ok(VerificationEntry {
                        file: path.file_name().map_or_else(
                            || path.display().to_string(),
                            |n| n.to_string_lossy().into_owned(),
                        ),
                        distance,
                        decision: decide(distance, threshold),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            info!(n = entries.len(), "probes scored");

            // Write JSON artifact
            let writer = ResultWriter::new(&output_dir, experiment_name)?;
            writer.write_verification(k, threshold, &entries)?;

            let output = VerifyOutput {
                experiment,
                k,
                threshold,
                n_probes: entries.len(),
                n_accepted: entries
                    .iter()
                    .filter(|e| e.decision == Decision::Accept)
                    .count(),
                n_indeterminate: entries.iter().filter(|e| e.distance.is_none()).count(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Calibrate {
            data,
            test_size,
            experiment,
            output_dir,
            k_start,
            k_end,
            k_step,
            reader,
            tuning,
        } => {
            let experiment_name = ExperimentName::new(experiment.clone())?;
            let reader = build_reader(&reader)?;
            let config = build_config(reader.dim(), &tuning)?;
            let sweep = CalibrationConfig::new(k_start, k_end, k_step)?;

            // 1. Index dataset
            let index = DatasetIndex::scan(&data).context("failed to scan dataset")?;
            let signers: Vec<SignerId> = index.signers().cloned().collect();
            anyhow::ensure!(!signers.is_empty(), "no signers found under {}", data.display());

            // 2. Train one model per fold, signers in parallel
            let folds: Vec<CalibrationFold> = signers
                .par_iter()
                .map(|signer| signer_folds(&index, signer, &reader, &config, test_size, cli.seed))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .flatten()
                .collect();
            info!(signers = signers.len(), folds = folds.len(), "folds trained");

            // 3. Sweep
            let result = sweep.sweep(&folds).context("calibration failed")?;

            // 4. Write JSON artifact
            let writer = ResultWriter::new(&output_dir, experiment_name)?;
            writer.write_calibration(&signers, test_size, cli.seed, &result)?;

            let output = CalibrateOutput {
                experiment,
                n_signers: signers.len(),
                n_folds: result.n_folds,
                eer_k: result.eer.k,
                eer_frr: result.eer.frr,
                eer_far: result.eer.far,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
