use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use canopy_io::InferenceOptions;
use canopy_rf::{
    ClassMetrics, Model, OobEvaluation, OobMode, Prediction, Task, TrainingConfig,
    TrainingMetadata, predict_csv, train_csv,
};

#[derive(Parser)]
#[command(name = "canopy")]
#[command(about = "Random forest training and prediction over CSV data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
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

#[derive(Subcommand)]
enum Command {
    /// Infer a schema from a CSV file, train a forest and save it
    Train {
        /// Path to the training CSV file (with header)
        csv: PathBuf,

        /// Name of the label column
        label: String,

        /// Directory to write the model into (created if needed)
        output_dir: PathBuf,

        /// Learning task: "classification" or "regression"
        #[arg(long, default_value = "classification")]
        task: String,

        /// Number of trees in the forest
        #[arg(long, default_value_t = 1000)]
        num_trees: usize,

        /// Maximum tree depth (-1 = unlimited)
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        max_depth: i64,

        /// Fraction of the labelled rows drawn (with replacement) per tree
        #[arg(long, default_value_t = 1.0)]
        bootstrap_ratio: f64,

        /// Train every tree on all labelled rows instead of a bootstrap sample
        #[arg(long, default_value_t = false)]
        no_bootstrap: bool,

        /// Minimum number of examples in each child of a split
        #[arg(long, default_value_t = 1)]
        min_examples_per_leaf: usize,

        /// Features sampled per node (default: sqrt for classification, 1/3 for regression)
        #[arg(long)]
        num_candidate_attributes: Option<usize>,

        /// Cap on the number of values in each categorical dictionary
        #[arg(long)]
        max_num_values: Option<usize>,

        /// Compute out-of-bag evaluation after training
        #[arg(long, default_value_t = false)]
        oob: bool,
    },

    /// Predict every row of a CSV file with a saved model
    Predict {
        /// Path to the model directory
        model_dir: PathBuf,

        /// Path to the CSV file; must carry the model's columns in order
        csv: PathBuf,
    },

    /// Print a summary of a saved model
    Describe {
        /// Path to the model directory
        model_dir: PathBuf,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct TrainOutput {
    output_dir: PathBuf,
    label: String,
    #[serde(flatten)]
    metadata: TrainingMetadata,
    n_nodes: usize,
    oob_accuracy: Option<f64>,
    oob_rmse: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    oob_class_metrics: Option<Vec<ClassMetricsEntry>>,
}

#[derive(Serialize)]
struct ClassMetricsEntry {
    class: String,
    precision: f64,
    recall: f64,
    f1: f64,
    support: usize,
}

#[derive(Serialize)]
struct PredictOutput {
    model_dir: PathBuf,
    task: Task,
    n_rows: usize,
    predictions: Vec<PredictionEntry>,
}

#[derive(Serialize)]
struct PredictionEntry {
    row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
}

#[derive(Serialize)]
struct DescribeOutput {
    model_dir: PathBuf,
    task: Task,
    label: String,
    num_trees: usize,
    classes: Vec<String>,
    n_nodes: usize,
    n_leaves: usize,
    max_depth: usize,
    columns: Vec<ColumnOutput>,
}

#[derive(Serialize)]
struct ColumnOutput {
    name: String,
    kind: String,
    num_missing: u64,
}

fn parse_task(s: &str) -> Result<Task> {
    match s {
        "classification" => Ok(Task::Classification),
        "regression" => Ok(Task::Regression),
        other => anyhow::bail!("unknown task: {other} (expected classification or regression)"),
    }
}

fn parse_max_depth(depth: i64) -> Result<Option<usize>> {
    match depth {
        -1 => Ok(None),
        d if d >= 0 => Ok(Some(usize::try_from(d)?)),
        other => anyhow::bail!("invalid max depth: {other} (expected -1 or a non-negative integer)"),
    }
}

fn class_metrics_entries(model: &Model, metrics: Vec<ClassMetrics>) -> Vec<ClassMetricsEntry> {
    metrics
        .into_iter()
        .map(|m| ClassMetricsEntry {
            class: model
                .class_name(m.class)
                .map_or_else(|| m.class.to_string(), str::to_string),
            precision: m.precision,
            recall: m.recall,
            f1: m.f1,
            support: m.support,
        })
        .collect()
}

fn prediction_entry(model: &Model, row: usize, prediction: &Prediction) -> PredictionEntry {
    match prediction {
        Prediction::Class { code, votes } => PredictionEntry {
            row,
            class: model.class_name(*code).map(str::to_string),
            confidence: votes
                .get(*code as usize)
                .map(|&v| v as f64 / model.num_trees() as f64),
            value: None,
        },
        Prediction::Value(v) => PredictionEntry {
            row,
            class: None,
            confidence: None,
            value: Some(*v),
        },
    }
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

    // Prediction runs on the global pool; training builds its own from the config.
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Train {
            csv,
            label,
            output_dir,
            task,
            num_trees,
            max_depth,
            bootstrap_ratio,
            no_bootstrap,
            min_examples_per_leaf,
            num_candidate_attributes,
            max_num_values,
            oob,
        } => {
            let task = parse_task(&task)?;
            let mut config = TrainingConfig::new(task)
                .with_num_trees(num_trees)
                .with_max_depth(parse_max_depth(max_depth)?)
                .with_bootstrap(!no_bootstrap)
                .with_bootstrap_ratio(bootstrap_ratio)
                .with_min_examples_per_leaf(min_examples_per_leaf)
                .with_num_candidate_attributes(num_candidate_attributes)
                .with_seed(cli.seed)
                .with_oob_mode(if oob {
                    OobMode::Enabled
                } else {
                    OobMode::Disabled
                });
            if let Some(threads) = cli.threads {
                config = config.with_num_threads(threads);
            }
            let inference = InferenceOptions::new().with_max_num_values(max_num_values);

            // 1. Infer, encode, train
            let result = train_csv(&csv, &label, &config, &inference)
                .with_context(|| format!("training on {} failed", csv.display()))?;

            if let Some(OobEvaluation::Classification { confusion, .. }) = result.oob() {
                info!("OOB confusion matrix:\n{confusion}");
            }

            // 2. Save model
            let model = result.model();
            model
                .save(&output_dir)
                .context("failed to save model")?;
            info!(path = %output_dir.display(), "model saved");

            // 3. Print summary
            let output = TrainOutput {
                output_dir,
                label,
                metadata: result.metadata().clone(),
                n_nodes: model.trees().iter().map(|t| t.n_nodes()).sum(),
                oob_accuracy: result.oob().and_then(OobEvaluation::accuracy),
                oob_rmse: result.oob().and_then(OobEvaluation::rmse),
                oob_class_metrics: result
                    .oob()
                    .and_then(OobEvaluation::class_metrics)
                    .map(|metrics| class_metrics_entries(model, metrics)),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Predict { model_dir, csv } => {
            // 1. Load model
            let model = Model::load(&model_dir).context("failed to load model")?;
            info!(
                num_trees = model.num_trees(),
                task = %model.task(),
                label = model.label_name(),
                "model loaded"
            );

            // 2. Encode and predict
            let predictions = predict_csv(&model, &csv)
                .with_context(|| format!("prediction on {} failed", csv.display()))?;

            // 3. Print predictions
            let output = PredictOutput {
                model_dir,
                task: model.task(),
                n_rows: predictions.len(),
                predictions: predictions
                    .iter()
                    .enumerate()
                    .map(|(row, p)| prediction_entry(&model, row, p))
                    .collect(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Describe { model_dir } => {
            let model = Model::load(&model_dir).context("failed to load model")?;
            if !cli.quiet {
                eprint!("{}", model.data_spec().describe());
            }

            let trees = model.trees();
            let classes = model
                .data_spec()
                .column(model.label_column())
                .and_then(|c| c.dictionary())
                .map(|d| d.iter().map(|(_, v)| v.to_string()).collect())
                .unwrap_or_default();
            let output = DescribeOutput {
                task: model.task(),
                label: model.label_name().to_string(),
                num_trees: model.num_trees(),
                classes,
                n_nodes: trees.iter().map(|t| t.n_nodes()).sum(),
                n_leaves: trees.iter().map(|t| t.n_leaves()).sum(),
                max_depth: trees.iter().map(|t| t.depth()).max().unwrap_or(0),
                columns: model
                    .data_spec()
                    .columns()
                    .iter()
                    .map(|c| ColumnOutput {
                        name: c.name().to_string(),
                        kind: c.kind().to_string(),
                        num_missing: c.num_missing(),
                    })
                    .collect(),
                model_dir,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
