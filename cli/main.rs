#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::error::Error;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;

use ratioscreen::GroupLabels;
use ratioscreen::compute_column_group_auc;
use ratioscreen::config::{DEFAULT_GROUP_COLUMN, ScreenConfig};
use ratioscreen::data::{load_screen_data, write_auc_table, write_screen_table};
use ratioscreen::pipeline::batch_size_for_budget;
use ratioscreen::progress::ScreenProgressObserver;

#[derive(Args)]
pub struct ColumnsArgs {
    /// Path to a TSV file with a group column and one column per feature
    pub data: PathBuf,

    /// Name of the integer group label column
    #[arg(long, default_value = DEFAULT_GROUP_COLUMN)]
    pub group_column: String,

    /// Where to write the feature x group AUC table
    #[arg(long, default_value = "column_auc.tsv")]
    pub output: PathBuf,
}

#[derive(Args)]
pub struct PairsArgs {
    /// Path to a TSV file with a group column and one column per feature
    pub data: PathBuf,

    /// TOML file with threshold, batch_size, threads and group_column settings
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Keep pairs whose ratio AUC is strictly greater than this value
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Number of feature pairs evaluated per batch
    #[arg(long, conflicts_with = "memory_budget_mb")]
    pub batch_size: Option<usize>,

    /// Derive the batch size from a per-batch memory budget in MiB
    #[arg(long, value_name = "MIB")]
    pub memory_budget_mb: Option<usize>,

    /// Worker threads (defaults to one per core)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Name of the integer group label column
    #[arg(long)]
    pub group_column: Option<String>,

    /// Where to write the retained (pair, group, AUC) rows
    #[arg(long, default_value = "paired_auc.tsv")]
    pub output: PathBuf,
}

#[derive(Parser)]
#[command(
    name = "ratioscreen",
    version,
    about = "Screen feature ratios for group discrimination by one-vs-rest AUC",
    long_about = "Computes per-feature AUC against integer group labels, and screens every \
                 pair of features by the AUC of their ratio, keeping pairs above a threshold."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// AUC of every feature against every group
    #[command(about = "Per-feature AUC table (outputs: column_auc.tsv)")]
    Columns(ColumnsArgs),

    /// AUC of every feature-pair ratio, filtered by threshold
    #[command(about = "Screen feature-pair ratios (outputs: paired_auc.tsv)")]
    Pairs(PairsArgs),
}

/// Draws batch progress on stderr when it is a terminal.
struct BarProgress {
    bar: Option<ProgressBar>,
}

fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let draw_target = if std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr_with_hz(20)
    } else {
        ProgressDrawTarget::hidden()
    };

    let pb = ProgressBar::with_draw_target(Some(len), draw_target);
    let style = ProgressStyle::with_template(
        "\n> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches ({eta}) {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

impl ScreenProgressObserver for BarProgress {
    fn on_start(&mut self, total_batches: usize) {
        self.bar = Some(create_progress_bar(total_batches as u64, "screening pairs"));
    }

    fn on_batch_finished(&mut self, completed_batches: usize, records_kept: usize) {
        if let Some(bar) = &self.bar {
            bar.set_position(completed_batches as u64);
            bar.set_message(format!("{records_kept} records kept"));
        }
    }

    fn on_finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

pub fn columns(args: ColumnsArgs) -> Result<(), Box<dyn Error>> {
    let data = load_screen_data(&args.data, &args.group_column)?;
    let auc = compute_column_group_auc(data.features.view(), &data.labels)?;
    write_auc_table(&args.output, auc.view(), &data.feature_names)?;
    println!(
        "Wrote AUC for {} features x {} groups to: {}",
        auc.nrows(),
        auc.ncols(),
        args.output.display()
    );
    Ok(())
}

fn resolve_config(args: &PairsArgs) -> Result<ScreenConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Reading screening config from {}", path.display());
            ScreenConfig::load(path)?
        }
        None => ScreenConfig::default(),
    };

    // Explicit flags take precedence over the config file.
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(threads) = args.threads {
        config.threads = Some(threads);
    }
    if let Some(group_column) = &args.group_column {
        config.group_column = group_column.clone();
    }
    Ok(config)
}

pub fn pairs(args: PairsArgs) -> Result<(), Box<dyn Error>> {
    let mut config = resolve_config(&args)?;
    config.validate()?;

    let data = load_screen_data(&args.data, &config.group_column)?;
    let n_groups = GroupLabels::normalize(&data.labels)?.num_groups();

    if let Some(budget_mb) = args.memory_budget_mb {
        config.batch_size = batch_size_for_budget(
            data.features.nrows(),
            n_groups,
            budget_mb.saturating_mul(1 << 20),
        );
        log::info!(
            "Batch size {} derived from a {} MiB budget",
            config.batch_size,
            budget_mb
        );
    }

    let mut progress = BarProgress { bar: None };
    let (table, summary) = config.pair_screen().run_with_summary(
        data.features.view(),
        &data.labels,
        &mut progress,
    )?;

    write_screen_table(&args.output, &table, &data.feature_names)?;
    println!(
        "Kept {} of {} pair/group cells above AUC {} in {} batches on {} threads ({:.2?}).",
        summary.records_kept,
        summary.total_pairs * n_groups,
        config.threshold,
        summary.chunks,
        summary.threads,
        summary.elapsed
    );
    println!("Results saved to: {}", args.output.display());
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let Cli { command } = cli;

    let result = match command {
        Some(Commands::Columns(args)) => columns(args),
        Some(Commands::Pairs(args)) => pairs(args),
        None => {
            let mut command = Cli::command();
            command
                .print_help()
                .map_err(|e| Box::new(e) as Box<dyn Error>)
                .map(|_| println!())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
