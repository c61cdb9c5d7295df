use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::Table;
use timslake_core::config::LakeConfig;
use timslake_core::journal::{load_last_run, PipelineJournal, TracingJournal};
use timslake_core::pipeline::{Pipeline, Stages};
use timslake_core::retention::RetentionPlan;
use timslake_core::snapshot::SnapshotCategory;
use timslake_core::store::SnapshotStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod stages;

use stages::{FileExtractor, FlatteningTransformer, JsonFileLoader};

const ROOT_ENV: &str = "TIMSLAKE_ROOT";

#[derive(Parser, Debug)]
#[command(author, version, about = "Filesystem data lake for the TIMS ETL pipeline", long_about = None)]
struct Cli {
    #[command(flatten)]
    lake: LakeArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Default)]
struct LakeArgs {
    /// TOML config file (root, retention_window, last_run_file)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Install root holding the `datalake/` tree; overrides TIMSLAKE_ROOT
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Number of processed snapshots to keep per category
    #[arg(long, global = true)]
    window: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run extract, transform, load and retention once
    Run(RunArgs),
    /// Plan (and optionally apply) the retention sweep over processed snapshots
    Retain(RetainArgs),
    /// Show pending and archived snapshots plus the last run
    Status,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// JSON document used as the raw payload
    #[arg(long)]
    input: PathBuf,
}

#[derive(Args, Debug, Default)]
struct RetainArgs {
    /// Print the plan without deleting anything
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli.lake)?;

    match cli.command {
        Command::Run(args) => handle_run(&config, args),
        Command::Retain(args) => handle_retain(&config, args),
        Command::Status => handle_status(&config),
    }
}

fn resolve_config(args: &LakeArgs) -> Result<LakeConfig> {
    dotenvy::dotenv().ok();
    let env_root = env::var(ROOT_ENV).ok();
    let cwd = env::current_dir().context("failed to resolve working directory")?;
    resolve_config_from(args, env_root, cwd)
}

/// Defaults, then the `--config` file, then `TIMSLAKE_ROOT`, then flags.
fn resolve_config_from(
    args: &LakeArgs,
    env_root: Option<String>,
    cwd: PathBuf,
) -> Result<LakeConfig> {
    let mut config = match &args.config {
        Some(path) => LakeConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => LakeConfig::new(cwd),
    };

    if let Some(root) = env_root {
        config = config.with_root(root);
    }
    if let Some(root) = &args.root {
        config = config.with_root(root);
    }
    if let Some(window) = args.window {
        config = config.with_retention_window(window);
    }

    config.validate()?;
    Ok(config)
}

fn handle_run(config: &LakeConfig, args: RunArgs) -> Result<()> {
    let journal = Arc::new(TracingJournal::new(&config.last_run_file));
    let stages = Stages {
        extractor: FileExtractor { input: args.input },
        transformer: FlatteningTransformer,
        loader: JsonFileLoader {
            output_dir: config.layout().lake_dir().join("loaded"),
        },
    };

    let mut pipeline = Pipeline::from_config(config, journal.clone(), stages)?;
    let summary = pipeline.run()?;

    let run_id = summary.run_id.unwrap_or_else(|| journal.run_id());
    info!(run_id = %run_id, "pipeline run complete");
    println!("Run {} complete.", run_id);
    println!("  raw snapshot:         {}", summary.raw_snapshot);
    println!("  transformed snapshot: {}", summary.transformed_snapshot);
    println!("  records written:      {}", summary.records_written);
    println!("  snapshots deleted:    {}", summary.retention.total_expired());
    Ok(())
}

fn handle_retain(config: &LakeConfig, args: RetainArgs) -> Result<()> {
    let journal: Arc<dyn PipelineJournal> = Arc::new(TracingJournal::new(&config.last_run_file));
    let store = SnapshotStore::open(config.layout(), journal)?;
    let plan = store.plan_retention(config.retention_window)?;

    print_plan(&plan);

    if args.dry_run {
        if plan.total_expired() > 0 {
            println!("Run again without --dry-run to delete the expired snapshots.");
        }
    } else {
        store.apply_retention(&plan)?;
        println!("Retention window of {} applied.", plan.window);
    }
    Ok(())
}

fn print_plan(plan: &RetentionPlan) {
    if plan.total_expired() == 0 {
        println!("No snapshots outside the window of {}.", plan.window);
    } else {
        println!(
            "Found {} snapshots outside the window of {}:",
            plan.total_expired(),
            plan.window
        );
        for group in &plan.groups {
            if group.expired.is_empty() {
                continue;
            }
            println!("  {}: {} expired", group.category.label(), group.expired.len());
            for name in &group.expired {
                println!("    {}", name);
            }
        }
    }

    if !plan.unrecognized.is_empty() {
        println!("Ignoring {} unrecognized archive entries:", plan.unrecognized.len());
        for name in &plan.unrecognized {
            println!("    {}", name);
        }
    }
}

fn handle_status(config: &LakeConfig) -> Result<()> {
    let journal: Arc<dyn PipelineJournal> = Arc::new(TracingJournal::new(&config.last_run_file));
    let store = SnapshotStore::open(config.layout(), journal)?;
    let archived = store.archived()?;

    let mut table = Table::new();
    table.set_header(vec!["Category", "Pending", "Archived", "Newest archived"]);
    for category in SnapshotCategory::ALL {
        let pending = store.pending(category)?.len();
        let mine: Vec<_> = archived
            .iter()
            .filter(|entry| entry.id.map(|id| id.category) == Some(category))
            .collect();
        let newest = mine
            .last()
            .map(|entry| entry.file_name.clone())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            category.label().to_string(),
            pending.to_string(),
            mine.len().to_string(),
            newest,
        ]);
    }

    println!("Lake root: {}", config.root.display());
    println!("{table}");

    match load_last_run(&config.last_run_file)? {
        Some(last) => println!(
            "Last run {} finished at {} ({} phases).",
            last.run_id,
            last.finished_at.to_rfc3339(),
            last.phases.len()
        ),
        None => println!("No completed run recorded."),
    }
    Ok(())
}
