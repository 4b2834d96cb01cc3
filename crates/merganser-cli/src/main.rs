//! `merganser` — runner binary for the sales-warehouse upsert pipeline.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite warehouse, and runs the pipeline once, prints its task graph, or
//! loops on the daily schedule.
//!
//! # Usage
//!
//! ```
//! merganser run
//! merganser --config /etc/merganser.toml run --json
//! merganser plan
//! merganser schedule
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use chrono::Utc;
use clap::{Parser, Subcommand};
use merganser_core::gate::GatePolicy;
use merganser_pipeline::{
  Pipeline, PipelineConfig, RunSummary,
  run::{StepOutput, task_graph},
  schedule::next_daily_run,
  source::FsObjectStore,
};
use merganser_warehouse_sqlite::SqliteWarehouse;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Sales-warehouse upsert pipeline runner")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Execute one pipeline run.
  Run {
    /// Print the run summary as JSON instead of a table.
    #[arg(long)]
    json: bool,
  },
  /// Print the validated task graph without executing anything.
  Plan,
  /// Run once per UTC day; missed intervals are not caught up.
  Schedule,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the TOML config file; every field has a default so an absent
/// file still yields a runnable local setup. Values are overridable via
/// `MERGANSER_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct Settings {
  warehouse_path:           PathBuf,
  namespace:                String,
  /// Root directory the object keys are resolved under.
  source_root:              PathBuf,
  merchants_object:         String,
  sales_object:             String,
  require_staged_sales:     bool,
  require_staged_merchants: bool,
  retries:                  u32,
}

impl Default for Settings {
  fn default() -> Self {
    let pipeline = PipelineConfig::default();
    let gate = GatePolicy::default();
    Self {
      warehouse_path:           PathBuf::from("merganser.db"),
      namespace:                pipeline.namespace,
      source_root:              PathBuf::from("data"),
      merchants_object:         pipeline.merchants_object,
      sales_object:             pipeline.sales_object,
      require_staged_sales:     gate.require_staged_sales,
      require_staged_merchants: gate.require_staged_merchants,
      retries:                  pipeline.retries,
    }
  }
}

impl Settings {
  fn pipeline_config(&self) -> PipelineConfig {
    PipelineConfig {
      namespace:        self.namespace.clone(),
      merchants_object: self.merchants_object.clone(),
      sales_object:     self.sales_object.clone(),
      gate:             GatePolicy {
        require_staged_sales:     self.require_staged_sales,
        require_staged_merchants: self.require_staged_merchants,
      },
      retries:          self.retries,
    }
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("MERGANSER"))
    .build()
    .context("failed to read config file")?;
  let settings: Settings = settings
    .try_deserialize()
    .context("failed to deserialise settings")?;

  match cli.command {
    Command::Run { json } => {
      let pipeline = build_pipeline(&settings).await?;
      let summary = pipeline.run().await.context("pipeline run failed")?;
      print_summary(&summary, json)?;
    }
    Command::Plan => print_plan()?,
    Command::Schedule => {
      let pipeline = build_pipeline(&settings).await?;
      run_schedule(pipeline).await;
    }
  }

  Ok(())
}

async fn build_pipeline(
  settings: &Settings,
) -> anyhow::Result<Pipeline<SqliteWarehouse, FsObjectStore>> {
  let warehouse = SqliteWarehouse::open(&settings.warehouse_path)
    .await
    .with_context(|| {
      format!("failed to open warehouse at {:?}", settings.warehouse_path)
    })?;
  let objects = FsObjectStore::new(&settings.source_root);
  Ok(Pipeline::new(warehouse, objects, settings.pipeline_config()))
}

// ─── Output ───────────────────────────────────────────────────────────────────

fn print_summary(summary: &RunSummary, json: bool) -> anyhow::Result<()> {
  if json {
    println!("{}", serde_json::to_string_pretty(summary)?);
    return Ok(());
  }

  let elapsed = summary.finished_at - summary.started_at;
  println!(
    "run {} finished in {}ms",
    summary.run_id,
    elapsed.num_milliseconds()
  );
  for step in &summary.steps {
    let detail = match &step.output {
      StepOutput::Provisioned => "ok".to_string(),
      StepOutput::Loaded { rows } => format!("{rows} rows loaded"),
      StepOutput::GatePassed { report } => report.to_string(),
      StepOutput::Merged { outcome } => {
        format!("{} inserted, {} updated", outcome.inserted, outcome.updated)
      }
    };
    let retries = if step.attempts > 1 {
      format!(" (attempt {})", step.attempts)
    } else {
      String::new()
    };
    println!("  {:<24} {detail}{retries}", step.id);
  }
  Ok(())
}

fn print_plan() -> anyhow::Result<()> {
  let graph = task_graph().context("task graph declaration is invalid")?;

  for step in graph.steps() {
    if step.deps.is_empty() {
      println!("{}", step.id);
    } else {
      println!("{} <- {}", step.id, step.deps.join(", "));
    }
  }
  println!();
  for (i, wave) in graph.waves().enumerate() {
    let ids: Vec<_> = wave.into_iter().map(|s| s.id).collect();
    println!("wave {}: {}", i + 1, ids.join(", "));
  }
  Ok(())
}

// ─── Schedule loop ────────────────────────────────────────────────────────────

/// Sleep to each UTC-midnight boundary and run once. Computing the next
/// boundary from the current clock after every run is what disables
/// catch-up: however many intervals were missed, only the most recent one
/// executes.
async fn run_schedule(pipeline: Pipeline<SqliteWarehouse, FsObjectStore>) {
  loop {
    let now = Utc::now();
    let next = next_daily_run(now);
    let wait = (next - now)
      .to_std()
      .unwrap_or(std::time::Duration::ZERO);
    tracing::info!(next = %next, "sleeping until next scheduled run");
    tokio::time::sleep(wait).await;

    match pipeline.run().await {
      Ok(summary) => {
        if let Err(err) = print_summary(&summary, false) {
          tracing::warn!(error = %err, "failed to print run summary");
        }
      }
      Err(err) => {
        tracing::error!(error = %err, "scheduled run failed");
      }
    }
  }
}
