//! The pipeline runner: step wiring and wave-based execution.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use merganser_core::{
  gate::{GatePolicy, GateReport},
  record::{MergeOutcome, MerchantRecord, SaleRecord, decode_ndjson},
  relation::{MERCHANTS, RelationDef, SALES_STAGE, SALES_TARGET},
  warehouse::Warehouse,
};
use serde::Serialize;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::{
  Error, Result,
  graph::{GraphError, StepId, TaskGraph},
  source::ObjectStore,
};

// ─── Step wiring ─────────────────────────────────────────────────────────────

pub const CREATE_DATASET: StepId = "create_dataset";
pub const CREATE_MERCHANTS_TABLE: StepId = "create_merchants_table";
pub const CREATE_SALES_STAGE: StepId = "create_sales_stage";
pub const CREATE_TARGET_TABLE: StepId = "create_target_table";
pub const LOAD_MERCHANTS: StepId = "load_merchants";
pub const LOAD_SALES: StepId = "load_sales";
pub const CHECK_STAGE_HAS_ROWS: StepId = "check_stage_has_rows";
pub const MERGE_SALES: StepId = "merge_sales";

/// What a named step does when executed.
#[derive(Debug, Clone, Copy)]
pub enum StepKind {
  EnsureNamespace,
  EnsureRelation(&'static RelationDef),
  LoadMerchants,
  LoadSales,
  QualityGate,
  Merge,
}

/// The pipeline's full step declaration: namespace, then the three
/// relations, then the two concurrent staging loads, then the gate, then
/// the merge.
pub fn task_graph() -> Result<TaskGraph<StepKind>, GraphError> {
  let creates = &[CREATE_MERCHANTS_TABLE, CREATE_SALES_STAGE, CREATE_TARGET_TABLE];
  TaskGraph::builder()
    .step(CREATE_DATASET, &[], StepKind::EnsureNamespace)
    .step(
      CREATE_MERCHANTS_TABLE,
      &[CREATE_DATASET],
      StepKind::EnsureRelation(&MERCHANTS),
    )
    .step(
      CREATE_SALES_STAGE,
      &[CREATE_DATASET],
      StepKind::EnsureRelation(&SALES_STAGE),
    )
    .step(
      CREATE_TARGET_TABLE,
      &[CREATE_DATASET],
      StepKind::EnsureRelation(&SALES_TARGET),
    )
    .step(LOAD_MERCHANTS, creates, StepKind::LoadMerchants)
    .step(LOAD_SALES, creates, StepKind::LoadSales)
    .step(
      CHECK_STAGE_HAS_ROWS,
      &[LOAD_MERCHANTS, LOAD_SALES],
      StepKind::QualityGate,
    )
    .step(MERGE_SALES, &[CHECK_STAGE_HAS_ROWS], StepKind::Merge)
    .build()
}

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PipelineConfig {
  /// Warehouse namespace the relations live in.
  pub namespace:        String,
  /// Object key of the merchants NDJSON dataset.
  pub merchants_object: String,
  /// Object key of the sales NDJSON dataset.
  pub sales_object:     String,
  pub gate:             GatePolicy,
  /// Blind retries granted uniformly to every step.
  pub retries:          u32,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      namespace:        "sales_dwh".into(),
      merchants_object: "merchants/merchants.json".into(),
      sales_object:     "sales/sales.json".into(),
      gate:             GatePolicy::default(),
      retries:          1,
    }
  }
}

// ─── Run reporting ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutput {
  Provisioned,
  Loaded { rows: u64 },
  GatePassed { report: GateReport },
  Merged { outcome: MergeOutcome },
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
  pub id:       StepId,
  /// 1 means first try succeeded.
  pub attempts: u32,
  pub output:   StepOutput,
}

/// Everything a completed run reports.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
  pub run_id:      Uuid,
  pub started_at:  DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
  /// Step outcomes in declaration order.
  pub steps:       Vec<StepOutcome>,
}

impl RunSummary {
  pub fn gate_report(&self) -> Option<&GateReport> {
    self.steps.iter().find_map(|s| match &s.output {
      StepOutput::GatePassed { report } => Some(report),
      _ => None,
    })
  }

  pub fn merge_outcome(&self) -> Option<MergeOutcome> {
    self.steps.iter().find_map(|s| match s.output {
      StepOutput::Merged { outcome } => Some(outcome),
      _ => None,
    })
  }
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

struct Inner<W, O> {
  warehouse: W,
  objects:   O,
  config:    PipelineConfig,
}

/// The upsert pipeline bound to a warehouse and an object store.
///
/// Cloning is cheap — shared state is reference-counted.
pub struct Pipeline<W, O> {
  inner: Arc<Inner<W, O>>,
}

impl<W, O> Clone for Pipeline<W, O> {
  fn clone(&self) -> Self {
    Self { inner: Arc::clone(&self.inner) }
  }
}

impl<W, O> Pipeline<W, O>
where
  W: Warehouse + 'static,
  O: ObjectStore + 'static,
{
  pub fn new(warehouse: W, objects: O, config: PipelineConfig) -> Self {
    Self { inner: Arc::new(Inner { warehouse, objects, config }) }
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.inner.config
  }

  /// Execute one full run of the task graph.
  ///
  /// Steps sharing a wave run concurrently; a step failure (after its
  /// retry budget) aborts the run before any dependent executes.
  pub async fn run(&self) -> Result<RunSummary> {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    tracing::info!(%run_id, "pipeline run starting");

    let graph = task_graph()?;
    let mut steps = Vec::new();

    for wave in graph.waves() {
      if let [step] = wave.as_slice() {
        steps.push(self.exec_step(step.id, step.payload).await?);
        continue;
      }

      let mut set = JoinSet::new();
      for (pos, step) in wave.iter().enumerate() {
        let me = self.clone();
        let (id, kind) = (step.id, step.payload);
        set.spawn(async move { (pos, me.exec_step(id, kind).await) });
      }

      // Collect the whole wave before failing so the error we surface is
      // the first one in declaration order, not join order.
      let mut results: Vec<Option<Result<StepOutcome>>> =
        wave.iter().map(|_| None).collect();
      while let Some(joined) = set.join_next().await {
        let (pos, result) = joined?;
        results[pos] = Some(result);
      }
      for result in results.into_iter().flatten() {
        steps.push(result?);
      }
    }

    let summary = RunSummary { run_id, started_at, finished_at: Utc::now(), steps };
    if let Some(outcome) = summary.merge_outcome() {
      tracing::info!(
        %run_id,
        inserted = outcome.inserted,
        updated = outcome.updated,
        "pipeline run complete"
      );
    }
    Ok(summary)
  }

  async fn exec_step(&self, id: StepId, kind: StepKind) -> Result<StepOutcome> {
    let budget = self.inner.config.retries + 1;
    let mut attempt = 0;

    loop {
      attempt += 1;
      match self.exec_once(id, kind).await {
        Ok(output) => {
          tracing::info!(step = id, attempt, "step complete");
          return Ok(StepOutcome { id, attempts: attempt, output });
        }
        // The retry is blind: every failure kind gets the same budget.
        Err(err) if attempt < budget => {
          tracing::warn!(step = id, attempt, error = %err, "step failed; retrying");
        }
        Err(err) => {
          tracing::error!(step = id, attempt, error = %err, "step failed; halting dependents");
          return Err(err);
        }
      }
    }
  }

  async fn exec_once(&self, id: StepId, kind: StepKind) -> Result<StepOutput> {
    let cfg = &self.inner.config;
    let wh = &self.inner.warehouse;

    match kind {
      StepKind::EnsureNamespace => {
        wh.ensure_namespace(&cfg.namespace)
          .await
          .map_err(|e| warehouse_err(id, e))?;
        Ok(StepOutput::Provisioned)
      }

      StepKind::EnsureRelation(def) => {
        wh.ensure_relation(def).await.map_err(|e| warehouse_err(id, e))?;
        Ok(StepOutput::Provisioned)
      }

      StepKind::LoadMerchants => {
        let records: Vec<MerchantRecord> =
          self.fetch_records(&cfg.merchants_object).await?;
        let rows = wh
          .replace_merchants(records)
          .await
          .map_err(|e| warehouse_err(id, e))?;
        Ok(StepOutput::Loaded { rows })
      }

      StepKind::LoadSales => {
        let records: Vec<SaleRecord> =
          self.fetch_records(&cfg.sales_object).await?;
        let rows = wh
          .replace_staged_sales(records)
          .await
          .map_err(|e| warehouse_err(id, e))?;
        Ok(StepOutput::Loaded { rows })
      }

      StepKind::QualityGate => {
        let staged_sales = wh
          .staged_sales_count()
          .await
          .map_err(|e| warehouse_err(id, e))?;
        let staged_merchants = wh
          .staged_merchants_count()
          .await
          .map_err(|e| warehouse_err(id, e))?;

        let report = cfg.gate.evaluate(staged_sales, staged_merchants);
        if report.passed() {
          Ok(StepOutput::GatePassed { report })
        } else {
          Err(Error::GateFailed(report))
        }
      }

      StepKind::Merge => {
        // One stamp per run; every applied row carries it.
        let stamp = Utc::now();
        let rows = wh.enriched_sales(stamp).await.map_err(|e| Error::Reconcile {
          phase:  "enrich",
          source: Box::new(e),
        })?;
        let outcome = wh.apply_enriched(rows).await.map_err(|e| Error::Reconcile {
          phase:  "apply",
          source: Box::new(e),
        })?;
        Ok(StepOutput::Merged { outcome })
      }
    }
  }

  /// Fetch and decode one NDJSON source object.
  async fn fetch_records<T: serde::de::DeserializeOwned>(
    &self,
    object: &str,
  ) -> Result<Vec<T>> {
    let bytes = self
      .inner
      .objects
      .fetch(object)
      .await
      .map_err(|source| Error::Fetch { object: object.to_owned(), source })?;
    decode_ndjson(&bytes)
      .map_err(|source| Error::Decode { object: object.to_owned(), source })
  }
}

fn warehouse_err<E>(step: StepId, source: E) -> Error
where
  E: std::error::Error + Send + Sync + 'static,
{
  Error::Warehouse { step, source: Box::new(source) }
}
