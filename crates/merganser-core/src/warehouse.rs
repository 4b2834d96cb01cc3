//! The `Warehouse` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g.
//! `merganser-warehouse-sqlite`). The pipeline layer depends on this
//! abstraction, not on any concrete engine; a backend owns locking and
//! transactional isolation, the pipeline owns only the calling order.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  record::{EnrichedSale, MergeOutcome, MerchantRecord, SaleRecord},
  relation::RelationDef,
};

/// Abstraction over the warehouse the pipeline loads into.
///
/// All methods return `Send` futures so the trait can be used from
/// multi-threaded async runtimes.
pub trait Warehouse: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Provisioning ──────────────────────────────────────────────────────

  /// Idempotently create (or verify) the namespace holding the relations.
  ///
  /// Fails if the backing store was provisioned under a different
  /// namespace name.
  fn ensure_namespace<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Idempotently create a relation from its contract definition,
  /// including whatever physical layout stands in for its partition and
  /// clustering attributes.
  fn ensure_relation(
    &self,
    def: &'static RelationDef,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Truncate loads ────────────────────────────────────────────────────

  /// Replace the merchants relation's entire contents with `rows`,
  /// atomically. Returns the number of rows landed.
  fn replace_merchants(
    &self,
    rows: Vec<MerchantRecord>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Replace the sales staging relation's entire contents with `rows`,
  /// atomically. Returns the number of rows landed.
  fn replace_staged_sales(
    &self,
    rows: Vec<SaleRecord>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Gate reads ────────────────────────────────────────────────────────

  fn staged_sales_count(
    &self,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn staged_merchants_count(
    &self,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Reconciliation (two-phase merge) ──────────────────────────────────

  /// Phase one: left-join staged sales with merchants and stamp every row
  /// with `stamp`. A pure read; the warehouse is unchanged.
  fn enriched_sales(
    &self,
    stamp: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<EnrichedSale>, Self::Error>> + Send + '_;

  /// Phase two: upsert `rows` into the target relation keyed by `sale_id`.
  ///
  /// Matched rows have every non-key column overwritten; unmatched rows
  /// are inserted whole; target rows absent from `rows` are untouched.
  /// All-or-nothing: on failure the target keeps its pre-call state.
  fn apply_enriched(
    &self,
    rows: Vec<EnrichedSale>,
  ) -> impl Future<Output = Result<MergeOutcome, Self::Error>> + Send + '_;

  // ── Target reads ──────────────────────────────────────────────────────

  /// All target rows ordered by `sale_id`. The read model for summaries
  /// and verification.
  fn target_sales(
    &self,
  ) -> impl Future<Output = Result<Vec<EnrichedSale>, Self::Error>> + Send + '_;
}
