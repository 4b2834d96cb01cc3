//! Record types — the rows that flow through the pipeline.
//!
//! Source records are decoded from newline-delimited JSON. Decoding is
//! lenient: fields not present in the schema are ignored, and only the
//! columns marked NOT NULL in the relation contract are required. A record
//! missing a required field is a load failure, not a silent null.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{Error, Result};

// ─── Source records ──────────────────────────────────────────────────────────

/// A row of the merchants reference/dimension relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantRecord {
  pub merchant_id:       String,
  #[serde(default)]
  pub merchant_name:     Option<String>,
  #[serde(default)]
  pub merchant_category: Option<String>,
  #[serde(default)]
  pub merchant_country:  Option<String>,
  /// Source-side modification time; informational only.
  #[serde(default)]
  pub last_update:       Option<DateTime<Utc>>,
}

/// A raw sale as landed in the staging relation.
///
/// `sale_id` is the only required field; it is the merge key downstream.
/// Staging does not enforce its uniqueness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleRecord {
  pub sale_id:           String,
  #[serde(default)]
  pub sale_date:         Option<NaiveDate>,
  #[serde(default)]
  pub product_id:        Option<String>,
  #[serde(default)]
  pub quantity_sold:     Option<i64>,
  #[serde(default)]
  pub total_sale_amount: Option<f64>,
  #[serde(default)]
  pub merchant_id:       Option<String>,
  #[serde(default)]
  pub last_update:       Option<DateTime<Utc>>,
}

// ─── Enriched rows ───────────────────────────────────────────────────────────

/// A staged sale left-joined with its merchant attributes, ready to be
/// applied to the target relation.
///
/// The merchant columns are `None` exactly when no reference row matched
/// the sale's `merchant_id`. `last_update` is stamped at reconciliation
/// time, never carried over from the source record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedSale {
  pub sale_id:           String,
  pub sale_date:         Option<NaiveDate>,
  pub product_id:        Option<String>,
  pub quantity_sold:     Option<i64>,
  pub total_sale_amount: Option<f64>,
  pub merchant_id:       Option<String>,
  pub merchant_name:     Option<String>,
  pub merchant_category: Option<String>,
  pub merchant_country:  Option<String>,
  pub last_update:       DateTime<Utc>,
}

/// Counts returned by the apply phase of the reconciler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
  /// Rows whose key was absent from the target and were inserted whole.
  pub inserted: u64,
  /// Rows whose key matched and had every non-key column overwritten.
  pub updated:  u64,
}

// ─── NDJSON decoding ─────────────────────────────────────────────────────────

/// Decode a newline-delimited JSON byte buffer into records.
///
/// Blank lines are skipped. The first malformed record aborts decoding and
/// reports its 1-based line number.
pub fn decode_ndjson<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>> {
  let text = std::str::from_utf8(bytes)?;

  let mut records = Vec::new();
  for (idx, line) in text.lines().enumerate() {
    if line.trim().is_empty() {
      continue;
    }
    let record = serde_json::from_str(line)
      .map_err(|source| Error::Ndjson { line: idx + 1, source })?;
    records.push(record);
  }
  Ok(records)
}
