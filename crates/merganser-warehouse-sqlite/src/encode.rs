//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, dates as ISO 8601
//! (`YYYY-MM-DD`) strings.

use chrono::{DateTime, NaiveDate, Utc};
use merganser_core::record::EnrichedSale;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339()
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String {
  d.format("%Y-%m-%d").to_string()
}

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read from an enriched-sale row (the join projection or the
/// target relation; both share this column set).
pub struct RawEnrichedSale {
  pub sale_id:           String,
  pub sale_date:         Option<String>,
  pub product_id:        Option<String>,
  pub quantity_sold:     Option<i64>,
  pub total_sale_amount: Option<f64>,
  pub merchant_id:       Option<String>,
  pub merchant_name:     Option<String>,
  pub merchant_category: Option<String>,
  pub merchant_country:  Option<String>,
  pub last_update:       String,
}

impl RawEnrichedSale {
  pub fn into_enriched(self) -> Result<EnrichedSale> {
    Ok(EnrichedSale {
      sale_id:           self.sale_id,
      sale_date:         self.sale_date.as_deref().map(decode_date).transpose()?,
      product_id:        self.product_id,
      quantity_sold:     self.quantity_sold,
      total_sale_amount: self.total_sale_amount,
      merchant_id:       self.merchant_id,
      merchant_name:     self.merchant_name,
      merchant_category: self.merchant_category,
      merchant_country:  self.merchant_country,
      last_update:       decode_dt(&self.last_update)?,
    })
  }
}
