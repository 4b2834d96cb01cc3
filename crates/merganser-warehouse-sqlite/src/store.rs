//! [`SqliteWarehouse`] — the SQLite implementation of [`Warehouse`].

use std::path::Path;

use chrono::{DateTime, Utc};
use merganser_core::{
  record::{EnrichedSale, MergeOutcome, MerchantRecord, SaleRecord},
  relation::RelationDef,
  warehouse::Warehouse,
};
use rusqlite::OptionalExtension as _;

use crate::{
  Error, Result,
  ddl::{META_SCHEMA, create_table_sql, index_sql},
  encode::{RawEnrichedSale, encode_date, encode_dt},
};

// ─── Warehouse handle ────────────────────────────────────────────────────────

/// A merganser warehouse backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteWarehouse {
  conn: tokio_rusqlite::Connection,
}

impl SqliteWarehouse {
  /// Open (or create) a warehouse at `path` and apply connection pragmas.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let wh = Self { conn };
    wh.init_meta().await?;
    Ok(wh)
  }

  /// Open an in-memory warehouse — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let wh = Self { conn };
    wh.init_meta().await?;
    Ok(wh)
  }

  async fn init_meta(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(META_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn count(&self, table: &'static str) -> Result<u64> {
    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| {
          r.get(0)
        })?)
      })
      .await?;
    Ok(n as u64)
  }
}

// ─── Encoded row (moved into insert closures) ────────────────────────────────

struct EncodedSale {
  sale_id:           String,
  sale_date:         Option<String>,
  product_id:        Option<String>,
  quantity_sold:     Option<i64>,
  total_sale_amount: Option<f64>,
  merchant_id:       Option<String>,
  merchant_name:     Option<String>,
  merchant_category: Option<String>,
  merchant_country:  Option<String>,
  last_update:       String,
}

impl From<EnrichedSale> for EncodedSale {
  fn from(row: EnrichedSale) -> Self {
    Self {
      sale_id:           row.sale_id,
      sale_date:         row.sale_date.map(encode_date),
      product_id:        row.product_id,
      quantity_sold:     row.quantity_sold,
      total_sale_amount: row.total_sale_amount,
      merchant_id:       row.merchant_id,
      merchant_name:     row.merchant_name,
      merchant_category: row.merchant_category,
      merchant_country:  row.merchant_country,
      last_update:       encode_dt(row.last_update),
    }
  }
}

// ─── Warehouse impl ──────────────────────────────────────────────────────────

impl Warehouse for SqliteWarehouse {
  type Error = Error;

  // ── Provisioning ──────────────────────────────────────────────────────────

  async fn ensure_namespace(&self, name: &str) -> Result<()> {
    let existing: Option<String> = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row("SELECT name FROM namespace LIMIT 1", [], |r| r.get(0))
            .optional()?,
        )
      })
      .await?;

    if let Some(existing) = existing {
      if existing != name {
        return Err(Error::NamespaceMismatch {
          existing,
          requested: name.to_owned(),
        });
      }
      return Ok(());
    }

    let name_str = name.to_owned();
    let at_str = encode_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO namespace (name, created_at) VALUES (?1, ?2)",
          rusqlite::params![name_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn ensure_relation(&self, def: &'static RelationDef) -> Result<()> {
    let table_sql = create_table_sql(def);
    let idx_sqls = index_sql(def);

    self
      .conn
      .call(move |conn| {
        conn.execute(&table_sql, [])?;
        for sql in &idx_sqls {
          conn.execute(sql, [])?;
        }
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Truncate loads ────────────────────────────────────────────────────────

  async fn replace_merchants(&self, rows: Vec<MerchantRecord>) -> Result<u64> {
    let landed = rows.len() as u64;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM merchants", [])?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO merchants (
               merchant_id, merchant_name, merchant_category,
               merchant_country, last_update
             ) VALUES (?1, ?2, ?3, ?4, ?5)",
          )?;
          for row in rows {
            stmt.execute(rusqlite::params![
              row.merchant_id,
              row.merchant_name,
              row.merchant_category,
              row.merchant_country,
              row.last_update.map(encode_dt),
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(landed)
  }

  async fn replace_staged_sales(&self, rows: Vec<SaleRecord>) -> Result<u64> {
    let landed = rows.len() as u64;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM sales_stage", [])?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO sales_stage (
               sale_id, sale_date, product_id, quantity_sold,
               total_sale_amount, merchant_id, last_update
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          )?;
          for row in rows {
            stmt.execute(rusqlite::params![
              row.sale_id,
              row.sale_date.map(encode_date),
              row.product_id,
              row.quantity_sold,
              row.total_sale_amount,
              row.merchant_id,
              row.last_update.map(encode_dt),
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(landed)
  }

  // ── Gate reads ────────────────────────────────────────────────────────────

  async fn staged_sales_count(&self) -> Result<u64> {
    self.count("sales_stage").await
  }

  async fn staged_merchants_count(&self) -> Result<u64> {
    self.count("merchants").await
  }

  // ── Reconciliation (two-phase merge) ──────────────────────────────────────

  async fn enriched_sales(&self, stamp: DateTime<Utc>) -> Result<Vec<EnrichedSale>> {
    let stamp_str = encode_dt(stamp);

    let raws: Vec<RawEnrichedSale> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT
             s.sale_id, s.sale_date, s.product_id, s.quantity_sold,
             s.total_sale_amount, s.merchant_id,
             m.merchant_name, m.merchant_category, m.merchant_country
           FROM sales_stage s
           LEFT JOIN merchants m ON s.merchant_id = m.merchant_id",
        )?;

        let rows = stmt
          .query_map([], |row| {
            Ok(RawEnrichedSale {
              sale_id:           row.get(0)?,
              sale_date:         row.get(1)?,
              product_id:        row.get(2)?,
              quantity_sold:     row.get(3)?,
              total_sale_amount: row.get(4)?,
              merchant_id:       row.get(5)?,
              merchant_name:     row.get(6)?,
              merchant_category: row.get(7)?,
              merchant_country:  row.get(8)?,
              last_update:       stamp_str.clone(),
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEnrichedSale::into_enriched).collect()
  }

  async fn apply_enriched(&self, rows: Vec<EnrichedSale>) -> Result<MergeOutcome> {
    let encoded: Vec<EncodedSale> = rows.into_iter().map(Into::into).collect();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut outcome = MergeOutcome::default();
        {
          let mut exists_stmt =
            tx.prepare("SELECT 1 FROM sales_target WHERE sale_id = ?1")?;
          let mut update_stmt = tx.prepare(
            "UPDATE sales_target SET
               sale_date = ?2, product_id = ?3, quantity_sold = ?4,
               total_sale_amount = ?5, merchant_id = ?6, merchant_name = ?7,
               merchant_category = ?8, merchant_country = ?9, last_update = ?10
             WHERE sale_id = ?1",
          )?;
          let mut insert_stmt = tx.prepare(
            "INSERT INTO sales_target (
               sale_id, sale_date, product_id, quantity_sold,
               total_sale_amount, merchant_id, merchant_name,
               merchant_category, merchant_country, last_update
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          )?;

          for row in &encoded {
            let matched: bool = exists_stmt
              .query_row(rusqlite::params![row.sale_id], |_| Ok(true))
              .optional()?
              .unwrap_or(false);

            let params = rusqlite::params![
              row.sale_id,
              row.sale_date,
              row.product_id,
              row.quantity_sold,
              row.total_sale_amount,
              row.merchant_id,
              row.merchant_name,
              row.merchant_category,
              row.merchant_country,
              row.last_update,
            ];

            if matched {
              update_stmt.execute(params)?;
              outcome.updated += 1;
            } else {
              insert_stmt.execute(params)?;
              outcome.inserted += 1;
            }
          }
        }
        tx.commit()?;
        Ok(outcome)
      })
      .await?;

    Ok(outcome)
  }

  // ── Target reads ──────────────────────────────────────────────────────────

  async fn target_sales(&self) -> Result<Vec<EnrichedSale>> {
    let raws: Vec<RawEnrichedSale> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT
             sale_id, sale_date, product_id, quantity_sold,
             total_sale_amount, merchant_id, merchant_name,
             merchant_category, merchant_country, last_update
           FROM sales_target
           ORDER BY sale_id",
        )?;

        let rows = stmt
          .query_map([], |row| {
            Ok(RawEnrichedSale {
              sale_id:           row.get(0)?,
              sale_date:         row.get(1)?,
              product_id:        row.get(2)?,
              quantity_sold:     row.get(3)?,
              total_sale_amount: row.get(4)?,
              merchant_id:       row.get(5)?,
              merchant_name:     row.get(6)?,
              merchant_category: row.get(7)?,
              merchant_country:  row.get(8)?,
              last_update:       row.get(9)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEnrichedSale::into_enriched).collect()
  }
}
