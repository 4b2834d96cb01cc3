//! DDL generation from the relation contract.
//!
//! All statements are idempotent (`CREATE ... IF NOT EXISTS`), so
//! provisioning can run at the head of every pipeline run. Partition and
//! clustering attributes have no SQLite equivalent; each becomes a
//! secondary index over the same columns, which preserves the contract's
//! access-path intent without changing its logical schema.

use merganser_core::relation::{ColumnType, RelationDef};

/// Pragmas applied once per connection, plus the single-row namespace
/// bookkeeping table.
pub const META_SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS namespace (
    name        TEXT PRIMARY KEY,
    created_at  TEXT NOT NULL
);
";

fn sql_type(ty: ColumnType) -> &'static str {
  match ty {
    ColumnType::Text => "TEXT",
    // ISO 8601 date string
    ColumnType::Date => "TEXT",
    ColumnType::Integer => "INTEGER",
    ColumnType::Float => "REAL",
    // RFC 3339 UTC string
    ColumnType::Timestamp => "TEXT",
  }
}

/// Render the `CREATE TABLE IF NOT EXISTS` statement for a relation.
pub fn create_table_sql(def: &RelationDef) -> String {
  let mut lines: Vec<String> = def
    .columns
    .iter()
    .map(|c| {
      let null = if c.required { " NOT NULL" } else { "" };
      format!("    {} {}{}", c.name, sql_type(c.ty), null)
    })
    .collect();

  if let Some(key) = def.unique_key {
    lines.push(format!("    PRIMARY KEY ({key})"));
  }

  format!(
    "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
    def.name,
    lines.join(",\n")
  )
}

/// Render the index statements standing in for the relation's partition
/// and clustering attributes.
pub fn index_sql(def: &RelationDef) -> Vec<String> {
  let mut stmts = Vec::new();

  if let Some(col) = def.partition_by {
    stmts.push(format!(
      "CREATE INDEX IF NOT EXISTS {}_partition_idx ON {} ({col})",
      def.name, def.name
    ));
  }
  if !def.cluster_by.is_empty() {
    stmts.push(format!(
      "CREATE INDEX IF NOT EXISTS {}_cluster_idx ON {} ({})",
      def.name,
      def.name,
      def.cluster_by.join(", ")
    ));
  }

  stmts
}

#[cfg(test)]
mod tests {
  use merganser_core::relation::{MERCHANTS, SALES_STAGE, SALES_TARGET};

  use super::*;

  #[test]
  fn target_table_has_primary_key_on_merge_key() {
    let sql = create_table_sql(&SALES_TARGET);
    assert!(sql.contains("CREATE TABLE IF NOT EXISTS sales_target"));
    assert!(sql.contains("PRIMARY KEY (sale_id)"));
    assert!(sql.contains("sale_id TEXT NOT NULL"));
  }

  #[test]
  fn stage_table_has_no_primary_key() {
    let sql = create_table_sql(&SALES_STAGE);
    assert!(!sql.contains("PRIMARY KEY"));
  }

  #[test]
  fn indexes_cover_partition_and_cluster_attributes() {
    let stage = index_sql(&SALES_STAGE);
    assert_eq!(stage, vec![
      "CREATE INDEX IF NOT EXISTS sales_stage_partition_idx ON sales_stage (sale_date)"
        .to_string(),
      "CREATE INDEX IF NOT EXISTS sales_stage_cluster_idx ON sales_stage (merchant_id)"
        .to_string(),
    ]);

    let merchants = index_sql(&MERCHANTS);
    assert_eq!(merchants, vec![
      "CREATE INDEX IF NOT EXISTS merchants_cluster_idx ON merchants (merchant_category, merchant_country)"
        .to_string(),
    ]);
  }
}
