//! The warehouse schema contract, stated once as data.
//!
//! Backends derive their DDL from these definitions and tests assert
//! against them, so the logical schema (column sets, keys, partition and
//! clustering attributes) cannot drift between layers. Engines without
//! native partitioning or clustering are free to map those attributes to
//! whatever physical layout they have (e.g. secondary indexes).

// ─── Column / relation definitions ───────────────────────────────────────────

/// Logical column type; backends map these to their own storage types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
  Text,
  Date,
  Integer,
  Float,
  Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
  pub name:     &'static str,
  pub ty:       ColumnType,
  /// NOT NULL in the physical schema; also what the record decoder treats
  /// as a required field.
  pub required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationDef {
  pub name:         &'static str,
  pub columns:      &'static [ColumnDef],
  /// Unique key. For the target relation this is the merge key; staging
  /// deliberately has none (duplicate sale_ids are allowed to land).
  pub unique_key:   Option<&'static str>,
  pub partition_by: Option<&'static str>,
  pub cluster_by:   &'static [&'static str],
}

impl RelationDef {
  /// Column names in declaration order.
  pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.columns.iter().map(|c| c.name)
  }

  pub fn column(&self, name: &str) -> Option<&'static ColumnDef> {
    self.columns.iter().find(|c| c.name == name)
  }
}

// ─── The three relations ─────────────────────────────────────────────────────

const fn col(name: &'static str, ty: ColumnType, required: bool) -> ColumnDef {
  ColumnDef { name, ty, required }
}

/// Reference/dimension relation; loaded wholesale each run.
pub const MERCHANTS: RelationDef = RelationDef {
  name:         "merchants",
  columns:      &[
    col("merchant_id", ColumnType::Text, true),
    col("merchant_name", ColumnType::Text, false),
    col("merchant_category", ColumnType::Text, false),
    col("merchant_country", ColumnType::Text, false),
    col("last_update", ColumnType::Timestamp, false),
  ],
  unique_key:   Some("merchant_id"),
  partition_by: None,
  cluster_by:   &["merchant_category", "merchant_country"],
};

/// Transient landing zone for raw sales; fully replaced each run.
pub const SALES_STAGE: RelationDef = RelationDef {
  name:         "sales_stage",
  columns:      &[
    col("sale_id", ColumnType::Text, true),
    col("sale_date", ColumnType::Date, false),
    col("product_id", ColumnType::Text, false),
    col("quantity_sold", ColumnType::Integer, false),
    col("total_sale_amount", ColumnType::Float, false),
    col("merchant_id", ColumnType::Text, false),
    col("last_update", ColumnType::Timestamp, false),
  ],
  unique_key:   None,
  partition_by: Some("sale_date"),
  cluster_by:   &["merchant_id"],
};

/// Durable denormalized fact relation; rows are merged, never deleted.
pub const SALES_TARGET: RelationDef = RelationDef {
  name:         "sales_target",
  columns:      &[
    col("sale_id", ColumnType::Text, true),
    col("sale_date", ColumnType::Date, false),
    col("product_id", ColumnType::Text, false),
    col("quantity_sold", ColumnType::Integer, false),
    col("total_sale_amount", ColumnType::Float, false),
    col("merchant_id", ColumnType::Text, false),
    col("merchant_name", ColumnType::Text, false),
    col("merchant_category", ColumnType::Text, false),
    col("merchant_country", ColumnType::Text, false),
    col("last_update", ColumnType::Timestamp, false),
  ],
  unique_key:   Some("sale_id"),
  partition_by: Some("sale_date"),
  cluster_by:   &["merchant_id", "product_id"],
};

/// All relations the pipeline provisions, in creation order.
pub const ALL: [&RelationDef; 3] = [&MERCHANTS, &SALES_STAGE, &SALES_TARGET];

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn target_is_stage_plus_merchant_attributes() {
    let stage: Vec<_> = SALES_STAGE.column_names().collect();
    let target: Vec<_> = SALES_TARGET.column_names().collect();

    for name in &stage {
      assert!(target.contains(name), "target missing stage column {name}");
    }
    for name in ["merchant_name", "merchant_category", "merchant_country"] {
      assert!(target.contains(&name), "target missing {name}");
    }
    assert_eq!(target.len(), stage.len() + 3);
  }

  #[test]
  fn merge_key_is_required_and_unique() {
    let key = SALES_TARGET.unique_key.unwrap();
    assert_eq!(key, "sale_id");
    assert!(SALES_TARGET.column(key).unwrap().required);
    // Staging intentionally does not enforce uniqueness.
    assert!(SALES_STAGE.unique_key.is_none());
  }

  #[test]
  fn cluster_and_partition_columns_exist() {
    for def in ALL {
      if let Some(p) = def.partition_by {
        assert!(def.column(p).is_some(), "{}: partition column {p}", def.name);
      }
      for c in def.cluster_by {
        assert!(def.column(c).is_some(), "{}: cluster column {c}", def.name);
      }
    }
  }
}
