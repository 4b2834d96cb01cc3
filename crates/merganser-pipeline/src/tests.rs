//! End-to-end pipeline tests against an in-memory warehouse and object
//! store.

use merganser_core::{gate::GatePolicy, warehouse::Warehouse};
use merganser_warehouse_sqlite::SqliteWarehouse;

use crate::{
  Error, Pipeline, PipelineConfig,
  source::MemoryObjectStore,
};

const MERCHANTS_NDJSON: &str = concat!(
  r#"{"merchant_id":"M1","merchant_name":"Acme Foods","merchant_category":"grocery","merchant_country":"US"}"#,
  "\n",
  r#"{"merchant_id":"M2","merchant_name":"Biglow","merchant_category":"apparel","merchant_country":"CA"}"#,
  "\n",
);

const SALES_NDJSON: &str = concat!(
  r#"{"sale_id":"S1","sale_date":"2024-06-01","product_id":"P100","quantity_sold":5,"total_sale_amount":49.95,"merchant_id":"M1"}"#,
  "\n",
  r#"{"sale_id":"S2","sale_date":"2024-06-01","product_id":"P200","quantity_sold":2,"total_sale_amount":19.98,"merchant_id":"M404"}"#,
  "\n",
);

fn objects(merchants: &str, sales: &str) -> MemoryObjectStore {
  let mut store = MemoryObjectStore::new();
  store.insert("merchants/merchants.json", merchants.as_bytes().to_vec());
  store.insert("sales/sales.json", sales.as_bytes().to_vec());
  store
}

async fn pipeline(
  store: MemoryObjectStore,
) -> (Pipeline<SqliteWarehouse, MemoryObjectStore>, SqliteWarehouse) {
  let wh = SqliteWarehouse::open_in_memory()
    .await
    .expect("in-memory warehouse");
  let p = Pipeline::new(wh.clone(), store, PipelineConfig::default());
  (p, wh)
}

// ─── Happy path ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_run_loads_gates_and_merges() {
  let (p, wh) = pipeline(objects(MERCHANTS_NDJSON, SALES_NDJSON)).await;

  let summary = p.run().await.unwrap();

  let gate = summary.gate_report().unwrap();
  assert_eq!(gate.staged_sales, 2);
  assert_eq!(gate.staged_merchants, 2);

  let outcome = summary.merge_outcome().unwrap();
  assert_eq!((outcome.inserted, outcome.updated), (2, 0));

  let target = wh.target_sales().await.unwrap();
  assert_eq!(target.len(), 2);
  // Matched merchant: attributes enriched.
  assert_eq!(target[0].sale_id, "S1");
  assert_eq!(target[0].merchant_name.as_deref(), Some("Acme Foods"));
  assert_eq!(target[0].merchant_country.as_deref(), Some("US"));
  // Unmatched merchant_id: sale columns carried, merchant attributes null.
  assert_eq!(target[1].sale_id, "S2");
  assert_eq!(target[1].merchant_id.as_deref(), Some("M404"));
  assert!(target[1].merchant_name.is_none());
  assert!(target[1].merchant_category.is_none());
  // Quantities and amounts pass through unmodified.
  assert_eq!(target[0].quantity_sold, Some(5));
  assert_eq!(target[0].total_sale_amount, Some(49.95));
}

#[tokio::test]
async fn rerun_with_same_keys_never_duplicates() {
  let (p, wh) = pipeline(objects(MERCHANTS_NDJSON, SALES_NDJSON)).await;

  p.run().await.unwrap();
  let second = p.run().await.unwrap();

  // Second run matched every key.
  let outcome = second.merge_outcome().unwrap();
  assert_eq!((outcome.inserted, outcome.updated), (0, 2));

  let target = wh.target_sales().await.unwrap();
  assert_eq!(target.len(), 2);
}

#[tokio::test]
async fn rerun_with_identical_data_changes_only_last_update() {
  let (p, wh) = pipeline(objects(MERCHANTS_NDJSON, SALES_NDJSON)).await;

  p.run().await.unwrap();
  let before = wh.target_sales().await.unwrap();
  p.run().await.unwrap();
  let after = wh.target_sales().await.unwrap();

  assert_eq!(before.len(), after.len());
  for (b, a) in before.iter().zip(&after) {
    assert_eq!(b.sale_id, a.sale_id);
    assert_eq!(b.sale_date, a.sale_date);
    assert_eq!(b.product_id, a.product_id);
    assert_eq!(b.quantity_sold, a.quantity_sold);
    assert_eq!(b.total_sale_amount, a.total_sale_amount);
    assert_eq!(b.merchant_id, a.merchant_id);
    assert_eq!(b.merchant_name, a.merchant_name);
    assert_eq!(b.merchant_category, a.merchant_category);
    assert_eq!(b.merchant_country, a.merchant_country);
  }
}

#[tokio::test]
async fn update_scenario_overwrites_all_columns() {
  let (p, wh) = pipeline(objects(MERCHANTS_NDJSON, SALES_NDJSON)).await;
  p.run().await.unwrap();

  // New run stages S1 with quantity 9 instead of 5.
  let updated = r#"{"sale_id":"S1","sale_date":"2024-06-02","product_id":"P100","quantity_sold":9,"total_sale_amount":89.91,"merchant_id":"M1"}"#;
  let p2 = Pipeline::new(
    wh.clone(),
    objects(MERCHANTS_NDJSON, &format!("{updated}\n")),
    PipelineConfig::default(),
  );
  let summary = p2.run().await.unwrap();
  assert_eq!(summary.merge_outcome().unwrap().updated, 1);

  let target = wh.target_sales().await.unwrap();
  let s1 = target.iter().find(|r| r.sale_id == "S1").unwrap();
  // Full overwrite, not additive.
  assert_eq!(s1.quantity_sold, Some(9));
  assert_eq!(s1.total_sale_amount, Some(89.91));
  // S2 from the prior run is untouched (upsert, not sync).
  assert!(target.iter().any(|r| r.sale_id == "S2"));
}

// ─── Quality gate ────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_sales_halts_at_gate_and_leaves_target_unchanged() {
  let (p, wh) = pipeline(objects(MERCHANTS_NDJSON, SALES_NDJSON)).await;
  p.run().await.unwrap();
  let before = wh.target_sales().await.unwrap();

  let p2 = Pipeline::new(
    wh.clone(),
    objects(MERCHANTS_NDJSON, ""),
    PipelineConfig::default(),
  );
  let err = p2.run().await.unwrap_err();
  match err {
    Error::GateFailed(report) => assert_eq!(report.staged_sales, 0),
    other => panic!("unexpected error: {other}"),
  }

  assert_eq!(wh.target_sales().await.unwrap(), before);
}

#[tokio::test]
async fn strict_gate_policy_requires_merchants() {
  let config = PipelineConfig {
    gate: GatePolicy {
      require_staged_sales:     true,
      require_staged_merchants: true,
    },
    ..PipelineConfig::default()
  };

  let wh = SqliteWarehouse::open_in_memory().await.unwrap();
  let p = Pipeline::new(wh, objects("", SALES_NDJSON), config);

  let err = p.run().await.unwrap_err();
  assert!(matches!(err, Error::GateFailed(_)));
}

// ─── Load failures ───────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_source_object_is_a_fetch_error() {
  let wh = SqliteWarehouse::open_in_memory().await.unwrap();
  let mut store = MemoryObjectStore::new();
  store.insert("merchants/merchants.json", MERCHANTS_NDJSON.as_bytes().to_vec());
  // No sales object at all.
  let p = Pipeline::new(wh.clone(), store, PipelineConfig::default());

  let err = p.run().await.unwrap_err();
  match err {
    Error::Fetch { object, .. } => assert_eq!(object, "sales/sales.json"),
    other => panic!("unexpected error: {other}"),
  }

  // The merge never ran.
  assert!(wh.target_sales().await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_record_is_a_decode_error_with_line_number() {
  let bad_sales = "{\"sale_id\":\"S1\"}\nnot-json\n";
  let (p, wh) = pipeline(objects(MERCHANTS_NDJSON, bad_sales)).await;

  let err = p.run().await.unwrap_err();
  match err {
    Error::Decode { object, source } => {
      assert_eq!(object, "sales/sales.json");
      assert!(source.to_string().contains("line 2"));
    }
    other => panic!("unexpected error: {other}"),
  }

  assert!(wh.target_sales().await.unwrap().is_empty());
}

#[tokio::test]
async fn record_missing_required_field_aborts_the_load() {
  // sale_id is the merge key and NOT NULL; a record without it must fail
  // the load rather than land as a null.
  let bad_sales = r#"{"sale_date":"2024-06-01","quantity_sold":1}"#;
  let (p, _wh) = pipeline(objects(MERCHANTS_NDJSON, bad_sales)).await;

  assert!(matches!(p.run().await.unwrap_err(), Error::Decode { .. }));
}

// ─── Staging replacement across runs ─────────────────────────────────────────

#[tokio::test]
async fn staging_holds_only_the_latest_run_data() {
  let (p, wh) = pipeline(objects(MERCHANTS_NDJSON, SALES_NDJSON)).await;
  p.run().await.unwrap();

  let one_sale = r#"{"sale_id":"S9","sale_date":"2024-06-03","quantity_sold":1}"#;
  let p2 = Pipeline::new(
    wh.clone(),
    objects(MERCHANTS_NDJSON, &format!("{one_sale}\n")),
    PipelineConfig::default(),
  );
  p2.run().await.unwrap();

  assert_eq!(wh.staged_sales_count().await.unwrap(), 1);
  // Target accumulated across runs regardless.
  assert_eq!(wh.target_sales().await.unwrap().len(), 3);
}
