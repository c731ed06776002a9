//! Error paths: every failing stage reports a typed error and writes nothing

mod common;

use common::{bronze_item, bronze_order, date, failing_pipeline, memory_pipeline, seed_bronze};
use retail_lakehouse::partition::Dataset;
use retail_lakehouse::pipeline::Pipeline;
use retail_lakehouse::schema::{BronzeOrder, Order, OrderItem, SalesByRegionRow};
use retail_lakehouse::warehouse::{FailPoint, MemoryWarehouse};
use retail_lakehouse::Error;

use bytes::Bytes;
use object_store::ObjectStore;

async fn seed_valid(pipeline: &Pipeline) {
    seed_bronze(
        pipeline,
        vec![bronze_order("ORD-1", "2024-02-01 08:15:00", Some("East"), Some("Card"))],
        vec![bronze_item("ORD-1", "P-1", 2, 7.5, Some(0.1))],
    )
    .await;
}

async fn exists(pipeline: &Pipeline, dataset: Dataset) -> bool {
    pipeline.store().exists(dataset, date()).await.unwrap()
}

// =========================================================================
// Missing inputs
// =========================================================================

#[tokio::test]
async fn test_missing_bronze_partition_is_missing_input() {
    let pipeline = memory_pipeline();

    let err = pipeline.bronze_to_silver().await.unwrap_err();

    assert!(err.is_missing_input(), "unexpected error: {err}");
    assert!(!exists(&pipeline, Dataset::SilverOrders).await);
    assert!(!exists(&pipeline, Dataset::SilverOrderItems).await);
}

/// A bronze partition needs both files
#[tokio::test]
async fn test_orders_without_items_is_missing_input() {
    let pipeline = memory_pipeline();
    let orders = vec![bronze_order("ORD-1", "2024-02-01 08:15:00", Some("East"), Some("Card"))];
    let bytes = pipeline.store().encode_csv::<BronzeOrder>(&orders).unwrap();
    pipeline
        .store()
        .put(Dataset::BronzeOrders, date(), bytes)
        .await
        .unwrap();

    let err = pipeline.bronze_to_silver().await.unwrap_err();

    match err {
        Error::MissingInput { path } => assert!(path.ends_with("order_items.csv"), "{path}"),
        other => panic!("expected missing input, got {other:?}"),
    }
    assert!(!exists(&pipeline, Dataset::SilverOrders).await);
}

#[tokio::test]
async fn test_gold_without_silver_is_missing_input() {
    let pipeline = memory_pipeline();
    seed_valid(&pipeline).await;

    let err = pipeline.silver_to_gold().await.unwrap_err();

    assert!(err.is_missing_input());
    assert!(!exists(&pipeline, Dataset::GoldSalesByRegion).await);
    assert!(!exists(&pipeline, Dataset::GoldTopProducts).await);
}

#[tokio::test]
async fn test_load_without_gold_is_missing_input() {
    let pipeline = memory_pipeline();
    let mut warehouse = MemoryWarehouse::new();

    let err = pipeline.load_warehouse(&mut warehouse).await.unwrap_err();

    assert!(err.is_missing_input());
    assert_eq!(warehouse.snapshot(), Default::default());
}

// =========================================================================
// Malformed inputs
// =========================================================================

#[tokio::test]
async fn test_unexpected_bronze_header_is_schema_violation() {
    let pipeline = memory_pipeline();
    seed_valid(&pipeline).await;
    pipeline
        .store()
        .put(
            Dataset::BronzeOrders,
            date(),
            Bytes::from("order_id,region\nORD-1,East\n"),
        )
        .await
        .unwrap();

    let err = pipeline.bronze_to_silver().await.unwrap_err();

    assert!(matches!(err, Error::SchemaViolation(_)), "{err:?}");
    assert!(!exists(&pipeline, Dataset::SilverOrders).await);
}

/// Silver keeps the raw timestamp text, gold refuses to bucket it
#[tokio::test]
async fn test_unparseable_timestamp_fails_gold_without_writing() {
    let pipeline = memory_pipeline();
    seed_bronze(
        &pipeline,
        vec![
            bronze_order("ORD-1", "2024-02-01 08:15:00", Some("East"), Some("Card")),
            bronze_order("ORD-2", "yesterday-ish", Some("East"), Some("Card")),
        ],
        vec![bronze_item("ORD-2", "P-1", 1, 4.0, Some(0.0))],
    )
    .await;
    pipeline.bronze_to_silver().await.unwrap();

    let err = pipeline.silver_to_gold().await.unwrap_err();

    match err {
        Error::SchemaViolation(msg) => {
            assert!(msg.contains("ORD-2"), "{msg}");
            assert!(msg.contains("yesterday-ish"), "{msg}");
        }
        other => panic!("expected schema violation, got {other:?}"),
    }
    assert!(!exists(&pipeline, Dataset::GoldSalesByRegion).await);
    assert!(!exists(&pipeline, Dataset::GoldTopProducts).await);
}

// =========================================================================
// Previous outputs survive failures
// =========================================================================

#[tokio::test]
async fn test_failed_rerun_keeps_previous_silver() {
    let pipeline = memory_pipeline();
    seed_valid(&pipeline).await;
    pipeline.bronze_to_silver().await.unwrap();

    let items_path = pipeline.store().path(Dataset::BronzeOrderItems, date());
    pipeline
        .store()
        .object_store()
        .delete(&items_path)
        .await
        .unwrap();
    assert!(pipeline.bronze_to_silver().await.unwrap_err().is_missing_input());

    let orders: Vec<Order> = pipeline
        .store()
        .read_parquet(Dataset::SilverOrders, date())
        .await
        .unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order_id, "ORD-1");
}

async fn reseed_west(pipeline: &Pipeline) {
    seed_bronze(
        pipeline,
        vec![bronze_order("ORD-7", "2024-05-01 12:00:00", Some("West"), Some("Cash"))],
        vec![bronze_item("ORD-7", "P-Q", 3, 2.0, Some(0.0))],
    )
    .await;
}

/// The second silver write fails after the first has already landed
#[tokio::test]
async fn test_failed_second_silver_write_restores_first() {
    let (pipeline, store) = failing_pipeline();
    seed_valid(&pipeline).await;
    pipeline.bronze_to_silver().await.unwrap();

    reseed_west(&pipeline).await;
    store.fail_puts_to("order_items_silver.parquet");
    let err = pipeline.bronze_to_silver().await.unwrap_err();
    assert!(matches!(err, Error::ObjectStore(_)), "{err:?}");

    let orders: Vec<Order> = pipeline
        .store()
        .read_parquet(Dataset::SilverOrders, date())
        .await
        .unwrap();
    let items: Vec<OrderItem> = pipeline
        .store()
        .read_parquet(Dataset::SilverOrderItems, date())
        .await
        .unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order_id, "ORD-1");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].order_id, "ORD-1");

    store.clear_failure();
    pipeline.bronze_to_silver().await.unwrap();
    let orders: Vec<Order> = pipeline
        .store()
        .read_parquet(Dataset::SilverOrders, date())
        .await
        .unwrap();
    assert_eq!(orders[0].order_id, "ORD-7");
}

#[tokio::test]
async fn test_failed_second_write_removes_new_first_object() {
    let (pipeline, store) = failing_pipeline();
    seed_valid(&pipeline).await;
    store.fail_puts_to("order_items_silver.parquet");

    assert!(pipeline.bronze_to_silver().await.is_err());

    assert!(!exists(&pipeline, Dataset::SilverOrders).await);
    assert!(!exists(&pipeline, Dataset::SilverOrderItems).await);
}

#[tokio::test]
async fn test_failed_second_gold_write_restores_first() {
    let (pipeline, store) = failing_pipeline();
    seed_valid(&pipeline).await;
    pipeline.bronze_to_silver().await.unwrap();
    pipeline.silver_to_gold().await.unwrap();
    let before: Vec<SalesByRegionRow> = pipeline
        .store()
        .read_parquet(Dataset::GoldSalesByRegion, date())
        .await
        .unwrap();

    reseed_west(&pipeline).await;
    pipeline.bronze_to_silver().await.unwrap();
    store.fail_puts_to("top_products_monthly.parquet");
    assert!(pipeline.silver_to_gold().await.is_err());

    let after: Vec<SalesByRegionRow> = pipeline
        .store()
        .read_parquet(Dataset::GoldSalesByRegion, date())
        .await
        .unwrap();
    assert_eq!(after, before);
    assert_eq!(after[0].region, "East");
}

#[tokio::test]
async fn test_failed_load_leaves_warehouse_empty() {
    let pipeline = memory_pipeline();
    seed_valid(&pipeline).await;
    pipeline.bronze_to_silver().await.unwrap();
    pipeline.silver_to_gold().await.unwrap();

    let mut warehouse = MemoryWarehouse::new();
    warehouse.inject_failure(FailPoint::UpsertTopProducts);
    let err = pipeline.load_warehouse(&mut warehouse).await.unwrap_err();

    assert!(matches!(err, Error::LoadTransaction(_)), "{err:?}");
    assert_eq!(warehouse.snapshot(), Default::default());

    warehouse.clear_failure();
    let report = pipeline.load_warehouse(&mut warehouse).await.unwrap();
    assert_eq!(report.load.unwrap().sales_rows_upserted, 1);
}
