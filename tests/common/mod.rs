//! Shared fixtures for the integration tests
#![allow(dead_code)]

use retail_lakehouse::bronze::{self, BronzeGenerator, BronzePartition, GeneratorConfig};
use retail_lakehouse::config::RunConfig;
use retail_lakehouse::partition::IngestionDate;
use retail_lakehouse::pipeline::Pipeline;
use retail_lakehouse::schema::{BronzeOrder, BronzeOrderItem};

use async_trait::async_trait;
use futures::stream::BoxStream;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{
    GetOptions, GetResult, ListResult, MultipartUpload, ObjectMeta, ObjectStore, PutMultipartOpts,
    PutOptions, PutPayload, PutResult, Result as ObjectStoreResult,
};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

pub fn date() -> IngestionDate {
    "2026-01-12".parse().unwrap()
}

pub fn bronze_order(
    order_id: &str,
    order_ts: &str,
    region: Option<&str>,
    payment_method: Option<&str>,
) -> BronzeOrder {
    BronzeOrder {
        order_id: Some(order_id.to_string()),
        order_ts: Some(order_ts.to_string()),
        customer_id: Some("CUST-00001".to_string()),
        region: region.map(str::to_string),
        payment_method: payment_method.map(str::to_string),
        order_status: Some("Completed".to_string()),
        currency: Some("EUR".to_string()),
        ingestion_date: Some(date().to_string()),
    }
}

pub fn bronze_item(
    order_id: &str,
    product_id: &str,
    quantity: i64,
    unit_price: f64,
    discount_pct: Option<f64>,
) -> BronzeOrderItem {
    BronzeOrderItem {
        order_id: Some(order_id.to_string()),
        line_id: Some(1),
        product_id: Some(product_id.to_string()),
        quantity: Some(quantity),
        unit_price: Some(unit_price),
        discount_pct,
        ingestion_date: Some(date().to_string()),
    }
}

/// Pipeline over a fresh in-memory object store
pub fn memory_pipeline() -> Pipeline {
    Pipeline::new(Arc::new(InMemory::new()), RunConfig::new(date()))
}

pub async fn seed_bronze(pipeline: &Pipeline, orders: Vec<BronzeOrder>, items: Vec<BronzeOrderItem>) {
    let partition = BronzePartition { orders, items };
    bronze::write_partition(pipeline.store(), date(), &partition)
        .await
        .unwrap();
}

/// Deterministic synthetic partition with every kind of defect
pub fn generated_partition(orders: usize, seed: u64) -> BronzePartition {
    BronzeGenerator::new(GeneratorConfig {
        orders,
        seed: Some(seed),
        ..GeneratorConfig::default()
    })
    .unwrap()
    .generate(date())
}

/// In-memory store whose puts fail for one chosen file name
#[derive(Debug, Default)]
pub struct FailingPutStore {
    inner: InMemory,
    fail_on: Mutex<Option<String>>,
}

impl FailingPutStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every put whose key ends with `file_name`
    pub fn fail_puts_to(&self, file_name: &str) {
        *self.fail_on.lock() = Some(file_name.to_string());
    }

    pub fn clear_failure(&self) {
        *self.fail_on.lock() = None;
    }
}

impl fmt::Display for FailingPutStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FailingPutStore({})", self.inner)
    }
}

#[async_trait]
impl ObjectStore for FailingPutStore {
    async fn put_opts(
        &self,
        location: &Path,
        payload: PutPayload,
        opts: PutOptions,
    ) -> ObjectStoreResult<PutResult> {
        let fails = self
            .fail_on
            .lock()
            .as_deref()
            .is_some_and(|name| location.as_ref().ends_with(name));
        if fails {
            return Err(object_store::Error::Generic {
                store: "FailingPutStore",
                source: format!("injected put failure for {location}").into(),
            });
        }
        self.inner.put_opts(location, payload, opts).await
    }

    async fn put_multipart_opts(
        &self,
        location: &Path,
        opts: PutMultipartOpts,
    ) -> ObjectStoreResult<Box<dyn MultipartUpload>> {
        self.inner.put_multipart_opts(location, opts).await
    }

    async fn get_opts(&self, location: &Path, options: GetOptions) -> ObjectStoreResult<GetResult> {
        self.inner.get_opts(location, options).await
    }

    async fn delete(&self, location: &Path) -> ObjectStoreResult<()> {
        self.inner.delete(location).await
    }

    fn list(&self, prefix: Option<&Path>) -> BoxStream<'_, ObjectStoreResult<ObjectMeta>> {
        self.inner.list(prefix)
    }

    async fn list_with_delimiter(&self, prefix: Option<&Path>) -> ObjectStoreResult<ListResult> {
        self.inner.list_with_delimiter(prefix).await
    }

    async fn copy(&self, from: &Path, to: &Path) -> ObjectStoreResult<()> {
        self.inner.copy(from, to).await
    }

    async fn copy_if_not_exists(&self, from: &Path, to: &Path) -> ObjectStoreResult<()> {
        self.inner.copy_if_not_exists(from, to).await
    }
}

/// Pipeline over a [`FailingPutStore`], returned with the store handle
pub fn failing_pipeline() -> (Pipeline, Arc<FailingPutStore>) {
    let store = Arc::new(FailingPutStore::new());
    let pipeline = Pipeline::new(store.clone(), RunConfig::new(date()));
    (pipeline, store)
}
