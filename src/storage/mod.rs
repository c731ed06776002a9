//! Partition storage on top of an object store
//!
//! Bronze partitions are CSV with a header row; silver and gold partitions are
//! single Parquet files. Every read resolves its key through the
//! [`PartitionLayout`], and a missing object surfaces as
//! [`Error::MissingInput`](crate::Error::MissingInput).

mod parquet_writer;

pub use parquet_writer::ParquetWriter;

use crate::partition::{Dataset, IngestionDate, PartitionLayout};
use crate::schema::TableRecord;
use crate::{Error, Result};

use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow_array::RecordBatch;
use bytes::Bytes;
use object_store::path::Path;
use object_store::ObjectStore;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::io::Cursor;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Rows per Arrow batch when decoding CSV
const CSV_BATCH_SIZE: usize = 8192;

/// Reads and writes whole dataset partitions.
pub struct PartitionStore {
    object_store: Arc<dyn ObjectStore>,
    layout: PartitionLayout,
    parquet_writer: ParquetWriter,
}

impl PartitionStore {
    pub fn new(object_store: Arc<dyn ObjectStore>, layout: PartitionLayout) -> Self {
        Self {
            object_store,
            layout,
            parquet_writer: ParquetWriter::new(),
        }
    }

    pub fn layout(&self) -> &PartitionLayout {
        &self.layout
    }

    pub fn object_store(&self) -> Arc<dyn ObjectStore> {
        self.object_store.clone()
    }

    pub fn path(&self, dataset: Dataset, date: IngestionDate) -> Path {
        self.layout.path(dataset, date)
    }

    /// Whether the partition object exists
    pub async fn exists(&self, dataset: Dataset, date: IngestionDate) -> Result<bool> {
        match self.object_store.head(&self.path(dataset, date)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, path: &Path) -> Result<Bytes> {
        let data = self.object_store.get(path).await?.bytes().await?;
        debug!(path = %path, bytes = data.len(), "Read partition object");
        Ok(data)
    }

    /// Overwrite the partition object with `data`
    pub async fn put(&self, dataset: Dataset, date: IngestionDate, data: Bytes) -> Result<Path> {
        let path = self.path(dataset, date);
        let size = data.len();
        self.object_store.put(&path, data.into()).await?;
        debug!(path = %path, bytes = size, "Wrote partition object");
        Ok(path)
    }

    /// Overwrite several partition objects together.
    ///
    /// Previous contents are captured before the first write. If any write
    /// fails, the objects already written are put back (or deleted when they
    /// did not exist before) and the write error is returned.
    pub async fn put_partition<const N: usize>(
        &self,
        date: IngestionDate,
        outputs: [(Dataset, Bytes); N],
    ) -> Result<[Path; N]> {
        let mut previous = Vec::with_capacity(N);
        for (dataset, _) in &outputs {
            let path = self.path(*dataset, date);
            let data = match self.object_store.get(&path).await {
                Ok(result) => Some(result.bytes().await?),
                Err(object_store::Error::NotFound { .. }) => None,
                Err(e) => return Err(e.into()),
            };
            previous.push((path, data));
        }

        let mut written = Vec::with_capacity(N);
        for (dataset, data) in outputs {
            match self.put(dataset, date, data).await {
                Ok(path) => written.push(path),
                Err(e) => {
                    self.restore(&previous[..written.len()]).await;
                    return Err(e);
                }
            }
        }

        written.try_into().map_err(|paths: Vec<Path>| {
            Error::Invariant(format!("wrote {} of {} partition objects", paths.len(), N))
        })
    }

    async fn restore(&self, previous: &[(Path, Option<Bytes>)]) {
        for (path, data) in previous {
            let restored = match data {
                Some(data) => self
                    .object_store
                    .put(path, data.clone().into())
                    .await
                    .map(|_| ()),
                None => self.object_store.delete(path).await,
            };
            match restored {
                Ok(()) => warn!(path = %path, "Rolled back partition object after failed write"),
                Err(e) => error!(path = %path, error = %e, "Failed to roll back partition object"),
            }
        }
    }

    /// Read a CSV partition, checking the header against the row schema
    pub async fn read_csv<T: TableRecord>(
        &self,
        dataset: Dataset,
        date: IngestionDate,
    ) -> Result<Vec<T>> {
        let path = self.path(dataset, date);
        let data = self.get(&path).await?;
        let batches = decode_csv(&data, &T::schema()).map_err(|e| match e {
            Error::Arrow(inner) => Error::SchemaViolation(format!("{}: {}", path, inner)),
            Error::SchemaViolation(msg) => Error::SchemaViolation(format!("{}: {}", path, msg)),
            other => other,
        })?;
        T::from_batches(&batches)
    }

    /// Encode rows as CSV with a header row
    pub fn encode_csv<T: TableRecord>(&self, rows: &[T]) -> Result<Bytes> {
        let batch = T::to_batch(rows)?;
        let mut buffer = Vec::new();
        {
            let mut writer = WriterBuilder::new().with_header(true).build(&mut buffer);
            writer.write(&batch)?;
        }
        Ok(Bytes::from(buffer))
    }

    /// Read a Parquet partition into typed rows
    pub async fn read_parquet<T: TableRecord>(
        &self,
        dataset: Dataset,
        date: IngestionDate,
    ) -> Result<Vec<T>> {
        let path = self.path(dataset, date);
        let data = self.get(&path).await?;

        let reader = ParquetRecordBatchReaderBuilder::try_new(data)?.build()?;
        let batches = reader.collect::<std::result::Result<Vec<RecordBatch>, _>>()?;
        T::from_batches(&batches)
    }

    /// Encode rows as one Parquet file
    pub fn encode_parquet<T: TableRecord>(&self, rows: &[T]) -> Result<Bytes> {
        self.parquet_writer.write_rows(rows)
    }
}

/// Decode CSV bytes against `schema`, requiring the header to name its columns in order.
fn decode_csv(data: &[u8], schema: &arrow_schema::SchemaRef) -> Result<Vec<RecordBatch>> {
    let header_end = data.iter().position(|b| *b == b'\n').unwrap_or(data.len());
    let header = std::str::from_utf8(&data[..header_end])
        .map_err(|e| Error::SchemaViolation(format!("header is not UTF-8: {}", e)))?;
    let columns: Vec<&str> = header
        .trim_end_matches('\r')
        .split(',')
        .map(|c| c.trim().trim_matches('"'))
        .collect();
    let expected: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();

    if header.trim().is_empty() {
        return Err(Error::SchemaViolation("missing CSV header".to_string()));
    }
    if columns != expected {
        return Err(Error::SchemaViolation(format!(
            "CSV header {:?} does not match expected columns {:?}",
            columns, expected
        )));
    }

    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_batch_size(CSV_BATCH_SIZE)
        .build(Cursor::new(data))?;

    Ok(reader.collect::<std::result::Result<Vec<_>, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BronzeOrderItem, Order};
    use object_store::memory::InMemory;

    fn store() -> PartitionStore {
        PartitionStore::new(Arc::new(InMemory::new()), PartitionLayout::new())
    }

    fn date() -> IngestionDate {
        "2026-01-12".parse().unwrap()
    }

    #[tokio::test]
    async fn test_read_csv_treats_empty_fields_as_null() {
        let store = store();
        let csv = "order_id,line_id,product_id,quantity,unit_price,discount_pct,ingestion_date\n\
                   ORD-00000001,1,P-0042,2,19.99,0.1,2026-01-12\n\
                   ORD-00000001,2,P-0007,-1,5.5,,2026-01-12\n";
        store
            .put(Dataset::BronzeOrderItems, date(), Bytes::from(csv))
            .await
            .unwrap();

        let items: Vec<BronzeOrderItem> = store
            .read_csv(Dataset::BronzeOrderItems, date())
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].quantity, Some(2));
        assert_eq!(items[0].unit_price, Some(19.99));
        assert_eq!(items[1].quantity, Some(-1));
        assert_eq!(items[1].discount_pct, None);
    }

    #[tokio::test]
    async fn test_read_csv_rejects_unexpected_header() {
        let store = store();
        let csv = "order_id,quantity\nORD-1,2\n";
        store
            .put(Dataset::BronzeOrderItems, date(), Bytes::from(csv))
            .await
            .unwrap();

        let err = store
            .read_csv::<BronzeOrderItem>(Dataset::BronzeOrderItems, date())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(_)));
    }

    #[tokio::test]
    async fn test_read_csv_rejects_non_numeric_quantity() {
        let store = store();
        let csv = "order_id,line_id,product_id,quantity,unit_price,discount_pct,ingestion_date\n\
                   ORD-1,1,P-0001,two,1.0,0.0,2026-01-12\n";
        store
            .put(Dataset::BronzeOrderItems, date(), Bytes::from(csv))
            .await
            .unwrap();

        let err = store
            .read_csv::<BronzeOrderItem>(Dataset::BronzeOrderItems, date())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(_)));
    }

    #[tokio::test]
    async fn test_missing_partition_is_missing_input() {
        let store = store();

        assert!(!store.exists(Dataset::SilverOrders, date()).await.unwrap());
        let err = store
            .read_parquet::<Order>(Dataset::SilverOrders, date())
            .await
            .unwrap_err();
        assert!(err.is_missing_input());
    }

    #[tokio::test]
    async fn test_put_overwrites_partition() {
        let store = store();
        let first = Order {
            order_id: "ORD-1".to_string(),
            order_ts: "2024-01-01 10:00:00".to_string(),
            customer_id: "CUST-00001".to_string(),
            region: "North".to_string(),
            payment_method: "Card".to_string(),
            order_status: Some("Completed".to_string()),
            currency: Some("EUR".to_string()),
            ingestion_date: Some("2026-01-12".to_string()),
        };
        let mut second = first.clone();
        second.order_id = "ORD-2".to_string();

        let bytes = store.encode_parquet(&[first]).unwrap();
        store.put(Dataset::SilverOrders, date(), bytes).await.unwrap();
        let bytes = store.encode_parquet(&[second.clone()]).unwrap();
        store.put(Dataset::SilverOrders, date(), bytes).await.unwrap();

        let orders: Vec<Order> = store
            .read_parquet(Dataset::SilverOrders, date())
            .await
            .unwrap();
        assert_eq!(orders, vec![second]);
    }

    #[tokio::test]
    async fn test_put_partition_returns_paths_in_order() {
        let store = store();

        let [orders, items] = store
            .put_partition(
                date(),
                [
                    (Dataset::GoldSalesByRegion, Bytes::from("a")),
                    (Dataset::GoldTopProducts, Bytes::from("b")),
                ],
            )
            .await
            .unwrap();

        assert_eq!(orders, store.path(Dataset::GoldSalesByRegion, date()));
        assert_eq!(items, store.path(Dataset::GoldTopProducts, date()));
        assert!(store.exists(Dataset::GoldTopProducts, date()).await.unwrap());
    }
}
