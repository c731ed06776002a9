//! In-memory warehouse for development and testing
//!
//! Models what the load relies on from Postgres: serial surrogate keys,
//! unique natural keys, foreign keys from facts to dimensions, and
//! transactions that publish their writes only on commit. Like Postgres
//! sequences, the surrogate key counters are not rolled back.

use super::{SalesFactRow, TopProductFactRow, Warehouse, WarehouseTx};
use crate::schema::YearMonth;
use crate::{Error, Result};

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Committed contents of every warehouse table, ordered by primary key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WarehouseSnapshot {
    pub dim_time: BTreeMap<i32, YearMonth>,
    pub dim_region: BTreeMap<i32, String>,
    pub fact_sales_monthly: BTreeMap<(i32, i32), SalesFactRow>,
    pub fact_top_products_monthly: BTreeMap<(i32, String), TopProductFactRow>,
}

/// Transaction operation that fails when injected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    InsertTimeKeys,
    InsertRegions,
    UpsertSales,
    UpsertTopProducts,
    Commit,
}

#[derive(Debug)]
struct State {
    tables: WarehouseSnapshot,
    next_time_id: i32,
    next_region_id: i32,
    fail_point: Option<FailPoint>,
}

/// Cloneable handle to a shared in-memory warehouse.
#[derive(Debug, Clone)]
pub struct MemoryWarehouse {
    state: Arc<Mutex<State>>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                tables: WarehouseSnapshot::default(),
                next_time_id: 1,
                next_region_id: 1,
                fail_point: None,
            })),
        }
    }

    /// Make every later transaction fail at `point`
    pub fn inject_failure(&self, point: FailPoint) {
        self.state.lock().fail_point = Some(point);
    }

    pub fn clear_failure(&self) {
        self.state.lock().fail_point = None;
    }

    /// Committed state
    pub fn snapshot(&self) -> WarehouseSnapshot {
        self.state.lock().tables.clone()
    }
}

impl Default for MemoryWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn begin<'a>(&'a mut self) -> Result<Box<dyn WarehouseTx + 'a>> {
        let (staged, fail_point) = {
            let state = self.state.lock();
            (state.tables.clone(), state.fail_point)
        };
        Ok(Box::new(MemoryTransaction {
            state: self.state.clone(),
            staged,
            fail_point,
        }))
    }
}

struct MemoryTransaction {
    state: Arc<Mutex<State>>,
    staged: WarehouseSnapshot,
    fail_point: Option<FailPoint>,
}

impl MemoryTransaction {
    fn check(&self, point: FailPoint) -> Result<()> {
        if self.fail_point == Some(point) {
            return Err(Error::Internal(format!("injected failure at {:?}", point)));
        }
        Ok(())
    }

    fn require_time_id(&self, time_id: i32) -> Result<()> {
        if self.staged.dim_time.contains_key(&time_id) {
            Ok(())
        } else {
            Err(Error::LoadTransaction(format!(
                "foreign key violation: time_id {} not in dim_time",
                time_id
            )))
        }
    }
}

#[async_trait]
impl WarehouseTx for MemoryTransaction {
    async fn insert_time_keys(&mut self, keys: &[YearMonth]) -> Result<u64> {
        self.check(FailPoint::InsertTimeKeys)?;
        let mut inserted = 0;
        for key in keys {
            if !(1..=12).contains(&key.month) {
                return Err(Error::LoadTransaction(format!(
                    "check constraint violation: month {} of {} outside 1..=12",
                    key.month, key
                )));
            }
            if self.staged.dim_time.values().any(|existing| existing == key) {
                continue;
            }
            let time_id = {
                let mut state = self.state.lock();
                let id = state.next_time_id;
                state.next_time_id += 1;
                id
            };
            self.staged.dim_time.insert(time_id, *key);
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn insert_regions(&mut self, regions: &[String]) -> Result<u64> {
        self.check(FailPoint::InsertRegions)?;
        let mut inserted = 0;
        for region in regions {
            if self.staged.dim_region.values().any(|existing| existing == region) {
                continue;
            }
            let region_id = {
                let mut state = self.state.lock();
                let id = state.next_region_id;
                state.next_region_id += 1;
                id
            };
            self.staged.dim_region.insert(region_id, region.clone());
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn time_lookup(&mut self) -> Result<HashMap<YearMonth, i32>> {
        Ok(self
            .staged
            .dim_time
            .iter()
            .map(|(id, key)| (*key, *id))
            .collect())
    }

    async fn region_lookup(&mut self) -> Result<HashMap<String, i32>> {
        Ok(self
            .staged
            .dim_region
            .iter()
            .map(|(id, region)| (region.clone(), *id))
            .collect())
    }

    async fn upsert_sales(&mut self, rows: &[SalesFactRow]) -> Result<u64> {
        self.check(FailPoint::UpsertSales)?;
        for row in rows {
            self.require_time_id(row.time_id)?;
            if !self.staged.dim_region.contains_key(&row.region_id) {
                return Err(Error::LoadTransaction(format!(
                    "foreign key violation: region_id {} not in dim_region",
                    row.region_id
                )));
            }
            self.staged
                .fact_sales_monthly
                .insert((row.time_id, row.region_id), row.clone());
        }
        Ok(rows.len() as u64)
    }

    async fn upsert_top_products(&mut self, rows: &[TopProductFactRow]) -> Result<u64> {
        self.check(FailPoint::UpsertTopProducts)?;
        for row in rows {
            self.require_time_id(row.time_id)?;
            self.staged
                .fact_top_products_monthly
                .insert((row.time_id, row.product_id.clone()), row.clone());
        }
        Ok(rows.len() as u64)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.check(FailPoint::Commit)?;
        let this = *self;
        this.state.lock().tables = this.staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_uncommitted_writes_are_invisible() {
        let mut warehouse = MemoryWarehouse::new();
        let handle = warehouse.clone();

        let mut tx = warehouse.begin().await.unwrap();
        tx.insert_regions(&["North".to_string()]).await.unwrap();
        assert!(handle.snapshot().dim_region.is_empty());
        tx.rollback().await.unwrap();

        assert_eq!(handle.snapshot(), WarehouseSnapshot::default());
    }

    #[tokio::test]
    async fn test_dimension_insert_skips_existing_keys() {
        let mut warehouse = MemoryWarehouse::new();
        let keys = [YearMonth::new(2024, 1), YearMonth::new(2024, 2)];

        let mut tx = warehouse.begin().await.unwrap();
        assert_eq!(tx.insert_time_keys(&keys).await.unwrap(), 2);
        assert_eq!(tx.insert_time_keys(&keys).await.unwrap(), 0);
        tx.commit().await.unwrap();

        let snapshot = warehouse.snapshot();
        assert_eq!(snapshot.dim_time.len(), 2);
        assert_eq!(snapshot.dim_time.get(&1), Some(&YearMonth::new(2024, 1)));
    }

    #[tokio::test]
    async fn test_fact_requires_dimension_row() {
        let mut warehouse = MemoryWarehouse::new();
        let mut tx = warehouse.begin().await.unwrap();
        let err = tx
            .upsert_top_products(&[TopProductFactRow {
                time_id: 42,
                product_id: "P-0001".to_string(),
                items_sold: 1,
                net_revenue: 1.0,
                rank_by_net_revenue: 1,
            }])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LoadTransaction(_)));
    }
}
