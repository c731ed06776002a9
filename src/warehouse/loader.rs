//! Idempotent load of the gold marts

use super::{SalesFactRow, TopProductFactRow, Warehouse, WarehouseTx};
use crate::schema::{SalesByRegionRow, TopProductRow, YearMonth};
use crate::{Error, Result};

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Rows written by one committed load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub time_keys_inserted: u64,
    pub regions_inserted: u64,
    pub sales_rows_upserted: u64,
    pub top_product_rows_upserted: u64,
}

/// Loads gold marts into a [`Warehouse`] in a single transaction.
pub struct WarehouseLoader;

impl WarehouseLoader {
    /// Run the whole load in one transaction.
    ///
    /// Any failure rolls the transaction back and surfaces as
    /// [`Error::LoadTransaction`].
    pub async fn load(
        warehouse: &mut dyn Warehouse,
        sales: &[SalesByRegionRow],
        top_products: &[TopProductRow],
    ) -> Result<LoadSummary> {
        let mut tx = warehouse.begin().await.map_err(into_load_error)?;

        let outcome = Self::run(tx.as_mut(), sales, top_products).await;
        match outcome {
            Ok(summary) => {
                tx.commit().await.map_err(into_load_error)?;
                info!(
                    time_keys_inserted = summary.time_keys_inserted,
                    regions_inserted = summary.regions_inserted,
                    sales_rows_upserted = summary.sales_rows_upserted,
                    top_product_rows_upserted = summary.top_product_rows_upserted,
                    "Warehouse load committed"
                );
                Ok(summary)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Rollback of failed warehouse load failed");
                }
                warn!(error = %e, "Warehouse load rolled back");
                Err(into_load_error(e))
            }
        }
    }

    async fn run<'t>(
        tx: &mut (dyn WarehouseTx + 't),
        sales: &[SalesByRegionRow],
        top_products: &[TopProductRow],
    ) -> Result<LoadSummary> {
        // Dimension members come from the sales mart only
        let time_keys: Vec<YearMonth> = sales
            .iter()
            .map(SalesByRegionRow::year_month)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let regions: Vec<String> = sales
            .iter()
            .map(|row| row.region.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();

        let time_keys_inserted = tx.insert_time_keys(&time_keys).await?;
        let regions_inserted = tx.insert_regions(&regions).await?;
        debug!(
            time_keys = time_keys.len(),
            time_keys_inserted,
            regions = regions.len(),
            regions_inserted,
            "Dimension members ensured"
        );

        let time_ids = tx.time_lookup().await?;
        let region_ids = tx.region_lookup().await?;

        let sales_facts = sales
            .iter()
            .map(|row| {
                Ok(SalesFactRow {
                    time_id: resolve_time(&time_ids, row.year_month())?,
                    region_id: resolve_region(&region_ids, &row.region)?,
                    orders_count: row.orders_count,
                    items_sold: row.items_sold,
                    gross_revenue: row.gross_revenue,
                    net_revenue: row.net_revenue,
                    aov_net: row.aov_net,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let top_product_facts = top_products
            .iter()
            .map(|row| {
                Ok(TopProductFactRow {
                    time_id: resolve_time(&time_ids, row.year_month())?,
                    product_id: row.product_id.clone(),
                    items_sold: row.items_sold,
                    net_revenue: row.net_revenue,
                    rank_by_net_revenue: row.rank_by_net_revenue,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let sales_rows_upserted = tx.upsert_sales(&sales_facts).await?;
        let top_product_rows_upserted = tx.upsert_top_products(&top_product_facts).await?;

        Ok(LoadSummary {
            time_keys_inserted,
            regions_inserted,
            sales_rows_upserted,
            top_product_rows_upserted,
        })
    }
}

fn resolve_time(lookup: &HashMap<YearMonth, i32>, key: YearMonth) -> Result<i32> {
    lookup.get(&key).copied().ok_or_else(|| {
        Error::LoadTransaction(format!("dim_time has no row for {}", key))
    })
}

fn resolve_region(lookup: &HashMap<String, i32>, region: &str) -> Result<i32> {
    lookup.get(region).copied().ok_or_else(|| {
        Error::LoadTransaction(format!("dim_region has no row for '{}'", region))
    })
}

fn into_load_error(e: Error) -> Error {
    match e {
        Error::LoadTransaction(_) => e,
        other => Error::LoadTransaction(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::MemoryWarehouse;

    fn sales_row(region: &str, year: i32, month: i32) -> SalesByRegionRow {
        SalesByRegionRow {
            region: region.to_string(),
            year,
            month,
            orders_count: 2,
            items_sold: 3,
            gross_revenue: 30.0,
            net_revenue: 27.0,
            aov_net: 13.5,
        }
    }

    #[tokio::test]
    async fn test_load_resolves_surrogate_keys() {
        let mut warehouse = MemoryWarehouse::new();
        let sales = vec![sales_row("North", 2024, 1), sales_row("South", 2024, 1)];
        let top = vec![TopProductRow {
            product_id: "P-0001".to_string(),
            year: 2024,
            month: 1,
            items_sold: 3,
            net_revenue: 27.0,
            rank_by_net_revenue: 1,
        }];

        let summary = WarehouseLoader::load(&mut warehouse, &sales, &top).await.unwrap();
        assert_eq!(
            summary,
            LoadSummary {
                time_keys_inserted: 1,
                regions_inserted: 2,
                sales_rows_upserted: 2,
                top_product_rows_upserted: 1,
            }
        );

        let snapshot = warehouse.snapshot();
        assert_eq!(snapshot.dim_region.get(&1).map(String::as_str), Some("North"));
        assert!(snapshot.fact_sales_monthly.contains_key(&(1, 2)));
        assert!(snapshot
            .fact_top_products_monthly
            .contains_key(&(1, "P-0001".to_string())));
    }

    #[tokio::test]
    async fn test_top_product_month_missing_from_sales_aborts_load() {
        let mut warehouse = MemoryWarehouse::new();
        let sales = vec![sales_row("North", 2024, 1)];
        let top = vec![TopProductRow {
            product_id: "P-0001".to_string(),
            year: 2024,
            month: 2,
            items_sold: 1,
            net_revenue: 9.0,
            rank_by_net_revenue: 1,
        }];

        let err = WarehouseLoader::load(&mut warehouse, &sales, &top)
            .await
            .unwrap_err();
        match err {
            Error::LoadTransaction(msg) => assert!(msg.contains("2024-02")),
            other => panic!("expected load transaction error, got {other:?}"),
        }
        assert_eq!(warehouse.snapshot(), Default::default());
    }
}
