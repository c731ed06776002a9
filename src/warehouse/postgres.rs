//! Postgres warehouse backend

use super::{SalesFactRow, TopProductFactRow, Warehouse, WarehouseTx};
use crate::config::WarehouseConfig;
use crate::schema::YearMonth;
use crate::Result;

use async_trait::async_trait;
use std::collections::HashMap;
use tokio_postgres::{Client, IsolationLevel, NoTls, Transaction};
use tracing::{debug, error, info};

const SCHEMA_DDL: &str = include_str!("schema.sql");
const SCHEMA_PLACEHOLDER: &str = "__schema__";

/// DDL creating the warehouse tables inside `schema`
pub fn schema_ddl(schema: &str) -> String {
    SCHEMA_DDL.replace(SCHEMA_PLACEHOLDER, schema)
}

/// Create the warehouse schema and tables if they do not exist yet.
pub async fn apply_schema(client: &Client, config: &WarehouseConfig) -> Result<()> {
    client.batch_execute(&schema_ddl(config.schema())).await?;
    info!(schema = config.schema(), "Warehouse schema applied");
    Ok(())
}

/// Warehouse backed by one Postgres connection.
pub struct PostgresWarehouse {
    client: Client,
    config: WarehouseConfig,
}

impl PostgresWarehouse {
    pub async fn connect(config: &WarehouseConfig) -> Result<Self> {
        Self::connect_with(config.to_pg_config(), config.clone()).await
    }

    /// Connect with explicit driver settings, using `config` for the schema
    pub async fn connect_with(
        pg_config: tokio_postgres::Config,
        config: WarehouseConfig,
    ) -> Result<Self> {
        let (client, connection) = pg_config.connect(NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "Warehouse connection terminated");
            }
        });

        info!(
            host = %config.host,
            port = config.port,
            dbname = %config.dbname,
            schema = config.schema(),
            "Connected to warehouse"
        );
        Ok(Self { client, config })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    pub async fn apply_schema(&self) -> Result<()> {
        apply_schema(&self.client, &self.config).await
    }
}

#[async_trait]
impl Warehouse for PostgresWarehouse {
    async fn begin<'a>(&'a mut self) -> Result<Box<dyn WarehouseTx + 'a>> {
        let tx = self
            .client
            .build_transaction()
            .isolation_level(IsolationLevel::Serializable)
            .start()
            .await?;
        debug!("Opened serializable load transaction");
        Ok(Box::new(PostgresTransaction {
            tx,
            config: &self.config,
        }))
    }
}

struct PostgresTransaction<'a> {
    tx: Transaction<'a>,
    config: &'a WarehouseConfig,
}

#[async_trait]
impl<'a> WarehouseTx for PostgresTransaction<'a> {
    async fn insert_time_keys(&mut self, keys: &[YearMonth]) -> Result<u64> {
        let sql = format!(
            "INSERT INTO {} (year, month) VALUES ($1, $2) ON CONFLICT (year, month) DO NOTHING",
            self.config.table("dim_time")
        );
        let stmt = self.tx.prepare(&sql).await?;
        let mut inserted = 0;
        for key in keys {
            inserted += self.tx.execute(&stmt, &[&key.year, &key.month]).await?;
        }
        Ok(inserted)
    }

    async fn insert_regions(&mut self, regions: &[String]) -> Result<u64> {
        let sql = format!(
            "INSERT INTO {} (region) VALUES ($1) ON CONFLICT (region) DO NOTHING",
            self.config.table("dim_region")
        );
        let stmt = self.tx.prepare(&sql).await?;
        let mut inserted = 0;
        for region in regions {
            inserted += self.tx.execute(&stmt, &[region]).await?;
        }
        Ok(inserted)
    }

    async fn time_lookup(&mut self) -> Result<HashMap<YearMonth, i32>> {
        let sql = format!("SELECT time_id, year, month FROM {}", self.config.table("dim_time"));
        let rows = self.tx.query(&sql, &[]).await?;
        let mut lookup = HashMap::with_capacity(rows.len());
        for row in rows {
            let key = YearMonth::new(row.try_get("year")?, row.try_get("month")?);
            lookup.insert(key, row.try_get("time_id")?);
        }
        Ok(lookup)
    }

    async fn region_lookup(&mut self) -> Result<HashMap<String, i32>> {
        let sql = format!("SELECT region_id, region FROM {}", self.config.table("dim_region"));
        let rows = self.tx.query(&sql, &[]).await?;
        let mut lookup = HashMap::with_capacity(rows.len());
        for row in rows {
            lookup.insert(row.try_get("region")?, row.try_get("region_id")?);
        }
        Ok(lookup)
    }

    async fn upsert_sales(&mut self, rows: &[SalesFactRow]) -> Result<u64> {
        let sql = format!(
            "INSERT INTO {} \
             (time_id, region_id, orders_count, items_sold, gross_revenue, net_revenue, aov_net) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (time_id, region_id) DO UPDATE SET \
               orders_count = EXCLUDED.orders_count, \
               items_sold = EXCLUDED.items_sold, \
               gross_revenue = EXCLUDED.gross_revenue, \
               net_revenue = EXCLUDED.net_revenue, \
               aov_net = EXCLUDED.aov_net",
            self.config.table("fact_sales_monthly")
        );
        let stmt = self.tx.prepare(&sql).await?;
        let mut written = 0;
        for row in rows {
            written += self
                .tx
                .execute(
                    &stmt,
                    &[
                        &row.time_id,
                        &row.region_id,
                        &row.orders_count,
                        &row.items_sold,
                        &row.gross_revenue,
                        &row.net_revenue,
                        &row.aov_net,
                    ],
                )
                .await?;
        }
        Ok(written)
    }

    async fn upsert_top_products(&mut self, rows: &[TopProductFactRow]) -> Result<u64> {
        let sql = format!(
            "INSERT INTO {} \
             (time_id, product_id, items_sold, net_revenue, rank_by_net_revenue) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (time_id, product_id) DO UPDATE SET \
               items_sold = EXCLUDED.items_sold, \
               net_revenue = EXCLUDED.net_revenue, \
               rank_by_net_revenue = EXCLUDED.rank_by_net_revenue",
            self.config.table("fact_top_products_monthly")
        );
        let stmt = self.tx.prepare(&sql).await?;
        let mut written = 0;
        for row in rows {
            written += self
                .tx
                .execute(
                    &stmt,
                    &[
                        &row.time_id,
                        &row.product_id,
                        &row.items_sold,
                        &row.net_revenue,
                        &row.rank_by_net_revenue,
                    ],
                )
                .await?;
        }
        Ok(written)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_ddl_uses_configured_schema() {
        let ddl = schema_ddl("analytics");
        assert!(ddl.contains("CREATE SCHEMA IF NOT EXISTS analytics;"));
        assert!(ddl.contains("analytics.fact_top_products_monthly"));
        assert!(!ddl.contains(SCHEMA_PLACEHOLDER));
    }
}
