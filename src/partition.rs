//! Ingestion partitions and the object-store key layout for every tier
//!
//! Each tier stores one object per dataset per ingestion date, under a
//! Hive-style `ingestion_date=YYYY-MM-DD` directory. Writing a partition puts
//! the object at the same key again, so a rerun overwrites the previous
//! output instead of appending to it.

use crate::{Error, Result};

use chrono::NaiveDate;
use object_store::path::Path;
use std::fmt;
use std::str::FromStr;

/// Date key selecting one batch of data through every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IngestionDate(NaiveDate);

impl IngestionDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Today's date in UTC, used when no partition is given on the CLI.
    pub fn today() -> Self {
        Self(chrono::Utc::now().date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Hive-style directory segment, e.g. `ingestion_date=2026-01-12`
    pub fn partition_segment(&self) -> String {
        format!("ingestion_date={}", self)
    }
}

impl fmt::Display for IngestionDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for IngestionDate {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map(Self)
            .map_err(|e| {
                Error::Config(format!(
                    "ingestion date '{}' is not an ISO date (YYYY-MM-DD): {}",
                    value, e
                ))
            })
    }
}

/// Data quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
        }
    }
}

/// Every table that crosses a stage boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    BronzeOrders,
    BronzeOrderItems,
    SilverOrders,
    SilverOrderItems,
    GoldSalesByRegion,
    GoldTopProducts,
}

impl Dataset {
    pub const ALL: [Dataset; 6] = [
        Dataset::BronzeOrders,
        Dataset::BronzeOrderItems,
        Dataset::SilverOrders,
        Dataset::SilverOrderItems,
        Dataset::GoldSalesByRegion,
        Dataset::GoldTopProducts,
    ];

    pub fn tier(&self) -> Tier {
        match self {
            Dataset::BronzeOrders | Dataset::BronzeOrderItems => Tier::Bronze,
            Dataset::SilverOrders | Dataset::SilverOrderItems => Tier::Silver,
            Dataset::GoldSalesByRegion | Dataset::GoldTopProducts => Tier::Gold,
        }
    }

    /// Table directory name inside its tier
    pub fn table_name(&self) -> &'static str {
        match self {
            Dataset::BronzeOrders | Dataset::SilverOrders => "orders",
            Dataset::BronzeOrderItems | Dataset::SilverOrderItems => "order_items",
            Dataset::GoldSalesByRegion => "sales_monthly_by_region",
            Dataset::GoldTopProducts => "top_products_monthly",
        }
    }

    /// File name of the single object holding the partition
    pub fn file_name(&self) -> &'static str {
        match self {
            Dataset::BronzeOrders => "orders.csv",
            Dataset::BronzeOrderItems => "order_items.csv",
            Dataset::SilverOrders => "orders_silver.parquet",
            Dataset::SilverOrderItems => "order_items_silver.parquet",
            Dataset::GoldSalesByRegion => "sales_monthly_by_region.parquet",
            Dataset::GoldTopProducts => "top_products_monthly.parquet",
        }
    }
}

/// Resolves dataset partitions to object-store keys.
///
/// The optional prefix lets several lakehouses share one bucket or directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionLayout {
    prefix: Option<String>,
}

impl PartitionLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_matches('/');
        Self {
            prefix: (!trimmed.is_empty()).then(|| trimmed.to_string()),
        }
    }

    /// Object key for `dataset` in partition `date`
    pub fn path(&self, dataset: Dataset, date: IngestionDate) -> Path {
        let relative = format!(
            "{}/{}/{}/{}",
            dataset.tier().as_str(),
            dataset.table_name(),
            date.partition_segment(),
            dataset.file_name()
        );
        match &self.prefix {
            Some(prefix) => Path::from(format!("{}/{}", prefix, relative)),
            None => Path::from(relative),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> IngestionDate {
        "2026-01-12".parse().unwrap()
    }

    #[test]
    fn test_bronze_and_gold_paths() {
        let layout = PartitionLayout::new();
        assert_eq!(
            layout.path(Dataset::BronzeOrders, date()).as_ref(),
            "bronze/orders/ingestion_date=2026-01-12/orders.csv"
        );
        assert_eq!(
            layout.path(Dataset::GoldTopProducts, date()).as_ref(),
            "gold/top_products_monthly/ingestion_date=2026-01-12/top_products_monthly.parquet"
        );
    }

    #[test]
    fn test_prefix_is_trimmed() {
        let layout = PartitionLayout::with_prefix("/data/");
        assert_eq!(
            layout.path(Dataset::SilverOrderItems, date()).as_ref(),
            "data/silver/order_items/ingestion_date=2026-01-12/order_items_silver.parquet"
        );
        assert_eq!(PartitionLayout::with_prefix("//"), PartitionLayout::new());
    }

    #[test]
    fn test_partition_paths_are_distinct() {
        let layout = PartitionLayout::new();
        let paths: std::collections::HashSet<_> = Dataset::ALL
            .iter()
            .map(|d| layout.path(*d, date()).to_string())
            .collect();
        assert_eq!(paths.len(), Dataset::ALL.len());
    }

    #[test]
    fn test_rejects_non_iso_date() {
        assert!("12/01/2026".parse::<IngestionDate>().is_err());
        assert!("2026-13-01".parse::<IngestionDate>().is_err());
        assert_eq!(date().to_string(), "2026-01-12");
    }
}
