//! Gold tier: monthly business marts
//!
//! Two marts are derived from the silver tables of one partition:
//!
//! - **sales by region**: orders, items and revenue per (region, year, month)
//! - **top products**: the products ranked 1..=10 by net revenue in each month
//!
//! Order lines are inner-joined to their orders to pick up region and month.
//! Order counts come from the full order set, so an order without valid lines
//! still counts towards its region and month with zero revenue.

mod rank;

use crate::schema::{Order, OrderItem, SalesByRegionRow, TopProductRow, YearMonth};
use crate::{Error, Result};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

/// Highest rank kept in the top-products mart
pub const MAX_RANK: i32 = 10;

const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Both marts of one partition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoldTables {
    /// Sorted by (year, month, region)
    pub sales: Vec<SalesByRegionRow>,
    /// Sorted by (year, month, rank, product_id)
    pub top_products: Vec<TopProductRow>,
}

#[derive(Default)]
struct SalesAccumulator<'a> {
    orders: HashSet<&'a str>,
    items_sold: i64,
    gross_revenue: f64,
    net_revenue: f64,
}

#[derive(Default)]
struct ProductAccumulator {
    items_sold: i64,
    net_revenue: f64,
}

/// Builds the gold marts from silver tables.
#[derive(Debug, Clone)]
pub struct GoldAggregator {
    max_rank: i32,
}

impl Default for GoldAggregator {
    fn default() -> Self {
        Self { max_rank: MAX_RANK }
    }
}

impl GoldAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_rank(mut self, max_rank: i32) -> Self {
        self.max_rank = max_rank;
        self
    }

    /// Aggregate one partition. Empty inputs give empty marts.
    pub fn aggregate(&self, orders: &[Order], items: &[OrderItem]) -> Result<GoldTables> {
        let mut order_index: HashMap<&str, (&str, YearMonth)> = HashMap::with_capacity(orders.len());
        let mut sales: BTreeMap<(YearMonth, &str), SalesAccumulator<'_>> = BTreeMap::new();

        for order in orders {
            let month = order_month(&order.order_ts).ok_or_else(|| {
                Error::SchemaViolation(format!(
                    "order '{}' has unparseable order_ts '{}'",
                    order.order_id, order.order_ts
                ))
            })?;
            order_index.insert(order.order_id.as_str(), (order.region.as_str(), month));
            sales
                .entry((month, order.region.as_str()))
                .or_default()
                .orders
                .insert(order.order_id.as_str());
        }

        let mut products: BTreeMap<YearMonth, BTreeMap<&str, ProductAccumulator>> = BTreeMap::new();
        let mut unmatched = 0usize;

        for item in items {
            let Some(&(region, month)) = order_index.get(item.order_id.as_str()) else {
                unmatched += 1;
                continue;
            };
            let gross = item.gross_line_revenue();
            let net = item.net_line_revenue();

            let group = sales.entry((month, region)).or_default();
            group.items_sold = group.items_sold.checked_add(item.quantity).ok_or_else(|| {
                Error::Invariant(format!("items_sold of region '{}' in {} overflows", region, month))
            })?;
            group.gross_revenue += gross;
            group.net_revenue += net;

            let product = products
                .entry(month)
                .or_default()
                .entry(item.product_id.as_str())
                .or_default();
            product.items_sold = product.items_sold.checked_add(item.quantity).ok_or_else(|| {
                Error::Invariant(format!(
                    "items_sold of product '{}' in {} overflows",
                    item.product_id, month
                ))
            })?;
            product.net_revenue += net;
        }

        if unmatched > 0 {
            debug!(unmatched, "Order lines without a matching order excluded from gold");
        }

        let sales = sales
            .into_iter()
            .map(|((month, region), acc)| sales_row(region, month, acc))
            .collect::<Result<Vec<_>>>()?;
        let top_products = self.rank_products(products);

        info!(
            orders = orders.len(),
            items = items.len(),
            sales_rows = sales.len(),
            top_product_rows = top_products.len(),
            "Gold aggregation complete"
        );

        Ok(GoldTables {
            sales,
            top_products,
        })
    }

    fn rank_products(
        &self,
        products: BTreeMap<YearMonth, BTreeMap<&str, ProductAccumulator>>,
    ) -> Vec<TopProductRow> {
        let mut rows = Vec::new();
        for (month, by_product) in products {
            let items_sold: HashMap<&str, i64> = by_product
                .iter()
                .map(|(product_id, acc)| (*product_id, acc.items_sold))
                .collect();
            let entries = by_product
                .into_iter()
                .map(|(product_id, acc)| (product_id, acc.net_revenue))
                .collect();

            for (product_id, net_revenue, rank) in rank::dense_rank_desc(entries) {
                if rank > self.max_rank {
                    break;
                }
                rows.push(TopProductRow {
                    product_id: product_id.to_string(),
                    year: month.year,
                    month: month.month,
                    items_sold: items_sold.get(product_id).copied().unwrap_or_default(),
                    net_revenue,
                    rank_by_net_revenue: rank,
                });
            }
        }
        rows
    }
}

fn sales_row(region: &str, month: YearMonth, acc: SalesAccumulator<'_>) -> Result<SalesByRegionRow> {
    let orders_count = acc.orders.len() as i64;
    if orders_count == 0 {
        return Err(Error::Invariant(format!(
            "sales group {} / {} has no orders, aov_net is undefined",
            region, month
        )));
    }
    Ok(SalesByRegionRow {
        region: region.to_string(),
        year: month.year,
        month: month.month,
        orders_count,
        items_sold: acc.items_sold,
        gross_revenue: acc.gross_revenue,
        net_revenue: acc.net_revenue,
        aov_net: acc.net_revenue / orders_count as f64,
    })
}

/// Parse an order timestamp into its wall-clock time.
///
/// RFC 3339 values keep the local time of their own offset; a bare date is
/// taken as midnight. Returns `None` if the text is not a timestamp.
pub fn parse_order_ts(order_ts: &str) -> Option<NaiveDateTime> {
    let ts = order_ts.trim();
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.naive_local())
        .ok()
        .or_else(|| {
            NAIVE_TIMESTAMP_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(ts, format).ok())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(ts, DATE_FORMAT)
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

/// Calendar month of an order timestamp, or `None` if the text is not a timestamp.
pub fn order_month(order_ts: &str) -> Option<YearMonth> {
    let date = parse_order_ts(order_ts)?.date();
    Some(YearMonth::new(date.year(), date.month() as i32))
}
