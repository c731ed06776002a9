//! Typed rows for each table and their RecordBatch codecs
//!
//! The cleaning and aggregation logic works on plain structs; Arrow is only
//! the exchange format at stage boundaries.

use super::tables::*;
use crate::{Error, Result};

use arrow_array::{Array, Float64Array, Int32Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::SchemaRef;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Conversion between a row type and its Arrow table.
pub trait TableRecord: Sized {
    /// Schema of the table holding rows of this type
    fn schema() -> SchemaRef;

    /// Encode rows into a single batch with [`TableRecord::schema`]
    fn to_batch(rows: &[Self]) -> Result<RecordBatch>;

    /// Decode one batch, looking columns up by name
    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>>;

    /// Decode several batches in order
    fn from_batches(batches: &[RecordBatch]) -> Result<Vec<Self>> {
        let mut rows = Vec::new();
        for batch in batches {
            rows.extend(Self::from_batch(batch)?);
        }
        Ok(rows)
    }
}

/// Calendar month used as the time grain of both marts and of `dim_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: i32,
}

impl YearMonth {
    pub fn new(year: i32, month: i32) -> Self {
        Self { year, month }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Raw order row; nothing is guaranteed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BronzeOrder {
    pub order_id: Option<String>,
    pub order_ts: Option<String>,
    pub customer_id: Option<String>,
    pub region: Option<String>,
    pub payment_method: Option<String>,
    pub order_status: Option<String>,
    pub currency: Option<String>,
    pub ingestion_date: Option<String>,
}

/// Raw order line; the order reference and all measures may be invalid
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BronzeOrderItem {
    pub order_id: Option<String>,
    pub line_id: Option<i64>,
    pub product_id: Option<String>,
    pub quantity: Option<i64>,
    pub unit_price: Option<f64>,
    pub discount_pct: Option<f64>,
    pub ingestion_date: Option<String>,
}

/// Conformed order: unique key, required fields present, dimensions defaulted.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub order_id: String,
    pub order_ts: String,
    pub customer_id: String,
    pub region: String,
    pub payment_method: String,
    pub order_status: Option<String>,
    pub currency: Option<String>,
    pub ingestion_date: Option<String>,
}

/// Conformed order line with positive measures and a clamped discount.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub order_id: String,
    pub line_id: Option<i64>,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub discount_pct: f64,
    pub ingestion_date: Option<String>,
}

impl OrderItem {
    pub fn gross_line_revenue(&self) -> f64 {
        self.quantity as f64 * self.unit_price
    }

    pub fn net_line_revenue(&self) -> f64 {
        self.gross_line_revenue() * (1.0 - self.discount_pct)
    }
}

/// Gold mart row: monthly KPIs for one region
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesByRegionRow {
    pub region: String,
    pub year: i32,
    pub month: i32,
    pub orders_count: i64,
    pub items_sold: i64,
    pub gross_revenue: f64,
    pub net_revenue: f64,
    pub aov_net: f64,
}

impl SalesByRegionRow {
    pub fn year_month(&self) -> YearMonth {
        YearMonth::new(self.year, self.month)
    }
}

/// Gold mart row: one product among the top ranks of its month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopProductRow {
    pub product_id: String,
    pub year: i32,
    pub month: i32,
    pub items_sold: i64,
    pub net_revenue: f64,
    pub rank_by_net_revenue: i32,
}

impl TopProductRow {
    pub fn year_month(&self) -> YearMonth {
        YearMonth::new(self.year, self.month)
    }
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    let array = batch
        .column_by_name(name)
        .ok_or_else(|| Error::SchemaViolation(format!("missing column '{}'", name)))?;
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        Error::SchemaViolation(format!(
            "column '{}' has unexpected type {}",
            name,
            array.data_type()
        ))
    })
}

fn opt_string(array: &StringArray, row: usize) -> Option<String> {
    array.is_valid(row).then(|| array.value(row).to_string())
}

fn req_string(array: &StringArray, row: usize, name: &str) -> Result<String> {
    opt_string(array, row)
        .ok_or_else(|| Error::SchemaViolation(format!("null '{}' at row {}", name, row)))
}

fn opt_i64(array: &Int64Array, row: usize) -> Option<i64> {
    array.is_valid(row).then(|| array.value(row))
}

fn req_i64(array: &Int64Array, row: usize, name: &str) -> Result<i64> {
    opt_i64(array, row)
        .ok_or_else(|| Error::SchemaViolation(format!("null '{}' at row {}", name, row)))
}

fn req_i32(array: &Int32Array, row: usize, name: &str) -> Result<i32> {
    if array.is_valid(row) {
        Ok(array.value(row))
    } else {
        Err(Error::SchemaViolation(format!("null '{}' at row {}", name, row)))
    }
}

fn opt_f64(array: &Float64Array, row: usize) -> Option<f64> {
    array.is_valid(row).then(|| array.value(row))
}

fn req_f64(array: &Float64Array, row: usize, name: &str) -> Result<f64> {
    opt_f64(array, row)
        .ok_or_else(|| Error::SchemaViolation(format!("null '{}' at row {}", name, row)))
}

fn strings<'a, I>(values: I) -> Arc<StringArray>
where
    I: Iterator<Item = Option<&'a str>>,
{
    Arc::new(values.collect::<StringArray>())
}

impl TableRecord for BronzeOrder {
    fn schema() -> SchemaRef {
        bronze_orders_schema()
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        Ok(RecordBatch::try_new(
            Self::schema(),
            vec![
                strings(rows.iter().map(|r| r.order_id.as_deref())),
                strings(rows.iter().map(|r| r.order_ts.as_deref())),
                strings(rows.iter().map(|r| r.customer_id.as_deref())),
                strings(rows.iter().map(|r| r.region.as_deref())),
                strings(rows.iter().map(|r| r.payment_method.as_deref())),
                strings(rows.iter().map(|r| r.order_status.as_deref())),
                strings(rows.iter().map(|r| r.currency.as_deref())),
                strings(rows.iter().map(|r| r.ingestion_date.as_deref())),
            ],
        )?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let order_id = column::<StringArray>(batch, ORDER_ID)?;
        let order_ts = column::<StringArray>(batch, ORDER_TS)?;
        let customer_id = column::<StringArray>(batch, CUSTOMER_ID)?;
        let region = column::<StringArray>(batch, REGION)?;
        let payment_method = column::<StringArray>(batch, PAYMENT_METHOD)?;
        let order_status = column::<StringArray>(batch, ORDER_STATUS)?;
        let currency = column::<StringArray>(batch, CURRENCY)?;
        let ingestion_date = column::<StringArray>(batch, INGESTION_DATE)?;

        Ok((0..batch.num_rows())
            .map(|i| BronzeOrder {
                order_id: opt_string(order_id, i),
                order_ts: opt_string(order_ts, i),
                customer_id: opt_string(customer_id, i),
                region: opt_string(region, i),
                payment_method: opt_string(payment_method, i),
                order_status: opt_string(order_status, i),
                currency: opt_string(currency, i),
                ingestion_date: opt_string(ingestion_date, i),
            })
            .collect())
    }
}

impl TableRecord for BronzeOrderItem {
    fn schema() -> SchemaRef {
        bronze_order_items_schema()
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        Ok(RecordBatch::try_new(
            Self::schema(),
            vec![
                strings(rows.iter().map(|r| r.order_id.as_deref())),
                Arc::new(rows.iter().map(|r| r.line_id).collect::<Int64Array>()),
                strings(rows.iter().map(|r| r.product_id.as_deref())),
                Arc::new(rows.iter().map(|r| r.quantity).collect::<Int64Array>()),
                Arc::new(rows.iter().map(|r| r.unit_price).collect::<Float64Array>()),
                Arc::new(rows.iter().map(|r| r.discount_pct).collect::<Float64Array>()),
                strings(rows.iter().map(|r| r.ingestion_date.as_deref())),
            ],
        )?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let order_id = column::<StringArray>(batch, ORDER_ID)?;
        let line_id = column::<Int64Array>(batch, LINE_ID)?;
        let product_id = column::<StringArray>(batch, PRODUCT_ID)?;
        let quantity = column::<Int64Array>(batch, QUANTITY)?;
        let unit_price = column::<Float64Array>(batch, UNIT_PRICE)?;
        let discount_pct = column::<Float64Array>(batch, DISCOUNT_PCT)?;
        let ingestion_date = column::<StringArray>(batch, INGESTION_DATE)?;

        Ok((0..batch.num_rows())
            .map(|i| BronzeOrderItem {
                order_id: opt_string(order_id, i),
                line_id: opt_i64(line_id, i),
                product_id: opt_string(product_id, i),
                quantity: opt_i64(quantity, i),
                unit_price: opt_f64(unit_price, i),
                discount_pct: opt_f64(discount_pct, i),
                ingestion_date: opt_string(ingestion_date, i),
            })
            .collect())
    }
}

impl TableRecord for Order {
    fn schema() -> SchemaRef {
        silver_orders_schema()
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        Ok(RecordBatch::try_new(
            Self::schema(),
            vec![
                strings(rows.iter().map(|r| Some(r.order_id.as_str()))),
                strings(rows.iter().map(|r| Some(r.order_ts.as_str()))),
                strings(rows.iter().map(|r| Some(r.customer_id.as_str()))),
                strings(rows.iter().map(|r| Some(r.region.as_str()))),
                strings(rows.iter().map(|r| Some(r.payment_method.as_str()))),
                strings(rows.iter().map(|r| r.order_status.as_deref())),
                strings(rows.iter().map(|r| r.currency.as_deref())),
                strings(rows.iter().map(|r| r.ingestion_date.as_deref())),
            ],
        )?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let order_id = column::<StringArray>(batch, ORDER_ID)?;
        let order_ts = column::<StringArray>(batch, ORDER_TS)?;
        let customer_id = column::<StringArray>(batch, CUSTOMER_ID)?;
        let region = column::<StringArray>(batch, REGION)?;
        let payment_method = column::<StringArray>(batch, PAYMENT_METHOD)?;
        let order_status = column::<StringArray>(batch, ORDER_STATUS)?;
        let currency = column::<StringArray>(batch, CURRENCY)?;
        let ingestion_date = column::<StringArray>(batch, INGESTION_DATE)?;

        (0..batch.num_rows())
            .map(|i| {
                Ok(Order {
                    order_id: req_string(order_id, i, ORDER_ID)?,
                    order_ts: req_string(order_ts, i, ORDER_TS)?,
                    customer_id: req_string(customer_id, i, CUSTOMER_ID)?,
                    region: req_string(region, i, REGION)?,
                    payment_method: req_string(payment_method, i, PAYMENT_METHOD)?,
                    order_status: opt_string(order_status, i),
                    currency: opt_string(currency, i),
                    ingestion_date: opt_string(ingestion_date, i),
                })
            })
            .collect()
    }
}

impl TableRecord for OrderItem {
    fn schema() -> SchemaRef {
        silver_order_items_schema()
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        Ok(RecordBatch::try_new(
            Self::schema(),
            vec![
                strings(rows.iter().map(|r| Some(r.order_id.as_str()))),
                Arc::new(rows.iter().map(|r| r.line_id).collect::<Int64Array>()),
                strings(rows.iter().map(|r| Some(r.product_id.as_str()))),
                Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.quantity))),
                Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.unit_price))),
                Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.discount_pct))),
                strings(rows.iter().map(|r| r.ingestion_date.as_deref())),
            ],
        )?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let order_id = column::<StringArray>(batch, ORDER_ID)?;
        let line_id = column::<Int64Array>(batch, LINE_ID)?;
        let product_id = column::<StringArray>(batch, PRODUCT_ID)?;
        let quantity = column::<Int64Array>(batch, QUANTITY)?;
        let unit_price = column::<Float64Array>(batch, UNIT_PRICE)?;
        let discount_pct = column::<Float64Array>(batch, DISCOUNT_PCT)?;
        let ingestion_date = column::<StringArray>(batch, INGESTION_DATE)?;

        (0..batch.num_rows())
            .map(|i| {
                Ok(OrderItem {
                    order_id: req_string(order_id, i, ORDER_ID)?,
                    line_id: opt_i64(line_id, i),
                    product_id: req_string(product_id, i, PRODUCT_ID)?,
                    quantity: req_i64(quantity, i, QUANTITY)?,
                    unit_price: req_f64(unit_price, i, UNIT_PRICE)?,
                    discount_pct: req_f64(discount_pct, i, DISCOUNT_PCT)?,
                    ingestion_date: opt_string(ingestion_date, i),
                })
            })
            .collect()
    }
}

impl TableRecord for SalesByRegionRow {
    fn schema() -> SchemaRef {
        gold_sales_by_region_schema()
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        Ok(RecordBatch::try_new(
            Self::schema(),
            vec![
                strings(rows.iter().map(|r| Some(r.region.as_str()))),
                Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.year))),
                Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.month))),
                Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.orders_count))),
                Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.items_sold))),
                Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.gross_revenue))),
                Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.net_revenue))),
                Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.aov_net))),
            ],
        )?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let region = column::<StringArray>(batch, REGION)?;
        let year = column::<Int32Array>(batch, YEAR)?;
        let month = column::<Int32Array>(batch, MONTH)?;
        let orders_count = column::<Int64Array>(batch, ORDERS_COUNT)?;
        let items_sold = column::<Int64Array>(batch, ITEMS_SOLD)?;
        let gross_revenue = column::<Float64Array>(batch, GROSS_REVENUE)?;
        let net_revenue = column::<Float64Array>(batch, NET_REVENUE)?;
        let aov_net = column::<Float64Array>(batch, AOV_NET)?;

        (0..batch.num_rows())
            .map(|i| {
                Ok(SalesByRegionRow {
                    region: req_string(region, i, REGION)?,
                    year: req_i32(year, i, YEAR)?,
                    month: req_i32(month, i, MONTH)?,
                    orders_count: req_i64(orders_count, i, ORDERS_COUNT)?,
                    items_sold: req_i64(items_sold, i, ITEMS_SOLD)?,
                    gross_revenue: req_f64(gross_revenue, i, GROSS_REVENUE)?,
                    net_revenue: req_f64(net_revenue, i, NET_REVENUE)?,
                    aov_net: req_f64(aov_net, i, AOV_NET)?,
                })
            })
            .collect()
    }
}

impl TableRecord for TopProductRow {
    fn schema() -> SchemaRef {
        gold_top_products_schema()
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        Ok(RecordBatch::try_new(
            Self::schema(),
            vec![
                strings(rows.iter().map(|r| Some(r.product_id.as_str()))),
                Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.year))),
                Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.month))),
                Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.items_sold))),
                Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.net_revenue))),
                Arc::new(Int32Array::from_iter_values(
                    rows.iter().map(|r| r.rank_by_net_revenue),
                )),
            ],
        )?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let product_id = column::<StringArray>(batch, PRODUCT_ID)?;
        let year = column::<Int32Array>(batch, YEAR)?;
        let month = column::<Int32Array>(batch, MONTH)?;
        let items_sold = column::<Int64Array>(batch, ITEMS_SOLD)?;
        let net_revenue = column::<Float64Array>(batch, NET_REVENUE)?;
        let rank = column::<Int32Array>(batch, RANK_BY_NET_REVENUE)?;

        (0..batch.num_rows())
            .map(|i| {
                Ok(TopProductRow {
                    product_id: req_string(product_id, i, PRODUCT_ID)?,
                    year: req_i32(year, i, YEAR)?,
                    month: req_i32(month, i, MONTH)?,
                    items_sold: req_i64(items_sold, i, ITEMS_SOLD)?,
                    net_revenue: req_f64(net_revenue, i, NET_REVENUE)?,
                    rank_by_net_revenue: req_i32(rank, i, RANK_BY_NET_REVENUE)?,
                })
            })
            .collect()
    }
}
