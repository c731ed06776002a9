//! Arrow schema definitions
//!
//! Field order here is the column order of the CSV and Parquet files.

use arrow_schema::{DataType, Field, Schema, SchemaRef};
use std::sync::Arc;

/// Order columns
pub const ORDER_ID: &str = "order_id";
pub const ORDER_TS: &str = "order_ts";
pub const CUSTOMER_ID: &str = "customer_id";
pub const REGION: &str = "region";
pub const PAYMENT_METHOD: &str = "payment_method";
pub const ORDER_STATUS: &str = "order_status";
pub const CURRENCY: &str = "currency";
pub const INGESTION_DATE: &str = "ingestion_date";

/// Order item columns
pub const LINE_ID: &str = "line_id";
pub const PRODUCT_ID: &str = "product_id";
pub const QUANTITY: &str = "quantity";
pub const UNIT_PRICE: &str = "unit_price";
pub const DISCOUNT_PCT: &str = "discount_pct";

/// Gold mart columns
pub const YEAR: &str = "year";
pub const MONTH: &str = "month";
pub const ORDERS_COUNT: &str = "orders_count";
pub const ITEMS_SOLD: &str = "items_sold";
pub const GROSS_REVENUE: &str = "gross_revenue";
pub const NET_REVENUE: &str = "net_revenue";
pub const AOV_NET: &str = "aov_net";
pub const RANK_BY_NET_REVENUE: &str = "rank_by_net_revenue";

fn orders_schema(required: bool) -> SchemaRef {
    // Silver guarantees the key, timestamp, customer and both defaulted dimensions.
    let nullable = !required;
    Arc::new(Schema::new(vec![
        Field::new(ORDER_ID, DataType::Utf8, nullable),
        Field::new(ORDER_TS, DataType::Utf8, nullable),
        Field::new(CUSTOMER_ID, DataType::Utf8, nullable),
        Field::new(REGION, DataType::Utf8, nullable),
        Field::new(PAYMENT_METHOD, DataType::Utf8, nullable),
        Field::new(ORDER_STATUS, DataType::Utf8, true),
        Field::new(CURRENCY, DataType::Utf8, true),
        Field::new(INGESTION_DATE, DataType::Utf8, true),
    ]))
}

fn order_items_schema(required: bool) -> SchemaRef {
    let nullable = !required;
    Arc::new(Schema::new(vec![
        Field::new(ORDER_ID, DataType::Utf8, nullable),
        Field::new(LINE_ID, DataType::Int64, true),
        Field::new(PRODUCT_ID, DataType::Utf8, nullable),
        Field::new(QUANTITY, DataType::Int64, nullable),
        Field::new(UNIT_PRICE, DataType::Float64, nullable),
        Field::new(DISCOUNT_PCT, DataType::Float64, nullable),
        Field::new(INGESTION_DATE, DataType::Utf8, true),
    ]))
}

/// Raw orders as exported to CSV
pub fn bronze_orders_schema() -> SchemaRef {
    orders_schema(false)
}

/// Raw order lines as exported to CSV
pub fn bronze_order_items_schema() -> SchemaRef {
    order_items_schema(false)
}

pub fn silver_orders_schema() -> SchemaRef {
    orders_schema(true)
}

pub fn silver_order_items_schema() -> SchemaRef {
    order_items_schema(true)
}

/// Monthly KPIs by region, grain (region, year, month)
pub fn gold_sales_by_region_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(REGION, DataType::Utf8, false),
        Field::new(YEAR, DataType::Int32, false),
        Field::new(MONTH, DataType::Int32, false),
        Field::new(ORDERS_COUNT, DataType::Int64, false),
        Field::new(ITEMS_SOLD, DataType::Int64, false),
        Field::new(GROSS_REVENUE, DataType::Float64, false),
        Field::new(NET_REVENUE, DataType::Float64, false),
        Field::new(AOV_NET, DataType::Float64, false),
    ]))
}

/// Top products per month, grain (product_id, year, month)
pub fn gold_top_products_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(PRODUCT_ID, DataType::Utf8, false),
        Field::new(YEAR, DataType::Int32, false),
        Field::new(MONTH, DataType::Int32, false),
        Field::new(ITEMS_SOLD, DataType::Int64, false),
        Field::new(NET_REVENUE, DataType::Float64, false),
        Field::new(RANK_BY_NET_REVENUE, DataType::Int32, false),
    ]))
}
