//! Table schemas for every tier of the lakehouse
//!
//! Bronze tables mirror the raw CSV exports and are fully nullable. Silver
//! tables carry the conformed-data invariants in their nullability, and gold
//! tables hold the two monthly marts loaded into the warehouse.

mod records;
mod tables;

pub use records::{
    BronzeOrder, BronzeOrderItem, Order, OrderItem, SalesByRegionRow, TableRecord,
    TopProductRow, YearMonth,
};
pub use tables::{
    bronze_order_items_schema, bronze_orders_schema, gold_sales_by_region_schema,
    gold_top_products_schema, silver_order_items_schema, silver_orders_schema, AOV_NET,
    CURRENCY, CUSTOMER_ID, DISCOUNT_PCT, GROSS_REVENUE, INGESTION_DATE, ITEMS_SOLD, LINE_ID,
    MONTH, NET_REVENUE, ORDERS_COUNT, ORDER_ID, ORDER_STATUS, ORDER_TS, PAYMENT_METHOD,
    PRODUCT_ID, QUANTITY, RANK_BY_NET_REVENUE, REGION, UNIT_PRICE, YEAR,
};
