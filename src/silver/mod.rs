//! Silver tier: conformed orders and order lines
//!
//! The cleaner applies the [`CleaningStep`]s in their fixed order and then
//! converts the surviving bronze rows into silver rows. The conversion fails
//! only if a step did not establish its postcondition.

mod rules;

pub use rules::{
    CleaningReport, CleaningStep, DuplicateOrderPolicy, StepOutcome, MAX_DISCOUNT_PCT,
    MIN_DISCOUNT_PCT, UNKNOWN,
};

use crate::schema::{BronzeOrder, BronzeOrderItem, Order, OrderItem};
use crate::{Error, Result};
use rules::CleaningState;

use tracing::{debug, info};

/// Conformed tables of one partition
#[derive(Debug, Clone, Default)]
pub struct SilverTables {
    pub orders: Vec<Order>,
    pub items: Vec<OrderItem>,
    pub report: CleaningReport,
}

/// Applies the silver cleaning rules to one bronze partition.
#[derive(Debug, Clone, Default)]
pub struct SilverCleaner {
    policy: DuplicateOrderPolicy,
}

impl SilverCleaner {
    pub fn new(policy: DuplicateOrderPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DuplicateOrderPolicy {
        self.policy
    }

    /// Clean a bronze partition entirely in memory.
    pub fn clean(
        &self,
        orders: Vec<BronzeOrder>,
        items: Vec<BronzeOrderItem>,
    ) -> Result<SilverTables> {
        let bronze_orders = orders.len();
        let bronze_items = items.len();
        let mut state = CleaningState { orders, items };
        let mut report = CleaningReport {
            duplicate_policy: self.policy,
            ..CleaningReport::default()
        };

        for step in CleaningStep::ORDERED {
            let outcome = step.apply(&mut state, self.policy);
            debug!(
                step = step.name(),
                rows_in = outcome.rows_in,
                rows_out = outcome.rows_out,
                rows_changed = outcome.rows_changed,
                "Applied cleaning step"
            );
            report.steps.push(outcome);
        }

        let orders = state
            .orders
            .into_iter()
            .map(conform_order)
            .collect::<Result<Vec<_>>>()?;
        let items = state
            .items
            .into_iter()
            .map(conform_item)
            .collect::<Result<Vec<_>>>()?;

        info!(
            bronze_orders,
            bronze_items,
            silver_orders = orders.len(),
            silver_items = items.len(),
            orders_dropped = report.orders_dropped(),
            items_dropped = report.items_dropped(),
            duplicate_policy = %self.policy,
            "Silver cleaning complete"
        );

        Ok(SilverTables {
            orders,
            items,
            report,
        })
    }
}

fn postcondition(field: &str) -> Error {
    Error::Internal(format!("cleaning left '{}' unset", field))
}

fn conform_order(order: BronzeOrder) -> Result<Order> {
    Ok(Order {
        order_id: order.order_id.ok_or_else(|| postcondition("order_id"))?,
        order_ts: order.order_ts.ok_or_else(|| postcondition("order_ts"))?,
        customer_id: order.customer_id.ok_or_else(|| postcondition("customer_id"))?,
        region: order.region.ok_or_else(|| postcondition("region"))?,
        payment_method: order
            .payment_method
            .ok_or_else(|| postcondition("payment_method"))?,
        order_status: order.order_status,
        currency: order.currency,
        ingestion_date: order.ingestion_date,
    })
}

fn conform_item(item: BronzeOrderItem) -> Result<OrderItem> {
    Ok(OrderItem {
        order_id: item.order_id.ok_or_else(|| postcondition("order_id"))?,
        line_id: item.line_id,
        product_id: item.product_id.ok_or_else(|| postcondition("product_id"))?,
        quantity: item.quantity.ok_or_else(|| postcondition("quantity"))?,
        unit_price: item.unit_price.ok_or_else(|| postcondition("unit_price"))?,
        discount_pct: item.discount_pct.ok_or_else(|| postcondition("discount_pct"))?,
        ingestion_date: item.ingestion_date,
    })
}
