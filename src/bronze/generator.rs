//! Synthetic bronze data with realistic defects
//!
//! Produces a partition that exercises every silver cleaning rule: missing
//! dimensions, duplicated orders, non-positive quantities, out-of-range
//! discounts and orphan order lines.

use super::BronzePartition;
use crate::partition::IngestionDate;
use crate::schema::{BronzeOrder, BronzeOrderItem};
use crate::{Error, Result};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use tracing::info;

/// Order id carried by injected orphan lines; never generated for a real order
pub const ORPHAN_ORDER_ID: &str = "ORD-99999999";

const REGIONS: [&str; 4] = ["North", "South", "East", "West"];
const REGION_WEIGHTS: [f64; 4] = [0.40, 0.25, 0.20, 0.15];
const PAYMENT_METHODS: [&str; 3] = ["Card", "PayPal", "Cash"];
const ORDER_STATUSES: [&str; 3] = ["Completed", "Cancelled", "Returned"];
const STATUS_WEIGHTS: [f64; 3] = [0.92, 0.06, 0.02];
const CURRENCY: &str = "EUR";

const NULL_PAYMENT_RATE: f64 = 0.02;
const NULL_REGION_RATE: f64 = 0.005;
const DUPLICATE_ORDER_RATE: f64 = 0.005;
const INVALID_DISCOUNT_RATE: f64 = 0.005;
const ORPHAN_LINE_RATE: f64 = 0.003;

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Distinct orders before duplicates are injected
    pub orders: usize,
    pub min_items_per_order: u32,
    pub max_items_per_order: u32,
    pub products: u32,
    pub customers: u32,
    /// Order timestamps are drawn uniformly from `[start, end]`
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Fixed seed for reproducible partitions; entropy when unset
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        let end = NaiveDate::from_ymd_opt(2024, 12, 31)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        Self {
            orders: 10_000,
            min_items_per_order: 1,
            max_items_per_order: 6,
            products: 500,
            customers: 2_500,
            start,
            end,
            seed: None,
        }
    }
}

impl GeneratorConfig {
    fn validate(&self) -> Result<()> {
        if self.products == 0 || self.customers == 0 {
            return Err(Error::Config(
                "generator needs at least one product and one customer".to_string(),
            ));
        }
        if self.min_items_per_order == 0 || self.min_items_per_order > self.max_items_per_order {
            return Err(Error::Config(format!(
                "items per order must satisfy 1 <= min <= max, got {}..={}",
                self.min_items_per_order, self.max_items_per_order
            )));
        }
        if self.start > self.end {
            return Err(Error::Config(format!(
                "generator window start {} is after end {}",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

/// Seedable generator of bronze partitions.
pub struct BronzeGenerator {
    config: GeneratorConfig,
    rng: StdRng,
    regions: WeightedIndex<f64>,
    statuses: WeightedIndex<f64>,
}

impl BronzeGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let regions = WeightedIndex::new(REGION_WEIGHTS)
            .map_err(|e| Error::Internal(format!("invalid region weights: {}", e)))?;
        let statuses = WeightedIndex::new(STATUS_WEIGHTS)
            .map_err(|e| Error::Internal(format!("invalid status weights: {}", e)))?;

        Ok(Self {
            config,
            rng,
            regions,
            statuses,
        })
    }

    /// Generate one partition stamped with `date`
    pub fn generate(&mut self, date: IngestionDate) -> BronzePartition {
        let ingestion_date = date.to_string();
        let orders = self.make_orders(&ingestion_date);
        let items = self.make_items(&orders, &ingestion_date);

        info!(
            ingestion_date = %date,
            orders = orders.len(),
            items = items.len(),
            null_regions = orders.iter().filter(|o| o.region.is_none()).count(),
            null_payments = orders.iter().filter(|o| o.payment_method.is_none()).count(),
            orphan_lines = items
                .iter()
                .filter(|i| i.order_id.as_deref() == Some(ORPHAN_ORDER_ID))
                .count(),
            "Generated bronze partition"
        );

        BronzePartition { orders, items }
    }

    fn make_orders(&mut self, ingestion_date: &str) -> Vec<BronzeOrder> {
        let span = (self.config.end - self.config.start).num_seconds();
        let mut orders = Vec::with_capacity(self.config.orders);

        for i in 1..=self.config.orders {
            let ts = self.config.start + Duration::seconds(self.rng.gen_range(0..=span));
            let region = REGIONS[self.regions.sample(&mut self.rng)];
            let status = ORDER_STATUSES[self.statuses.sample(&mut self.rng)];
            let payment = PAYMENT_METHODS.choose(&mut self.rng).copied();

            orders.push(BronzeOrder {
                order_id: Some(format!("ORD-{:08}", i)),
                order_ts: Some(ts.format("%Y-%m-%d %H:%M:%S").to_string()),
                customer_id: Some(format!(
                    "CUST-{:05}",
                    self.rng.gen_range(1..=self.config.customers)
                )),
                region: (!self.rng.gen_bool(NULL_REGION_RATE)).then(|| region.to_string()),
                payment_method: payment
                    .filter(|_| !self.rng.gen_bool(NULL_PAYMENT_RATE))
                    .map(str::to_string),
                order_status: Some(status.to_string()),
                currency: Some(CURRENCY.to_string()),
                ingestion_date: Some(ingestion_date.to_string()),
            });
        }

        let duplicates: Vec<BronzeOrder> = orders
            .iter()
            .filter(|_| self.rng.gen_bool(DUPLICATE_ORDER_RATE))
            .cloned()
            .collect();
        orders.extend(duplicates);
        orders
    }

    fn make_items(&mut self, orders: &[BronzeOrder], ingestion_date: &str) -> Vec<BronzeOrderItem> {
        let mut seen = std::collections::HashSet::new();
        let mut items = Vec::new();

        for order_id in orders.iter().filter_map(|o| o.order_id.as_deref()) {
            if !seen.insert(order_id) {
                continue;
            }
            let lines = self
                .rng
                .gen_range(self.config.min_items_per_order..=self.config.max_items_per_order);
            for line in 1..=lines {
                items.push(BronzeOrderItem {
                    order_id: Some(order_id.to_string()),
                    line_id: Some(i64::from(line)),
                    product_id: Some(format!(
                        "P-{:04}",
                        self.rng.gen_range(1..=self.config.products)
                    )),
                    quantity: Some(self.quantity()),
                    unit_price: Some(self.unit_price()),
                    discount_pct: Some(self.discount()),
                    ingestion_date: Some(ingestion_date.to_string()),
                });
            }
        }

        if !items.is_empty() {
            let orphans = ((items.len() as f64 * ORPHAN_LINE_RATE) as usize).max(1);
            for _ in 0..orphans {
                let mut orphan = items[self.rng.gen_range(0..items.len())].clone();
                orphan.order_id = Some(ORPHAN_ORDER_ID.to_string());
                items.push(orphan);
            }
        }
        items
    }

    /// Mostly 1 to 5, with rare outliers and invalid values
    fn quantity(&mut self) -> i64 {
        let quantity = self.rng.gen_range(1..=5);
        match self.rng.gen::<f64>() {
            r if r < 0.005 => 20,
            r if r < 0.008 => 0,
            r if r < 0.011 => -1,
            _ => quantity,
        }
    }

    /// Three price bands: everyday, mid-range and premium
    fn unit_price(&mut self) -> f64 {
        let band = self.rng.gen::<f64>();
        let price = if band < 0.70 {
            self.rng.gen_range(5.0..60.0)
        } else if band < 0.95 {
            self.rng.gen_range(60.0..250.0)
        } else {
            self.rng.gen_range(250.0..900.0)
        };
        round_cents(price)
    }

    fn discount(&mut self) -> f64 {
        if self.rng.gen_bool(INVALID_DISCOUNT_RATE) {
            round_cents(self.rng.gen_range(0.51..=0.80))
        } else {
            round_cents(self.rng.gen_range(0.0..=0.30))
        }
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
