//! Ordered cleaning steps for the silver tier
//!
//! The steps run in the order of [`CleaningStep::ORDERED`]. Item filtering
//! depends on the final order set, so the order steps must all run first.

use crate::gold::parse_order_ts;
use crate::schema::{BronzeOrder, BronzeOrderItem};

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Value used for a missing region or payment method
pub const UNKNOWN: &str = "Unknown";

/// Lowest valid discount fraction
pub const MIN_DISCOUNT_PCT: f64 = 0.0;

/// Highest valid discount fraction
pub const MAX_DISCOUNT_PCT: f64 = 0.30;

/// Which row survives when an order_id repeats in bronze.
///
/// Bronze input order is not guaranteed to follow recency, so `KeepFirst` is
/// a policy choice rather than a data-quality guarantee.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateOrderPolicy {
    /// First occurrence in input order
    #[default]
    KeepFirst,
    /// Greatest parsed `order_ts`; ties keep the earlier occurrence. The survivor takes
    /// the position of the first occurrence.
    KeepLatest,
}

impl DuplicateOrderPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateOrderPolicy::KeepFirst => "first",
            DuplicateOrderPolicy::KeepLatest => "latest",
        }
    }
}

impl fmt::Display for DuplicateOrderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DuplicateOrderPolicy {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "first" | "keep_first" => Ok(Self::KeepFirst),
            "latest" | "keep_latest" => Ok(Self::KeepLatest),
            other => Err(format!(
                "unknown duplicate policy '{}'; expected one of first, latest",
                other
            )),
        }
    }
}

/// Bronze rows in flight through the cleaning steps.
#[derive(Debug, Default)]
pub(crate) struct CleaningState {
    pub orders: Vec<BronzeOrder>,
    pub items: Vec<BronzeOrderItem>,
}

/// One named cleaning rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningStep {
    /// Pre: raw orders. Post: order_id, order_ts and customer_id are present.
    DropIncompleteOrders,
    /// Post: region and payment_method are present, `Unknown` when they were missing.
    FillUnknownDimensions,
    /// Pre: order_id present. Post: order_id is unique.
    DeduplicateOrders,
    /// Post: every item has order_id, product_id, quantity > 0 and unit_price > 0.
    DropInvalidItems,
    /// Post: discount_pct is present and within [0.0, 0.30].
    ClampDiscounts,
    /// Pre: the order set is final. Post: every item references a kept order.
    DropOrphanItems,
}

impl CleaningStep {
    pub const ORDERED: [CleaningStep; 6] = [
        CleaningStep::DropIncompleteOrders,
        CleaningStep::FillUnknownDimensions,
        CleaningStep::DeduplicateOrders,
        CleaningStep::DropInvalidItems,
        CleaningStep::ClampDiscounts,
        CleaningStep::DropOrphanItems,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CleaningStep::DropIncompleteOrders => "drop_incomplete_orders",
            CleaningStep::FillUnknownDimensions => "fill_unknown_dimensions",
            CleaningStep::DeduplicateOrders => "deduplicate_orders",
            CleaningStep::DropInvalidItems => "drop_invalid_items",
            CleaningStep::ClampDiscounts => "clamp_discounts",
            CleaningStep::DropOrphanItems => "drop_orphan_items",
        }
    }

    /// Whether the step operates on orders (otherwise on items)
    pub fn targets_orders(&self) -> bool {
        matches!(
            self,
            CleaningStep::DropIncompleteOrders
                | CleaningStep::FillUnknownDimensions
                | CleaningStep::DeduplicateOrders
        )
    }

    /// Apply the step, returning how many rows of its target table it kept.
    pub(crate) fn apply(
        &self,
        state: &mut CleaningState,
        policy: DuplicateOrderPolicy,
    ) -> StepOutcome {
        let rows_in = self.target_len(state);
        let mut rows_changed = 0;

        match self {
            CleaningStep::DropIncompleteOrders => {
                state.orders.retain(|o| {
                    is_present(&o.order_id) && is_present(&o.order_ts) && is_present(&o.customer_id)
                });
            }
            CleaningStep::FillUnknownDimensions => {
                for order in &mut state.orders {
                    for field in [&mut order.region, &mut order.payment_method] {
                        if !is_present(field) {
                            *field = Some(UNKNOWN.to_string());
                            rows_changed += 1;
                        }
                    }
                }
            }
            CleaningStep::DeduplicateOrders => {
                state.orders = deduplicate(std::mem::take(&mut state.orders), policy);
            }
            CleaningStep::DropInvalidItems => {
                state.items.retain(|item| {
                    is_present(&item.order_id)
                        && is_present(&item.product_id)
                        && item.quantity.map(|q| q > 0).unwrap_or(false)
                        && item.unit_price.map(|p| p > 0.0).unwrap_or(false)
                });
            }
            CleaningStep::ClampDiscounts => {
                for item in &mut state.items {
                    let clamped = match item.discount_pct {
                        Some(d) if d.is_nan() => MIN_DISCOUNT_PCT,
                        Some(d) => d.clamp(MIN_DISCOUNT_PCT, MAX_DISCOUNT_PCT),
                        None => MIN_DISCOUNT_PCT,
                    };
                    if item.discount_pct != Some(clamped) {
                        rows_changed += 1;
                    }
                    item.discount_pct = Some(clamped);
                }
            }
            CleaningStep::DropOrphanItems => {
                let order_ids: HashSet<&str> = state
                    .orders
                    .iter()
                    .filter_map(|o| o.order_id.as_deref())
                    .collect();
                state.items.retain(|item| {
                    item.order_id
                        .as_deref()
                        .map(|id| order_ids.contains(id))
                        .unwrap_or(false)
                });
            }
        }

        StepOutcome {
            step: *self,
            rows_in,
            rows_out: self.target_len(state),
            rows_changed,
        }
    }

    fn target_len(&self, state: &CleaningState) -> usize {
        if self.targets_orders() {
            state.orders.len()
        } else {
            state.items.len()
        }
    }
}

impl fmt::Display for CleaningStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Row counts for one applied step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub step: CleaningStep,
    pub rows_in: usize,
    pub rows_out: usize,
    /// Values repaired in place (filled or clamped)
    pub rows_changed: usize,
}

impl StepOutcome {
    pub fn rows_dropped(&self) -> usize {
        self.rows_in - self.rows_out
    }
}

/// Outcome of every step, in application order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningReport {
    /// Duplicate policy the run was cleaned with
    pub duplicate_policy: DuplicateOrderPolicy,
    pub steps: Vec<StepOutcome>,
}

impl CleaningReport {
    pub fn outcome(&self, step: CleaningStep) -> Option<&StepOutcome> {
        self.steps.iter().find(|o| o.step == step)
    }

    pub fn orders_dropped(&self) -> usize {
        self.steps
            .iter()
            .filter(|o| o.step.targets_orders())
            .map(StepOutcome::rows_dropped)
            .sum()
    }

    pub fn items_dropped(&self) -> usize {
        self.steps
            .iter()
            .filter(|o| !o.step.targets_orders())
            .map(StepOutcome::rows_dropped)
            .sum()
    }
}

/// Empty or whitespace-only strings count as missing.
fn is_present(value: &Option<String>) -> bool {
    value.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// Parsed recency of a bronze order; missing or unparseable timestamps rank oldest.
fn recency(order: &BronzeOrder) -> Option<chrono::NaiveDateTime> {
    order.order_ts.as_deref().and_then(parse_order_ts)
}

fn deduplicate(orders: Vec<BronzeOrder>, policy: DuplicateOrderPolicy) -> Vec<BronzeOrder> {
    let mut kept: Vec<BronzeOrder> = Vec::with_capacity(orders.len());
    let mut position: HashMap<String, usize> = HashMap::with_capacity(orders.len());

    for order in orders {
        let Some(order_id) = order.order_id.clone() else {
            continue;
        };
        match position.get(&order_id) {
            None => {
                position.insert(order_id, kept.len());
                kept.push(order);
            }
            Some(&index) => {
                if policy == DuplicateOrderPolicy::KeepLatest
                    && recency(&order) > recency(&kept[index])
                {
                    kept[index] = order;
                }
            }
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: &str, ts: &str, customer: &str) -> BronzeOrder {
        BronzeOrder {
            order_id: Some(id.to_string()),
            order_ts: Some(ts.to_string()),
            customer_id: Some(customer.to_string()),
            region: Some("North".to_string()),
            payment_method: Some("Card".to_string()),
            ..Default::default()
        }
    }

    fn item(order_id: &str, quantity: i64, unit_price: f64, discount: Option<f64>) -> BronzeOrderItem {
        BronzeOrderItem {
            order_id: Some(order_id.to_string()),
            line_id: Some(1),
            product_id: Some("P-0001".to_string()),
            quantity: Some(quantity),
            unit_price: Some(unit_price),
            discount_pct: discount,
            ingestion_date: None,
        }
    }

    #[test]
    fn test_orders_steps_precede_item_steps() {
        let first_item_step = CleaningStep::ORDERED
            .iter()
            .position(|s| !s.targets_orders())
            .unwrap();
        assert!(CleaningStep::ORDERED[first_item_step..]
            .iter()
            .all(|s| !s.targets_orders()));
        assert_eq!(
            CleaningStep::ORDERED.last(),
            Some(&CleaningStep::DropOrphanItems)
        );
    }

    #[test]
    fn test_blank_strings_count_as_missing() {
        let mut state = CleaningState {
            orders: vec![
                order("ORD-1", "2024-01-01 00:00:00", "CUST-1"),
                order("ORD-2", "2024-01-01 00:00:00", "  "),
            ],
            items: vec![],
        };
        let outcome =
            CleaningStep::DropIncompleteOrders.apply(&mut state, DuplicateOrderPolicy::KeepFirst);
        assert_eq!(outcome.rows_dropped(), 1);
        assert_eq!(state.orders[0].order_id.as_deref(), Some("ORD-1"));
    }

    #[test]
    fn test_keep_first_dedup() {
        let orders = vec![
            order("ORD-1", "2024-01-01 00:00:00", "CUST-A"),
            order("ORD-2", "2024-01-02 00:00:00", "CUST-B"),
            order("ORD-1", "2024-03-01 00:00:00", "CUST-C"),
        ];
        let kept = deduplicate(orders, DuplicateOrderPolicy::KeepFirst);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].customer_id.as_deref(), Some("CUST-A"));
    }

    #[test]
    fn test_keep_latest_dedup_keeps_first_position() {
        let orders = vec![
            order("ORD-1", "2024-01-01 00:00:00", "CUST-A"),
            order("ORD-2", "2024-01-02 00:00:00", "CUST-B"),
            order("ORD-1", "2024-03-01 00:00:00", "CUST-C"),
            order("ORD-1", "2024-03-01 00:00:00", "CUST-D"),
        ];
        let kept = deduplicate(orders, DuplicateOrderPolicy::KeepLatest);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].customer_id.as_deref(), Some("CUST-C"));
        assert_eq!(kept[1].order_id.as_deref(), Some("ORD-2"));
    }

    #[test]
    fn test_keep_latest_compares_parsed_timestamps() {
        let orders = vec![
            order("ORD-1", "2024-01-02 10:00:00", "CUST-A"),
            order("ORD-1", "2024-01-02T09:00:00", "CUST-B"),
            order("ORD-2", "2024-01-02T09:00:00", "CUST-C"),
            order("ORD-2", "2024-01-02 10:00:00", "CUST-D"),
        ];
        let kept = deduplicate(orders, DuplicateOrderPolicy::KeepLatest);
        let customers: Vec<_> = kept.iter().map(|o| o.customer_id.as_deref()).collect();
        assert_eq!(customers, vec![Some("CUST-A"), Some("CUST-D")]);
    }

    #[test]
    fn test_keep_latest_ranks_unparseable_timestamps_oldest() {
        let orders = vec![
            order("ORD-1", "not a time", "CUST-A"),
            order("ORD-1", "2024-01-02", "CUST-B"),
            order("ORD-1", "garbage", "CUST-C"),
            order("ORD-2", "2024-06-01T00:30:00+02:00", "CUST-D"),
            order("ORD-2", "2024-05-31 23:00:00", "CUST-E"),
        ];
        let kept = deduplicate(orders, DuplicateOrderPolicy::KeepLatest);
        let customers: Vec<_> = kept.iter().map(|o| o.customer_id.as_deref()).collect();
        assert_eq!(customers, vec![Some("CUST-B"), Some("CUST-D")]);
    }

    #[test]
    fn test_clamp_discounts() {
        let mut state = CleaningState {
            orders: vec![],
            items: vec![
                item("ORD-1", 1, 1.0, Some(0.65)),
                item("ORD-1", 1, 1.0, Some(-0.1)),
                item("ORD-1", 1, 1.0, Some(0.15)),
                item("ORD-1", 1, 1.0, None),
                item("ORD-1", 1, 1.0, Some(f64::NAN)),
            ],
        };
        let outcome =
            CleaningStep::ClampDiscounts.apply(&mut state, DuplicateOrderPolicy::KeepFirst);

        let discounts: Vec<f64> = state.items.iter().map(|i| i.discount_pct.unwrap()).collect();
        assert_eq!(discounts, vec![0.30, 0.0, 0.15, 0.0, 0.0]);
        assert_eq!(outcome.rows_dropped(), 0);
        assert_eq!(outcome.rows_changed, 4);
    }

    #[test]
    fn test_invalid_items_are_dropped_not_repaired() {
        let mut state = CleaningState {
            orders: vec![],
            items: vec![
                item("ORD-1", 0, 10.0, Some(0.0)),
                item("ORD-1", -1, 10.0, Some(0.0)),
                item("ORD-1", 2, 0.0, Some(0.0)),
                item("ORD-1", 2, -3.0, Some(0.0)),
                item("ORD-1", 2, 3.0, Some(0.0)),
            ],
        };
        let outcome =
            CleaningStep::DropInvalidItems.apply(&mut state, DuplicateOrderPolicy::KeepFirst);
        assert_eq!(outcome.rows_in, 5);
        assert_eq!(outcome.rows_out, 1);
        assert_eq!(state.items[0].quantity, Some(2));
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "latest".parse::<DuplicateOrderPolicy>().unwrap(),
            DuplicateOrderPolicy::KeepLatest
        );
        assert_eq!(DuplicateOrderPolicy::default(), DuplicateOrderPolicy::KeepFirst);
        assert!("best".parse::<DuplicateOrderPolicy>().is_err());
    }
}
