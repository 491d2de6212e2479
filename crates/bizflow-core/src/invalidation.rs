//! # Invalidation Table
//!
//! Static mapping from stream event kind to the cached queries it makes stale.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  EVENT              CACHE KEY PREFIXES                                  │
//! │  ─────              ──────────────────                                  │
//! │  ORDER_CREATED  ──► orders, dashboardStats, inventory                   │
//! │  DEBT_REPAID    ──► debts, dashboardStats                               │
//! │  STOCK_ADJUSTED ──► inventory, dashboardStats                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Keys are prefixes: invalidating `["orders"]` also covers
//! `["orders", "page=2"]`. A sale touches inventory because stock moves as
//! a side effect.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::events::EventKind;

// =============================================================================
// Cache Key
// =============================================================================

/// Hierarchical identifier of a cached query result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(Vec<String>);

impl CacheKey {
    /// A single-segment key such as `orders`.
    pub fn root(name: &str) -> Self {
        CacheKey(vec![name.to_string()])
    }

    /// Appends a segment: `orders` → `orders/page=2`.
    pub fn with(mut self, segment: impl Into<String>) -> Self {
        self.0.push(segment.into());
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// `true` if `prefix` matches this key segment by segment.
    pub fn starts_with(&self, prefix: &CacheKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// Root segments of the query keys the screens use.
pub mod keys {
    pub const ORDERS: &str = "orders";
    pub const DASHBOARD_STATS: &str = "dashboardStats";
    pub const INVENTORY: &str = "inventory";
    pub const DEBTS: &str = "debts";
    pub const NOTIFICATIONS: &str = "notifications";
}

// =============================================================================
// Mapping
// =============================================================================

/// Root keys invalidated by an event of `kind`.
pub fn invalidation_targets(kind: EventKind) -> &'static [&'static str] {
    match kind {
        EventKind::OrderCreated => &[keys::ORDERS, keys::DASHBOARD_STATS, keys::INVENTORY],
        EventKind::DebtRepaid => &[keys::DEBTS, keys::DASHBOARD_STATS],
        EventKind::StockAdjusted => &[keys::INVENTORY, keys::DASHBOARD_STATS],
    }
}

/// [`invalidation_targets`] as cache keys.
pub fn invalidation_keys(kind: EventKind) -> Vec<CacheKey> {
    invalidation_targets(kind)
        .iter()
        .map(|name| CacheKey::root(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_matching() {
        let orders = CacheKey::root(keys::ORDERS);
        let page = CacheKey::root(keys::ORDERS).with("page=2");
        let debts = CacheKey::root(keys::DEBTS);

        assert!(page.starts_with(&orders));
        assert!(orders.starts_with(&orders));
        assert!(!orders.starts_with(&page));
        assert!(!debts.starts_with(&orders));
        assert_eq!(page.to_string(), "orders/page=2");
    }

    #[test]
    fn test_segment_prefix_is_not_string_prefix() {
        let orders = CacheKey::root("orders");
        let order_items = CacheKey::root("ordersArchive");
        assert!(!order_items.starts_with(&orders));
    }

    #[test]
    fn test_order_created_targets() {
        let targets = invalidation_targets(EventKind::OrderCreated);
        assert_eq!(targets, &["orders", "dashboardStats", "inventory"]);
    }

    #[test]
    fn test_every_kind_refreshes_dashboard() {
        for kind in EventKind::ALL {
            assert!(invalidation_keys(kind).contains(&CacheKey::root(keys::DASHBOARD_STATS)));
        }
    }
}
