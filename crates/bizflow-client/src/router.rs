//! # Cache Invalidation Router
//!
//! Turns a decoded push event into stale cache entries and a toast.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Routing One Event                               │
//! │                                                                         │
//! │  StreamEvent ──► invalidation_keys(kind) ──► QueryCache::invalidate    │
//! │       │                                       (marks stale, no fetch)   │
//! │       │                                                                 │
//! │       └────────► Toast::for_event(locale) ──► ToastSink::show          │
//! │                  (STOCK_ADJUSTED: none)                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bizflow_core::invalidation::invalidation_keys;
use bizflow_core::{CacheKey, Locale, StreamEvent, Toast};
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::QueryCache;
use crate::toasts::ToastSink;

/// What routing one event did.
#[derive(Debug, Clone, PartialEq)]
pub struct Routed {
    pub invalidated: Vec<CacheKey>,
    pub toast: Option<Toast>,
}

#[derive(Clone)]
pub struct InvalidationRouter {
    cache: QueryCache,
    toasts: Arc<dyn ToastSink>,
    locale: Locale,
}

impl InvalidationRouter {
    pub fn new(cache: QueryCache, toasts: Arc<dyn ToastSink>, locale: Locale) -> Self {
        InvalidationRouter {
            cache,
            toasts,
            locale,
        }
    }

    /// Invalidates every key mapped to the event's kind, then raises its toast.
    pub fn route(&self, event: &StreamEvent) -> Routed {
        let kind = event.kind();
        let invalidated = invalidation_keys(kind);

        for key in &invalidated {
            self.cache.invalidate(key);
        }
        info!(event_type = %kind, keys = invalidated.len(), "Routed stream event");

        let toast = Toast::for_event(event, self.locale);
        if let Some(toast) = &toast {
            debug!(title = %toast.title, "Raising toast for stream event");
            self.toasts.show(toast.clone());
        }

        Routed { invalidated, toast }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toasts::ChannelToasts;
    use bizflow_core::events::{DebtRepaid, OrderCreated, StockAdjusted};
    use bizflow_core::invalidation::keys;
    use bizflow_core::{MajorAmount, ToastVariant};

    fn seeded_cache() -> QueryCache {
        let cache = QueryCache::new();
        for name in [keys::ORDERS, keys::DASHBOARD_STATS, keys::INVENTORY, keys::DEBTS] {
            cache.set(CacheKey::root(name), ());
        }
        cache
    }

    #[test]
    fn test_order_created_invalidates_and_toasts_once() {
        let cache = seeded_cache();
        let (sink, mut toasts) = ChannelToasts::new();
        let router = InvalidationRouter::new(cache.clone(), Arc::new(sink), Locale::ViVn);

        let event = StreamEvent::OrderCreated(OrderCreated {
            order_code: "A1".to_string(),
            customer_name: None,
            total_amount: MajorAmount::from_major(50_000),
        });
        router.route(&event);

        for name in [keys::ORDERS, keys::DASHBOARD_STATS, keys::INVENTORY] {
            assert_eq!(cache.is_stale(&CacheKey::root(name)), Some(true), "{}", name);
        }
        assert_eq!(cache.is_stale(&CacheKey::root(keys::DEBTS)), Some(false));

        let toast = toasts.try_recv().unwrap();
        assert!(toast.text().contains("A1"));
        assert!(toasts.try_recv().is_err());
    }

    #[test]
    fn test_debt_repaid_routing() {
        let cache = seeded_cache();
        let (sink, mut toasts) = ChannelToasts::new();
        let router = InvalidationRouter::new(cache.clone(), Arc::new(sink), Locale::ViVn);

        let routed = router.route(&StreamEvent::DebtRepaid(DebtRepaid {
            payment_amount: MajorAmount::from_major(100_000),
            remaining_amount: MajorAmount::default(),
        }));

        assert_eq!(
            routed.invalidated,
            vec![CacheKey::root(keys::DEBTS), CacheKey::root(keys::DASHBOARD_STATS)]
        );
        assert_eq!(cache.is_stale(&CacheKey::root(keys::ORDERS)), Some(false));
        assert_eq!(toasts.try_recv().unwrap().variant, ToastVariant::Success);
    }

    #[test]
    fn test_stock_adjusted_is_silent() {
        let cache = seeded_cache();
        let (sink, mut toasts) = ChannelToasts::new();
        let router = InvalidationRouter::new(cache.clone(), Arc::new(sink), Locale::ViVn);

        let routed = router.route(&StreamEvent::StockAdjusted(StockAdjusted::default()));

        assert!(routed.toast.is_none());
        assert!(toasts.try_recv().is_err());
        assert_eq!(cache.is_stale(&CacheKey::root(keys::INVENTORY)), Some(true));
        assert_eq!(cache.is_stale(&CacheKey::root(keys::DASHBOARD_STATS)), Some(true));
    }

    #[test]
    fn test_repeated_event_is_idempotent_on_cache() {
        let cache = seeded_cache();
        let router = InvalidationRouter::new(
            cache.clone(),
            Arc::new(crate::toasts::NoOpToasts),
            Locale::ViVn,
        );
        let event = StreamEvent::StockAdjusted(StockAdjusted::default());

        router.route(&event);
        let stale_once = cache.stale_keys();
        router.route(&event);
        assert_eq!(cache.stale_keys(), stale_once);
    }
}
