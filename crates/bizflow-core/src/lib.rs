//! # bizflow-core: Pure Client Logic for BizFlow POS
//!
//! The state-consistency engine of the BizFlow web client, with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        BizFlow Client                                   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Web Shell (screens, dialogs)                 │   │
//! │  │    POS screen ──► Checkout ──► Notification bell ──► Toasts    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 bizflow-client (async I/O)                      │   │
//! │  │   persistence, SSE consumer, query cache, notification poller  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ bizflow-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌────────┐ ┌────────┐ ┌────────┐ ┌──────────────┐ ┌───────┐ │   │
//! │  │   │ money  │ │  cart  │ │ events │ │ invalidation │ │ toast │ │   │
//! │  │   └────────┘ └────────┘ └────────┘ └──────────────┘ └───────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • NO TIMERS • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money and quantity with integer arithmetic
//! - [`types`] - Catalog, customer, payment and tax types
//! - [`cart`] - The cart and every Cart Engine operation
//! - [`events`] - Push event tagged union and its decoder
//! - [`invalidation`] - Static event → cache key table
//! - [`notification`] - Notification model and unread derivation
//! - [`locale`] - Currency formatting and toast text
//! - [`toast`] - Toast values raised for the web shell
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use bizflow_core::cart::Cart;
//! use bizflow_core::money::{Money, Quantity};
//! use bizflow_core::types::{Product, ProductUnit};
//!
//! let unit = ProductUnit { unit_id: 1, unit_name: "Cái".into(), price: None, conversion_rate: None };
//! let product = Product {
//!     id: 1,
//!     name: "Bút bi".into(),
//!     sell_price: Some(Money::from_minor(100)),
//!     base_price: Money::from_minor(100),
//!     units: vec![unit.clone()],
//! };
//!
//! let mut cart = Cart::new();
//! cart.add_item(&product, &unit);
//! cart.update_quantity(1, Quantity::from_units(3));
//!
//! assert_eq!(cart.subtotal().minor(), 300);
//! assert_eq!(cart.total().minor(), 330); // 10% tax by default
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod events;
pub mod invalidation;
pub mod locale;
pub mod money;
pub mod notification;
pub mod toast;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartItem};
pub use error::{CheckoutError, CoreError, CoreResult};
pub use events::{EventKind, StreamEvent};
pub use invalidation::CacheKey;
pub use locale::Locale;
pub use money::{MajorAmount, Money, Quantity};
pub use notification::{Notification, NotificationList};
pub use toast::{Toast, ToastVariant};
pub use types::*;
