//! # Domain Types
//!
//! Catalog, customer and payment types the cart is built from.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌──────────────────┐      │
//! │  │    Product      │   │  ProductUnit    │   │ SelectedCustomer │      │
//! │  │  ─────────────  │   │  ─────────────  │   │  ──────────────  │      │
//! │  │  id             │──►│  unit_id        │   │  id              │      │
//! │  │  name           │   │  unit_name      │   │  full_name       │      │
//! │  │  sell_price     │   │  price          │   │  phone           │      │
//! │  │  base_price     │   │  conversion     │   └──────────────────┘      │
//! │  │  units[]        │   └─────────────────┘                             │
//! │  └─────────────────┘                                                   │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │    TaxRate      │   │ PaymentMethod   │                             │
//! │  │  bps (u32)      │   │  CASH, CARD,    │                             │
//! │  │  1000 = 10%     │   │  BANK_TRANSFER… │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Identifiers are the server's integer primary keys; the client never mints
//! its own.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

/// Server-side product identifier.
pub type ProductId = i64;

/// Server-side unit-of-measure identifier.
pub type UnitId = i64;

/// Server-side customer identifier.
pub type CustomerId = i64;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1000 bps = 10% (the default VAT rate on a new cart)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage.
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round().max(0.0) as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    /// New carts start at 10% VAT.
    fn default() -> Self {
        TaxRate(1000)
    }
}

// =============================================================================
// Product
// =============================================================================

/// One sellable unit of measure for a product (box, pack, piece…).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductUnit {
    pub unit_id: UnitId,

    #[serde(default)]
    pub unit_name: String,

    /// Price for this unit. `None` means "keep whatever price the line has".
    #[serde(default, deserialize_with = "crate::money::deserialize_lenient_opt")]
    pub price: Option<Money>,

    /// How many base units this unit holds (1 box = 24 cans).
    #[serde(default)]
    pub conversion_rate: Option<i64>,
}

/// A product as returned by the catalog search, with its unit alternatives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    pub id: ProductId,
    pub name: String,

    /// Shelf price; takes precedence over `base_price` when non-zero.
    #[serde(default, deserialize_with = "crate::money::deserialize_lenient_opt")]
    pub sell_price: Option<Money>,

    #[serde(default, deserialize_with = "Money::deserialize_lenient")]
    pub base_price: Money,

    #[serde(default)]
    pub units: Vec<ProductUnit>,
}

impl Product {
    /// Price a new cart line starts at, whatever unit was picked.
    ///
    /// A zero `sell_price` counts as "not set".
    pub fn default_price(&self) -> Money {
        match self.sell_price {
            Some(price) if !price.is_zero() => price,
            _ => self.base_price,
        }
    }
}

// =============================================================================
// Customer
// =============================================================================

/// The customer attached to the sale. `None` on the cart means walk-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SelectedCustomer {
    pub id: CustomerId,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

// =============================================================================
// Payment Method
// =============================================================================

/// Payment method tag sent with the order.
///
/// Unknown tags are preserved verbatim so a newer server's tag survives a
/// reload on an older client.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentMethod {
    #[default]
    Cash,
    BankTransfer,
    Card,
    EWallet,
    Other(String),
}

impl PaymentMethod {
    /// Wire tag for this method.
    pub fn as_str(&self) -> &str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::Card => "CARD",
            PaymentMethod::EWallet => "E_WALLET",
            PaymentMethod::Other(tag) => tag,
        }
    }
}

impl From<String> for PaymentMethod {
    fn from(tag: String) -> Self {
        match tag.to_uppercase().as_str() {
            "CASH" => PaymentMethod::Cash,
            "BANK_TRANSFER" | "TRANSFER" => PaymentMethod::BankTransfer,
            "CARD" => PaymentMethod::Card,
            "E_WALLET" | "EWALLET" => PaymentMethod::EWallet,
            _ => PaymentMethod::Other(tag),
        }
    }
}

impl From<&str> for PaymentMethod {
    fn from(tag: &str) -> Self {
        PaymentMethod::from(tag.to_string())
    }
}

impl From<PaymentMethod> for String {
    fn from(method: PaymentMethod) -> Self {
        method.as_str().to_string()
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
