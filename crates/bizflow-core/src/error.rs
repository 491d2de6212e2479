//! # Error Types
//!
//! Domain-specific error types for bizflow-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bizflow-core errors (this file)                                       │
//! │  ├── CoreError        - Decoding and checkout rule failures            │
//! │  └── CheckoutError    - Why a cart cannot be submitted                 │
//! │                                                                         │
//! │  bizflow-client errors (separate crate)                                │
//! │  └── ClientError      - Storage, transport and API failures            │
//! │                                                                         │
//! │  Flow: CoreError → ClientError → Toast shown by the web shell          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cart mutations never produce errors: unparseable input is a no-op.
//! Errors here come from decoding untrusted frames and from the explicit
//! checkout validation callers run before submitting an order.

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A stream frame named a `type` outside the known event set.
    #[error("Unknown stream event type: {0}")]
    UnknownEventType(String),

    /// A stream frame was not valid JSON or its payload had the wrong shape.
    ///
    /// ## When This Occurs
    /// - Frame body is not JSON at all
    /// - `type` is missing or not a string
    /// - Payload fields are missing or carry the wrong JSON type
    #[error("Malformed stream event: {0}")]
    MalformedEvent(String),

    /// Numeric text typed by the cashier could not be parsed.
    #[error("{field} is not a number: '{input}'")]
    InvalidNumber { field: String, input: String },

    /// The cart failed checkout validation.
    #[error("Checkout rejected: {0}")]
    Checkout(#[from] CheckoutError),
}

// =============================================================================
// Checkout Error
// =============================================================================

/// Reasons a cart cannot be submitted.
///
/// The cart engine itself permits every one of these states; the checkout
/// screen calls [`crate::cart::Cart::validate_for_checkout`] before sending.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckoutError {
    /// Nothing to sell.
    #[error("cart is empty")]
    EmptyCart,

    /// Discount exceeds subtotal plus tax.
    #[error("total is negative ({total})")]
    NegativeTotal { total: Money },

    /// A line carries a zero or negative quantity.
    #[error("product {product_id} has non-positive quantity")]
    NonPositiveQuantity { product_id: i64 },

    /// Customer paid less than the total and the sale is not on credit.
    #[error("paid {paid} is less than total {total}")]
    Underpaid { paid: Money, total: Money },

    /// Debt sales need a known customer to carry the balance.
    #[error("debt sale requires a customer")]
    DebtWithoutCustomer,
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
