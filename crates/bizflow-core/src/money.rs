//! # Money Module
//!
//! Provides the `Money` and `Quantity` types used by the cart engine.
//!
//! ## Why Integers?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │    A cart of 3 × 0.1 kg never sums back to its line totals.            │
//! │                                                                         │
//! │  OUR SOLUTION:                                                          │
//! │    Money    = i64 minor units   (1 đồng, or 1 cent for USD)            │
//! │    Quantity = i64 thousandths   (2.5 kg = 2500)                        │
//! │    line_total = round(unit_price × quantity)  - ONE rounding step      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bizflow_core::money::{Money, Quantity};
//!
//! let price = Money::from_minor(15_000);
//! let qty = Quantity::parse("2.5").unwrap();
//! assert_eq!(price.multiply_quantity(qty).minor(), 37_500);
//! ```
//!
//! ## Overflow
//! Totals saturate at the i64 bounds instead of wrapping. Cart mutations use
//! [`Money::checked_multiply_quantity`] and refuse a line whose total would
//! not fit.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::types::TaxRate;

/// Thousandths per whole quantity unit.
pub const QUANTITY_SCALE: i64 = 1000;

/// Fraction digits kept by [`MajorAmount`].
pub const AMOUNT_SCALE: u32 = 4;

/// Integer division rounding half away from zero.
///
/// Used for every rounding step so that a refund line (negative quantity)
/// rounds symmetrically with the matching sale line.
pub(crate) fn round_div(numerator: i128, denominator: i128) -> i128 {
    let half = denominator / 2;
    if (numerator < 0) != (denominator < 0) {
        (numerator - half) / denominator
    } else {
        (numerator + half) / denominator
    }
}

/// Parses plain decimal text (`"12"`, `"-3.75"`, `" 0.5 "`) into an integer
/// scaled by `10^scale`, rounding any extra fraction digits.
fn parse_scaled(input: &str, scale: u32) -> Option<i64> {
    let text = input.trim();
    if text.is_empty() {
        return None;
    }

    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let (whole, fraction) = match digits.split_once('.') {
        Some((w, f)) => (w, f),
        None => (digits, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let whole: i128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };

    // Keep one guard digit beyond the scale for rounding.
    let keep = (scale + 1) as usize;
    let mut frac_digits: String = fraction.chars().take(keep).collect();
    while frac_digits.len() < keep {
        frac_digits.push('0');
    }
    let frac: i128 = frac_digits.parse().ok()?;

    let factor = 10_i128.pow(scale + 1);
    let raw = whole.checked_mul(factor)?.checked_add(frac)?;
    let scaled = round_div(raw, 10);
    let signed = if negative { -scaled } else { scaled };

    i64::try_from(signed).ok()
}

/// Narrows an intermediate result, clamping to the i64 bounds.
fn saturate(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// The cart is currency-agnostic: for VND the minor unit is one đồng, for USD
/// it is one cent. Only [`crate::locale::Locale`] knows how many decimals to
/// render.
///
/// ## Design Decisions
/// - **i64 (signed)**: A refund line or an oversized discount may go negative
/// - **Single field tuple struct**: Zero-cost abstraction over i64
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Parses an amount typed in major units, e.g. `"15000"` for VND
    /// (`decimals = 0`) or `"12.50"` for USD (`decimals = 2`).
    ///
    /// Returns `None` for anything that is not plain decimal text.
    ///
    /// ## Example
    /// ```rust
    /// use bizflow_core::money::Money;
    ///
    /// assert_eq!(Money::parse_major("12.50", 2), Some(Money::from_minor(1250)));
    /// assert_eq!(Money::parse_major("15000", 0), Some(Money::from_minor(15000)));
    /// assert_eq!(Money::parse_major("abc", 0), None);
    /// ```
    pub fn parse_major(input: &str, decimals: u8) -> Option<Money> {
        parse_scaled(input, decimals as u32).map(Money)
    }

    /// Calculates tax at the given rate, rounding half away from zero.
    ///
    /// ## Example
    /// ```rust
    /// use bizflow_core::money::Money;
    /// use bizflow_core::types::TaxRate;
    ///
    /// let subtotal = Money::from_minor(300);
    /// let tax = subtotal.calculate_tax(TaxRate::from_percentage(10.0));
    /// assert_eq!(tax.minor(), 30);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        // rate.bps() is basis points: 1000 = 10%
        let tax = round_div(self.0 as i128 * rate.bps() as i128, 10_000);
        Money(saturate(tax))
    }

    /// Multiplies a unit price by a (possibly fractional) quantity.
    ///
    /// This is THE definition of a line total; every cart mutation goes
    /// through it so `line_total == quantity × unit_price` holds exactly.
    ///
    /// Returns `None` when the product does not fit in i64.
    pub fn checked_multiply_quantity(&self, qty: Quantity) -> Option<Money> {
        let total = round_div(self.0 as i128 * qty.milli() as i128, QUANTITY_SCALE as i128);
        i64::try_from(total).ok().map(Money)
    }

    /// [`Money::checked_multiply_quantity`], saturating on overflow.
    pub fn multiply_quantity(&self, qty: Quantity) -> Money {
        let total = round_div(self.0 as i128 * qty.milli() as i128, QUANTITY_SCALE as i128);
        Money(saturate(total))
    }

    /// Reads an amount from a JSON number or numeric string.
    ///
    /// The server serializes decimals inconsistently (`50000`, `50000.0`,
    /// `"50000.00"`), so catalog prices go through this instead of the
    /// derive. The value is taken as minor units.
    pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Money, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        let value = serde_json::Value::deserialize(deserializer)?;
        match &value {
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Money(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Money(f.round() as i64))
                } else {
                    Err(D::Error::custom(format!("amount out of range: {}", n)))
                }
            }
            serde_json::Value::String(s) => Money::parse_major(s, 0)
                .ok_or_else(|| D::Error::custom(format!("amount is not numeric: '{}'", s))),
            other => Err(D::Error::custom(format!("expected amount, got {}", other))),
        }
    }
}

/// [`Money::deserialize_lenient`] for optional fields; `null` maps to `None`.
pub fn deserialize_lenient_opt<'de, D>(deserializer: D) -> Result<Option<Money>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Lenient(#[serde(deserialize_with = "Money::deserialize_lenient")] Money);

    Ok(Option::<Lenient>::deserialize(deserializer)?.map(|Lenient(m)| m))
}

/// Plain minor-unit rendering for logs and error messages.
///
/// User-facing text goes through `Locale::format_currency`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        *self = *self - other;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(self.0.saturating_neg())
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Major Amount
// =============================================================================

/// An amount in major currency units, as the server reports it in push
/// events (`50000` đồng, `1234.56` dollars).
///
/// Held exactly in ten-thousandths so a float on the wire is never rounded
/// before the display currency is known. [`MajorAmount::to_minor`] turns it
/// into [`Money`] for a given number of currency decimals.
///
/// ```text
///   wire 1234.56 ──► MajorAmount(12_345_600) ──┬─► to_minor(2) = 123_456 ¢
///                                              └─► to_minor(0) = 1_235 đ
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MajorAmount(i64);

impl MajorAmount {
    const FACTOR: i64 = 10_i64.pow(AMOUNT_SCALE);

    /// Whole major units, saturating at the i64 bounds.
    pub const fn from_major(units: i64) -> Self {
        MajorAmount(units.saturating_mul(Self::FACTOR))
    }

    /// Parses plain decimal text; digits beyond the fourth are rounded.
    ///
    /// ## Example
    /// ```rust
    /// use bizflow_core::money::MajorAmount;
    ///
    /// let amount = MajorAmount::parse("1234.56").unwrap();
    /// assert_eq!(amount.to_minor(2).minor(), 123_456);
    /// assert_eq!(MajorAmount::parse("1,234"), None);
    /// ```
    pub fn parse(input: &str) -> Option<Self> {
        parse_scaled(input, AMOUNT_SCALE).map(MajorAmount)
    }

    /// Converts to minor units of a currency with `decimals` fraction
    /// digits, rounding half away from zero.
    pub fn to_minor(&self, decimals: u8) -> Money {
        let decimals = u32::from(decimals);
        let value = self.0 as i128;
        let minor = if decimals <= AMOUNT_SCALE {
            round_div(value, 10_i128.pow(AMOUNT_SCALE - decimals))
        } else {
            value.saturating_mul(10_i128.pow((decimals - AMOUNT_SCALE).min(18)))
        };
        Money(saturate(minor))
    }

    fn from_f64(value: f64) -> Option<Self> {
        let scaled = (value * Self::FACTOR as f64).round();
        if scaled.is_finite() && scaled.abs() < i64::MAX as f64 {
            Some(MajorAmount(scaled as i64))
        } else {
            None
        }
    }

    fn as_f64(&self) -> f64 {
        self.0 as f64 / Self::FACTOR as f64
    }
}

impl Serialize for MajorAmount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_f64(self.as_f64())
    }
}

/// Accepts a JSON number or numeric string (`50000`, `1234.56`, `"200000.00"`).
impl<'de> Deserialize<'de> for MajorAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        let value = serde_json::Value::deserialize(deserializer)?;
        let amount = match &value {
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => i.checked_mul(Self::FACTOR).map(MajorAmount),
                None => MajorAmount::parse(&n.to_string())
                    .or_else(|| n.as_f64().and_then(MajorAmount::from_f64)),
            },
            serde_json::Value::String(s) => MajorAmount::parse(s),
            other => return Err(D::Error::custom(format!("expected amount, got {}", other))),
        };
        amount.ok_or_else(|| D::Error::custom(format!("amount out of range: {}", value)))
    }
}

impl fmt::Display for MajorAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_f64())
    }
}

// =============================================================================
// Quantity Type
// =============================================================================

/// A cart quantity in thousandths of a unit.
///
/// Fractional quantities are normal (0.5 kg of sugar). Negative quantities
/// are accepted as-is: the engine performs no clamping, callers validate
/// before checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Quantity(i64);

impl Quantity {
    /// One whole unit.
    pub const ONE: Quantity = Quantity(QUANTITY_SCALE);

    /// Creates a quantity from whole units.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Quantity(units * QUANTITY_SCALE)
    }

    /// Creates a quantity from thousandths.
    #[inline]
    pub const fn from_milli(milli: i64) -> Self {
        Quantity(milli)
    }

    /// Returns the quantity in thousandths.
    #[inline]
    pub const fn milli(&self) -> i64 {
        self.0
    }

    /// Checks if the quantity is zero or negative.
    #[inline]
    pub const fn is_non_positive(&self) -> bool {
        self.0 <= 0
    }

    /// Parses quantity text typed into the cart table.
    ///
    /// ## Example
    /// ```rust
    /// use bizflow_core::money::Quantity;
    ///
    /// assert_eq!(Quantity::parse("3"), Some(Quantity::from_units(3)));
    /// assert_eq!(Quantity::parse("0.25"), Some(Quantity::from_milli(250)));
    /// assert_eq!(Quantity::parse("three"), None);
    /// ```
    pub fn parse(input: &str) -> Option<Quantity> {
        parse_scaled(input, 3).map(Quantity)
    }
}

impl Add for Quantity {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Quantity(self.0.saturating_add(other.0))
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Quantity(0)
    }
}

/// Renders without trailing zeros: `2`, `2.5`, `0.125`.
impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / QUANTITY_SCALE as u64;
        let frac = abs % QUANTITY_SCALE as u64;
        if frac == 0 {
            write!(f, "{}{}", sign, whole)
        } else {
            let digits = format!("{:03}", frac);
            write!(f, "{}{}.{}", sign, whole, digits.trim_end_matches('0'))
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
