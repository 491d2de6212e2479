//! # Locale
//!
//! Currency formatting and the fixed user-facing strings of the engine.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  LOCALE   MINOR UNIT   FORMAT          WALK-IN LABEL                    │
//! │  ──────   ──────────   ──────          ─────────────                    │
//! │  vi-VN    1 đồng       1.234.567đ      Khách lẻ                         │
//! │  en-US    1 cent       $12,345.67      Walk-in customer                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::money::{MajorAmount, Money};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "vi-VN")]
    ViVn,
    #[serde(rename = "en-US")]
    EnUs,
}

impl Locale {
    pub fn tag(&self) -> &'static str {
        match self {
            Locale::ViVn => "vi-VN",
            Locale::EnUs => "en-US",
        }
    }

    /// Digits after the decimal point in the currency's minor unit.
    pub fn currency_decimals(&self) -> u8 {
        match self {
            Locale::ViVn => 0,
            Locale::EnUs => 2,
        }
    }

    /// Converts a major-unit amount into this currency's minor units.
    pub fn to_minor(&self, amount: MajorAmount) -> Money {
        amount.to_minor(self.currency_decimals())
    }

    /// Formats an amount held in minor units.
    ///
    /// ## Example
    /// ```rust
    /// use bizflow_core::locale::Locale;
    /// use bizflow_core::money::Money;
    ///
    /// assert_eq!(Locale::ViVn.format_currency(Money::from_minor(50_000)), "50.000đ");
    /// assert_eq!(Locale::EnUs.format_currency(Money::from_minor(123_456)), "$1,234.56");
    /// ```
    pub fn format_currency(&self, amount: Money) -> String {
        let sign = if amount.is_negative() { "-" } else { "" };
        let abs = amount.minor().unsigned_abs();

        match self {
            Locale::ViVn => format!("{}{}đ", sign, group_digits(abs, '.')),
            Locale::EnUs => format!(
                "{}${}.{:02}",
                sign,
                group_digits(abs / 100, ','),
                abs % 100
            ),
        }
    }

    /// Shown in place of a missing customer name.
    pub fn walk_in_label(&self) -> &'static str {
        match self {
            Locale::ViVn => "Khách lẻ",
            Locale::EnUs => "Walk-in customer",
        }
    }

    // =========================================================================
    // Toast Text
    // =========================================================================

    pub fn order_created_title(&self) -> &'static str {
        match self {
            Locale::ViVn => "Đơn hàng mới",
            Locale::EnUs => "New order",
        }
    }

    pub fn order_created_description(&self, order_code: &str, customer: &str, total: Money) -> String {
        let total = self.format_currency(total);
        match self {
            Locale::ViVn => format!(
                "Đơn hàng {} vừa được tạo cho {}. Tổng: {}",
                order_code, customer, total
            ),
            Locale::EnUs => format!("Order {} was created for {}. Total: {}", order_code, customer, total),
        }
    }

    pub fn debt_repaid_title(&self) -> &'static str {
        match self {
            Locale::ViVn => "Thanh toán công nợ",
            Locale::EnUs => "Debt payment",
        }
    }

    pub fn debt_repaid_description(&self, paid: Money, remaining: Money) -> String {
        let paid = self.format_currency(paid);
        let remaining = self.format_currency(remaining);
        match self {
            Locale::ViVn => format!("Khoản nợ đã được thanh toán {}. Còn lại: {}", paid, remaining),
            Locale::EnUs => format!("A debt payment of {} was received. Remaining: {}", paid, remaining),
        }
    }

    pub fn notifications_load_failed(&self) -> &'static str {
        match self {
            Locale::ViVn => "Không thể tải thông báo",
            Locale::EnUs => "Could not load notifications",
        }
    }

    pub fn notifications_update_failed(&self) -> &'static str {
        match self {
            Locale::ViVn => "Không thể cập nhật thông báo",
            Locale::EnUs => "Could not update notifications",
        }
    }

    pub fn cart_restore_failed(&self) -> &'static str {
        match self {
            Locale::ViVn => "Không thể khôi phục giỏ hàng",
            Locale::EnUs => "Could not restore the cart",
        }
    }

    pub fn try_again_later(&self) -> &'static str {
        match self {
            Locale::ViVn => "Vui lòng thử lại sau.",
            Locale::EnUs => "Please try again later.",
        }
    }
}

/// `1234567` → `1.234.567` with `sep = '.'`.
fn group_digits(value: u64, sep: char) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(sep);
        }
        out.push(c);
    }
    out
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "vi-vn" | "vi" => Ok(Locale::ViVn),
            "en-us" | "en" => Ok(Locale::EnUs),
            other => Err(format!("unsupported locale: {}", other)),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
