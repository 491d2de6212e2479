//! # Toasts
//!
//! Transient, user-facing messages raised by the engine.
//!
//! A `Toast` is plain data; the client crate hands it to whatever sink the
//! web shell registered.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::events::StreamEvent;
use crate::locale::Locale;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ToastVariant {
    Success,
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Toast {
    pub title: String,
    pub description: Option<String>,
    pub variant: ToastVariant,
}

impl Toast {
    pub fn new(variant: ToastVariant, title: impl Into<String>, description: Option<String>) -> Self {
        Toast {
            title: title.into(),
            description,
            variant,
        }
    }

    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(ToastVariant::Success, title, Some(description.into()))
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(ToastVariant::Error, title, Some(description.into()))
    }

    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(ToastVariant::Warning, title, Some(description.into()))
    }

    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(ToastVariant::Info, title, Some(description.into()))
    }

    /// The toast a push event raises, if any.
    ///
    /// Stock adjustments only refresh views and stay silent.
    pub fn for_event(event: &StreamEvent, locale: Locale) -> Option<Toast> {
        match event {
            StreamEvent::OrderCreated(order) => {
                let customer = order.named_customer().unwrap_or(locale.walk_in_label());
                Some(Toast::info(
                    locale.order_created_title(),
                    locale.order_created_description(
                        &order.order_code,
                        customer,
                        locale.to_minor(order.total_amount),
                    ),
                ))
            }
            StreamEvent::DebtRepaid(debt) => Some(Toast::success(
                locale.debt_repaid_title(),
                locale.debt_repaid_description(
                    locale.to_minor(debt.payment_amount),
                    locale.to_minor(debt.remaining_amount),
                ),
            )),
            StreamEvent::StockAdjusted(_) => None,
        }
    }

    /// Title plus description, for logs and assertions.
    pub fn text(&self) -> String {
        match &self.description {
            Some(description) => format!("{}: {}", self.title, description),
            None => self.title.clone(),
        }
    }
}
