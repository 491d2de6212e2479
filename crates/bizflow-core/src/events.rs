//! # Stream Events
//!
//! The closed set of events the server pushes over the per-session stream.
//!
//! ## Wire Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Push Channel Frames                               │
//! │                                                                         │
//! │  event: update                                                          │
//! │  data: {"type":"ORDER_CREATED","payload":{"order_code":"A1",…}}         │
//! │        └──────────── decoded by StreamEvent::decode ────────────┘       │
//! │                                                                         │
//! │  event: ping                                                            │
//! │  data: {}            ◄── heartbeat, never decoded                       │
//! │                                                                         │
//! │  TYPE             PAYLOAD                                               │
//! │  ────             ───────                                               │
//! │  ORDER_CREATED    { order_code, customer_name?, total_amount }          │
//! │  DEBT_REPAID      { payment_amount, remaining_amount }                  │
//! │  STOCK_ADJUSTED   { }  (extra fields ignored)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Decoding is two-step: the envelope is read first so an unknown `type` is
//! reported as [`CoreError::UnknownEventType`] rather than as a shape error.
//!
//! Payload amounts are major currency units and decode to [`MajorAmount`];
//! the display currency picks the minor-unit scale later.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};
use crate::money::MajorAmount;

/// Frame name carrying a JSON `{type, payload}` body.
pub const UPDATE_FRAME: &str = "update";

/// Frame name of the keep-alive heartbeat.
pub const HEARTBEAT_FRAME: &str = "ping";

// =============================================================================
// Event Kind
// =============================================================================

/// The semantic type of a stream event, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    OrderCreated,
    DebtRepaid,
    StockAdjusted,
}

impl EventKind {
    /// Every known kind, in wire-table order.
    pub const ALL: [EventKind; 3] = [
        EventKind::OrderCreated,
        EventKind::DebtRepaid,
        EventKind::StockAdjusted,
    ];

    /// Wire tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::OrderCreated => "ORDER_CREATED",
            EventKind::DebtRepaid => "DEBT_REPAID",
            EventKind::StockAdjusted => "STOCK_ADJUSTED",
        }
    }
}

impl FromStr for EventKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ORDER_CREATED" => Ok(EventKind::OrderCreated),
            "DEBT_REPAID" => Ok(EventKind::DebtRepaid),
            "STOCK_ADJUSTED" => Ok(EventKind::StockAdjusted),
            other => Err(CoreError::UnknownEventType(other.to_string())),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payloads
// =============================================================================

/// A sale was recorded, possibly on another terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreated {
    #[serde(deserialize_with = "string_or_number")]
    pub order_code: String,

    /// `None` (or blank) for a walk-in sale.
    #[serde(default)]
    pub customer_name: Option<String>,

    pub total_amount: MajorAmount,
}

impl OrderCreated {
    /// Customer name if the sale named one.
    pub fn named_customer(&self) -> Option<&str> {
        self.customer_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// A customer paid down an outstanding debt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtRepaid {
    pub payment_amount: MajorAmount,
    pub remaining_amount: MajorAmount,
}

/// Stock levels changed outside of a sale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockAdjusted {}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("expected string, got {}", other))),
    }
}

// =============================================================================
// Stream Event (Tagged Union)
// =============================================================================

/// A decoded push event.
///
/// Serializes adjacently tagged: `{ "type": "ORDER_CREATED", "payload": {…} }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamEvent {
    OrderCreated(OrderCreated),
    DebtRepaid(DebtRepaid),
    StockAdjusted(StockAdjusted),
}

/// Envelope read before the payload shape is known.
#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    payload: serde_json::Value,
}

impl StreamEvent {
    /// Decodes the body of an `update` frame.
    ///
    /// ## Errors
    /// - [`CoreError::MalformedEvent`]: not JSON, no string `type`, or a
    ///   payload that does not fit the type
    /// - [`CoreError::UnknownEventType`]: a `type` outside [`EventKind::ALL`]
    pub fn decode(data: &str) -> CoreResult<StreamEvent> {
        let raw: RawEvent =
            serde_json::from_str(data).map_err(|e| CoreError::MalformedEvent(e.to_string()))?;

        let kind: EventKind = raw.event_type.parse()?;

        let payload = match raw.payload {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            other => other,
        };

        let malformed = |e: serde_json::Error| CoreError::MalformedEvent(format!("{}: {}", kind, e));
        let event = match kind {
            EventKind::OrderCreated => {
                StreamEvent::OrderCreated(serde_json::from_value(payload).map_err(malformed)?)
            }
            EventKind::DebtRepaid => {
                StreamEvent::DebtRepaid(serde_json::from_value(payload).map_err(malformed)?)
            }
            EventKind::StockAdjusted => {
                StreamEvent::StockAdjusted(serde_json::from_value(payload).map_err(malformed)?)
            }
        };

        Ok(event)
    }

    /// Encodes as the body of an `update` frame.
    pub fn to_json(&self) -> CoreResult<String> {
        serde_json::to_string(self).map_err(|e| CoreError::MalformedEvent(e.to_string()))
    }

    pub fn kind(&self) -> EventKind {
        match self {
            StreamEvent::OrderCreated(_) => EventKind::OrderCreated,
            StreamEvent::DebtRepaid(_) => EventKind::DebtRepaid,
            StreamEvent::StockAdjusted(_) => EventKind::StockAdjusted,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_order_created() {
        let event =
            StreamEvent::decode(r#"{"type":"ORDER_CREATED","payload":{"order_code":"A1","total_amount":50000}}"#)
                .unwrap();

        match &event {
            StreamEvent::OrderCreated(order) => {
                assert_eq!(order.order_code, "A1");
                assert_eq!(order.total_amount, MajorAmount::from_major(50_000));
                assert_eq!(order.named_customer(), None);
            }
            other => panic!("Expected OrderCreated, got {:?}", other),
        }
        assert_eq!(event.kind(), EventKind::OrderCreated);
    }

    #[test]
    fn test_decode_debt_repaid_with_string_amounts() {
        let event = StreamEvent::decode(
            r#"{"type":"DEBT_REPAID","payload":{"payment_amount":"200000.00","remaining_amount":0}}"#,
        )
        .unwrap();

        assert_eq!(
            event,
            StreamEvent::DebtRepaid(DebtRepaid {
                payment_amount: MajorAmount::from_major(200_000),
                remaining_amount: MajorAmount::default(),
            })
        );
    }

    #[test]
    fn test_decode_keeps_fractional_amounts() {
        let event = StreamEvent::decode(
            r#"{"type":"ORDER_CREATED","payload":{"order_code":"A1","total_amount":1234.56}}"#,
        )
        .unwrap();
        match event {
            StreamEvent::OrderCreated(order) => {
                assert_eq!(order.total_amount, MajorAmount::parse("1234.56").unwrap());
                assert_eq!(order.total_amount.to_minor(2).minor(), 123_456);
            }
            other => panic!("Expected OrderCreated, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_stock_adjusted_ignores_payload() {
        for body in [
            r#"{"type":"STOCK_ADJUSTED","payload":{}}"#,
            r#"{"type":"STOCK_ADJUSTED","payload":null}"#,
            r#"{"type":"STOCK_ADJUSTED"}"#,
            r#"{"type":"STOCK_ADJUSTED","payload":{"product_id":9,"delta":-3}}"#,
        ] {
            let event = StreamEvent::decode(body).unwrap();
            assert_eq!(event.kind(), EventKind::StockAdjusted);
        }
    }

    #[test]
    fn test_unknown_type_is_reported_as_unknown() {
        let err = StreamEvent::decode(r#"{"type":"UNKNOWN_X","payload":{}}"#).unwrap_err();
        assert!(matches!(err, CoreError::UnknownEventType(t) if t == "UNKNOWN_X"));
    }

    #[test]
    fn test_malformed_bodies() {
        for body in [
            "not json",
            "{}",
            r#"{"type":42}"#,
            r#"{"type":"ORDER_CREATED","payload":{"order_code":"A1"}}"#,
            r#"{"type":"DEBT_REPAID","payload":{"payment_amount":true,"remaining_amount":0}}"#,
        ] {
            let err = StreamEvent::decode(body).unwrap_err();
            assert!(matches!(err, CoreError::MalformedEvent(_)), "body: {}", body);
        }
    }

    #[test]
    fn test_numeric_order_code_and_blank_customer() {
        let event = StreamEvent::decode(
            r#"{"type":"ORDER_CREATED","payload":{"order_code":1024,"customer_name":"  ","total_amount":1}}"#,
        )
        .unwrap();
        match event {
            StreamEvent::OrderCreated(order) => {
                assert_eq!(order.order_code, "1024");
                assert_eq!(order.named_customer(), None);
            }
            other => panic!("Expected OrderCreated, got {:?}", other),
        }
    }

    #[test]
    fn test_encoded_event_decodes_back() {
        let event = StreamEvent::OrderCreated(OrderCreated {
            order_code: "HD-001".to_string(),
            customer_name: Some("Lê Văn C".to_string()),
            total_amount: MajorAmount::parse("125000.50").unwrap(),
        });
        let json = event.to_json().unwrap();
        assert!(json.contains(r#""type":"ORDER_CREATED""#));
        assert_eq!(StreamEvent::decode(&json).unwrap(), event);
    }

    #[test]
    fn test_event_kind_tags() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert!("order_created".parse::<EventKind>().is_err());
    }
}
