//! # Notifications
//!
//! Server-owned messages and the client's read-through copy of them.
//!
//! The list is whatever the last successful poll returned (newest first,
//! at most 50). Local mutations are optimistic: they flip read flags in
//! place until the next poll replaces the whole list.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

/// Server-side notification identifier.
pub type NotificationId = i64;

/// Unread counts above this render as `"9+"`.
pub const BADGE_CAP: usize = 9;

/// One asynchronously delivered message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub message: String,

    /// `DRAFT_ORDER`, `LOW_STOCK`, `DEBT_WARNING`, `SYSTEM`, `OTHER`.
    #[serde(default)]
    pub notification_type: Option<String>,

    #[serde(default)]
    pub reference_type: Option<String>,

    #[serde(default)]
    pub reference_id: Option<i64>,

    #[serde(rename = "is_read", default)]
    pub read: bool,

    #[serde(deserialize_with = "deserialize_timestamp")]
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Accepts RFC 3339 or a zone-less ISO timestamp, which is taken as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let text = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&text) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| D::Error::custom(format!("invalid timestamp '{}': {}", text, e)))
}

// =============================================================================
// Notification List
// =============================================================================

/// The cached notification list plus its derived unread figures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationList {
    items: Vec<Notification>,
}

impl NotificationList {
    pub fn new(items: Vec<Notification>) -> Self {
        NotificationList { items }
    }

    /// Replaces the list with a poll result. Order is kept as received.
    pub fn replace(&mut self, items: Vec<Notification>) {
        self.items = items;
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn get(&self, id: NotificationId) -> Option<&Notification> {
        self.items.iter().find(|n| n.id == id)
    }

    /// Flags one notification read locally.
    ///
    /// Returns `true` if the notification was present and unread.
    pub fn mark_read(&mut self, id: NotificationId) -> bool {
        match self.items.iter_mut().find(|n| n.id == id) {
            Some(n) if !n.read => {
                n.read = true;
                true
            }
            _ => false,
        }
    }

    /// Flags everything read locally. Returns how many flags changed.
    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for n in self.items.iter_mut().filter(|n| !n.read) {
            n.read = true;
            changed += 1;
        }
        changed
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.read).count()
    }

    pub fn has_unread(&self) -> bool {
        self.items.iter().any(|n| !n.read)
    }

    /// Bell badge text, `None` when there is nothing unread.
    pub fn badge_label(&self) -> Option<String> {
        badge_label(self.unread_count())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Renders an unread count for the bell badge: `1`..`9`, then `9+`.
pub fn badge_label(unread: usize) -> Option<String> {
    match unread {
        0 => None,
        n if n > BADGE_CAP => Some(format!("{}+", BADGE_CAP)),
        n => Some(n.to_string()),
    }
}
