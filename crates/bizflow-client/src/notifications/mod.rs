//! # Notifications
//!
//! Timer-driven pull of the server's notification list, independent of the
//! push stream.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   spawn_poller ──every 5s──► NotificationStore::poll                    │
//! │                                   │                                     │
//! │                                   ▼                                     │
//! │                          NotificationApi::list ──► replace list         │
//! │                                                    (last poll wins)     │
//! │                                                                         │
//! │   mark_as_read(id) ──► flag locally ──► POST /{id}/read ──► poll        │
//! │   mark_all_as_read ──► flag locally ──► POST /read-all  ──► poll        │
//! │                                                                         │
//! │   unread count ──► watch channel ──► bell badge ("9+" above nine)       │
//! │                                                                         │
//! │   Failures: cached list kept, error toast, next tick tries again.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod store;

pub use api::{HttpNotificationApi, NotificationApi};
pub use store::{spawn_poller, NotificationStore, PollerHandle};
