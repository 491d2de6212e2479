//! # bizflow-client: Runtime of the BizFlow POS Client
//!
//! Everything in the client that touches the outside world: local storage,
//! the push channel, the notification REST surface, and the timers that
//! drive them. Pure logic lives in `bizflow-core`.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         ClientApp (app.rs)                              │
//! │                                                                         │
//! │  ┌────────────────┐   ┌─────────────────────┐   ┌───────────────────┐  │
//! │  │  CartEngine    │   │ EventStreamConsumer │   │ NotificationStore │  │
//! │  │                │   │                     │   │                   │  │
//! │  │ Cart ops from  │   │ SseTransport        │   │ poller (5s)       │  │
//! │  │ bizflow-core,  │   │   │ frames          │   │ mark read         │  │
//! │  │ saved on every │   │   ▼                 │   │ (optimistic)      │  │
//! │  │ change         │   │ InvalidationRouter  │   │ unread badge      │  │
//! │  └───────┬────────┘   └──────┬────────┬─────┘   └────────┬──────────┘  │
//! │          │                   │        │                  │             │
//! │          ▼                   ▼        ▼                  ▼             │
//! │  ┌────────────────┐   ┌────────────┐ ┌────────────────────────────┐   │
//! │  │  BlobStore     │   │ QueryCache │ │ ToastSink                  │   │
//! │  │ bizflow-pos    │   │ (stale     │ │ (rendered by the web shell)│   │
//! │  │ bizflow-auth   │   │  flags)    │ │                            │   │
//! │  └────────────────┘   └────────────┘ └────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`app`] - Composition root and session lifecycle
//! - [`config`] - TOML + environment configuration
//! - [`engine`] - Persisted cart engine
//! - [`persistence`] - Blob stores and the versioned state envelope
//! - [`session`] - Auth state and the shared bearer token
//! - [`transport`] - SSE client with reconnection
//! - [`consumer`] - Push channel state machine and frame dispatch
//! - [`router`] - Event → cache invalidation + toast
//! - [`cache`] - Lazily invalidated query cache
//! - [`notifications`] - REST client, store, and poller
//! - [`toasts`] - Toast delivery
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bizflow_client::{ClientApp, ClientConfig};
//!
//! bizflow_client::init_tracing();
//! let config = ClientConfig::load_or_default(None);
//! let app = ClientApp::builder(config).build()?;
//! app.bootstrap().await;
//!
//! app.login(user, token).await?;
//! app.cart().add_item(&product, &unit);
//! println!("Total: {}", app.locale().format_currency(app.cart().total()));
//! ```

use tracing_subscriber::EnvFilter;

// =============================================================================
// Module Declarations
// =============================================================================

pub mod app;
pub mod cache;
pub mod config;
pub mod consumer;
pub mod engine;
pub mod error;
pub mod notifications;
pub mod persistence;
pub mod router;
pub mod session;
pub mod toasts;
pub mod transport;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use app::{ClientApp, ClientAppBuilder};
pub use cache::QueryCache;
pub use config::{ClientConfig, ReconnectPolicy};
pub use consumer::{EventStreamConsumer, StreamState};
pub use engine::CartEngine;
pub use error::{ClientError, ClientResult};
pub use notifications::{HttpNotificationApi, NotificationApi, NotificationStore};
pub use persistence::{BlobStore, FileStore, MemoryStore};
pub use router::InvalidationRouter;
pub use session::{SessionState, SessionUser};
pub use toasts::{ChannelToasts, NoOpToasts, ToastSink};
pub use transport::{SseConnector, StreamConnector, TransportConfig};

/// Installs the global `tracing` subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=bizflow_client::transport=trace` - One module only
/// - Default: `info,bizflow=debug`
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bizflow=debug"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
