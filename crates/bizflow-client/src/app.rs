//! # Client Application
//!
//! Composition root: owns the cart, session, cache, push channel and
//! notification poller of one running client, and wires them together.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        ClientApp Lifecycle                              │
//! │                                                                         │
//! │  ClientAppBuilder::build                                               │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  bootstrap()  restore cart blob ──► restore session blob                │
//! │        │      (failure: warning toast, start empty)                     │
//! │        │                                                                │
//! │        ├── session authenticated? ──► start_session()                   │
//! │        │                                                                │
//! │  login(user, token)  persist session ──► start_session()                │
//! │        │                                  ├─ consumer.connect           │
//! │        │                                  └─ spawn notification poller  │
//! │        │                                                                │
//! │  logout()  close stream ──► stop poller ──► clear cache and list        │
//! │            ──► forget session (cart is kept)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here is global: every screen gets the [`ClientApp`] (or one of
//! its parts) passed in.

use bizflow_core::{Locale, Toast};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::cache::QueryCache;
use crate::config::ClientConfig;
use crate::consumer::{EventStreamConsumer, StreamState};
use crate::engine::CartEngine;
use crate::error::{ClientError, ClientResult};
use crate::notifications::{spawn_poller, HttpNotificationApi, NotificationApi, NotificationStore, PollerHandle};
use crate::persistence::{load_state, save_state, BlobStore, FileStore};
use crate::router::InvalidationRouter;
use crate::session::{token_cell, SessionState, SessionUser, TokenCell};
use crate::toasts::{NoOpToasts, ToastSink};
use crate::transport::{SseConnector, StreamConnector, TransportConfig};

// =============================================================================
// Client Application
// =============================================================================

pub struct ClientApp {
    config: Arc<ClientConfig>,
    store: Arc<dyn BlobStore>,
    toasts: Arc<dyn ToastSink>,
    cart: CartEngine,
    cache: QueryCache,
    session: RwLock<SessionState>,
    token: TokenCell,
    consumer: EventStreamConsumer,
    notifications: Arc<NotificationStore>,
    poller: Mutex<Option<PollerHandle>>,
}

impl ClientApp {
    pub fn builder(config: ClientConfig) -> ClientAppBuilder {
        ClientAppBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn locale(&self) -> Locale {
        self.config.locale()
    }

    pub fn cart(&self) -> &CartEngine {
        &self.cart
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn notifications(&self) -> &Arc<NotificationStore> {
        &self.notifications
    }

    /// Bearer token cell shared with REST clients.
    pub fn token(&self) -> TokenCell {
        Arc::clone(&self.token)
    }

    pub async fn session(&self) -> SessionState {
        self.session.read().await.clone()
    }

    pub async fn stream_state(&self) -> StreamState {
        self.consumer.state().await
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Restores persisted state and, if a session was saved, resumes it.
    ///
    /// Never fails: unreadable blobs are logged, reported with a warning
    /// toast, and treated as absent.
    pub async fn bootstrap(&self) {
        match self.cart.restore() {
            Ok(true) => info!("Cart restored"),
            Ok(false) => debug!("No saved cart"),
            Err(e) => {
                warn!(error = %e, "Could not restore cart, starting empty");
                let locale = self.locale();
                self.toasts.show(Toast::warning(
                    locale.cart_restore_failed(),
                    locale.try_again_later(),
                ));
            }
        }

        let blob = &self.config.storage.session_blob;
        let session = match load_state::<SessionState>(self.store.as_ref(), blob) {
            Ok(saved) => saved.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Could not restore session, starting logged out");
                SessionState::default()
            }
        };

        let resume = session.is_authenticated();
        *self.token.write().await = session.token.clone();
        *self.session.write().await = session;

        if resume {
            info!("Resuming saved session");
            self.start_session().await;
        }
    }

    /// Records a successful login and starts the session's background work.
    pub async fn login(&self, user: SessionUser, token: impl Into<String>) -> ClientResult<()> {
        let token = token.into();
        if token.is_empty() {
            return Err(ClientError::NotAuthenticated);
        }

        info!(user_id = user.id, owner_id = ?user.owner_id, "Logging in");
        {
            let mut session = self.session.write().await;
            session.login(user, token.clone());
            self.persist_session(&session);
        }
        *self.token.write().await = Some(token);

        self.start_session().await;
        Ok(())
    }

    /// Tears down the push channel and poller and forgets the session.
    ///
    /// The cart survives logout.
    pub async fn logout(&self) {
        info!("Logging out");
        self.consumer.disconnect().await;

        if let Some(poller) = self.poller.lock().await.take() {
            poller.stop().await;
        }
        self.notifications.clear();
        self.cache.clear();

        {
            let mut session = self.session.write().await;
            session.logout();
            self.persist_session(&session);
        }
        *self.token.write().await = None;
    }

    /// Clears the cart after the server accepted an order.
    pub fn checkout_completed(&self) {
        self.cart.clear_cart();
        debug!("Cart cleared after checkout");
    }

    async fn start_session(&self) {
        let session = self.session.read().await.clone();

        match self.consumer.connect(&session).await {
            Ok(true) => {}
            Ok(false) => warn!("Session has no owner account, event stream not started"),
            Err(e) => warn!(error = %e, "Could not start event stream"),
        }

        let mut poller = self.poller.lock().await;
        if poller.is_none() {
            *poller = Some(spawn_poller(
                Arc::clone(&self.notifications),
                self.config.poll_interval(),
            ));
        }
    }

    fn persist_session(&self, session: &SessionState) {
        if let Err(e) = save_state(self.store.as_ref(), &self.config.storage.session_blob, session) {
            warn!(error = %e, "Failed to persist session");
        }
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`ClientApp`]. Anything not supplied is created from the
/// configuration.
pub struct ClientAppBuilder {
    config: ClientConfig,
    store: Option<Arc<dyn BlobStore>>,
    toasts: Option<Arc<dyn ToastSink>>,
    connector: Option<Arc<dyn StreamConnector>>,
    notification_api: Option<Arc<dyn NotificationApi>>,
}

impl ClientAppBuilder {
    pub fn new(config: ClientConfig) -> Self {
        ClientAppBuilder {
            config,
            store: None,
            toasts: None,
            connector: None,
            notification_api: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_toasts(mut self, toasts: Arc<dyn ToastSink>) -> Self {
        self.toasts = Some(toasts);
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn StreamConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn with_notification_api(mut self, api: Arc<dyn NotificationApi>) -> Self {
        self.notification_api = Some(api);
        self
    }

    pub fn build(self) -> ClientResult<ClientApp> {
        let config = self.config;
        config.validate()?;

        let store: Arc<dyn BlobStore> = match self.store {
            Some(store) => store,
            None => {
                let dir = config.data_dir().ok_or_else(|| {
                    ClientError::InvalidConfig("No data directory available".into())
                })?;
                Arc::new(FileStore::open(dir)?)
            }
        };

        let toasts = self.toasts.unwrap_or_else(|| Arc::new(NoOpToasts));

        let connector: Arc<dyn StreamConnector> = match self.connector {
            Some(connector) => connector,
            None => Arc::new(SseConnector::new(TransportConfig::from(&config))?),
        };

        let token = token_cell();
        let notification_api: Arc<dyn NotificationApi> = match self.notification_api {
            Some(api) => api,
            None => Arc::new(HttpNotificationApi::new(
                config.endpoint(&config.notifications.path)?,
                Arc::clone(&token),
                config.request_timeout(),
            )?),
        };

        let locale = config.locale();
        let cache = QueryCache::new();
        let router = InvalidationRouter::new(cache.clone(), Arc::clone(&toasts), locale);
        let consumer = EventStreamConsumer::new(
            connector,
            router,
            config.endpoint(&config.stream.path)?,
            config.heartbeat_timeout(),
        );
        let notifications = Arc::new(NotificationStore::new(
            notification_api,
            Arc::clone(&toasts),
            locale,
        ));
        let cart = CartEngine::new(Arc::clone(&store), config.storage.cart_blob.clone());

        Ok(ClientApp {
            config: Arc::new(config),
            store,
            toasts,
            cart,
            cache,
            session: RwLock::new(SessionState::default()),
            token,
            consumer,
            notifications,
            poller: Mutex::new(None),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use crate::testing::{notification, FakeApi, FakeConnector};
    use crate::toasts::ChannelToasts;
    use crate::transport::{Frame, TransportEvent};
    use bizflow_core::invalidation::keys;
    use bizflow_core::{CacheKey, Money, Product, ProductUnit, ToastVariant};

    struct Harness {
        store: MemoryStore,
        connector: Arc<FakeConnector>,
        api: Arc<FakeApi>,
        toasts: tokio::sync::mpsc::UnboundedReceiver<Toast>,
        app: ClientApp,
    }

    fn harness(store: MemoryStore) -> Harness {
        let connector = Arc::new(FakeConnector::default());
        let api = FakeApi::with(vec![notification(1, false), notification(2, true)]);
        let (sink, toasts) = ChannelToasts::new();
        let app = ClientApp::builder(ClientConfig::default())
            .with_store(Arc::new(store.clone()))
            .with_toasts(Arc::new(sink))
            .with_connector(connector.clone())
            .with_notification_api(api.clone())
            .build()
            .unwrap();
        Harness {
            store,
            connector,
            api,
            toasts,
            app,
        }
    }

    fn owner() -> SessionUser {
        SessionUser {
            id: 1,
            username: "owner".to_string(),
            full_name: Some("Chủ cửa hàng".to_string()),
            role: Some("OWNER".to_string()),
            owner_id: Some(1),
        }
    }

    fn product() -> (Product, ProductUnit) {
        let unit = ProductUnit {
            unit_id: 1,
            unit_name: "Cái".to_string(),
            price: None,
            conversion_rate: None,
        };
        let product = Product {
            id: 1,
            name: "Bút bi".to_string(),
            sell_price: Some(Money::from_minor(100)),
            base_price: Money::from_minor(100),
            units: vec![unit.clone()],
        };
        (product, unit)
    }

    async fn settle() {
        for _ in 0..1000 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_login_opens_stream_and_polls() {
        let h = harness(MemoryStore::new());
        h.app.bootstrap().await;
        assert_eq!(h.connector.connections(), 0);

        h.app.login(owner(), "tok").await.unwrap();
        settle().await;

        let ends = h.connector.take();
        assert_eq!(ends.url.path(), "/api/v1/events/stream");
        assert_eq!(ends.url.query(), Some("token=tok"));
        assert_eq!(h.app.token().read().await.as_deref(), Some("tok"));
        assert!(h.api.calls().contains(&"list".to_string()));
        assert_eq!(h.app.notifications().unread_count(), 1);

        ends.event_tx.send(TransportEvent::Opened).await.unwrap();
        let frame = Frame::new(
            "update",
            r#"{"type":"DEBT_REPAID","payload":{"payment_amount":100000,"remaining_amount":0}}"#,
        );
        h.app.cache().set(CacheKey::root(keys::DEBTS), ());
        ends.event_tx.send(TransportEvent::Frame(frame)).await.unwrap();
        settle().await;

        assert_eq!(h.app.stream_state().await, StreamState::Connected);
        assert_eq!(h.app.cache().is_stale(&CacheKey::root(keys::DEBTS)), Some(true));
    }

    #[tokio::test]
    async fn test_login_without_owner_skips_stream() {
        let h = harness(MemoryStore::new());
        let mut user = owner();
        user.owner_id = None;

        h.app.login(user, "tok").await.unwrap();
        assert_eq!(h.connector.connections(), 0);
        assert_eq!(h.app.stream_state().await, StreamState::Disconnected);
        assert!(matches!(
            h.app.login(owner(), "").await,
            Err(ClientError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_bootstrap_resumes_saved_session_and_cart() {
        let store = MemoryStore::new();
        {
            let first = harness(store.clone());
            first.app.login(owner(), "tok").await.unwrap();
            let (product, unit) = product();
            first.app.cart().add_item(&product, &unit);
            first.app.logout().await;
            first.app.login(owner(), "tok2").await.unwrap();
        }

        let h = harness(store);
        h.app.bootstrap().await;

        assert!(h.app.session().await.is_authenticated());
        assert_eq!(h.app.cart().subtotal(), Money::from_minor(100));
        assert_eq!(h.connector.take().url.query(), Some("token=tok2"));
    }

    #[tokio::test]
    async fn test_logout_tears_down_and_keeps_cart() {
        let h = harness(MemoryStore::new());
        h.app.login(owner(), "tok").await.unwrap();
        settle().await;
        let mut ends = h.connector.take();
        let (product, unit) = product();
        h.app.cart().add_item(&product, &unit);
        h.app.cache().set(CacheKey::root(keys::ORDERS), ());

        h.app.logout().await;

        assert_eq!(ends.control_rx.recv().await, Some(crate::transport::TransportControl::Close));
        assert_eq!(h.app.stream_state().await, StreamState::Disconnected);
        assert!(h.app.notifications().snapshot().is_empty());
        assert_eq!(h.app.cache().is_stale(&CacheKey::root(keys::ORDERS)), None);
        assert!(!h.app.session().await.is_authenticated());
        assert!(h.app.token().read().await.is_none());
        assert_eq!(h.app.cart().with_cart(|c| c.item_count()), 1);

        let saved: Option<SessionState> = load_state(&h.store, "bizflow-auth").unwrap();
        assert_eq!(saved, Some(SessionState::default()));
    }

    #[tokio::test]
    async fn test_corrupt_cart_blob_warns_and_starts_empty() {
        let store = MemoryStore::new();
        store.save("bizflow-pos", "{not json").unwrap();
        let mut h = harness(store);

        h.app.bootstrap().await;

        assert!(h.app.cart().with_cart(|c| c.is_empty()));
        assert_eq!(h.toasts.try_recv().unwrap().variant, ToastVariant::Warning);
    }

    #[tokio::test]
    async fn test_checkout_completed_clears_cart() {
        let h = harness(MemoryStore::new());
        let (product, unit) = product();
        h.app.cart().add_item(&product, &unit);

        h.app.checkout_completed();
        assert!(h.app.cart().with_cart(|c| c.is_empty()));
    }
}
