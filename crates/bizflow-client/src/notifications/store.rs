//! Notification Store: the polled, optimistically mutated list behind the
//! bell icon.

use bizflow_core::notification::NotificationId;
use bizflow_core::{Locale, NotificationList, Toast};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::api::NotificationApi;
use crate::error::ClientResult;
use crate::toasts::ToastSink;

struct ListState {
    list: NotificationList,
    /// Sequence number of the poll whose result `list` holds.
    applied: u64,
}

pub struct NotificationStore {
    api: Arc<dyn NotificationApi>,
    toasts: Arc<dyn ToastSink>,
    locale: Locale,
    state: Mutex<ListState>,
    next_poll: AtomicU64,
    failing: AtomicBool,
    unread_tx: watch::Sender<usize>,
}

impl NotificationStore {
    pub fn new(api: Arc<dyn NotificationApi>, toasts: Arc<dyn ToastSink>, locale: Locale) -> Self {
        let (unread_tx, _) = watch::channel(0);
        NotificationStore {
            api,
            toasts,
            locale,
            state: Mutex::new(ListState {
                list: NotificationList::default(),
                applied: 0,
            }),
            next_poll: AtomicU64::new(1),
            failing: AtomicBool::new(false),
            unread_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ListState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, unread: usize) {
        self.unread_tx.send_replace(unread);
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn snapshot(&self) -> NotificationList {
        self.lock().list.clone()
    }

    pub fn unread_count(&self) -> usize {
        self.lock().list.unread_count()
    }

    pub fn badge_label(&self) -> Option<String> {
        self.lock().list.badge_label()
    }

    /// Unread count updates, for the bell badge.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.unread_tx.subscribe()
    }

    // =========================================================================
    // Poll
    // =========================================================================

    /// Fetches the list and replaces the cached one. Returns the new unread
    /// count.
    ///
    /// On failure the cached list is kept. The first failure after a success
    /// raises an error toast; repeats stay quiet until a poll succeeds.
    pub async fn poll(&self) -> ClientResult<usize> {
        let seq = self.next_poll.fetch_add(1, Ordering::SeqCst);

        match self.api.list().await {
            Ok(items) => {
                if self.failing.swap(false, Ordering::SeqCst) {
                    info!("Notification polling recovered");
                }
                let mut state = self.lock();
                if seq < state.applied {
                    debug!(seq, applied = state.applied, "Dropping superseded poll result");
                    return Ok(state.list.unread_count());
                }
                state.list.replace(items);
                state.applied = seq;
                let unread = state.list.unread_count();
                drop(state);

                self.publish(unread);
                Ok(unread)
            }
            Err(e) => {
                warn!(error = %e, "Failed to poll notifications");
                if !self.failing.swap(true, Ordering::SeqCst) {
                    self.toasts.show(Toast::error(
                        self.locale.notifications_load_failed(),
                        self.locale.try_again_later(),
                    ));
                }
                Err(e)
            }
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Marks one notification read: local flag first, then the request,
    /// then a re-poll that reconciles with the server.
    ///
    /// Callers skip notifications already flagged read.
    pub async fn mark_as_read(&self, id: NotificationId) -> ClientResult<()> {
        let unread = {
            let mut state = self.lock();
            state.list.mark_read(id);
            state.list.unread_count()
        };
        self.publish(unread);

        let result = self.api.mark_read(id).await;
        self.after_mutation(result).await
    }

    /// Marks everything read, optimistically, then re-polls.
    pub async fn mark_all_as_read(&self) -> ClientResult<()> {
        let changed = self.lock().list.mark_all_read();
        debug!(changed, "Marked all notifications read locally");
        self.publish(0);

        let result = self.api.mark_all_read().await;
        self.after_mutation(result).await
    }

    async fn after_mutation(&self, result: ClientResult<()>) -> ClientResult<()> {
        if let Err(e) = &result {
            warn!(error = %e, "Notification update failed");
            self.toasts.show(Toast::error(
                self.locale.notifications_update_failed(),
                self.locale.try_again_later(),
            ));
        }

        // The server's list is the source of truth either way.
        if let Err(e) = self.poll().await {
            debug!(error = %e, "Re-poll after notification update failed");
        }
        result
    }

    /// Forgets the cached list (logout).
    pub fn clear(&self) {
        let mut state = self.lock();
        state.list = NotificationList::default();
        state.applied = self.next_poll.load(Ordering::SeqCst);
        drop(state);

        self.failing.store(false, Ordering::SeqCst);
        self.publish(0);
    }
}

// =============================================================================
// Poller
// =============================================================================

/// Running poll timer. Stop it with [`PollerHandle::stop`]; dropping the
/// handle also ends the task.
pub struct PollerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                debug!(error = %e, "Notification poller ended abnormally");
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Polls immediately, then every `interval`, until stopped.
pub fn spawn_poller(store: Arc<NotificationStore>, interval: Duration) -> PollerHandle {
    let (shutdown, mut shutdown_rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(?interval, "Notification poller started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Failures are logged and toasted inside poll().
                    let _ = store.poll().await;
                }
                _ = &mut shutdown_rx => break,
            }
        }
        info!("Notification poller stopped");
    });

    PollerHandle {
        shutdown: Some(shutdown),
        task: Some(task),
    }
}
