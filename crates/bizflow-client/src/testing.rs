//! Test doubles for the network seams.

use async_trait::async_trait;
use bizflow_core::notification::NotificationId;
use bizflow_core::Notification;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use url::Url;

use crate::error::{ClientError, ClientResult};
use crate::notifications::NotificationApi;
use crate::transport::{StreamConnector, TransportControl, TransportEvent, TransportHandle};

/// The transport side of one connection a [`FakeConnector`] handed out.
pub struct FakeEnds {
    pub url: Url,
    pub control_rx: mpsc::Receiver<TransportControl>,
    pub event_tx: mpsc::Sender<TransportEvent>,
}

/// Connector whose "transport" is driven by the test.
#[derive(Default)]
pub struct FakeConnector {
    ends: Mutex<Vec<FakeEnds>>,
}

impl FakeConnector {
    /// Oldest connection not yet taken.
    pub fn take(&self) -> FakeEnds {
        self.ends.lock().unwrap().remove(0)
    }

    pub fn connections(&self) -> usize {
        self.ends.lock().unwrap().len()
    }
}

#[async_trait]
impl StreamConnector for FakeConnector {
    async fn connect(&self, url: Url) -> ClientResult<(TransportHandle, mpsc::Receiver<TransportEvent>)> {
        let (handle, control_rx, event_tx, event_rx) = TransportHandle::pair(16);
        self.ends.lock().unwrap().push(FakeEnds {
            url,
            control_rx,
            event_tx,
        });
        Ok((handle, event_rx))
    }
}

pub fn notification(id: NotificationId, read: bool) -> Notification {
    Notification {
        id,
        title: format!("n{}", id),
        message: "Đơn hàng nháp cần duyệt".to_string(),
        notification_type: Some("DRAFT_ORDER".to_string()),
        reference_type: None,
        reference_id: None,
        read,
        created_at: Utc::now(),
    }
}

/// Server double: holds the notifications and answers like the backend.
#[derive(Default)]
pub struct FakeApi {
    pub items: Mutex<Vec<Notification>>,
    pub fail_list: AtomicBool,
    pub fail_mutations: AtomicBool,
    calls: Mutex<VecDeque<String>>,
    held_list: Mutex<Option<(Vec<Notification>, oneshot::Receiver<()>)>>,
}

impl FakeApi {
    pub fn with(items: Vec<Notification>) -> Arc<Self> {
        let api = FakeApi::default();
        *api.items.lock().unwrap() = items;
        Arc::new(api)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().cloned().collect()
    }

    /// The next `list()` answers `items`, but only once `release` fires.
    pub fn hold_next_list(&self, items: Vec<Notification>, release: oneshot::Receiver<()>) {
        *self.held_list.lock().unwrap() = Some((items, release));
    }
}

#[async_trait]
impl NotificationApi for FakeApi {
    async fn list(&self) -> ClientResult<Vec<Notification>> {
        self.calls.lock().unwrap().push_back("list".into());
        let held = self.held_list.lock().unwrap().take();
        if let Some((items, release)) = held {
            let _ = release.await;
            return Ok(items);
        }
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(ClientError::Http {
                status: 503,
                message: "unavailable".into(),
            });
        }
        Ok(self.items.lock().unwrap().clone())
    }

    async fn mark_read(&self, id: NotificationId) -> ClientResult<()> {
        self.calls.lock().unwrap().push_back(format!("read {}", id));
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(ClientError::ConnectionFailed("refused".into()));
        }
        let mut items = self.items.lock().unwrap();
        match items.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.read = true;
                Ok(())
            }
            None => Err(ClientError::Http {
                status: 404,
                message: "Notification not found".into(),
            }),
        }
    }

    async fn mark_all_read(&self) -> ClientResult<()> {
        self.calls.lock().unwrap().push_back("read-all".into());
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(ClientError::ConnectionFailed("refused".into()));
        }
        for n in self.items.lock().unwrap().iter_mut() {
            n.read = true;
        }
        Ok(())
    }
}
