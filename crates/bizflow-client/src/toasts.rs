//! # Toast Sink
//!
//! Where the engine hands toasts to the web shell.

use bizflow_core::Toast;
use tokio::sync::mpsc;
use tracing::debug;

/// Receiver of user-facing toasts.
pub trait ToastSink: Send + Sync {
    fn show(&self, toast: Toast);
}

/// Drops every toast (headless use and tests that do not care).
pub struct NoOpToasts;

impl ToastSink for NoOpToasts {
    fn show(&self, toast: Toast) {
        debug!(title = %toast.title, "Toast dropped");
    }
}

/// Forwards toasts over a channel to the rendering layer.
#[derive(Clone)]
pub struct ChannelToasts {
    tx: mpsc::UnboundedSender<Toast>,
}

impl ChannelToasts {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Toast>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelToasts { tx }, rx)
    }
}

impl ToastSink for ChannelToasts {
    fn show(&self, toast: Toast) {
        if self.tx.send(toast).is_err() {
            debug!("Toast receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_toasts_deliver_in_order() {
        let (sink, mut rx) = ChannelToasts::new();
        sink.show(Toast::info("a", "1"));
        sink.show(Toast::error("b", "2"));

        assert_eq!(rx.try_recv().unwrap().title, "a");
        assert_eq!(rx.try_recv().unwrap().title, "b");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_after_receiver_dropped_is_silent() {
        let (sink, rx) = ChannelToasts::new();
        drop(rx);
        sink.show(Toast::info("a", "1"));
        NoOpToasts.show(Toast::info("b", "2"));
    }
}
