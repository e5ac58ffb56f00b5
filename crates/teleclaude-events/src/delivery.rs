use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::store::NotificationStore;
use crate::types::{EventLevel, PushCallbackArgs};

/// A sink the daemon registers to receive post-projection notification
/// events. Implementations decide for themselves whether a given call is
/// worth acting on — `DeliveryHub` only decides which callbacks get
/// invoked, not what they do with the notification.
#[async_trait]
pub trait PushCallback: Send + Sync {
    fn name(&self) -> &'static str;

    async fn push(&self, args: &PushCallbackArgs);
}

/// Fans a projected notification out to every registered callback (spec
/// §4.8 "invoke push callbacks with (notification_id, event_type,
/// was_created, is_meaningful, level)"). Callbacks never return a `Result`:
/// a dropped WS frame or a failed chat send must not affect the
/// processor's ACK decision, so failures are the callback's own concern to
/// log internally rather than something `DeliveryHub` can retry.
pub struct DeliveryHub {
    callbacks: Vec<Arc<dyn PushCallback>>,
}

impl DeliveryHub {
    pub fn new() -> Self {
        Self { callbacks: Vec::new() }
    }

    pub fn register(&mut self, callback: Arc<dyn PushCallback>) {
        self.callbacks.push(callback);
    }

    pub async fn notify(&self, args: PushCallbackArgs) {
        for callback in &self.callbacks {
            callback.push(&args).await;
        }
    }
}

impl Default for DeliveryHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Delivers every projected notification, unfiltered, as the full
/// notification row via a caller-supplied sink — the daemon wires this to
/// `EventBroadcaster` (spec §4.8 "the WS delivery callback broadcasts the
/// notification row directly").
pub struct WsBroadcastCallback<F: Fn(String) + Send + Sync> {
    store: Arc<NotificationStore>,
    send: F,
}

impl<F: Fn(String) + Send + Sync> WsBroadcastCallback<F> {
    pub fn new(store: Arc<NotificationStore>, send: F) -> Self {
        Self { store, send }
    }
}

#[async_trait]
impl<F: Fn(String) + Send + Sync> PushCallback for WsBroadcastCallback<F> {
    fn name(&self) -> &'static str {
        "ws_broadcast"
    }

    async fn push(&self, args: &PushCallbackArgs) {
        let row = match self.store.get(&args.notification_id) {
            Ok(Some(row)) => row,
            Ok(None) => {
                warn!(notification_id = %args.notification_id, "ws broadcast: notification row vanished before delivery");
                return;
            }
            Err(err) => {
                warn!(error = %err, notification_id = %args.notification_id, "ws broadcast: notification lookup failed");
                return;
            }
        };
        match serde_json::to_string(&row) {
            Ok(payload) => (self.send)(payload),
            Err(err) => warn!(error = %err, "ws broadcast: failed to serialize notification row"),
        }
    }
}

/// Delivers to chat platforms (Telegram/Discord/WhatsApp), but only for
/// genuinely noteworthy notifications: newly-created rows at `Workflow`
/// level or above (spec §4.8 "chat-platform delivery adapter filters by
/// level >= workflow"). Silent `Operational`/`Infrastructure` bookkeeping
/// and in-place progress updates never reach a human inbox this way.
pub struct ChatDeliveryCallback<F: Fn(&PushCallbackArgs) + Send + Sync> {
    dispatch: F,
}

impl<F: Fn(&PushCallbackArgs) + Send + Sync> ChatDeliveryCallback<F> {
    pub fn new(dispatch: F) -> Self {
        Self { dispatch }
    }
}

#[async_trait]
impl<F: Fn(&PushCallbackArgs) + Send + Sync> PushCallback for ChatDeliveryCallback<F> {
    fn name(&self) -> &'static str {
        "chat_delivery"
    }

    async fn push(&self, args: &PushCallbackArgs) {
        if !args.was_created || args.level < EventLevel::Workflow {
            return;
        }
        (self.dispatch)(args);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use teleclaude_core::NotificationId;

    fn args(was_created: bool, level: EventLevel) -> PushCallbackArgs {
        PushCallbackArgs {
            notification_id: NotificationId::new(),
            event_type: "agent.needs_input".to_string(),
            was_created,
            is_meaningful: true,
            level,
        }
    }

    #[tokio::test]
    async fn chat_delivery_skips_non_created() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        let callback = ChatDeliveryCallback::new(move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        callback.push(&args(false, EventLevel::Business)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn chat_delivery_skips_below_workflow() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        let callback = ChatDeliveryCallback::new(move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        callback.push(&args(true, EventLevel::Operational)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn chat_delivery_fires_on_created_workflow_level() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        let callback = ChatDeliveryCallback::new(move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        callback.push(&args(true, EventLevel::Workflow)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn delivery_hub_invokes_all_registered_callbacks() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut hub = DeliveryHub::new();
        for _ in 0..3 {
            let count2 = Arc::clone(&count);
            hub.register(Arc::new(ChatDeliveryCallback::new(move |_| {
                count2.fetch_add(1, Ordering::SeqCst);
            })));
        }
        hub.notify(args(true, EventLevel::Business)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
