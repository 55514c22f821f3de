//! Callback-driven subscriptions.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;

use crate::backend::{ChannelEvent, ChannelReceiver};
use crate::error::TransportError;
use crate::transport::CancelTarget;

type MessageFn<T> = Box<dyn FnMut(T) + Send>;
type ErrorFn = Box<dyn FnMut(TransportError) + Send>;

/// `onMessage` plus an optional `onError`.
pub struct SubscriptionCallbacks<T> {
    on_message: MessageFn<T>,
    on_error: Option<ErrorFn>,
}

impl<T> SubscriptionCallbacks<T> {
    pub fn new(on_message: impl FnMut(T) + Send + 'static) -> Self {
        Self {
            on_message: Box::new(on_message),
            on_error: None,
        }
    }

    pub fn on_error(mut self, on_error: impl FnMut(TransportError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(on_error));
        self
    }

    fn report(&mut self, error: TransportError) {
        match &mut self.on_error {
            Some(on_error) => on_error(error),
            None => tracing::warn!("subscription error: {error}"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    /// Overrides the `<command>_cancel` default.
    pub cancel_command: Option<String>,
}

impl SubscribeOptions {
    pub fn with_cancel_command(cancel_command: impl Into<String>) -> Self {
        Self {
            cancel_command: Some(cancel_command.into()),
        }
    }
}

/// One live backend invocation feeding callbacks.
///
/// [`unsubscribe`](Self::unsubscribe) stops delivery and runs the cancel
/// command. Dropping without unsubscribing does the same on a best-effort
/// basis.
pub struct Subscription {
    command: String,
    closed: Arc<AtomicBool>,
    delivery: JoinHandle<()>,
    cancel: Option<CancelTarget>,
}

impl Subscription {
    pub(crate) fn start<T>(
        command: String,
        rx: ChannelReceiver,
        callbacks: SubscriptionCallbacks<T>,
        cancel: CancelTarget,
    ) -> Self
    where
        T: DeserializeOwned + Send + 'static,
    {
        let closed = Arc::new(AtomicBool::new(false));
        let delivery = tokio::spawn(deliver(command.clone(), rx, callbacks, closed.clone()));
        Self {
            command,
            closed,
            delivery,
            cancel: Some(cancel),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Whether messages may still be delivered.
    pub fn is_active(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && !self.delivery.is_finished()
    }

    /// Stop delivery and invoke the cancel command with the original
    /// payload. Cancel failures are logged; this always completes.
    pub async fn unsubscribe(mut self) {
        self.stop_delivery();
        if let Some(cancel) = self.cancel.take() {
            cancel.run_logged().await;
        }
    }

    fn stop_delivery(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.delivery.abort();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            self.stop_delivery();
            cancel.spawn_detached();
        }
    }
}

async fn deliver<T: DeserializeOwned>(
    command: String,
    mut rx: ChannelReceiver,
    mut callbacks: SubscriptionCallbacks<T>,
    closed: Arc<AtomicBool>,
) {
    while let Some(event) = rx.recv().await {
        if closed.load(Ordering::SeqCst) {
            break;
        }
        match event {
            ChannelEvent::Message(value) => match serde_json::from_value::<T>(value) {
                Ok(message) => (callbacks.on_message)(message),
                Err(e) => tracing::warn!("skipping undecodable message from {command}: {e}"),
            },
            ChannelEvent::Failed(message) => callbacks.report(TransportError::Channel(message)),
            ChannelEvent::InvokeFailed(message) => callbacks.report(TransportError::Invoke {
                command: command.clone(),
                message,
            }),
        }
    }
    rx.close();
    tracing::debug!("subscription to {command} ended");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::{Value, json};
    use tokio::sync::mpsc;

    use super::*;
    use crate::mock::{ScriptedBackend, eventually};
    use crate::transport::ChannelTransport;

    fn collecting<T: Send + 'static>() -> (SubscriptionCallbacks<T>, mpsc::UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callbacks = SubscriptionCallbacks::new(move |msg| {
            let _ = tx.send(msg);
        });
        (callbacks, rx)
    }

    #[tokio::test]
    async fn delivers_in_send_order() {
        let backend = Arc::new(ScriptedBackend {
            messages: vec![json!(1), json!(2), json!(3)],
            ..ScriptedBackend::default()
        });
        let transport = ChannelTransport::new(backend.clone());
        let (callbacks, mut rx) = collecting::<u32>();

        let sub = transport.subscribe("numbers", json!({}), callbacks, SubscribeOptions::default());
        let mut got = Vec::new();
        while let Some(n) = rx.recv().await {
            got.push(n);
        }
        assert_eq!(got, vec![1, 2, 3]);
        assert_eq!(sub.command(), "numbers");
    }

    #[tokio::test]
    async fn undecodable_message_is_skipped() {
        let backend = Arc::new(ScriptedBackend {
            messages: vec![json!("nope"), json!(7)],
            ..ScriptedBackend::default()
        });
        let transport = ChannelTransport::new(backend);
        let (callbacks, mut rx) = collecting::<u32>();

        let _sub = transport.subscribe("numbers", Value::Null, callbacks, SubscribeOptions::default());
        assert_eq!(rx.recv().await, Some(7));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn unsubscribe_runs_default_cancel_with_payload() {
        let backend = Arc::new(ScriptedBackend {
            messages: vec![json!(1)],
            hold_open: true,
            ..ScriptedBackend::default()
        });
        let transport = ChannelTransport::new(backend.clone());
        let (callbacks, mut rx) = collecting::<u32>();
        let payload = json!({"paneId": 4});

        let sub = transport.subscribe("terminal_subscribe_output", payload.clone(), callbacks, SubscribeOptions::default());
        assert_eq!(rx.recv().await, Some(1));
        sub.unsubscribe().await;

        assert_eq!(
            backend.calls(),
            vec![("terminal_subscribe_output_cancel".to_string(), payload)]
        );

        // Stragglers after unsubscribe never reach the callback.
        if let Some(channel) = backend.retained_channel() {
            channel.send(json!(2));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn custom_cancel_command_is_used() {
        let backend = Arc::new(ScriptedBackend {
            hold_open: true,
            ..ScriptedBackend::default()
        });
        let transport = ChannelTransport::new(backend.clone());
        let (callbacks, _rx) = collecting::<Value>();

        let sub = transport.subscribe(
            "agent_execute_task",
            json!({"taskId": "t1"}),
            callbacks,
            SubscribeOptions::with_cancel_command("agent_cancel_task"),
        );
        sub.unsubscribe().await;
        assert_eq!(backend.calls()[0].0, "agent_cancel_task");
    }

    #[tokio::test]
    async fn cancel_failure_still_resolves() {
        let backend = Arc::new(ScriptedBackend {
            hold_open: true,
            call_error: Some("backend gone".to_string()),
            ..ScriptedBackend::default()
        });
        let transport = ChannelTransport::new(backend.clone());
        let (callbacks, _rx) = collecting::<Value>();

        let sub = transport.subscribe("numbers", Value::Null, callbacks, SubscribeOptions::default());
        sub.unsubscribe().await;
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn invoke_failure_reported_once() {
        let backend = Arc::new(ScriptedBackend {
            invoke_error: Some("unknown command".to_string()),
            ..ScriptedBackend::default()
        });
        let transport = ChannelTransport::new(backend);
        let (err_tx, mut err_rx) = mpsc::unbounded_channel();
        let callbacks = SubscriptionCallbacks::<Value>::new(|_| {}).on_error(move |e| {
            let _ = err_tx.send(e);
        });

        let _sub = transport.subscribe("bogus", Value::Null, callbacks, SubscribeOptions::default());
        assert_eq!(
            err_rx.recv().await,
            Some(TransportError::Invoke {
                command: "bogus".to_string(),
                message: "unknown command".to_string(),
            })
        );
        assert_eq!(err_rx.recv().await, None);
    }

    #[tokio::test]
    async fn invoke_failure_without_handler_is_logged() {
        let backend = Arc::new(ScriptedBackend {
            invoke_error: Some("unknown command".to_string()),
            ..ScriptedBackend::default()
        });
        let transport = ChannelTransport::new(backend);
        let sub = transport.subscribe(
            "bogus",
            Value::Null,
            SubscriptionCallbacks::<Value>::new(|_| {}),
            SubscribeOptions::default(),
        );
        assert!(eventually(|| !sub.is_active()).await);
    }

    #[tokio::test]
    async fn drop_without_unsubscribe_cancels() {
        let backend = Arc::new(ScriptedBackend {
            hold_open: true,
            ..ScriptedBackend::default()
        });
        let transport = ChannelTransport::new(backend.clone());
        let (callbacks, _rx) = collecting::<Value>();

        drop(transport.subscribe("numbers", json!(1), callbacks, SubscribeOptions::default()));
        assert!(eventually(|| backend.calls().len() == 1).await);
        assert_eq!(backend.calls()[0], ("numbers_cancel".to_string(), json!(1)));
    }
}
