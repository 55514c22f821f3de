//! [`ChannelTransport`]: entry point tying a [`Backend`] to typed
//! subscriptions and streams.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::backend::{Backend, Channel, ChannelReceiver};
use crate::error::TransportError;
use crate::stream::{ChannelStream, StreamOptions};
use crate::subscription::{SubscribeOptions, Subscription, SubscriptionCallbacks};

/// Suffix appended to a push command to form its cancel command.
pub const CANCEL_SUFFIX: &str = "_cancel";

/// `"<command>_cancel"`.
pub fn default_cancel_command(command: &str) -> String {
    format!("{command}{CANCEL_SUFFIX}")
}

#[derive(Clone)]
pub struct ChannelTransport {
    backend: Arc<dyn Backend>,
}

impl ChannelTransport {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Invoke `command` once and route every message to `callbacks`.
    ///
    /// Returns immediately; delivery happens on a spawned task, so this must
    /// be called from within a Tokio runtime. Invocation failures go to the
    /// error callback (or the log), never to the caller.
    pub fn subscribe<T>(
        &self,
        command: &str,
        payload: Value,
        callbacks: SubscriptionCallbacks<T>,
        options: SubscribeOptions,
    ) -> Subscription
    where
        T: DeserializeOwned + Send + 'static,
    {
        let rx = start_invocation(self.backend.clone(), command, payload.clone());
        let cancel = CancelTarget {
            backend: self.backend.clone(),
            command: options
                .cancel_command
                .unwrap_or_else(|| default_cancel_command(command)),
            payload,
        };
        Subscription::start(command.to_string(), rx, callbacks, cancel)
    }

    /// Invoke `command` once and expose its messages as a pull stream.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn create_stream<T>(
        &self,
        command: &str,
        payload: Value,
        options: StreamOptions<T>,
    ) -> ChannelStream<T>
    where
        T: DeserializeOwned,
    {
        let rx = start_invocation(self.backend.clone(), command, payload.clone());
        let StreamOptions {
            cancel_command,
            should_close,
        } = options;
        let cancel = CancelTarget {
            backend: self.backend.clone(),
            command: cancel_command.unwrap_or_else(|| default_cancel_command(command)),
            payload,
        };
        ChannelStream::new(command.to_string(), rx, should_close, cancel)
    }

    /// Plain request/response operation.
    pub async fn call(&self, command: &str, payload: Value) -> Result<Value, TransportError> {
        self.backend
            .call(command, payload)
            .await
            .map_err(|message| TransportError::Invoke {
                command: command.to_string(),
                message,
            })
    }
}

/// Spawn the backend invocation and hand back the consumer end of its
/// channel. The channel closes once the invocation returns and the backend
/// has dropped every clone it kept.
fn start_invocation(backend: Arc<dyn Backend>, command: &str, payload: Value) -> ChannelReceiver {
    let (channel, rx) = Channel::pair();
    let command = command.to_string();
    tokio::spawn(async move {
        let reporter = channel.clone();
        if let Err(e) = backend.invoke(&command, payload, channel).await {
            tracing::debug!("invoke {command} rejected: {e}");
            reporter.invoke_failed(e);
        }
    });
    rx
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// The cancel command of one subscription or stream, with the payload of
/// the original invocation.
pub(crate) struct CancelTarget {
    backend: Arc<dyn Backend>,
    command: String,
    payload: Value,
}

impl CancelTarget {
    pub(crate) async fn run(self) -> Result<(), TransportError> {
        let Self {
            backend,
            command,
            payload,
        } = self;
        match backend.call(&command, payload).await {
            Ok(_) => Ok(()),
            Err(message) => Err(TransportError::Cancel { command, message }),
        }
    }

    /// Run and log a failure instead of returning it.
    pub(crate) async fn run_logged(self) {
        if let Err(e) = self.run().await {
            tracing::warn!("{e}");
        }
    }

    /// Fire-and-forget on the current runtime, if there is one.
    pub(crate) fn spawn_detached(self) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(self.run_logged());
            }
            Err(_) => tracing::debug!("no runtime available, skipping {}", self.command),
        }
    }
}
