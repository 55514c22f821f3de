//! Backend push-channel primitive.
//!
//! A [`Backend`] runs named operations. Push operations receive a
//! [`Channel`] and emit any number of JSON messages through it; plain
//! request/response operations (cancel, existence checks, setup) go through
//! [`Backend::call`].

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

/// What travels from a [`Channel`] to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ChannelEvent {
    Message(Value),
    /// Channel-level failure reported by the backend.
    Failed(String),
    /// The invocation itself was rejected.
    InvokeFailed(String),
}

pub(crate) type ChannelReceiver = mpsc::UnboundedReceiver<ChannelEvent>;

/// Backend-side handle of one push channel.
///
/// Cloneable; messages are delivered in send order. Once the consumer
/// closes (unsubscribe, stream cancel, stream closed by its predicate)
/// every send becomes a no-op returning `false`.
#[derive(Debug, Clone)]
pub struct Channel {
    tx: mpsc::UnboundedSender<ChannelEvent>,
}

impl Channel {
    pub(crate) fn pair() -> (Self, ChannelReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Push one message. Returns `false` when the consumer is gone.
    pub fn send(&self, message: Value) -> bool {
        self.tx.send(ChannelEvent::Message(message)).is_ok()
    }

    /// Report a channel-level error to the consumer.
    pub fn fail(&self, error: impl Into<String>) -> bool {
        self.tx.send(ChannelEvent::Failed(error.into())).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub(crate) fn invoke_failed(&self, error: String) -> bool {
        self.tx.send(ChannelEvent::InvokeFailed(error)).is_ok()
    }
}

/// Named backend operations.
///
/// Errors are plain strings, matching what a command bridge rejects with.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Start the push operation `command`. The backend may keep clones of
    /// `channel` and emit after this returns; the stream ends once every
    /// clone is dropped.
    async fn invoke(&self, command: &str, payload: Value, channel: Channel) -> Result<(), String>;

    /// Request/response operation.
    async fn call(&self, command: &str, payload: Value) -> Result<Value, String>;
}
