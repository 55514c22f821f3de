//! Pull-based view of a push channel.
//!
//! Every message is yielded in delivery order; right after yielding, the
//! consumer's close predicate decides whether the stream ends there. The
//! [`StreamGate`] guarantees that once any terminal path has been taken
//! nothing else is yielded, whatever the backend still has in flight.

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures_util::Stream;
use serde::de::DeserializeOwned;

use crate::backend::{ChannelEvent, ChannelReceiver};
use crate::error::TransportError;
use crate::gate::{GateState, StreamGate};
use crate::transport::CancelTarget;

pub type ClosePredicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

pub struct StreamOptions<T> {
    /// Overrides the `<command>_cancel` default.
    pub cancel_command: Option<String>,
    pub should_close: Option<ClosePredicate<T>>,
}

impl<T> Default for StreamOptions<T> {
    fn default() -> Self {
        Self {
            cancel_command: None,
            should_close: None,
        }
    }
}

impl<T> StreamOptions<T> {
    pub fn close_when(mut self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.should_close = Some(Box::new(predicate));
        self
    }

    pub fn cancel_command(mut self, command: impl Into<String>) -> Self {
        self.cancel_command = Some(command.into());
        self
    }
}

/// Cancellable stream of typed messages from one backend invocation.
///
/// Yields `Ok(message)` items, then ends when the predicate fires, the
/// backend drops the channel, or [`cancel`](Self::cancel) is called. A
/// channel error, rejected invocation or undecodable message is yielded
/// once as `Err` and ends the stream.
pub struct ChannelStream<T> {
    command: String,
    rx: ChannelReceiver,
    gate: StreamGate,
    should_close: Option<ClosePredicate<T>>,
    /// Present until a terminal path has decided whether to cancel.
    cancel: Option<CancelTarget>,
}

impl<T> ChannelStream<T> {
    pub(crate) fn new(
        command: String,
        rx: ChannelReceiver,
        should_close: Option<ClosePredicate<T>>,
        cancel: CancelTarget,
    ) -> Self {
        Self {
            command,
            rx,
            gate: StreamGate::new(),
            should_close,
            cancel: Some(cancel),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn state(&self) -> GateState {
        self.gate.state()
    }

    /// Consumer cancellation: runs the cancel command once and ends the
    /// stream. A stream that already reached a terminal state is left
    /// untouched.
    pub async fn cancel(&mut self) {
        if self.gate.begin_close() {
            self.rx.close();
            if let Some(cancel) = self.cancel.take() {
                cancel.run_logged().await;
            }
        }
        self.gate.finish();
    }

    /// Terminal path that does not ask the backend to stop.
    fn close_quietly(&mut self) {
        self.gate.begin_close();
        self.rx.close();
        self.cancel = None;
    }

    fn fail(&mut self, error: TransportError) -> Poll<Option<Result<T, TransportError>>> {
        if !self.gate.admit() {
            return Poll::Ready(None);
        }
        self.close_quietly();
        Poll::Ready(Some(Err(error)))
    }
}

impl<T: DeserializeOwned> Stream for ChannelStream<T> {
    type Item = Result<T, TransportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if !this.gate.admit() {
            this.gate.finish();
            return Poll::Ready(None);
        }

        let Some(event) = ready!(this.rx.poll_recv(cx)) else {
            this.close_quietly();
            this.gate.finish();
            return Poll::Ready(None);
        };

        match event {
            ChannelEvent::Message(value) => match serde_json::from_value::<T>(value) {
                Ok(message) => {
                    let done = this.should_close.as_ref().is_some_and(|close| close(&message));
                    if done {
                        this.close_quietly();
                    }
                    Poll::Ready(Some(Ok(message)))
                }
                Err(e) => {
                    // The consumer gives up on a live invocation.
                    if let Some(cancel) = this.cancel.take() {
                        cancel.spawn_detached();
                    }
                    let command = this.command.clone();
                    this.fail(TransportError::Decode {
                        command,
                        message: e.to_string(),
                    })
                }
            },
            ChannelEvent::Failed(message) => this.fail(TransportError::Channel(message)),
            ChannelEvent::InvokeFailed(message) => {
                let command = this.command.clone();
                this.fail(TransportError::Invoke { command, message })
            }
        }
    }
}

impl<T> Drop for ChannelStream<T> {
    fn drop(&mut self) {
        if self.gate.begin_close() {
            self.rx.close();
            if let Some(cancel) = self.cancel.take() {
                cancel.spawn_detached();
            }
        }
    }
}
