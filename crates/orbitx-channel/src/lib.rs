//! orbitx-channel: typed streams over a backend push channel.
//!
//! A [`Backend`] runs named operations; push operations emit JSON messages
//! through a [`Channel`]. [`ChannelTransport`] turns one invocation into
//! either a callback [`Subscription`] or a pull [`ChannelStream`], both
//! cancellable through the `<command>_cancel` convention (or an explicit
//! cancel command).
//!
//! Delivery order within one invocation is the backend's send order.
//! Nothing here panics or returns an error across a delivery boundary.

pub mod backend;
pub mod error;
pub mod gate;
pub mod stream;
pub mod subscription;
pub mod transport;

#[cfg(test)]
mod mock;

pub use backend::{Backend, Channel};
pub use error::TransportError;
pub use gate::{GateState, StreamGate};
pub use stream::{ChannelStream, ClosePredicate, StreamOptions};
pub use subscription::{SubscribeOptions, Subscription, SubscriptionCallbacks};
pub use transport::{CANCEL_SUFFIX, ChannelTransport, default_cancel_command};
