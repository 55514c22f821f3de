use thiserror::Error;

/// Failures surfaced by the channel transport.
///
/// None of these are ever raised across a delivery boundary: subscriptions
/// route them to an optional error callback (or the log), streams yield
/// them as a terminal item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("invoking {command} failed: {message}")]
    Invoke { command: String, message: String },

    #[error("cancel command {command} failed: {message}")]
    Cancel { command: String, message: String },

    #[error("channel error: {0}")]
    Channel(String),

    #[error("cannot decode message from {command}: {message}")]
    Decode { command: String, message: String },
}
