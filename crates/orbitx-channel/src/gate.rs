//! Terminal-state machine shared by streams and subscriptions.
//!
//! ```text
//!   Open ──begin_close()──▶ Closing ──finish()──▶ Closed
//!     └──────────────────finish()─────────────────▲
//! ```
//!
//! Only `Open` admits deliveries. Whichever path leaves `Open` first (close
//! predicate, consumer cancel, channel error, end of channel) wins; every
//! later attempt is a no-op.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateState {
    #[default]
    Open,
    /// Terminal decision taken; the consumer may still drain one item.
    Closing,
    Closed,
}

#[derive(Debug, Clone, Default)]
pub struct StreamGate {
    state: GateState,
}

impl StreamGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Whether a newly arrived message may be delivered.
    pub fn admit(&self) -> bool {
        self.state == GateState::Open
    }

    /// Leave `Open`. Returns `true` only for the call that made the
    /// transition, so close side effects run exactly once.
    pub fn begin_close(&mut self) -> bool {
        if self.state != GateState::Open {
            return false;
        }
        self.state = GateState::Closing;
        true
    }

    pub fn finish(&mut self) {
        self.state = GateState::Closed;
    }

    pub fn is_closed(&self) -> bool {
        self.state == GateState::Closed
    }
}
