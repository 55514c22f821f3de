//! Command lifecycle state machine driven by shell-integration markers.
//!
//! ```text
//!            CommandStart / CommandExecute
//!   Idle  ─────────────────────────────────▶  Active
//!    ▲                                         │  │ CommandStart
//!    └──────────── CommandFinish ──────────────┘  └─▶ Active (replaced, no finish)
//! ```
//!
//! A finish while idle is a no-op, so "finished" can never outnumber
//! "started".

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

use crate::protocol::ProtocolEvent;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandState {
    Idle,
    Active {
        command_id: String,
        start_time: DateTime<Utc>,
    },
}

/// A finished command. Handed out once, not retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRecord {
    pub command_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub is_success: bool,
}

/// Transition output of [`CommandLifecycleTracker::handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEvent {
    Started {
        command_id: String,
        start_time: DateTime<Utc>,
    },
    Finished(CommandRecord),
}

/// Per-pane command tracker.
#[derive(Debug, Clone)]
pub struct CommandLifecycleTracker {
    state: CommandState,
}

impl Default for CommandLifecycleTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandLifecycleTracker {
    pub fn new() -> Self {
        Self {
            state: CommandState::Idle,
        }
    }

    pub fn state(&self) -> &CommandState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, CommandState::Active { .. })
    }

    /// Apply one protocol event. Property and cwd events are not ours and
    /// yield `None`.
    pub fn handle(&mut self, event: &ProtocolEvent, now: DateTime<Utc>) -> Option<CommandEvent> {
        match event {
            ProtocolEvent::CommandStart => Some(self.start(now)),
            // Fallback for shells that never emit B.
            ProtocolEvent::CommandExecute if !self.is_active() => Some(self.start(now)),
            ProtocolEvent::CommandExecute => None,
            ProtocolEvent::CommandFinish { payload } => self.finish(payload.as_deref(), now),
            ProtocolEvent::PropertyUpdate { .. } | ProtocolEvent::CwdChange(_) => None,
        }
    }

    /// Drop back to idle without reporting anything (pane disposal).
    pub fn reset(&mut self) {
        self.state = CommandState::Idle;
    }

    fn start(&mut self, now: DateTime<Utc>) -> CommandEvent {
        if let CommandState::Active { command_id, .. } = &self.state {
            tracing::debug!("command {command_id} replaced by a new start marker");
        }
        let command_id = generate_command_id(now);
        self.state = CommandState::Active {
            command_id: command_id.clone(),
            start_time: now,
        };
        CommandEvent::Started {
            command_id,
            start_time: now,
        }
    }

    fn finish(&mut self, payload: Option<&str>, now: DateTime<Utc>) -> Option<CommandEvent> {
        let CommandState::Active {
            command_id,
            start_time,
        } = std::mem::replace(&mut self.state, CommandState::Idle)
        else {
            tracing::debug!("finish marker with no active command");
            return None;
        };

        let exit_code = parse_exit_code(payload);
        Some(CommandEvent::Finished(CommandRecord {
            command_id,
            start_time,
            end_time: Some(now),
            exit_code: Some(exit_code),
            is_success: exit_code == 0,
        }))
    }
}

/// Exit code carried by a `D` marker. Empty or non-numeric payloads count
/// as success. Forms like `exit=2` or `0;extra` yield their first integer
/// token.
pub fn parse_exit_code(payload: Option<&str>) -> i32 {
    let Some(payload) = payload.map(str::trim).filter(|p| !p.is_empty()) else {
        return 0;
    };
    payload.parse::<i32>().ok().unwrap_or_else(|| {
        payload
            .split(|c: char| c == ';' || c == '=' || c.is_whitespace())
            .find_map(|tok| tok.parse::<i32>().ok())
            .unwrap_or(0)
    })
}

/// `cmd_<millis>_<9 base36 chars>`.
fn generate_command_id(now: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("cmd_{}_{suffix}", now.timestamp_millis())
}
