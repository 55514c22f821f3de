//! Shell-integration tuning knobs, deserialized from the `[shell]` table of
//! the runtime config.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellIntegrationConfig {
    /// Carry an unterminated OSC tail over to the next fragment.
    ///
    /// Off by default: sequences split across deliveries are then missed,
    /// matching per-fragment scanning.
    pub reassemble_split_sequences: bool,
    /// Upper bound for the carried tail; a longer residue is discarded.
    pub max_residual_bytes: usize,
    /// Settle delay between pane creation and integration setup.
    pub setup_delay_ms: u64,
    /// Request silent setup (checks that the pane still exists first).
    pub silent_setup: bool,
}

impl Default for ShellIntegrationConfig {
    fn default() -> Self {
        Self {
            reassemble_split_sequences: false,
            max_residual_bytes: 4096,
            setup_delay_ms: 500,
            silent_setup: true,
        }
    }
}
