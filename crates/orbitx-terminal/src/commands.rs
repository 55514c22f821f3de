use serde::{Deserialize, Serialize};

/// Backend command names used for pane output and setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalCommands {
    /// Push command streaming `TerminalChannelMessage`s for one pane.
    pub terminal_output: String,
    /// Cancel command for `terminal_output`; `<terminal_output>_cancel`
    /// when unset.
    pub terminal_output_cancel: Option<String>,
    pub pane_exists: String,
    pub shell_setup: String,
}

impl Default for TerminalCommands {
    fn default() -> Self {
        Self {
            terminal_output: "terminal_subscribe_output".to_string(),
            terminal_output_cancel: None,
            pane_exists: "terminal_pane_exists".to_string(),
            shell_setup: "setup_shell_integration".to_string(),
        }
    }
}
