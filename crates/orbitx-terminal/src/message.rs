//! Terminal output channel messages, as pushed by the backend.

use orbitx_shell::PaneId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TerminalChannelMessage {
    Data {
        #[serde(alias = "paneId")]
        pane_id: PaneId,
        data: Vec<u8>,
    },
    Error {
        #[serde(alias = "paneId")]
        pane_id: PaneId,
        error: String,
    },
    Close {
        #[serde(alias = "paneId")]
        pane_id: PaneId,
    },
}

impl TerminalChannelMessage {
    pub fn pane_id(&self) -> PaneId {
        match self {
            Self::Data { pane_id, .. } | Self::Error { pane_id, .. } | Self::Close { pane_id } => *pane_id,
        }
    }
}
