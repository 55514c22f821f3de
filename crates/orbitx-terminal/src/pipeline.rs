//! Per-pane output processing: decode, render, then track shell state.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use orbitx_shell::{PaneId, ShellIntegrationConfig, ShellIntegrationRegistry};

use crate::message::TerminalChannelMessage;
use crate::sink::{ShellListener, TerminalSink};

pub struct PaneOutputPipeline {
    registry: ShellIntegrationRegistry,
    /// Panes whose bytes go to the sink undecoded.
    raw_panes: HashSet<PaneId>,
}

impl Default for PaneOutputPipeline {
    fn default() -> Self {
        Self::new(ShellIntegrationConfig::default())
    }
}

impl PaneOutputPipeline {
    pub fn new(config: ShellIntegrationConfig) -> Self {
        Self {
            registry: ShellIntegrationRegistry::new(config),
            raw_panes: HashSet::new(),
        }
    }

    pub fn registry(&self) -> &ShellIntegrationRegistry {
        &self.registry
    }

    /// Route `pane_id` through the binary path (no decoding, no shell
    /// tracking) or back through the text path.
    pub fn set_raw_output(&mut self, pane_id: PaneId, raw: bool) {
        if raw {
            self.raw_panes.insert(pane_id);
        } else {
            self.raw_panes.remove(&pane_id);
        }
    }

    pub fn handle<S, L>(&mut self, message: TerminalChannelMessage, sink: &mut S, listener: &mut L)
    where
        S: TerminalSink + ?Sized,
        L: ShellListener + ?Sized,
    {
        self.handle_at(message, Utc::now(), sink, listener);
    }

    pub fn handle_at<S, L>(
        &mut self,
        message: TerminalChannelMessage,
        now: DateTime<Utc>,
        sink: &mut S,
        listener: &mut L,
    ) where
        S: TerminalSink + ?Sized,
        L: ShellListener + ?Sized,
    {
        match message {
            TerminalChannelMessage::Data { pane_id, data } => {
                if self.raw_panes.contains(&pane_id) {
                    sink.write_bytes(pane_id, &data);
                    return;
                }
                let output = self.registry.ingest(pane_id, &data, now);
                if !output.text.is_empty() {
                    sink.write_text(pane_id, &output.text);
                }
                for notification in &output.notifications {
                    listener.on_notification(notification);
                }
            }
            TerminalChannelMessage::Error { pane_id, error } => {
                tracing::warn!(pane_id, "terminal channel error: {error}");
            }
            TerminalChannelMessage::Close { pane_id } => {
                let tail = self.registry.close_stream(pane_id);
                if !tail.is_empty() {
                    sink.write_text(pane_id, &tail);
                    for notification in self.registry.process_text(pane_id, &tail, now) {
                        listener.on_notification(&notification);
                    }
                }
                tracing::debug!(pane_id, "pane output closed");
            }
        }
    }

    /// Forget all state of `pane_id`. Nothing is reported for a command
    /// still running in it.
    pub fn dispose(&mut self, pane_id: PaneId) {
        self.registry.dispose(pane_id);
        self.raw_panes.remove(&pane_id);
    }
}
