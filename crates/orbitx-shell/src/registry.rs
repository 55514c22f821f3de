//! Per-pane shell-integration state.
//!
//! [`ShellIntegrationRegistry`] owns one decoder, one command tracker and one
//! cwd tracker per pane id, so output from one pane can never disturb the
//! state of another. The owner (the pane-lifecycle manager) is expected to
//! serialise pane creation and disposal with delivery.

use std::borrow::Cow;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ShellIntegrationConfig;
use crate::cwd::{CwdTracker, decode_cwd_value};
use crate::decoder::Utf8StreamDecoder;
use crate::lifecycle::{CommandEvent, CommandLifecycleTracker, CommandRecord, CommandState};
use crate::protocol::{ProtocolEvent, ShellProtocolParser, unterminated_tail};

pub type PaneId = u32;

const PROPERTY_CWD: &str = "Cwd";
const PROPERTY_OS_TYPE: &str = "OSType";

/// UI-facing notification produced while processing pane output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ShellNotification {
    CommandStarted {
        pane_id: PaneId,
        command_id: String,
        start_time: DateTime<Utc>,
    },
    CommandFinished {
        pane_id: PaneId,
        #[serde(flatten)]
        record: CommandRecord,
    },
    CwdChanged {
        pane_id: PaneId,
        cwd: String,
    },
    OsTypeChanged {
        pane_id: PaneId,
        os_type: String,
    },
}

/// Result of [`ShellIntegrationRegistry::ingest`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaneOutput {
    /// Decoded text, ready for the renderer.
    pub text: String,
    pub notifications: Vec<ShellNotification>,
}

#[derive(Debug, Default)]
struct PaneState {
    /// Created lazily on the first chunk, removed when the stream closes.
    decoder: Option<Utf8StreamDecoder>,
    commands: CommandLifecycleTracker,
    cwd: CwdTracker,
    os_type: Option<String>,
    /// Set once the pane has emitted any command marker.
    integration_enabled: bool,
    /// Unterminated OSC tail carried to the next fragment (opt-in).
    residual: String,
}

pub struct ShellIntegrationRegistry {
    config: ShellIntegrationConfig,
    parser: ShellProtocolParser,
    panes: HashMap<PaneId, PaneState>,
}

impl Default for ShellIntegrationRegistry {
    fn default() -> Self {
        Self::new(ShellIntegrationConfig::default())
    }
}

impl ShellIntegrationRegistry {
    pub fn new(config: ShellIntegrationConfig) -> Self {
        Self {
            config,
            parser: ShellProtocolParser::new(),
            panes: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ShellIntegrationConfig {
        &self.config
    }

    /// Decode a raw chunk for `pane_id`, creating its decoder on first use.
    pub fn decode(&mut self, pane_id: PaneId, bytes: &[u8]) -> String {
        self.pane_mut(pane_id)
            .decoder
            .get_or_insert_with(Utf8StreamDecoder::new)
            .decode(bytes)
    }

    /// Flush and drop the decoder of `pane_id` when its byte stream ends.
    ///
    /// Returns the flushed text (empty when nothing was pending or the pane
    /// never produced output).
    pub fn close_stream(&mut self, pane_id: PaneId) -> String {
        self.panes
            .get_mut(&pane_id)
            .and_then(|pane| pane.decoder.take())
            .map(|mut decoder| decoder.finish())
            .unwrap_or_default()
    }

    /// Decode `bytes` and process the resulting text in one step.
    pub fn ingest(&mut self, pane_id: PaneId, bytes: &[u8], now: DateTime<Utc>) -> PaneOutput {
        let text = self.decode(pane_id, bytes);
        let notifications = self.process_text(pane_id, &text, now);
        PaneOutput {
            text,
            notifications,
        }
    }

    /// Scan decoded text for shell-integration sequences and update the
    /// pane's trackers.
    pub fn process_text(
        &mut self,
        pane_id: PaneId,
        text: &str,
        now: DateTime<Utc>,
    ) -> Vec<ShellNotification> {
        let reassemble = self.config.reassemble_split_sequences;
        let max_residual = self.config.max_residual_bytes;
        let parser = self.parser;
        let pane = self.pane_mut(pane_id);

        let scanned = if reassemble {
            let mut combined = std::mem::take(&mut pane.residual);
            combined.push_str(text);
            if let Some(start) = unterminated_tail(&combined) {
                if combined.len() - start <= max_residual {
                    pane.residual = combined[start..].to_string();
                } else {
                    tracing::debug!(pane_id, "discarding oversized OSC residue");
                }
                combined.truncate(start);
            }
            Cow::Owned(combined)
        } else {
            Cow::Borrowed(text)
        };

        if !pane.integration_enabled && parser.contains_shell_integration(&scanned) {
            pane.integration_enabled = true;
            tracing::info!(pane_id, "shell integration detected");
        }
        let events = parser.parse(&scanned);

        let mut notifications = Vec::new();
        for event in &events {
            apply_event(pane_id, pane, event, now, &mut notifications);
        }
        notifications
    }

    /// Forget everything about `pane_id` without emitting notifications.
    pub fn dispose(&mut self, pane_id: PaneId) {
        self.panes.remove(&pane_id);
    }

    pub fn current_cwd(&self, pane_id: PaneId) -> Option<&str> {
        self.panes.get(&pane_id).and_then(|p| p.cwd.current())
    }

    pub fn os_type(&self, pane_id: PaneId) -> Option<&str> {
        self.panes.get(&pane_id).and_then(|p| p.os_type.as_deref())
    }

    pub fn command_state(&self, pane_id: PaneId) -> Option<&CommandState> {
        self.panes.get(&pane_id).map(|p| p.commands.state())
    }

    /// Whether `pane_id` has produced a command marker since it was opened
    /// (or last disposed).
    pub fn integration_enabled(&self, pane_id: PaneId) -> bool {
        self.panes
            .get(&pane_id)
            .is_some_and(|p| p.integration_enabled)
    }

    pub fn has_decoder(&self, pane_id: PaneId) -> bool {
        self.panes
            .get(&pane_id)
            .is_some_and(|p| p.decoder.is_some())
    }

    pub fn pane_count(&self) -> usize {
        self.panes.len()
    }

    fn pane_mut(&mut self, pane_id: PaneId) -> &mut PaneState {
        self.panes.entry(pane_id).or_default()
    }
}

fn apply_event(
    pane_id: PaneId,
    pane: &mut PaneState,
    event: &ProtocolEvent,
    now: DateTime<Utc>,
    out: &mut Vec<ShellNotification>,
) {
    match event {
        ProtocolEvent::CommandStart
        | ProtocolEvent::CommandExecute
        | ProtocolEvent::CommandFinish { .. } => match pane.commands.handle(event, now) {
            Some(CommandEvent::Started {
                command_id,
                start_time,
            }) => out.push(ShellNotification::CommandStarted {
                pane_id,
                command_id,
                start_time,
            }),
            Some(CommandEvent::Finished(record)) => {
                out.push(ShellNotification::CommandFinished { pane_id, record })
            }
            None => {}
        },
        ProtocolEvent::CwdChange(cwd) => observe_cwd(pane_id, pane, cwd, out),
        ProtocolEvent::PropertyUpdate { key, value } => match key.as_str() {
            PROPERTY_CWD => match decode_cwd_value(value) {
                Ok(cwd) => observe_cwd(pane_id, pane, &cwd, out),
                Err(e) => tracing::warn!(pane_id, "skipping undecodable Cwd property {value:?}: {e}"),
            },
            PROPERTY_OS_TYPE => {
                if pane.os_type.as_deref() != Some(value.as_str()) {
                    pane.os_type = Some(value.clone());
                    out.push(ShellNotification::OsTypeChanged {
                        pane_id,
                        os_type: value.clone(),
                    });
                }
            }
            other => tracing::debug!(pane_id, "ignoring shell property {other}"),
        },
    }
}

fn observe_cwd(pane_id: PaneId, pane: &mut PaneState, cwd: &str, out: &mut Vec<ShellNotification>) {
    if pane.cwd.observe(cwd) {
        out.push(ShellNotification::CwdChanged {
            pane_id,
            cwd: cwd.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started_count(notes: &[ShellNotification]) -> usize {
        notes
            .iter()
            .filter(|n| matches!(n, ShellNotification::CommandStarted { .. }))
            .count()
    }

    #[test]
    fn command_scenario_from_bytes() {
        let mut reg = ShellIntegrationRegistry::default();
        let out = reg.ingest(1, b"\x1b]133;B\x07ls -la\r\n\x1b]133;D;0\x07", Utc::now());

        assert_eq!(out.notifications.len(), 2);
        let ShellNotification::CommandStarted { command_id, .. } = &out.notifications[0] else {
            panic!("expected CommandStarted, got {:?}", out.notifications[0]);
        };
        match &out.notifications[1] {
            ShellNotification::CommandFinished { pane_id, record } => {
                assert_eq!(*pane_id, 1);
                assert_eq!(&record.command_id, command_id);
                assert_eq!(record.exit_code, Some(0));
                assert!(record.is_success);
            }
            other => panic!("expected CommandFinished, got {other:?}"),
        }
        assert_eq!(reg.command_state(1), Some(&CommandState::Idle));
    }

    #[test]
    fn same_cwd_twice_notifies_once() {
        let mut reg = ShellIntegrationRegistry::default();
        let now = Utc::now();
        let first = reg.process_text(3, "\x1b]7;file://host/home/me\x07", now);
        let second = reg.process_text(3, "\x1b]7;file://host/home/me\x07", now);

        assert_eq!(
            first,
            vec![ShellNotification::CwdChanged {
                pane_id: 3,
                cwd: "/home/me".to_string()
            }]
        );
        assert!(second.is_empty());
        assert_eq!(reg.current_cwd(3), Some("/home/me"));
    }

    #[test]
    fn cwd_property_shares_dedup_with_osc7() {
        let mut reg = ShellIntegrationRegistry::default();
        let now = Utc::now();
        let first = reg.process_text(1, "\x1b]133;P;Cwd=/srv\x07", now);
        let second = reg.process_text(1, "\x1b]7;/srv\x07", now);
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn os_type_property_is_recorded() {
        let mut reg = ShellIntegrationRegistry::default();
        let now = Utc::now();
        let notes = reg.process_text(1, "\x1b]133;P;OSType=linux\x07\x1b]133;P;OSType=linux\x07", now);
        assert_eq!(
            notes,
            vec![ShellNotification::OsTypeChanged {
                pane_id: 1,
                os_type: "linux".to_string()
            }]
        );
        assert_eq!(reg.os_type(1), Some("linux"));
    }

    #[test]
    fn unknown_property_is_ignored() {
        let mut reg = ShellIntegrationRegistry::default();
        assert!(reg.process_text(1, "\x1b]133;P;Theme=dark\x07", Utc::now()).is_empty());
    }

    #[test]
    fn panes_do_not_share_state() {
        let mut reg = ShellIntegrationRegistry::default();
        let now = Utc::now();
        reg.process_text(1, "\x1b]133;B\x07", now);
        // Finish on another pane must not close pane 1's command.
        assert!(reg.process_text(2, "\x1b]133;D;0\x07", now).is_empty());
        assert!(matches!(reg.command_state(1), Some(CommandState::Active { .. })));

        // Same cwd on two panes notifies for each.
        assert_eq!(reg.process_text(1, "\x1b]7;/x\x07", now).len(), 1);
        assert_eq!(reg.process_text(2, "\x1b]7;/x\x07", now).len(), 1);
    }

    #[test]
    fn split_utf8_across_chunks_per_pane() {
        let mut reg = ShellIntegrationRegistry::default();
        let now = Utc::now();
        assert_eq!(reg.ingest(1, &[0xE4, 0xB8], now).text, "");
        // Interleaved output from another pane must not consume pane 1's bytes.
        assert_eq!(reg.ingest(2, b"ok", now).text, "ok");
        assert_eq!(reg.ingest(1, &[0xAD], now).text, "中");
    }

    #[test]
    fn decoder_is_lazy_and_removed_on_close() {
        let mut reg = ShellIntegrationRegistry::default();
        assert!(!reg.has_decoder(5));
        reg.decode(5, &[b'a', 0xE4]);
        assert!(reg.has_decoder(5));
        assert_eq!(reg.close_stream(5), "\u{FFFD}");
        assert!(!reg.has_decoder(5));
        assert_eq!(reg.close_stream(5), "");
    }

    #[test]
    fn dispose_resets_without_notifications() {
        let mut reg = ShellIntegrationRegistry::default();
        let now = Utc::now();
        reg.ingest(1, b"\x1b]133;B\x07\x1b]7;/a\x07", now);
        reg.dispose(1);
        assert_eq!(reg.pane_count(), 0);
        assert!(reg.process_text(1, "\x1b]133;D;0\x07", now).is_empty());
        assert_eq!(reg.process_text(1, "\x1b]7;/a\x07", now).len(), 1);
    }

    #[test]
    fn split_marker_is_missed_by_default() {
        let mut reg = ShellIntegrationRegistry::default();
        let now = Utc::now();
        let a = reg.process_text(1, "$ \x1b]133;", now);
        let b = reg.process_text(1, "B\x07", now);
        assert_eq!(started_count(&a) + started_count(&b), 0);
    }

    #[test]
    fn split_marker_is_reassembled_when_enabled() {
        let mut reg = ShellIntegrationRegistry::new(ShellIntegrationConfig {
            reassemble_split_sequences: true,
            ..ShellIntegrationConfig::default()
        });
        let now = Utc::now();
        assert!(reg.process_text(1, "$ \x1b]13", now).is_empty());
        let notes = reg.process_text(1, "3;B\x07", now);
        assert_eq!(started_count(&notes), 1);
    }

    #[test]
    fn st_terminator_split_after_esc_is_reassembled() {
        let mut reg = ShellIntegrationRegistry::new(ShellIntegrationConfig {
            reassemble_split_sequences: true,
            ..ShellIntegrationConfig::default()
        });
        let now = Utc::now();
        assert!(reg.process_text(1, "$ \x1b]133;B\x1b", now).is_empty());
        let notes = reg.process_text(1, "\\ls\r\n", now);
        assert_eq!(started_count(&notes), 1);
        assert!(matches!(reg.command_state(1), Some(CommandState::Active { .. })));
    }

    #[test]
    fn empty_cwd_announcement_keeps_previous_value() {
        let mut reg = ShellIntegrationRegistry::default();
        let now = Utc::now();
        reg.process_text(1, "\x1b]7;/home/me\x07", now);
        assert!(reg.process_text(1, "\x1b]7;\x07", now).is_empty());
        assert!(reg.process_text(1, "\x1b]133;P;Cwd=\x07", now).is_empty());
        assert_eq!(reg.current_cwd(1), Some("/home/me"));
    }

    #[test]
    fn integration_enabled_on_first_marker() {
        let mut reg = ShellIntegrationRegistry::default();
        let now = Utc::now();
        reg.process_text(2, "plain output\x1b]7;/tmp\x07", now);
        assert!(!reg.integration_enabled(2));

        reg.process_text(2, "\x1b]133;A\x07$ ", now);
        assert!(reg.integration_enabled(2));
        assert!(!reg.integration_enabled(3));

        reg.process_text(2, "no markers here", now);
        assert!(reg.integration_enabled(2));
        reg.dispose(2);
        assert!(!reg.integration_enabled(2));
    }

    #[test]
    fn oversized_residue_is_discarded() {
        let mut reg = ShellIntegrationRegistry::new(ShellIntegrationConfig {
            reassemble_split_sequences: true,
            max_residual_bytes: 8,
            ..ShellIntegrationConfig::default()
        });
        let now = Utc::now();
        reg.process_text(1, "\x1b]7;/a/very/long/path", now);
        assert!(reg.process_text(1, "\x07", now).is_empty());
    }

    #[test]
    fn notification_wire_shape() {
        let note = ShellNotification::CwdChanged {
            pane_id: 4,
            cwd: "/tmp".to_string(),
        };
        let json = serde_json::to_value(&note).expect("serialize");
        assert_eq!(json["kind"], "cwd_changed");
        assert_eq!(json["paneId"], 4);
        assert_eq!(json["cwd"], "/tmp");
    }
}
