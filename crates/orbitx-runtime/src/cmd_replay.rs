//! `orbitx replay-output`: run a captured pane byte stream through the
//! output pipeline offline and print what the UI would see.

use std::path::Path;

use orbitx_shell::{PaneId, ShellIntegrationConfig, ShellNotification, ShellProtocolParser};
use orbitx_terminal::{PaneOutputPipeline, ShellListener, TerminalChannelMessage, TerminalSink};
use serde_json::{Value, json};

#[derive(Default)]
struct CollectSink {
    chunks: Vec<String>,
}

impl TerminalSink for CollectSink {
    fn write_text(&mut self, _pane_id: PaneId, text: &str) {
        self.chunks.push(text.to_string());
    }

    fn write_bytes(&mut self, _pane_id: PaneId, bytes: &[u8]) {
        self.chunks.push(String::from_utf8_lossy(bytes).into_owned());
    }
}

#[derive(Default)]
struct CollectListener {
    notifications: Vec<ShellNotification>,
}

impl ShellListener for CollectListener {
    fn on_notification(&mut self, notification: &ShellNotification) {
        self.notifications.push(notification.clone());
    }
}

/// Feed `bytes` as `chunk`-sized Data messages followed by a Close and
/// return one record per delivered text chunk and per notification.
pub(crate) fn replay(
    bytes: &[u8],
    pane_id: PaneId,
    chunk: usize,
    strip: bool,
    config: ShellIntegrationConfig,
) -> Vec<Value> {
    let mut pipeline = PaneOutputPipeline::new(config);
    let parser = ShellProtocolParser::new();
    let mut sink = CollectSink::default();
    let mut listener = CollectListener::default();
    let mut records = Vec::new();

    let messages = bytes
        .chunks(chunk.max(1))
        .map(|data| TerminalChannelMessage::Data {
            pane_id,
            data: data.to_vec(),
        })
        .chain(std::iter::once(TerminalChannelMessage::Close { pane_id }));

    for message in messages {
        pipeline.handle(message, &mut sink, &mut listener);

        for text in sink.chunks.drain(..) {
            let text = if strip { parser.strip_sequences(&text) } else { text };
            if !text.is_empty() {
                records.push(json!({ "kind": "output", "paneId": pane_id, "text": text }));
            }
        }
        for notification in listener.notifications.drain(..) {
            match serde_json::to_value(&notification) {
                Ok(value) => records.push(value),
                Err(e) => tracing::warn!("cannot serialize notification: {e}"),
            }
        }
    }

    records
}

pub async fn cmd_replay_output(
    file: &Path,
    pane_id: PaneId,
    chunk: u64,
    strip: bool,
    reassemble: bool,
    mut config: ShellIntegrationConfig,
) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", file.display()))?;
    let chunk = usize::try_from(chunk)?;
    if reassemble {
        config.reassemble_split_sequences = true;
    }
    tracing::debug!(bytes = bytes.len(), chunk, "replaying capture");

    for record in replay(&bytes, pane_id, chunk, strip, config) {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}
