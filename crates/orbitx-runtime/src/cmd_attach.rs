//! `orbitx attach`: stream one live pane until Ctrl-C.

use std::io::Write;
use std::sync::Arc;

use orbitx_channel::ChannelTransport;
use orbitx_shell::{PaneId, ShellNotification};
use orbitx_terminal::{PaneManager, TerminalSink};

use crate::client::UdsBackend;
use crate::config::RuntimeConfig;

/// Writes pane output straight to stdout.
struct StdoutSink {
    quiet: bool,
}

impl TerminalSink for StdoutSink {
    fn write_text(&mut self, pane_id: PaneId, text: &str) {
        self.write_bytes(pane_id, text.as_bytes());
    }

    fn write_bytes(&mut self, _pane_id: PaneId, bytes: &[u8]) {
        if self.quiet {
            return;
        }
        let mut out = std::io::stdout().lock();
        if let Err(e) = out.write_all(bytes).and_then(|()| out.flush()) {
            tracing::debug!("stdout write failed: {e}");
        }
    }
}

/// One line per notification on stderr, so it never interleaves with the
/// pane bytes on stdout.
pub(crate) fn notification_line(notification: &ShellNotification) -> String {
    serde_json::to_string(notification).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
}

pub async fn cmd_attach(
    socket_path: &str,
    config: &RuntimeConfig,
    pane_id: PaneId,
    raw: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    let transport = ChannelTransport::new(Arc::new(UdsBackend::new(socket_path)));
    let mut manager = PaneManager::new(transport, config.commands.terminal.clone(), config.shell.clone());

    if raw {
        manager
            .pipeline()
            .lock()
            .map_err(|_| anyhow::anyhow!("pane pipeline poisoned"))?
            .set_raw_output(pane_id, true);
    }

    let listener = |notification: &ShellNotification| {
        eprintln!("{}", notification_line(notification));
    };
    manager.open(pane_id, StdoutSink { quiet }, listener);
    tracing::info!(pane_id, socket_path, "attached");

    tokio::signal::ctrl_c().await?;
    tracing::info!(pane_id, "detaching");
    manager.shutdown().await;
    Ok(())
}
