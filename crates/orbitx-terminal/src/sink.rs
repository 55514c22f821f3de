//! Consumers of pipeline output.

use orbitx_shell::{PaneId, ShellNotification};

/// Terminal renderer endpoint.
pub trait TerminalSink: Send {
    /// Decoded text for `pane_id`.
    fn write_text(&mut self, pane_id: PaneId, text: &str);

    /// Raw bytes for panes that bypass decoding.
    fn write_bytes(&mut self, pane_id: PaneId, bytes: &[u8]);
}

/// Receives command lifecycle and cwd notifications.
pub trait ShellListener: Send {
    fn on_notification(&mut self, notification: &ShellNotification);
}

impl<F> ShellListener for F
where
    F: FnMut(&ShellNotification) + Send,
{
    fn on_notification(&mut self, notification: &ShellNotification) {
        self(notification)
    }
}

/// Listener that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl ShellListener for NoopListener {
    fn on_notification(&mut self, _notification: &ShellNotification) {}
}
