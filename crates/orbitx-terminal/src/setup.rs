//! Deferred shell-integration setup for freshly created panes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orbitx_channel::ChannelTransport;
use orbitx_shell::PaneId;
use serde_json::json;
use tokio::task::JoinHandle;

use crate::commands::TerminalCommands;

/// Pane operations the setup step needs from the backend.
#[async_trait]
pub trait PaneHost: Send + Sync {
    async fn exists(&self, pane_id: PaneId) -> Result<bool, String>;
    async fn setup(&self, pane_id: PaneId, silent: bool) -> Result<(), String>;
}

/// [`PaneHost`] backed by request/response calls on the transport.
#[derive(Clone)]
pub struct BackendPaneHost {
    transport: ChannelTransport,
    commands: TerminalCommands,
}

impl BackendPaneHost {
    pub fn new(transport: ChannelTransport, commands: TerminalCommands) -> Self {
        Self {
            transport,
            commands,
        }
    }
}

#[async_trait]
impl PaneHost for BackendPaneHost {
    async fn exists(&self, pane_id: PaneId) -> Result<bool, String> {
        let reply = self
            .transport
            .call(&self.commands.pane_exists, json!({ "paneId": pane_id }))
            .await
            .map_err(|e| e.to_string())?;
        reply
            .as_bool()
            .ok_or_else(|| format!("{} returned a non-boolean: {reply}", self.commands.pane_exists))
    }

    async fn setup(&self, pane_id: PaneId, silent: bool) -> Result<(), String> {
        self.transport
            .call(
                &self.commands.shell_setup,
                json!({ "paneId": pane_id, "silent": silent }),
            )
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    Completed,
    /// Silent setup found the pane already gone.
    PaneMissing,
    Failed(String),
}

/// Wait `delay`, then set up shell integration for `pane_id`.
///
/// Silent setup first checks that the pane still exists so it does not
/// race pane removal. Failures are logged and returned, never raised.
pub async fn run_integration_setup(
    host: &dyn PaneHost,
    pane_id: PaneId,
    silent: bool,
    delay: Duration,
) -> SetupOutcome {
    tokio::time::sleep(delay).await;

    if silent {
        match host.exists(pane_id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(pane_id, "pane gone before shell integration setup");
                return SetupOutcome::PaneMissing;
            }
            Err(e) => {
                tracing::warn!(pane_id, "pane existence check failed: {e}");
                return SetupOutcome::Failed(e);
            }
        }
    }

    match host.setup(pane_id, silent).await {
        Ok(()) => {
            tracing::info!(pane_id, silent, "shell integration set up");
            SetupOutcome::Completed
        }
        Err(e) => {
            tracing::warn!(pane_id, "shell integration setup failed: {e}");
            SetupOutcome::Failed(e)
        }
    }
}

/// Spawn [`run_integration_setup`]. Abort the handle to drop a pending
/// setup when the pane goes away first.
pub fn schedule_integration_setup(
    host: Arc<dyn PaneHost>,
    pane_id: PaneId,
    silent: bool,
    delay: Duration,
) -> JoinHandle<SetupOutcome> {
    tokio::spawn(async move { run_integration_setup(host.as_ref(), pane_id, silent, delay).await })
}
