//! Pane lifecycle: attach output, schedule integration setup, dispose.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use orbitx_channel::{ChannelTransport, Subscription};
use orbitx_shell::{PaneId, ShellIntegrationConfig};
use tokio::task::JoinHandle;

use crate::attach::{SharedPipeline, attach_pane};
use crate::commands::TerminalCommands;
use crate::pipeline::PaneOutputPipeline;
use crate::setup::{BackendPaneHost, PaneHost, SetupOutcome, schedule_integration_setup};
use crate::sink::{ShellListener, TerminalSink};

struct AttachedPane {
    subscription: Subscription,
    setup: JoinHandle<SetupOutcome>,
}

/// Owns every open pane's subscription and shell state.
///
/// Opening and closing take `&mut self`, so pane creation and disposal are
/// serialised with respect to each other.
pub struct PaneManager {
    transport: ChannelTransport,
    commands: TerminalCommands,
    host: Arc<dyn PaneHost>,
    pipeline: SharedPipeline,
    panes: HashMap<PaneId, AttachedPane>,
    setup_delay: Duration,
    silent_setup: bool,
}

impl PaneManager {
    pub fn new(transport: ChannelTransport, commands: TerminalCommands, config: ShellIntegrationConfig) -> Self {
        let host = Arc::new(BackendPaneHost::new(transport.clone(), commands.clone()));
        Self {
            transport,
            commands,
            host,
            setup_delay: Duration::from_millis(config.setup_delay_ms),
            silent_setup: config.silent_setup,
            pipeline: Arc::new(Mutex::new(PaneOutputPipeline::new(config))),
            panes: HashMap::new(),
        }
    }

    /// Replace the backend-backed [`PaneHost`].
    #[must_use]
    pub fn with_host(mut self, host: Arc<dyn PaneHost>) -> Self {
        self.host = host;
        self
    }

    pub fn pipeline(&self) -> &SharedPipeline {
        &self.pipeline
    }

    pub fn is_open(&self, pane_id: PaneId) -> bool {
        self.panes.contains_key(&pane_id)
    }

    pub fn open_panes(&self) -> Vec<PaneId> {
        let mut ids: Vec<PaneId> = self.panes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Start streaming `pane_id`'s output and schedule its shell
    /// integration setup after the settle delay.
    ///
    /// Opening a pane that is already open replaces the old attachment.
    pub fn open<S, L>(&mut self, pane_id: PaneId, sink: S, listener: L)
    where
        S: TerminalSink + 'static,
        L: ShellListener + 'static,
    {
        if let Some(previous) = self.panes.remove(&pane_id) {
            tracing::warn!(pane_id, "pane already open, replacing attachment");
            previous.setup.abort();
            drop(previous.subscription);
            self.dispose_state(pane_id);
        }

        let subscription = attach_pane(
            &self.transport,
            &self.commands,
            pane_id,
            self.pipeline.clone(),
            sink,
            listener,
        );
        let setup = schedule_integration_setup(self.host.clone(), pane_id, self.silent_setup, self.setup_delay);
        self.panes.insert(pane_id, AttachedPane { subscription, setup });
        tracing::debug!(pane_id, "pane opened");
    }

    /// Detach `pane_id`: cancel its output subscription, drop a pending
    /// setup and forget its shell state. Returns `false` if it was not open.
    pub async fn close(&mut self, pane_id: PaneId) -> bool {
        let Some(AttachedPane { subscription, setup }) = self.panes.remove(&pane_id) else {
            return false;
        };
        setup.abort();
        subscription.unsubscribe().await;
        self.dispose_state(pane_id);
        tracing::debug!(pane_id, "pane closed");
        true
    }

    pub async fn shutdown(&mut self) {
        for pane_id in self.open_panes() {
            self.close(pane_id).await;
        }
    }

    fn dispose_state(&self, pane_id: PaneId) {
        self.pipeline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .dispose(pane_id);
    }
}
