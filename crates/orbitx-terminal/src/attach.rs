//! Wiring a pane's backend output subscription into the pipeline.

use std::sync::{Arc, Mutex, PoisonError};

use orbitx_channel::{ChannelTransport, SubscribeOptions, Subscription, SubscriptionCallbacks};
use orbitx_shell::PaneId;
use serde_json::json;

use crate::commands::TerminalCommands;
use crate::message::TerminalChannelMessage;
use crate::pipeline::PaneOutputPipeline;
use crate::sink::{ShellListener, TerminalSink};

/// One pipeline shared by every attached pane; state inside is keyed by
/// pane id.
pub type SharedPipeline = Arc<Mutex<PaneOutputPipeline>>;

/// Subscribe to `pane_id`'s output and feed every message through
/// `pipeline` into `sink` and `listener`.
pub fn attach_pane<S, L>(
    transport: &ChannelTransport,
    commands: &TerminalCommands,
    pane_id: PaneId,
    pipeline: SharedPipeline,
    mut sink: S,
    mut listener: L,
) -> Subscription
where
    S: TerminalSink + 'static,
    L: ShellListener + 'static,
{
    let on_message = move |message: TerminalChannelMessage| {
        if message.pane_id() != pane_id {
            tracing::debug!(pane_id, other = message.pane_id(), "message for another pane on this subscription");
        }
        let mut pipeline = pipeline.lock().unwrap_or_else(PoisonError::into_inner);
        pipeline.handle(message, &mut sink, &mut listener);
    };
    let callbacks = SubscriptionCallbacks::new(on_message).on_error(move |e| {
        tracing::warn!(pane_id, "terminal output subscription failed: {e}");
    });
    let options = SubscribeOptions {
        cancel_command: commands.terminal_output_cancel.clone(),
    };

    transport.subscribe(
        &commands.terminal_output,
        json!({ "paneId": pane_id }),
        callbacks,
        options,
    )
}
