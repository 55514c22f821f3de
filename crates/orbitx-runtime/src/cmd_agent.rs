//! `orbitx agent`: run one agent task and print its reconciled steps.

use std::future::Future;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use orbitx_channel::{ChannelTransport, StreamOptions, TransportError};
use orbitx_steps::{Step, StepAccumulator, TaskProgress};
use serde_json::{Value, json};

use crate::client::UdsBackend;
use crate::config::AgentCommands;

pub(crate) fn execute_payload(conversation_id: i64, prompt: &str) -> Value {
    json!({
        "params": {
            "conversationId": conversation_id,
            "userPrompt": prompt,
        }
    })
}

#[derive(Debug, Default)]
pub(crate) struct Collected {
    pub steps: Vec<Step>,
    pub error: Option<TransportError>,
    pub interrupted: bool,
}

/// Fold `progress` into steps until it ends, fails, or `interrupt` fires.
///
/// Steps received before a failure or interrupt are kept.
pub(crate) async fn collect_steps<S, F>(progress: &mut S, interrupt: F) -> Collected
where
    S: Stream<Item = Result<TaskProgress, TransportError>> + Unpin,
    F: Future,
{
    let mut accumulator = StepAccumulator::new();
    let mut error = None;
    let mut interrupted = false;
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            item = progress.next() => match item {
                Some(Ok(event)) => match event.to_step() {
                    Some(step) => {
                        accumulator.push(step);
                    }
                    None => tracing::debug!(?event, "progress event without a step"),
                },
                Some(Err(e)) => {
                    error = Some(e);
                    break;
                }
                None => break,
            },
            _ = &mut interrupt => {
                interrupted = true;
                break;
            }
        }
    }

    Collected {
        steps: accumulator.into_steps(),
        error,
        interrupted,
    }
}

pub async fn cmd_agent(
    socket_path: &str,
    commands: &AgentCommands,
    conversation_id: i64,
    prompt: &str,
) -> anyhow::Result<()> {
    let transport = ChannelTransport::new(Arc::new(UdsBackend::new(socket_path)));
    let options = StreamOptions::default()
        .cancel_command(commands.agent_cancel.as_str())
        .close_when(TaskProgress::is_terminal);
    let mut stream = transport.create_stream::<TaskProgress>(
        &commands.agent_execute,
        execute_payload(conversation_id, prompt),
        options,
    );
    tracing::info!(conversation_id, "agent task started");

    let collected = collect_steps(&mut stream, tokio::signal::ctrl_c()).await;
    if collected.interrupted {
        tracing::info!("cancelling agent task");
        stream.cancel().await;
    }

    for step in &collected.steps {
        println!("{}", serde_json::to_string(step)?);
    }
    match collected.error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
