//! orbitx-terminal: pane output pipeline and pane lifecycle.
//!
//! [`PaneManager`] attaches each pane's backend output stream
//! ([`TerminalChannelMessage`]s) to a shared [`PaneOutputPipeline`], which
//! decodes bytes, hands text to a [`TerminalSink`] and reports command and
//! cwd changes to a [`ShellListener`]. Shell-integration setup runs after a
//! settle delay through a [`PaneHost`].

pub mod attach;
pub mod commands;
pub mod manager;
pub mod message;
pub mod pipeline;
pub mod setup;
pub mod sink;

#[cfg(test)]
mod testing;

pub use attach::{SharedPipeline, attach_pane};
pub use commands::TerminalCommands;
pub use manager::PaneManager;
pub use message::TerminalChannelMessage;
pub use pipeline::PaneOutputPipeline;
pub use setup::{BackendPaneHost, PaneHost, SetupOutcome, run_integration_setup, schedule_integration_setup};
pub use sink::{NoopListener, ShellListener, TerminalSink};
