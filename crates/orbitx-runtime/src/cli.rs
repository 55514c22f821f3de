//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "orbitx", about = "terminal output and agent stream tooling")]
pub struct Cli {
    /// Backend UDS socket path (default: $XDG_RUNTIME_DIR/orbitx/backend.sock)
    #[arg(long, short = 's', global = true, env = "ORBITX_SOCKET")]
    pub socket_path: Option<String>,

    /// Config file (default: $XDG_CONFIG_HOME/orbitx/orbitx.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Feed a raw pane capture through the output pipeline
    ReplayOutput(ReplayOpts),
    /// Reconcile agent step deltas from a JSON / JSON-lines file
    ReconcileSteps(StepsOpts),
    /// Stream a live pane's output and shell notifications
    Attach(AttachOpts),
    /// Run an agent task and print its reconciled steps
    Agent(AgentOpts),
}

#[derive(clap::Args)]
pub struct ReplayOpts {
    /// Raw byte capture of a pane's output
    pub file: PathBuf,

    /// Pane id to attribute the output to
    #[arg(long, default_value = "1")]
    pub pane: u32,

    /// Delivery chunk size in bytes
    #[arg(long, default_value = "4096", value_parser = clap::value_parser!(u64).range(1..))]
    pub chunk: u64,

    /// Remove shell-integration sequences from printed text
    #[arg(long)]
    pub strip: bool,

    /// Reassemble sequences split across chunks (overrides config)
    #[arg(long)]
    pub reassemble: bool,
}

#[derive(clap::Args)]
pub struct StepsOpts {
    /// Step deltas: one JSON array, or one step per line
    pub file: PathBuf,
}

#[derive(clap::Args)]
pub struct AttachOpts {
    #[arg(long)]
    pub pane: u32,

    /// Forward bytes undecoded (no shell tracking)
    #[arg(long)]
    pub raw: bool,

    /// Do not print pane output, only notifications
    #[arg(long)]
    pub quiet: bool,
}

#[derive(clap::Args)]
pub struct AgentOpts {
    #[arg(long)]
    pub prompt: String,

    #[arg(long, default_value = "0")]
    pub conversation_id: i64,
}

/// Default socket path, per user.
pub fn default_socket_path() -> String {
    if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
        return format!("{dir}/orbitx/backend.sock");
    }
    let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    format!("/tmp/orbitx-{user}/backend.sock")
}
