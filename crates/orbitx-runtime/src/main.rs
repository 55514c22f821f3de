//! orbitx: command-line driver for the terminal streaming layer.
//!
//! `replay-output` and `reconcile-steps` run offline against files;
//! `attach` and `agent` talk to a backend over its UDS JSON-RPC socket.

use clap::Parser;

mod cli;
mod client;
mod cmd_agent;
mod cmd_attach;
mod cmd_replay;
mod cmd_steps;
mod config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let filter = std::env::var("ORBITX_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let config = config::RuntimeConfig::load(args.config.as_deref())?;

    match args.command {
        cli::Command::ReplayOutput(opts) => {
            cmd_replay::cmd_replay_output(
                &opts.file,
                opts.pane,
                opts.chunk,
                opts.strip,
                opts.reassemble,
                config.shell,
            )
            .await?;
        }
        cli::Command::ReconcileSteps(opts) => {
            cmd_steps::cmd_reconcile_steps(&opts.file).await?;
        }
        cli::Command::Attach(opts) => {
            let socket_path = config.resolve_socket_path(args.socket_path, cli::default_socket_path);
            cmd_attach::cmd_attach(&socket_path, &config, opts.pane, opts.raw, opts.quiet).await?;
        }
        cli::Command::Agent(opts) => {
            let socket_path = config.resolve_socket_path(args.socket_path, cli::default_socket_path);
            cmd_agent::cmd_agent(
                &socket_path,
                &config.commands.agent,
                opts.conversation_id,
                &opts.prompt,
            )
            .await?;
        }
    }

    Ok(())
}
