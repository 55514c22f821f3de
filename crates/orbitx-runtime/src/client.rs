//! UDS JSON-RPC backend adapter.
//!
//! Newline-delimited JSON-RPC 2.0 over a Unix socket. `call` is one request
//! and one response. `invoke` sends the request, then keeps reading: the
//! response acknowledges (or rejects) the invocation and every notification
//! that follows is one channel message, until the backend closes the
//! connection.

use async_trait::async_trait;
use orbitx_channel::{Backend, Channel};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};

/// Notification method the backend uses to report a channel-level error.
const CHANNEL_ERROR_METHOD: &str = "channel.error";

pub struct UdsBackend {
    socket_path: String,
}

impl UdsBackend {
    pub fn new(socket_path: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    async fn send_request(
        &self,
        method: &str,
        params: Value,
    ) -> anyhow::Result<(BufReader<OwnedReadHalf>, OwnedWriteHalf)> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| anyhow::anyhow!("cannot connect to backend at {}: {e}", self.socket_path))?;
        let (reader, mut writer) = stream.into_split();

        let request = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });
        let mut req = serde_json::to_string(&request)?;
        req.push('\n');
        writer.write_all(req.as_bytes()).await?;

        Ok((BufReader::new(reader), writer))
    }

    async fn call_inner(&self, method: &str, params: Value) -> anyhow::Result<Value> {
        let (mut reader, mut writer) = self.send_request(method, params).await?;
        writer.shutdown().await?;
        let mut line = String::new();
        reader.read_line(&mut line).await?;

        match classify_line(&line)? {
            RpcLine::Response(result) => Ok(result),
            RpcLine::Rejected(error) => anyhow::bail!("RPC error: {error}"),
            other => anyhow::bail!("expected a response to {method}, got {other:?}"),
        }
    }

    async fn invoke_inner(&self, method: &str, params: Value, channel: Channel) -> anyhow::Result<()> {
        // Write half held open until the stream ends.
        let (mut reader, _writer) = self.send_request(method, params).await?;
        let mut line = String::new();

        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                tracing::debug!("backend closed {method} stream");
                return Ok(());
            }
            if line.trim().is_empty() {
                continue;
            }
            let delivered = match classify_line(&line) {
                Ok(RpcLine::Response(_)) => true,
                Ok(RpcLine::Rejected(error)) => anyhow::bail!("RPC error: {error}"),
                Ok(RpcLine::Message(params)) => channel.send(params),
                Ok(RpcLine::ChannelError(error)) => channel.fail(error),
                Err(e) => {
                    tracing::warn!("skipping malformed line on {method} stream: {e}");
                    true
                }
            };
            if !delivered {
                tracing::debug!("consumer of {method} went away, dropping connection");
                return Ok(());
            }
        }
    }
}

#[async_trait]
impl Backend for UdsBackend {
    async fn invoke(&self, command: &str, payload: Value, channel: Channel) -> Result<(), String> {
        self.invoke_inner(command, payload, channel)
            .await
            .map_err(|e| e.to_string())
    }

    async fn call(&self, command: &str, payload: Value) -> Result<Value, String> {
        self.call_inner(command, payload).await.map_err(|e| e.to_string())
    }
}

#[derive(Debug, PartialEq)]
enum RpcLine {
    Response(Value),
    Rejected(String),
    Message(Value),
    ChannelError(String),
}

fn classify_line(line: &str) -> anyhow::Result<RpcLine> {
    let value: Value = serde_json::from_str(line.trim())?;

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Ok(RpcLine::Rejected(message));
    }
    if value.get("id").is_some() {
        return Ok(RpcLine::Response(value.get("result").cloned().unwrap_or(Value::Null)));
    }

    let Some(method) = value.get("method").and_then(Value::as_str) else {
        anyhow::bail!("neither a response nor a notification: {value}");
    };
    let params = value.get("params").cloned().unwrap_or(Value::Null);
    if method == CHANNEL_ERROR_METHOD {
        let message = params
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| params.to_string());
        return Ok(RpcLine::ChannelError(message));
    }
    Ok(RpcLine::Message(params))
}
