//! Test doubles shared by the attach and manager tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use orbitx_channel::{Backend, Channel};
use orbitx_shell::PaneId;
use serde_json::Value;

use crate::message::TerminalChannelMessage;
use crate::sink::TerminalSink;

/// Backend that replays canned terminal output and answers pane calls.
#[derive(Default)]
pub(crate) struct TerminalBackend {
    pub output: Vec<TerminalChannelMessage>,
    pub pane_present: bool,
    pub log: Mutex<Vec<(String, Value)>>,
}

impl TerminalBackend {
    pub fn with_output(output: Vec<TerminalChannelMessage>) -> Self {
        Self {
            output,
            ..Self::default()
        }
    }

    pub fn log(&self) -> Vec<(String, Value)> {
        self.log.lock().expect("lock").clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.log().into_iter().map(|(name, _)| name).collect()
    }
}

#[async_trait]
impl Backend for TerminalBackend {
    async fn invoke(&self, command: &str, payload: Value, channel: Channel) -> Result<(), String> {
        self.log
            .lock()
            .expect("lock")
            .push((format!("invoke:{command}"), payload));
        for message in &self.output {
            let value = serde_json::to_value(message).map_err(|e| e.to_string())?;
            channel.send(value);
        }
        Ok(())
    }

    async fn call(&self, command: &str, payload: Value) -> Result<Value, String> {
        self.log
            .lock()
            .expect("lock")
            .push((command.to_string(), payload));
        if command == "terminal_pane_exists" {
            return Ok(Value::Bool(self.pane_present));
        }
        Ok(Value::Null)
    }
}

#[derive(Debug, Default, Clone)]
pub(crate) struct SharedSink {
    text: Arc<Mutex<String>>,
}

impl SharedSink {
    pub fn text(&self) -> String {
        self.text.lock().expect("lock").clone()
    }
}

impl TerminalSink for SharedSink {
    fn write_text(&mut self, _pane_id: PaneId, text: &str) {
        self.text.lock().expect("lock").push_str(text);
    }

    fn write_bytes(&mut self, _pane_id: PaneId, bytes: &[u8]) {
        self.text
            .lock()
            .expect("lock")
            .push_str(&String::from_utf8_lossy(bytes));
    }
}

pub(crate) async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    check()
}
