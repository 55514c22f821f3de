//! Scripted in-memory backend for transport tests.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::backend::{Backend, Channel};

#[derive(Default)]
pub(crate) struct ScriptedBackend {
    /// Emitted synchronously during `invoke`.
    pub messages: Vec<Value>,
    /// Emitted through `Channel::fail` after `messages`.
    pub channel_error: Option<String>,
    /// Rejects `invoke` after emitting.
    pub invoke_error: Option<String>,
    /// Rejects every `call`.
    pub call_error: Option<String>,
    /// Keep the channel after `invoke` returns so the consumer stays open.
    pub hold_open: bool,
    pub retained: Mutex<Option<Channel>>,
    pub log: Mutex<Vec<(String, Value)>>,
}

impl ScriptedBackend {
    pub fn invocations(&self) -> Vec<(String, Value)> {
        self.log.lock().expect("lock").clone()
    }

    /// Only the `call` entries (cancel and friends).
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.invocations()
            .into_iter()
            .filter(|(name, _)| !name.starts_with("invoke:"))
            .collect()
    }

    pub fn retained_channel(&self) -> Option<Channel> {
        self.retained.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn invoke(&self, command: &str, payload: Value, channel: Channel) -> Result<(), String> {
        self.log
            .lock()
            .expect("lock")
            .push((format!("invoke:{command}"), payload));
        for message in &self.messages {
            channel.send(message.clone());
        }
        if let Some(error) = &self.channel_error {
            channel.fail(error.clone());
        }
        if self.hold_open {
            *self.retained.lock().expect("lock") = Some(channel);
        }
        match &self.invoke_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn call(&self, command: &str, payload: Value) -> Result<Value, String> {
        self.log
            .lock()
            .expect("lock")
            .push((command.to_string(), payload));
        match &self.call_error {
            Some(error) => Err(error.clone()),
            None => Ok(Value::Null),
        }
    }
}

/// Poll `check` until it holds or a short deadline passes.
pub(crate) async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    check()
}
