//! Step: one discrete unit of agent output.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

pub const META_STREAM_ID: &str = "streamId";
pub const META_STREAM_DONE: &str = "streamDone";

/// Step discriminator. Serialised as its snake_case tag; unknown tags are
/// preserved in [`StepType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StepType {
    UserText,
    Thinking,
    Text,
    ToolUse,
    ToolResult,
    Error,
    System,
    Other(String),
}

impl StepType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::UserText => "user_text",
            Self::Thinking => "thinking",
            Self::Text => "text",
            Self::ToolUse => "tool_use",
            Self::ToolResult => "tool_result",
            Self::Error => "error",
            Self::System => "system",
            Self::Other(tag) => tag,
        }
    }

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "user_text" => Self::UserText,
            "thinking" => Self::Thinking,
            "text" => Self::Text,
            "tool_use" => Self::ToolUse,
            "tool_result" => Self::ToolResult,
            "error" => Self::Error,
            "system" => Self::System,
            other => Self::Other(other.to_string()),
        }
    }

    /// Types whose deltas are merged by `(type, streamId)`.
    pub fn is_incremental(&self) -> bool {
        matches!(self, Self::Text | Self::Thinking)
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StepType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StepType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Self::from_tag(&tag))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub step_type: StepType,
    #[serde(default)]
    pub content: String,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Step {
    pub fn new(step_type: StepType, content: impl Into<String>, timestamp: i64) -> Self {
        Self {
            step_type,
            content: content.into(),
            timestamp,
            metadata: None,
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value.into());
        self
    }

    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.metadata.as_ref().and_then(|m| m.get(key))
    }

    /// Streaming identity, if this step is a delta of a longer block.
    pub fn stream_id(&self) -> Option<&str> {
        self.meta(META_STREAM_ID).and_then(Value::as_str)
    }

    pub fn stream_done(&self) -> bool {
        self.meta(META_STREAM_DONE)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Empty end-of-stream marker.
    pub fn is_stream_sentinel(&self) -> bool {
        self.content.is_empty() && self.stream_done()
    }

    /// Overlay `other` onto this step's metadata, key by key.
    pub(crate) fn merge_metadata(&mut self, other: Option<Map<String, Value>>) {
        let Some(other) = other else {
            return;
        };
        self.metadata.get_or_insert_with(Map::new).extend(other);
    }
}
