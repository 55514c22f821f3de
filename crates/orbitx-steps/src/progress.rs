//! Agent task progress events and their mapping onto [`Step`]s.
//!
//! Events arrive as `{"type": "<PascalCase>", "payload": {...camelCase}}`.
//! Only the kinds that produce steps or end a task are modelled; every
//! other kind decodes to [`TaskProgress::Other`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::step::{META_STREAM_DONE, META_STREAM_ID, Step, StepType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDelta {
    pub task_id: String,
    pub iteration: u32,
    /// `thought` for thinking deltas, `text` for text deltas.
    #[serde(alias = "thought", alias = "text")]
    pub content: String,
    pub stream_id: String,
    pub stream_done: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUsePayload {
    pub task_id: String,
    pub iteration: u32,
    pub tool_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub params: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultPayload {
    pub task_id: String,
    pub iteration: u32,
    pub tool_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub result: Value,
    pub is_error: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_info: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalAnswerPayload {
    pub task_id: String,
    pub iteration: u32,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskErrorPayload {
    pub task_id: String,
    pub iteration: u32,
    pub error_message: String,
    pub error_type: String,
    pub is_recoverable: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCompletedPayload {
    pub task_id: String,
    pub final_iteration: u32,
    pub completion_reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCancelledPayload {
    pub task_id: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawProgress")]
pub enum TaskProgress {
    Thinking(StreamDelta),
    Text(StreamDelta),
    ToolUse(ToolUsePayload),
    ToolResult(ToolResultPayload),
    FinalAnswer(FinalAnswerPayload),
    TaskError(TaskErrorPayload),
    TaskCompleted(TaskCompletedPayload),
    TaskCancelled(TaskCancelledPayload),
    /// Any other event kind, by tag.
    Other(String),
}

#[derive(Deserialize)]
struct RawProgress {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

impl TryFrom<RawProgress> for TaskProgress {
    type Error = serde_json::Error;

    fn try_from(raw: RawProgress) -> Result<Self, Self::Error> {
        let RawProgress { kind, payload } = raw;
        Ok(match kind.as_str() {
            "Thinking" => Self::Thinking(serde_json::from_value(payload)?),
            "Text" => Self::Text(serde_json::from_value(payload)?),
            "ToolUse" => Self::ToolUse(serde_json::from_value(payload)?),
            "ToolResult" => Self::ToolResult(serde_json::from_value(payload)?),
            "FinalAnswer" => Self::FinalAnswer(serde_json::from_value(payload)?),
            "TaskError" => Self::TaskError(serde_json::from_value(payload)?),
            "TaskCompleted" => Self::TaskCompleted(serde_json::from_value(payload)?),
            "TaskCancelled" => Self::TaskCancelled(serde_json::from_value(payload)?),
            _ => Self::Other(kind),
        })
    }
}

impl TaskProgress {
    /// Whether the task is over: completed, cancelled, or failed beyond
    /// recovery.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::TaskCompleted(_)
                | Self::TaskCancelled(_)
                | Self::TaskError(TaskErrorPayload {
                    is_recoverable: false,
                    ..
                })
        )
    }

    /// The step delta this event contributes, if any.
    pub fn to_step(&self) -> Option<Step> {
        match self {
            Self::Thinking(p) => Some(stream_step(StepType::Thinking, p)),
            Self::Text(p) => Some(stream_step(StepType::Text, p)),
            Self::ToolUse(p) => Some(
                Step::new(
                    StepType::ToolUse,
                    format!("Calling tool: {}", p.tool_name),
                    p.timestamp.timestamp_millis(),
                )
                .with_meta("iteration", p.iteration)
                .with_meta("toolId", p.tool_id.as_str())
                .with_meta("toolName", p.tool_name.as_str())
                .with_meta("params", p.params.clone()),
            ),
            Self::ToolResult(p) => {
                let content = if p.is_error {
                    format!("Tool {} failed", p.tool_name)
                } else {
                    format!("Tool {} returned", p.tool_name)
                };
                let mut step = Step::new(StepType::ToolResult, content, p.timestamp.timestamp_millis())
                    .with_meta("iteration", p.iteration)
                    .with_meta("toolId", p.tool_id.as_str())
                    .with_meta("toolName", p.tool_name.as_str())
                    .with_meta("result", p.result.clone())
                    .with_meta("isError", p.is_error);
                if let Some(ext) = &p.ext_info {
                    step = step.with_meta("extInfo", ext.clone());
                }
                Some(step)
            }
            Self::FinalAnswer(p) => Some(
                Step::new(StepType::Text, p.answer.as_str(), p.timestamp.timestamp_millis())
                    .with_meta("iteration", p.iteration)
                    .with_meta("final", true),
            ),
            Self::TaskError(p) => Some(
                Step::new(
                    StepType::Error,
                    format!("Task error: {}", p.error_message),
                    p.timestamp.timestamp_millis(),
                )
                .with_meta("iteration", p.iteration)
                .with_meta("errorType", p.error_type.as_str())
                .with_meta("recoverable", p.is_recoverable),
            ),
            Self::TaskCompleted(_) | Self::TaskCancelled(_) | Self::Other(_) => None,
        }
    }
}

fn stream_step(step_type: StepType, delta: &StreamDelta) -> Step {
    let mut metadata = Map::new();
    metadata.insert("iteration".to_string(), delta.iteration.into());
    metadata.insert(META_STREAM_ID.to_string(), delta.stream_id.as_str().into());
    metadata.insert(META_STREAM_DONE.to_string(), delta.stream_done.into());
    Step {
        step_type,
        content: delta.content.clone(),
        timestamp: delta.timestamp.timestamp_millis(),
        metadata: Some(metadata),
    }
}
