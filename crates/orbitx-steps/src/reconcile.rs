//! Step reconciliation: merge a batch of incremental deltas into stable,
//! de-duplicated blocks.
//!
//! Three rules, applied in one left-to-right walk:
//!
//! 1. Tool pairing: a `tool_result` folds into the immediately preceding
//!    delta when that delta is still a `tool_use`. Pairing is positional,
//!    not keyed by tool id.
//! 2. Incremental merge: `text`/`thinking` deltas sharing
//!    `(stepType, streamId)` are concatenated into the first occurrence.
//! 3. Sentinel filter: empty steps flagged `streamDone` are dropped from
//!    the visible list.

use std::collections::HashMap;

use serde_json::Value;

use crate::step::{Step, StepType};

/// Reconcile `steps`. Pure; running it on its own output changes nothing
/// for streamed text and thinking blocks.
pub fn process_steps(steps: impl IntoIterator<Item = Step>) -> Vec<Step> {
    let mut reconciler = Reconciler::default();
    for step in steps {
        reconciler.feed(step);
    }
    reconciler.into_visible()
}

/// Reconcile an untyped JSON value. Anything but an array yields no steps;
/// array elements that are not steps are skipped.
pub fn process_steps_value(value: Value) -> Vec<Step> {
    let Value::Array(items) = value else {
        tracing::debug!("step batch is not an array, treating as empty");
        return Vec::new();
    };
    let steps = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<Step>(item) {
            Ok(step) => Some(step),
            Err(e) => {
                tracing::warn!("skipping malformed step at index {index}: {e}");
                None
            }
        });
    process_steps(steps)
}

/// Online form of the three rules. Feeding deltas one at a time, in any
/// batching, gives the same result as [`process_steps`] over all of them.
#[derive(Debug, Clone, Default)]
pub(crate) struct Reconciler {
    /// Merged steps, sentinels included.
    merged: Vec<Step>,
    /// First occurrence of each `(type, streamId)` in `merged`.
    streams: HashMap<(StepType, String), usize>,
    /// Index in `merged` of the last delta when it is an unpaired `tool_use`.
    open_tool_use: Option<usize>,
}

impl Reconciler {
    pub(crate) fn feed(&mut self, step: Step) {
        if step.step_type == StepType::ToolResult {
            if let Some(index) = self.open_tool_use.take() {
                let target = &mut self.merged[index];
                target.step_type = StepType::ToolResult;
                target.content = step.content;
                target.timestamp = step.timestamp;
                target.merge_metadata(step.metadata);
                return;
            }
        }

        self.open_tool_use = None;
        if step.step_type.is_incremental() {
            if let Some(stream_id) = step.stream_id() {
                let key = (step.step_type.clone(), stream_id.to_string());
                if let Some(&index) = self.streams.get(&key) {
                    let target = &mut self.merged[index];
                    target.content.push_str(&step.content);
                    target.timestamp = step.timestamp;
                    target.merge_metadata(step.metadata);
                } else {
                    self.streams.insert(key, self.merged.len());
                    self.merged.push(step);
                }
                return;
            }
        }

        if step.step_type == StepType::ToolUse {
            self.open_tool_use = Some(self.merged.len());
        }
        self.merged.push(step);
    }

    pub(crate) fn visible(&self) -> Vec<Step> {
        self.merged
            .iter()
            .filter(|step| !step.is_stream_sentinel())
            .cloned()
            .collect()
    }

    pub(crate) fn into_visible(self) -> Vec<Step> {
        self.merged
            .into_iter()
            .filter(|step| !step.is_stream_sentinel())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{META_STREAM_DONE, META_STREAM_ID};
    use proptest::prelude::*;
    use serde_json::json;

    fn text(stream: &str, content: &str, ts: i64) -> Step {
        Step::new(StepType::Text, content, ts).with_meta(META_STREAM_ID, stream)
    }

    fn thinking(stream: &str, content: &str, ts: i64) -> Step {
        Step::new(StepType::Thinking, content, ts).with_meta(META_STREAM_ID, stream)
    }

    fn tool_use(id: &str) -> Step {
        Step::new(StepType::ToolUse, format!("Calling tool: {id}"), 1)
            .with_meta("toolId", id)
            .with_meta("params", json!({"cmd": "ls"}))
    }

    fn tool_result(id: &str) -> Step {
        Step::new(StepType::ToolResult, "done", 2)
            .with_meta("toolId", id)
            .with_meta("result", "ok")
            .with_meta("isError", false)
    }

    #[test]
    fn tool_result_folds_into_preceding_use() {
        let out = process_steps(vec![tool_use("a"), tool_result("a")]);
        assert_eq!(out.len(), 1);
        let step = &out[0];
        assert_eq!(step.step_type, StepType::ToolResult);
        assert_eq!(step.content, "done");
        assert_eq!(step.timestamp, 2);
        assert_eq!(step.meta("params"), Some(&json!({"cmd": "ls"})));
        assert_eq!(step.meta("result"), Some(&json!("ok")));
        assert_eq!(step.meta("isError"), Some(&json!(false)));
    }

    #[test]
    fn lone_tool_result_stays_standalone() {
        let out = process_steps(vec![tool_result("a")]);
        assert_eq!(out, vec![tool_result("a")]);
    }

    #[test]
    fn tool_result_after_other_step_is_not_paired() {
        let steps = vec![tool_use("a"), Step::new(StepType::Text, "hm", 1), tool_result("a")];
        let out = process_steps(steps.clone());
        assert_eq!(out, steps);
    }

    #[test]
    fn pairing_is_positional() {
        // Result "b" lands on the most recent use, whatever its id.
        let out = process_steps(vec![tool_use("a"), tool_result("b")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].meta("toolId"), Some(&json!("b")));
        assert_eq!(out[0].step_type, StepType::ToolResult);
    }

    #[test]
    fn second_result_does_not_refold() {
        let out = process_steps(vec![tool_use("a"), tool_result("a"), tool_result("a")]);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|s| s.step_type == StepType::ToolResult));
    }

    #[test]
    fn stream_deltas_concatenate() {
        let out = process_steps(vec![text("s1", "Hel", 1), text("s1", "lo", 2), text("s2", "Hi", 3)]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].content, "Hello");
        assert_eq!(out[0].timestamp, 2);
        assert_eq!(out[1].content, "Hi");
    }

    #[test]
    fn same_stream_id_different_type_stays_apart() {
        let out = process_steps(vec![thinking("s1", "plan", 1), text("s1", "answer", 2), thinking("s1", "!", 3)]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].step_type, StepType::Thinking);
        assert_eq!(out[0].content, "plan!");
        assert_eq!(out[1].content, "answer");
    }

    #[test]
    fn interleaved_streams_merge_into_first_position() {
        let out = process_steps(vec![
            text("s1", "a", 1),
            tool_use("x"),
            text("s1", "b", 2),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].content, "ab");
        assert_eq!(out[1].step_type, StepType::ToolUse);
    }

    #[test]
    fn steps_without_stream_id_always_append() {
        let plain = Step::new(StepType::Text, "x", 1);
        let out = process_steps(vec![plain.clone(), plain.clone()]);
        assert_eq!(out, vec![plain.clone(), plain]);
    }

    #[test]
    fn sentinel_is_dropped_but_merges_done_flag() {
        let done = text("s1", "", 3).with_meta(META_STREAM_DONE, true);
        let out = process_steps(vec![text("s1", "Hi", 1), done.clone()]);
        assert_eq!(out.len(), 1);
        assert!(out[0].stream_done());
        assert_eq!(out[0].content, "Hi");

        assert!(process_steps(vec![done]).is_empty());
        let bare = Step::new(StepType::Error, "", 0).with_meta(META_STREAM_DONE, true);
        assert!(process_steps(vec![bare]).is_empty());
    }

    #[test]
    fn value_input_that_is_not_an_array_is_empty() {
        assert!(process_steps_value(json!({"stepType": "text"})).is_empty());
        assert!(process_steps_value(Value::Null).is_empty());
    }

    #[test]
    fn value_input_skips_malformed_elements() {
        let out = process_steps_value(json!([
            {"stepType": "text", "content": "Hel", "timestamp": 1, "metadata": {"streamId": "s1"}},
            42,
            {"content": "no type"},
            {"stepType": "text", "content": "lo", "timestamp": 2, "metadata": {"streamId": "s1"}},
        ]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, "Hello");
    }

    #[test]
    fn rerun_is_stable() {
        let once = process_steps(vec![
            text("s1", "Hel", 1),
            tool_use("a"),
            tool_result("a"),
            text("s1", "lo", 2),
            thinking("t", "hmm", 3),
            text("s2", "", 4).with_meta(META_STREAM_DONE, true),
        ]);
        assert_eq!(process_steps(once.clone()), once);
    }

    fn arb_stream_step() -> impl Strategy<Value = Step> {
        (
            prop_oneof![Just(StepType::Text), Just(StepType::Thinking), Just(StepType::UserText)],
            prop::option::of(prop_oneof![Just("s1"), Just("s2"), Just("s3")]),
            "[a-z]{0,3}",
            any::<bool>(),
            0i64..100,
        )
            .prop_map(|(step_type, stream, content, done, ts)| {
                let mut step = Step::new(step_type, content, ts);
                if let Some(id) = stream {
                    step = step.with_meta(META_STREAM_ID, id);
                }
                if done {
                    step = step.with_meta(META_STREAM_DONE, true);
                }
                step
            })
    }

    proptest! {
        #[test]
        fn output_has_no_sentinels_or_duplicate_streams(steps in prop::collection::vec(arb_stream_step(), 0..24)) {
            let out = process_steps(steps.clone());
            prop_assert!(out.len() <= steps.len());
            prop_assert!(out.iter().all(|s| !s.is_stream_sentinel()));

            let mut seen = std::collections::HashSet::new();
            for step in out.iter().filter(|s| s.step_type.is_incremental()) {
                if let Some(id) = step.stream_id() {
                    prop_assert!(seen.insert((step.step_type.clone(), id.to_string())));
                }
            }
        }

        #[test]
        fn streamed_output_is_a_fixed_point(steps in prop::collection::vec(arb_stream_step(), 0..24)) {
            let once = process_steps(steps);
            prop_assert_eq!(process_steps(once.clone()), once);
        }
    }
}
