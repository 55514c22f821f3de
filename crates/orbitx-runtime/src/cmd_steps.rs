//! `orbitx reconcile-steps`: fold a file of step deltas into display steps.

use std::path::Path;

use orbitx_steps::{Step, process_steps_value};
use serde_json::Value;

/// Accepts either one JSON array of steps or JSON lines (one step per
/// line). Lines that are not JSON are logged and skipped.
pub(crate) fn parse_deltas(text: &str) -> Value {
    if let Ok(value @ Value::Array(_)) = serde_json::from_str::<Value>(text) {
        return value;
    }

    let mut deltas = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => deltas.push(value),
            Err(e) => tracing::warn!(line = index + 1, "skipping unparseable step: {e}"),
        }
    }
    Value::Array(deltas)
}

pub(crate) fn reconcile(text: &str) -> Vec<Step> {
    process_steps_value(parse_deltas(text))
}

pub async fn cmd_reconcile_steps(file: &Path) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", file.display()))?;

    let steps = reconcile(&text);
    tracing::debug!(steps = steps.len(), "reconciled");
    for step in &steps {
        println!("{}", serde_json::to_string(step)?);
    }
    Ok(())
}
