//! Live step list for one agent task.

use crate::reconcile::Reconciler;
use crate::step::Step;

/// Reconciled view over every delta received so far.
///
/// Deltas are folded in as they arrive; the visible list always equals
/// `process_steps` over everything seen, whatever the batch boundaries were.
#[derive(Debug, Clone, Default)]
pub struct StepAccumulator {
    reconciler: Reconciler,
    steps: Vec<Step>,
    delta_count: usize,
}

impl StepAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, delta: Step) -> &[Step] {
        self.extend([delta])
    }

    pub fn extend(&mut self, deltas: impl IntoIterator<Item = Step>) -> &[Step] {
        for delta in deltas {
            self.reconciler.feed(delta);
            self.delta_count += 1;
        }
        self.steps = self.reconciler.visible();
        &self.steps
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn delta_count(&self) -> usize {
        self.delta_count
    }

    pub fn into_steps(self) -> Vec<Step> {
        self.steps
    }
}
