//! orbitx-steps: agent output reconstruction.
//!
//! The backend streams agent progress as small deltas (text and thinking
//! fragments, tool invocations and their results). [`process_steps`] folds
//! a batch of them into the ordered, de-duplicated [`Step`] list the UI
//! renders; [`StepAccumulator`] keeps that list current as batches arrive.

pub mod accumulator;
pub mod progress;
pub mod reconcile;
pub mod step;

pub use accumulator::StepAccumulator;
pub use progress::TaskProgress;
pub use reconcile::{process_steps, process_steps_value};
pub use step::{META_STREAM_DONE, META_STREAM_ID, Step, StepType};
