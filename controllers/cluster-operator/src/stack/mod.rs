//! Tenant cluster infrastructure stack.
//!
//! - `observed`: per-tick capture of the live stack
//! - `detection`: update / scale / no-op decision
//! - `template`: stack body rendering
//! - `reconciler`: create, update and scale orchestration
//! - `delete`: deletion path

pub mod delete;
pub mod detection;
pub mod observed;
pub mod reconciler;
pub mod template;

#[cfg(test)]
mod detection_test;

pub use detection::{decide, should_scale, should_update, DecisionOutcome};
pub use observed::{ObservedStackState, StackOutputs};
pub use reconciler::{stack_name, StackResource, StopWait};
pub use template::{ResourceNames, StackParameters};
