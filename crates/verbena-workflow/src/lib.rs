//! Verbena Workflow
//!
//! This crate provides the workflow definition model for verbena: composable
//! [`Step`] values (transform, service call, publish, branch, suspend), the
//! [`Workflow`] container that names a start step and links steps by id, and
//! the append-only [`ExecutionContext`] a run accumulates state in.
//!
//! Workflows are plain values built with constructor functions; transforms,
//! predicates, and service calls are closures captured at construction time.
//! There is no registry and no global state; execution lives in
//! `verbena-runtime`, and the concrete workflow catalog in `verbena-catalog`.

mod context;
mod error;
mod step;
mod workflow;

pub use context::ExecutionContext;
pub use error::{StepError, WorkflowError};
pub use step::{
  Branch, EnvelopeFn, HandoffFn, PredicateFn, ServiceFn, Step, StepKind, TransformFn,
};
pub use workflow::Workflow;
