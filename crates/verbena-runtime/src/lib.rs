//! Verbena Runtime
//!
//! This crate executes workflow definitions from `verbena-workflow`. A
//! [`WorkflowRunner`] owns one definition and drives a run per triggering
//! payload:
//!
//! ```text
//! WorkflowRunner
//! ├── run(seed) - seeds a context under "trigger", walks steps to
//! │              completion, suspension, or failure
//! └── resume(token, payload) - consumes the persisted suspension, merges
//!                              the payload, continues at the recorded step
//! ```
//!
//! Steps execute strictly sequentially. Transient service failures are
//! retried with bounded exponential backoff; suspension durably externalizes
//! the context before handing off, so nothing about a suspended run lives in
//! memory. Runners implement `verbena_event::EventHandler`, which is how the
//! router triggers them.

mod error;
mod runner;

pub use error::ExecutionError;
pub use runner::{ResumeOutcome, RunOutcome, RunnerConfig, WorkflowRunner};
