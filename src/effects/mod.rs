//! Event-chain processing.
//!
//! Runs compiled handler chains against a copy-on-write draft of the data
//! and reports what the caller has to do next: commit, notify, transition,
//! queue follow-up events or schedule suspended continuations.
//!
//! The processor never touches the state tree or the scheduler. The
//! designer applies outcomes.

mod chain;
mod error;

pub use chain::{seconds, ChainRunner, Continuation, Frame, Outcome, PendingTransition, Step};
pub use error::{EvalError, Stage};
