//! The compiled state tree.
//!
//! Nodes live in an arena indexed by [`NodeId`]. Nodes keep no parent
//! pointers; each node stores its path and the trail of names leading to it,
//! and the engine walks from the root.

mod engine;
mod initial;
mod node;

pub use engine::{Entry, StateTree};
pub use initial::InitialScope;
pub use node::{
    AsyncHandler, Handlers, Initial, InitialDecision, Lease, NodeId, NodeKind, Repeat, StateNode,
};
