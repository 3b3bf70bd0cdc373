//! State nodes and the arena that owns them.

use crate::core::{AsyncId, Delay, Guards, HandlerChain, ResultId};
use std::collections::HashMap;
use std::sync::Arc;

/// Index of a node in its [`StateTree`](super::StateTree).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Cancellation token for timers and async tasks owned by a node.
///
/// A lease is current only while its node stays active with the same
/// activation generation. Deactivation bumps the generation, which
/// invalidates every lease taken before it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lease {
    pub node: NodeId,
    pub generation: u64,
}

/// How a branch picks its child when entered without history.
#[derive(Clone, Debug)]
pub enum Initial {
    Child(String),
    Decision(Arc<InitialDecision>),
}

/// Compiled `initial` object: `get` → guards → `to`, else `then`/`else`.
#[derive(Clone, Debug, Default)]
pub struct InitialDecision {
    pub get: Vec<ResultId>,
    pub guards: Guards,
    pub to: Option<String>,
    pub then: Option<Initial>,
    pub otherwise: Option<Initial>,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Leaf,
    /// Exactly one active child at a time.
    Branch(Initial),
    /// All children active together.
    Parallel,
}

/// `repeat` handler of a node. Without a delay it runs once per frame.
#[derive(Clone, Debug)]
pub struct Repeat {
    pub on_repeat: HandlerChain,
    pub delay: Option<Delay>,
}

/// `async` handler of a node.
#[derive(Clone, Debug)]
pub struct AsyncHandler {
    pub op: AsyncId,
    pub on_resolve: HandlerChain,
    pub on_reject: Option<HandlerChain>,
}

/// Compiled handlers of one node.
#[derive(Clone, Debug, Default)]
pub struct Handlers {
    pub on: HashMap<String, HandlerChain>,
    pub on_enter: Option<HandlerChain>,
    pub on_exit: Option<HandlerChain>,
    pub on_event: Option<HandlerChain>,
    pub repeat: Option<Repeat>,
    pub async_handler: Option<AsyncHandler>,
}

/// One node of the compiled state tree.
#[derive(Clone, Debug)]
pub struct StateNode {
    pub name: String,
    /// Dot-joined names from the machine id down to this node
    pub path: String,
    /// Names below the root leading to this node
    pub trail: Vec<String>,
    pub active: bool,
    /// Activation generation, bumped on every (de)activation
    pub active_id: u64,
    /// Previously active child names, most recent last
    pub history: Vec<String>,
    pub kind: NodeKind,
    pub children: Vec<NodeId>,
    pub handlers: Handlers,
}

impl StateNode {
    pub fn new(name: impl Into<String>, path: impl Into<String>, trail: Vec<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            trail,
            active: false,
            active_id: 0,
            history: Vec::new(),
            kind: NodeKind::Leaf,
            children: Vec::new(),
            handlers: Handlers::default(),
        }
    }

    pub fn depth(&self) -> usize {
        self.trail.len()
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self.kind, NodeKind::Parallel)
    }

    pub fn lease(&self, id: NodeId) -> Lease {
        Lease {
            node: id,
            generation: self.active_id,
        }
    }
}
