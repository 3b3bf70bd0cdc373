//! Activation, deactivation and target resolution over the state tree.
//!
//! These functions only read and write the tree itself. Initial rules are
//! evaluated through an [`InitialScope`], which borrows the data and the
//! function table for the duration of one activation.

use super::initial::InitialScope;
use super::node::{Lease, NodeId, NodeKind, StateNode};
use crate::core::{matches_suffix, HistoryMode};
use crate::effects::EvalError;
use std::collections::HashSet;

/// How a node is being entered during an activation pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entry<'p> {
    /// On the way to the target; the remaining names lead to it.
    Toward(&'p [String], HistoryMode),
    /// The node is the transition target.
    Target(HistoryMode),
    /// Below the target or beside the path.
    Descendant { restore: bool },
}

/// Arena of state nodes with a designated root.
#[derive(Clone, Debug)]
pub struct StateTree {
    nodes: Vec<StateNode>,
    root: NodeId,
}

impl StateTree {
    pub(crate) fn new(nodes: Vec<StateNode>, root: NodeId) -> Self {
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &StateNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut StateNode {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node in pre-order, active or not.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.walk(self.root, &mut out, false);
        out
    }

    /// Active nodes in pre-order.
    pub fn active_nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.walk(self.root, &mut out, true);
        out
    }

    /// Paths of the active nodes in pre-order.
    pub fn active_paths(&self) -> Vec<String> {
        self.active_nodes()
            .into_iter()
            .map(|id| self.node(id).path.clone())
            .collect()
    }

    fn walk(&self, id: NodeId, out: &mut Vec<NodeId>, active_only: bool) {
        let node = self.node(id);
        if active_only && !node.active {
            return;
        }
        out.push(id);
        for &child in &node.children {
            self.walk(child, out, active_only);
        }
    }

    pub fn child_named(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.node(id)
            .children
            .iter()
            .copied()
            .find(|&child| self.node(child).name == name)
    }

    /// Every node whose path ends with `.` + `path` (or equals it).
    pub fn find_transition_targets(&self, path: &str) -> Vec<NodeId> {
        self.preorder()
            .into_iter()
            .filter(|&id| matches_suffix(&self.node(id).path, path))
            .collect()
    }

    /// The deepest matching target; among equally deep matches, the last one
    /// in pre-order.
    pub fn resolve_target(&self, path: &str) -> Option<NodeId> {
        self.find_transition_targets(path)
            .into_iter()
            .max_by_key(|&id| self.node(id).depth())
    }

    pub fn lease(&self, id: NodeId) -> Lease {
        self.node(id).lease(id)
    }

    /// True while the leased node is active in the same generation.
    pub fn is_current(&self, lease: Lease) -> bool {
        let node = self.node(lease.node);
        node.active && node.active_id == lease.generation
    }

    /// Deactivate `id` and its whole subtree.
    pub fn deactivate(&mut self, id: NodeId) {
        let node = self.node_mut(id);
        node.active = false;
        node.active_id += 1;
        let children = node.children.clone();
        for child in children {
            self.deactivate(child);
        }
    }

    /// Activate `id` according to `entry`.
    ///
    /// `before` holds the nodes that were active when the transition began;
    /// branches that were active and are not the target keep their active
    /// child.
    pub fn activate<D>(
        &mut self,
        id: NodeId,
        entry: Entry<'_>,
        before: &HashSet<NodeId>,
        scope: &InitialScope<'_, D>,
    ) -> Result<(), EvalError> {
        let entry = match entry {
            Entry::Toward([], mode) => Entry::Target(mode),
            other => other,
        };

        let node = self.node_mut(id);
        if !node.active {
            node.active = true;
            node.active_id += 1;
        }

        match self.node(id).kind {
            NodeKind::Leaf => Ok(()),
            NodeKind::Parallel => {
                let children = self.node(id).children.clone();
                for child in children {
                    let child_entry = match entry {
                        Entry::Toward(names, mode) if self.node(child).name == names[0] => {
                            Entry::Toward(&names[1..], mode)
                        }
                        Entry::Toward(..) => Entry::Descendant { restore: false },
                        Entry::Target(HistoryMode::Fresh) => Entry::Descendant { restore: false },
                        Entry::Target(HistoryMode::Previous) => Entry::Target(HistoryMode::Previous),
                        Entry::Target(HistoryMode::Restore) => Entry::Descendant { restore: true },
                        Entry::Descendant { restore } => Entry::Descendant { restore },
                    };
                    self.activate(child, child_entry, before, scope)?;
                }
                Ok(())
            }
            NodeKind::Branch(_) => {
                let (chosen, child_entry) = self.choose_branch(id, entry, before, scope)?;
                let children = self.node(id).children.clone();
                for other in children.into_iter().filter(|&child| child != chosen) {
                    self.deactivate(other);
                }
                let name = self.node(chosen).name.clone();
                let history = &mut self.node_mut(id).history;
                if history.last() != Some(&name) {
                    history.push(name);
                }
                self.activate(chosen, child_entry, before, scope)
            }
        }
    }

    fn choose_branch<'p, D>(
        &self,
        id: NodeId,
        entry: Entry<'p>,
        before: &HashSet<NodeId>,
        scope: &InitialScope<'_, D>,
    ) -> Result<(NodeId, Entry<'p>), EvalError> {
        match entry {
            Entry::Toward(names, mode) => match self.child_named(id, &names[0]) {
                Some(child) => Ok((child, Entry::Toward(&names[1..], mode))),
                None => Ok((self.initial_child(id, scope)?, Entry::Descendant { restore: false })),
            },
            Entry::Target(mode) => {
                let restore = mode == HistoryMode::Restore;
                if mode != HistoryMode::Fresh {
                    if let Some(child) = self.history_child(id) {
                        return Ok((child, Entry::Descendant { restore }));
                    }
                }
                Ok((self.initial_child(id, scope)?, Entry::Descendant { restore }))
            }
            Entry::Descendant { restore } => {
                if restore {
                    if let Some(child) = self.history_child(id) {
                        return Ok((child, entry));
                    }
                }
                if before.contains(&id) {
                    if let Some(child) = self.active_child(id) {
                        return Ok((child, entry));
                    }
                }
                Ok((self.initial_child(id, scope)?, entry))
            }
        }
    }

    fn history_child(&self, id: NodeId) -> Option<NodeId> {
        let name = self.node(id).history.last()?;
        self.child_named(id, name)
    }

    fn active_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)
            .children
            .iter()
            .copied()
            .find(|&child| self.node(child).active)
    }

    fn initial_child<D>(&self, id: NodeId, scope: &InitialScope<'_, D>) -> Result<NodeId, EvalError> {
        let node = self.node(id);
        let chosen = match &node.kind {
            NodeKind::Branch(initial) => scope
                .resolve(initial)?
                .and_then(|name| self.child_named(id, &name)),
            _ => None,
        };
        Ok(chosen.unwrap_or_else(|| {
            tracing::warn!(path = %node.path, "initial rule selected no child, using the first");
            node.children[0]
        }))
    }
}
