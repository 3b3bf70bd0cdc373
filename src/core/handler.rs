//! Compiled handler objects and chains.

use super::guard::Guards;
use super::table::{ActionId, ConditionId, ResultId, TargetId, TimeId};
use serde_json::Value;
use std::ops::Deref;
use std::sync::Arc;

/// Where a transition goes: a fixed path or a computed one.
#[derive(Clone, Debug, PartialEq)]
pub enum Target {
    Path(String),
    Computed(TargetId),
}

/// How long a handler object waits before running.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Delay {
    /// Fixed delay in seconds.
    Seconds(f64),
    Computed(TimeId),
}

/// Follow-up event queued when a handler object passes its guards.
#[derive(Clone, Debug, PartialEq)]
pub struct FollowUp {
    pub event: String,
    pub payload: Value,
}

/// One link of a handler chain.
///
/// Stages run in order: `get` results, guards, then either the passing
/// branch (`actions`, `secret_actions`, `send`, `to`/`secretly_to` or
/// `then`, finally `break_when`) or the `otherwise` chain.
#[derive(Clone, Debug, Default)]
pub struct HandlerObject {
    pub get: Vec<ResultId>,
    pub guards: Guards,
    pub actions: Vec<ActionId>,
    pub secret_actions: Vec<ActionId>,
    pub to: Vec<Target>,
    pub secretly_to: Vec<Target>,
    pub send: Option<FollowUp>,
    pub wait: Option<Delay>,
    pub break_when: Option<ConditionId>,
    pub then: Option<HandlerChain>,
    pub otherwise: Option<HandlerChain>,
}

impl HandlerObject {
    /// A handler object that only runs one action.
    pub fn action(id: ActionId) -> Self {
        Self {
            actions: vec![id],
            ..Self::default()
        }
    }

    pub fn transitions(&self) -> bool {
        !self.to.is_empty() || !self.secretly_to.is_empty()
    }
}

/// An ordered, shared sequence of handler objects.
///
/// Chains are reference counted so that suspended continuations can hold on
/// to them after the event that started them is gone.
#[derive(Clone, Debug)]
pub struct HandlerChain(Arc<[HandlerObject]>);

impl HandlerChain {
    pub fn new(objects: Vec<HandlerObject>) -> Self {
        Self(objects.into())
    }
}

impl Deref for HandlerChain {
    type Target = [HandlerObject];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<HandlerObject>> for HandlerChain {
    fn from(objects: Vec<HandlerObject>) -> Self {
        Self::new(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_shortcut_has_no_guards_or_targets() {
        let object = HandlerObject::action(ActionId(3));

        assert_eq!(object.actions, vec![ActionId(3)]);
        assert!(object.guards.is_empty());
        assert!(!object.transitions());
    }

    #[test]
    fn chain_clones_share_objects() {
        let chain = HandlerChain::new(vec![HandlerObject::default(), HandlerObject::default()]);
        let cloned = chain.clone();

        assert_eq!(cloned.len(), 2);
        assert!(std::ptr::eq(chain.as_ptr(), cloned.as_ptr()));
    }

    #[test]
    fn secret_targets_count_as_transitions() {
        let object = HandlerObject {
            secretly_to: vec![Target::Path("idle".into())],
            ..HandlerObject::default()
        };

        assert!(object.transitions());
    }
}
