//! Named function collections that string shortcuts resolve against.

use crate::core::{ActionFn, AsyncFn, ConditionFn, ResultFn, TimeFn, ValueFn};
use std::collections::BTreeMap;
use std::fmt;

/// Which named collection a reference points into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    Results,
    Conditions,
    Actions,
    Asyncs,
    Times,
    Values,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Results => "result",
            Self::Conditions => "condition",
            Self::Actions => "action",
            Self::Asyncs => "async",
            Self::Times => "time",
            Self::Values => "value",
        };
        f.write_str(name)
    }
}

/// The named functions of a design.
pub struct Collections<D> {
    pub results: BTreeMap<String, ResultFn<D>>,
    pub conditions: BTreeMap<String, ConditionFn<D>>,
    pub actions: BTreeMap<String, ActionFn<D>>,
    pub asyncs: BTreeMap<String, AsyncFn<D>>,
    pub times: BTreeMap<String, TimeFn<D>>,
    pub values: BTreeMap<String, ValueFn<D>>,
}

impl<D> Default for Collections<D> {
    fn default() -> Self {
        Self {
            results: BTreeMap::new(),
            conditions: BTreeMap::new(),
            actions: BTreeMap::new(),
            asyncs: BTreeMap::new(),
            times: BTreeMap::new(),
            values: BTreeMap::new(),
        }
    }
}

impl<D> Clone for Collections<D> {
    fn clone(&self) -> Self {
        Self {
            results: self.results.clone(),
            conditions: self.conditions.clone(),
            actions: self.actions.clone(),
            asyncs: self.asyncs.clone(),
            times: self.times.clone(),
            values: self.values.clone(),
        }
    }
}

impl<D> fmt::Debug for Collections<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collections")
            .field("results", &self.results.keys().collect::<Vec<_>>())
            .field("conditions", &self.conditions.keys().collect::<Vec<_>>())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("asyncs", &self.asyncs.keys().collect::<Vec<_>>())
            .field("times", &self.times.keys().collect::<Vec<_>>())
            .field("values", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}
