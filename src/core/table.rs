//! Closed function table produced by the design compiler.
//!
//! Every function a design references, by name or inline, is placed into one
//! slot of a typed table. Handler objects hold typed indices into the table,
//! so dispatch at runtime is an index call rather than a name lookup.

use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Error returned by fallible user functions.
pub type FnError = Box<dyn std::error::Error + Send + Sync>;

/// Future produced by an async operation. Resolves to `Ok` (handled by
/// `onResolve`) or `Err` (handled by `onReject`).
pub type AsyncTask = Pin<Box<dyn Future<Output = Result<Value, Value>> + Send>>;

/// Computes a result from data, payload and the previous result.
pub type ResultFn<D> = Arc<dyn Fn(&D, &Value, &Value) -> Result<Value, FnError> + Send + Sync>;

/// Pure predicate over data, payload and the current result.
pub type ConditionFn<D> = Arc<dyn Fn(&D, &Value, &Value) -> bool + Send + Sync>;

/// Mutates the draft of the data.
pub type ActionFn<D> = Arc<dyn Fn(&mut D, &Value, &Value) -> Result<(), FnError> + Send + Sync>;

/// Computes a transition target path.
pub type TargetFn<D> = Arc<dyn Fn(&D, &Value, &Value) -> Result<String, FnError> + Send + Sync>;

/// Computes a delay in seconds.
pub type TimeFn<D> = Arc<dyn Fn(&D, &Value, &Value) -> f64 + Send + Sync>;

/// Launches an async operation.
pub type AsyncFn<D> = Arc<dyn Fn(&D, &Value, &Value) -> AsyncTask + Send + Sync>;

/// Derives a value from the data for update snapshots.
pub type ValueFn<D> = Arc<dyn Fn(&D) -> Value + Send + Sync>;

macro_rules! fn_ids {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
            pub struct $name(pub(crate) usize);

            impl $name {
                pub fn index(self) -> usize {
                    self.0
                }
            }
        )*
    };
}

fn_ids! {
    /// Index of a result function.
    ResultId,
    /// Index of a condition function.
    ConditionId,
    /// Index of an action function.
    ActionId,
    /// Index of a target function.
    TargetId,
    /// Index of a time function.
    TimeId,
    /// Index of an async function.
    AsyncId,
    /// Index of a derived value function.
    ValueId,
}

/// A table entry: the function plus the name used in diagnostics.
pub struct Slot<F> {
    pub name: Arc<str>,
    pub func: F,
}

impl<F: Clone> Clone for Slot<F> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            func: self.func.clone(),
        }
    }
}

/// All functions of one compiled design.
pub struct FnTable<D> {
    pub(crate) results: Vec<Slot<ResultFn<D>>>,
    pub(crate) conditions: Vec<Slot<ConditionFn<D>>>,
    pub(crate) actions: Vec<Slot<ActionFn<D>>>,
    pub(crate) targets: Vec<Slot<TargetFn<D>>>,
    pub(crate) times: Vec<Slot<TimeFn<D>>>,
    pub(crate) asyncs: Vec<Slot<AsyncFn<D>>>,
    pub(crate) values: Vec<Slot<ValueFn<D>>>,
}

impl<D> Default for FnTable<D> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            conditions: Vec::new(),
            actions: Vec::new(),
            targets: Vec::new(),
            times: Vec::new(),
            asyncs: Vec::new(),
            values: Vec::new(),
        }
    }
}

impl<D> FnTable<D> {
    pub fn result(&self, id: ResultId) -> &Slot<ResultFn<D>> {
        &self.results[id.0]
    }

    pub fn condition(&self, id: ConditionId) -> &Slot<ConditionFn<D>> {
        &self.conditions[id.0]
    }

    pub fn action(&self, id: ActionId) -> &Slot<ActionFn<D>> {
        &self.actions[id.0]
    }

    pub fn target(&self, id: TargetId) -> &Slot<TargetFn<D>> {
        &self.targets[id.0]
    }

    pub fn time(&self, id: TimeId) -> &Slot<TimeFn<D>> {
        &self.times[id.0]
    }

    pub fn async_op(&self, id: AsyncId) -> &Slot<AsyncFn<D>> {
        &self.asyncs[id.0]
    }

    /// Derived values in registration order.
    pub fn values(&self) -> impl Iterator<Item = (ValueId, &Slot<ValueFn<D>>)> {
        self.values
            .iter()
            .enumerate()
            .map(|(index, slot)| (ValueId(index), slot))
    }

    /// Evaluate a condition against the given inputs.
    pub fn check(&self, id: ConditionId, data: &D, payload: &Value, result: &Value) -> bool {
        (self.condition(id).func)(data, payload, result)
    }
}
