//! The design: initial data, the root state and the named collections.

use super::collections::Collections;
use super::def::StateDef;
use crate::core::{ActionFn, AsyncFn, AsyncTask, ConditionFn, FnError, ResultFn, TimeFn, ValueFn};
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Everything needed to build a machine instance.
///
/// A design is compiled once per instance and never mutated afterwards.
///
/// # Example
///
/// ```rust
/// use statecraft::design::{Design, HandlerDef, StateDef};
///
/// let design = Design::new(
///     0_i64,
///     StateDef::new()
///         .initial("off")
///         .state("off", StateDef::new().on("TOGGLE", HandlerDef::new().do_("count").to("on")))
///         .state("on", StateDef::new().on("TOGGLE", HandlerDef::new().to("off"))),
/// )
/// .id("switch")
/// .action("count", |count, _, _| *count += 1);
///
/// assert!(design.collections.actions.contains_key("count"));
/// ```
pub struct Design<D> {
    pub id: Option<String>,
    pub data: D,
    pub root: StateDef<D>,
    pub collections: Collections<D>,
}

#[derive(Deserialize)]
#[serde(bound = "")]
struct Document<D> {
    #[serde(default)]
    id: Option<String>,
    #[serde(flatten)]
    root: StateDef<D>,
}

impl<D> Design<D> {
    pub fn new(data: D, root: StateDef<D>) -> Self {
        Self {
            id: None,
            data,
            root,
            collections: Collections::default(),
        }
    }

    /// Parse the state tree from a JSON document.
    ///
    /// Every function position in the document names a collection entry;
    /// register the entries on the returned design before compiling it.
    pub fn from_json(data: D, json: &str) -> Result<Self, serde_json::Error> {
        let document: Document<D> = serde_json::from_str(json)?;
        Ok(Self {
            id: document.id,
            data,
            root: document.root,
            collections: Collections::default(),
        })
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }
}

impl<D: 'static> Design<D> {
    pub fn action<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&mut D, &Value, &Value) + Send + Sync + 'static,
    {
        let func: ActionFn<D> = Arc::new(move |data, payload, result| {
            f(data, payload, result);
            Ok(())
        });
        self.collections.actions.insert(name.to_string(), func);
        self
    }

    /// Register an action that can fail. A failure aborts the chain and
    /// discards its changes.
    pub fn try_action<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&mut D, &Value, &Value) -> Result<(), FnError> + Send + Sync + 'static,
    {
        let func: ActionFn<D> = Arc::new(f);
        self.collections.actions.insert(name.to_string(), func);
        self
    }

    pub fn condition<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&D, &Value, &Value) -> bool + Send + Sync + 'static,
    {
        let func: ConditionFn<D> = Arc::new(f);
        self.collections.conditions.insert(name.to_string(), func);
        self
    }

    pub fn result<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&D, &Value, &Value) -> Value + Send + Sync + 'static,
    {
        let func: ResultFn<D> = Arc::new(move |data, payload, result| Ok(f(data, payload, result)));
        self.collections.results.insert(name.to_string(), func);
        self
    }

    pub fn try_result<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&D, &Value, &Value) -> Result<Value, FnError> + Send + Sync + 'static,
    {
        let func: ResultFn<D> = Arc::new(f);
        self.collections.results.insert(name.to_string(), func);
        self
    }

    /// Register a time function returning seconds.
    pub fn time<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&D, &Value, &Value) -> f64 + Send + Sync + 'static,
    {
        let func: TimeFn<D> = Arc::new(f);
        self.collections.times.insert(name.to_string(), func);
        self
    }

    /// Register an async operation. `Ok` settles through `onResolve`,
    /// `Err` through `onReject`.
    pub fn async_op<F, Fut>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&D, &Value, &Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Value>> + Send + 'static,
    {
        let func: AsyncFn<D> = Arc::new(move |data: &D, payload: &Value, result: &Value| -> AsyncTask {
            Box::pin(f(data, payload, result))
        });
        self.collections.asyncs.insert(name.to_string(), func);
        self
    }

    /// Register a derived value, recomputed into every update.
    pub fn value<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&D) -> Value + Send + Sync + 'static,
    {
        let func: ValueFn<D> = Arc::new(f);
        self.collections.values.insert(name.to_string(), func);
        self
    }
}
