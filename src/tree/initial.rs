//! Evaluation of initial-state rules.

use super::node::{Initial, InitialDecision};
use crate::core::FnTable;
use crate::effects::{EvalError, Stage};
use serde_json::Value;

/// Inputs available to initial decisions during activation.
pub struct InitialScope<'a, D> {
    pub table: &'a FnTable<D>,
    pub data: &'a D,
    pub payload: &'a Value,
}

impl<'a, D> InitialScope<'a, D> {
    pub fn new(table: &'a FnTable<D>, data: &'a D, payload: &'a Value) -> Self {
        Self {
            table,
            data,
            payload,
        }
    }

    /// Name of the child an initial rule selects, if any branch yields one.
    pub fn resolve(&self, initial: &Initial) -> Result<Option<String>, EvalError> {
        self.resolve_with(initial, Value::Null)
    }

    fn resolve_with(&self, initial: &Initial, result: Value) -> Result<Option<String>, EvalError> {
        match initial {
            Initial::Child(name) => Ok(Some(name.clone())),
            Initial::Decision(decision) => self.decide(decision, result),
        }
    }

    fn decide(&self, decision: &InitialDecision, mut result: Value) -> Result<Option<String>, EvalError> {
        for &id in &decision.get {
            let slot = self.table.result(id);
            result = (slot.func)(self.data, self.payload, &result)
                .map_err(|source| EvalError::new(Stage::Initial, &slot.name, source))?;
        }

        let passed = decision
            .guards
            .check(|id| self.table.check(id, self.data, self.payload, &result));

        if passed {
            if let Some(to) = &decision.to {
                return Ok(Some(to.clone()));
            }
            if let Some(then) = &decision.then {
                return self.resolve_with(then, result);
            }
            Ok(None)
        } else if let Some(otherwise) = &decision.otherwise {
            self.resolve_with(otherwise, result)
        } else {
            Ok(None)
        }
    }
}
