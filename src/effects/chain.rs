//! Handler chain execution against a data draft.

use crate::core::{
    ActionId, Delay, Draft, FnTable, FollowUp, HandlerChain, HandlerObject, Target,
};
use crate::effects::error::{EvalError, Stage};
use serde_json::Value;
use std::time::Duration;

/// A transition requested by a chain.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingTransition {
    pub path: String,
    /// Requested through `secretlyTo`; does not oblige a notification.
    pub secret: bool,
}

/// How a suspended frame picks up again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// The object at the frame index was waiting; it runs without waiting again.
    Wait,
    /// The object ran its `then` chain; only its `break` check is left.
    Then,
    /// The object ran its `else` chain.
    Else,
}

/// One level of a suspended chain.
#[derive(Clone, Debug)]
pub struct Frame {
    pub chain: HandlerChain,
    pub index: usize,
    pub step: Step,
}

/// The remainder of a chain suspended by `wait`.
///
/// `frames` holds the innermost chain first. A `wait` inside a nested `then`
/// or `else` chain suspends every enclosing chain too; resuming unwinds the
/// frames outwards so outer objects still run after the nested ones.
#[derive(Clone, Debug)]
pub struct Continuation {
    pub frames: Vec<Frame>,
    pub delay: Duration,
}

/// Result of running one chain.
#[derive(Clone, Debug, Default)]
pub struct Outcome {
    /// Final result of the chain
    pub result: Value,
    /// Subscribers must be notified
    pub notify: bool,
    /// The chain stopped early, by transition or `break`
    pub broke: bool,
    pub transitions: Vec<PendingTransition>,
    pub sends: Vec<FollowUp>,
    /// Set when a `wait` stopped the chain
    pub suspended: Option<Continuation>,
}

impl Outcome {
    fn halted(&self) -> bool {
        self.broke || self.suspended.is_some()
    }
}

/// Convert seconds to a duration. Negative values and NaN become zero; values
/// too large to represent saturate to [`Duration::MAX`].
pub fn seconds(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Runs handler chains for one payload.
pub struct ChainRunner<'a, D> {
    table: &'a FnTable<D>,
    payload: &'a Value,
}

impl<'a, D: Clone> ChainRunner<'a, D> {
    pub fn new(table: &'a FnTable<D>, payload: &'a Value) -> Self {
        Self { table, payload }
    }

    /// Run `chain` from its first handler object.
    pub fn run(
        &self,
        draft: &mut Draft<D>,
        chain: &HandlerChain,
        result: Value,
    ) -> Result<Outcome, EvalError> {
        let mut outcome = Outcome::default();
        let result = self.run_objects(draft, chain, 0, result, &mut outcome)?;
        outcome.result = result;
        Ok(outcome)
    }

    /// Resume a suspended chain. Results from before the suspension are not
    /// carried over.
    pub fn resume(
        &self,
        draft: &mut Draft<D>,
        continuation: &Continuation,
    ) -> Result<Outcome, EvalError> {
        let mut outcome = Outcome::default();
        let mut result = Value::Null;
        for (depth, frame) in continuation.frames.iter().enumerate() {
            result = self.resume_frame(draft, frame, result, &mut outcome)?;
            if outcome.broke {
                break;
            }
            if let Some(suspended) = &mut outcome.suspended {
                suspended
                    .frames
                    .extend(continuation.frames[depth + 1..].iter().cloned());
                break;
            }
        }
        outcome.result = result;
        Ok(outcome)
    }

    /// Whether any handler object of `chain` would pass its guards against
    /// `data`. Nothing is mutated.
    pub fn would_pass(&self, data: &D, chain: &HandlerChain) -> Result<bool, EvalError> {
        self.probe(data, chain, Value::Null)
    }

    pub fn delay(&self, data: &D, delay: Delay, result: &Value) -> Duration {
        match delay {
            Delay::Seconds(secs) => seconds(secs),
            Delay::Computed(id) => seconds((self.table.time(id).func)(data, self.payload, result)),
        }
    }

    fn probe(&self, data: &D, chain: &HandlerChain, mut result: Value) -> Result<bool, EvalError> {
        for object in chain.iter() {
            result = self.compute_results(data, object, result)?;
            if self.guards_pass(data, object, &result) {
                return Ok(true);
            }
            if let Some(otherwise) = &object.otherwise {
                if self.probe(data, otherwise, result.clone())? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn resume_frame(
        &self,
        draft: &mut Draft<D>,
        frame: &Frame,
        mut result: Value,
        outcome: &mut Outcome,
    ) -> Result<Value, EvalError> {
        match frame.step {
            Step::Wait => {
                result = self.run_object(draft, &frame.chain, frame.index, result, outcome)?;
            }
            Step::Then => self.check_break(draft.get(), &frame.chain[frame.index], &result, outcome),
            Step::Else => {}
        }
        if outcome.halted() {
            return Ok(result);
        }
        self.run_objects(draft, &frame.chain, frame.index + 1, result, outcome)
    }

    fn run_objects(
        &self,
        draft: &mut Draft<D>,
        chain: &HandlerChain,
        start: usize,
        mut result: Value,
        outcome: &mut Outcome,
    ) -> Result<Value, EvalError> {
        for index in start..chain.len() {
            if let Some(delay) = chain[index].wait {
                let delay = self.delay(draft.get(), delay, &result);
                tracing::trace!(index, ?delay, "suspending handler chain");
                outcome.suspended = Some(Continuation {
                    frames: vec![Frame {
                        chain: chain.clone(),
                        index,
                        step: Step::Wait,
                    }],
                    delay,
                });
                return Ok(result);
            }

            result = self.run_object(draft, chain, index, result, outcome)?;
            if outcome.halted() {
                break;
            }
        }
        Ok(result)
    }

    fn run_object(
        &self,
        draft: &mut Draft<D>,
        chain: &HandlerChain,
        index: usize,
        result: Value,
        outcome: &mut Outcome,
    ) -> Result<Value, EvalError> {
        let object = &chain[index];
        let mut result = self.compute_results(draft.get(), object, result)?;

        if !self.guards_pass(draft.get(), object, &result) {
            if let Some(otherwise) = &object.otherwise {
                result = self.run_objects(draft, otherwise, 0, result, outcome)?;
                enclose(outcome, chain, index, Step::Else);
            }
            return Ok(result);
        }

        for &id in &object.actions {
            self.apply(draft, id, &result, Stage::Action)?;
            outcome.notify = true;
        }
        for &id in &object.secret_actions {
            self.apply(draft, id, &result, Stage::SecretAction)?;
        }

        if let Some(follow_up) = &object.send {
            outcome.sends.push(follow_up.clone());
        }

        if object.transitions() {
            for target in &object.to {
                let path = self.resolve_target(draft.get(), target, &result)?;
                outcome.transitions.push(PendingTransition {
                    path,
                    secret: false,
                });
            }
            for target in &object.secretly_to {
                let path = self.resolve_target(draft.get(), target, &result)?;
                outcome.transitions.push(PendingTransition { path, secret: true });
            }
            if !object.to.is_empty() {
                outcome.notify = true;
            }
            outcome.broke = true;
            return Ok(result);
        }

        if let Some(then) = &object.then {
            result = self.run_objects(draft, then, 0, result, outcome)?;
            enclose(outcome, chain, index, Step::Then);
            if outcome.halted() {
                return Ok(result);
            }
        }

        self.check_break(draft.get(), object, &result, outcome);
        Ok(result)
    }

    fn check_break(&self, data: &D, object: &HandlerObject, result: &Value, outcome: &mut Outcome) {
        if let Some(id) = object.break_when {
            if self.table.check(id, data, self.payload, result) {
                tracing::trace!(condition = %self.table.condition(id).name, "handler chain broke");
                outcome.broke = true;
            }
        }
    }

    fn compute_results(
        &self,
        data: &D,
        object: &HandlerObject,
        mut result: Value,
    ) -> Result<Value, EvalError> {
        for &id in &object.get {
            let slot = self.table.result(id);
            result = (slot.func)(data, self.payload, &result)
                .map_err(|source| EvalError::new(Stage::Result, &slot.name, source))?;
        }
        Ok(result)
    }

    fn guards_pass(&self, data: &D, object: &HandlerObject, result: &Value) -> bool {
        object
            .guards
            .check(|id| self.table.check(id, data, self.payload, result))
    }

    fn apply(
        &self,
        draft: &mut Draft<D>,
        id: ActionId,
        result: &Value,
        stage: Stage,
    ) -> Result<(), EvalError> {
        let slot = self.table.action(id);
        (slot.func)(draft.to_mut(), self.payload, result)
            .map_err(|source| EvalError::new(stage, &slot.name, source))
    }

    fn resolve_target(&self, data: &D, target: &Target, result: &Value) -> Result<String, EvalError> {
        match target {
            Target::Path(path) => Ok(path.clone()),
            Target::Computed(id) => {
                let slot = self.table.target(*id);
                (slot.func)(data, self.payload, result)
                    .map_err(|source| EvalError::new(Stage::Transition, &slot.name, source))
            }
        }
    }
}

/// Record the enclosing frame of a nested chain that just suspended.
fn enclose(outcome: &mut Outcome, chain: &HandlerChain, index: usize, step: Step) {
    if let Some(suspended) = &mut outcome.suspended {
        suspended.frames.push(Frame {
            chain: chain.clone(),
            index,
            step,
        });
    }
}
