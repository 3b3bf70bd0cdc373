//! The machine instance.

use super::config::{DesignerConfig, Mode};
use super::error::DesignerError;
use super::scheduler::{Due, Scheduler};
use super::update::Update;
use crate::core::{
    AsyncTask, Draft, FnTable, FollowUp, HandlerChain, HistoryMode, TargetPath, TransitionLog,
    TransitionRecord,
};
use crate::design::{compile, Design};
use crate::effects::{ChainRunner, Continuation, EvalError, Outcome, PendingTransition};
use crate::tree::{AsyncHandler, Entry, InitialScope, Lease, NodeId, StateTree};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;
use uuid::Uuid;

/// Handle returned by [`Designer::on_update`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber<D> = Box<dyn FnMut(&Update<D>) + Send>;

#[derive(Clone, Debug)]
enum Task {
    Resume {
        continuation: Continuation,
        payload: Value,
    },
    Repeat {
        chain: HandlerChain,
        started: Duration,
    },
}

struct PendingAsync {
    lease: Lease,
    handler: AsyncHandler,
    payload: Value,
    task: AsyncTask,
}

/// Outcomes of every chain run for one event, in order.
#[derive(Default)]
struct Effects {
    notify: bool,
    transitions: Vec<PendingTransition>,
    sends: Vec<FollowUp>,
    suspended: Vec<(Lease, Continuation, Value)>,
}

impl Effects {
    fn absorb(&mut self, owner: Lease, outcome: Outcome, payload: &Value) {
        self.notify |= outcome.notify;
        self.transitions.extend(outcome.transitions);
        self.sends.extend(outcome.sends);
        self.suspended.extend(
            outcome
                .suspended
                .into_iter()
                .map(|continuation| (owner, continuation, payload.clone())),
        );
    }
}

/// A live machine built from a [`Design`].
///
/// The designer owns the data, the state tree, a queue of pending events,
/// a virtual-clock scheduler for `wait` and `repeat`, and the async
/// operations launched by active states. All of it is driven through
/// `&mut self`, so events never interleave.
///
/// # Example
///
/// ```rust
/// use serde_json::Value;
/// use statecraft::design::{Design, HandlerDef, StateDef};
/// use statecraft::designer::Designer;
///
/// let design = Design::new(
///     0_i64,
///     StateDef::new()
///         .initial("idle")
///         .state("idle", StateDef::new().on("START", HandlerDef::new().do_("count").to("running")))
///         .state("running", StateDef::new().on("STOP", HandlerDef::new().to("idle"))),
/// )
/// .action("count", |count, _, _| *count += 1);
///
/// let mut machine = Designer::new(design).unwrap();
/// assert!(machine.can("START", &Value::Null));
///
/// machine.send("START", Value::Null).unwrap();
/// assert!(machine.is_in(["running"]));
/// assert_eq!(*machine.data(), 1);
/// ```
pub struct Designer<D> {
    design: Arc<Design<D>>,
    config: DesignerConfig,
    id: String,
    tree: StateTree,
    table: Arc<FnTable<D>>,
    data: Arc<D>,
    update: Update<D>,
    queue: VecDeque<(String, Value)>,
    scheduler: Scheduler<Task>,
    pending: Vec<PendingAsync>,
    subscribers: Vec<(SubscriptionId, Subscriber<D>)>,
    next_subscription: u64,
    /// Subscribers owe a notification
    dirty: bool,
    /// Transitions performed in the current step, for the loop guard
    steps: usize,
    /// Events handled in the current step; bounds follow-up cycles
    events: usize,
    log: TransitionLog,
}

impl<D: Clone + 'static> Designer<D> {
    pub fn new(design: Design<D>) -> Result<Self, DesignerError> {
        Self::with_config(design, DesignerConfig::default())
    }

    pub fn with_config(design: Design<D>, config: DesignerConfig) -> Result<Self, DesignerError> {
        Self::instantiate(Arc::new(design), config)
    }

    fn instantiate(design: Arc<Design<D>>, config: DesignerConfig) -> Result<Self, DesignerError> {
        let id = design
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let compiled = compile(&design, &id)?;
        let data = Arc::new(design.data.clone());

        let mut designer = Self {
            update: Update {
                id: id.clone(),
                data: Arc::clone(&data),
                active: Vec::new(),
                values: BTreeMap::new(),
            },
            scheduler: Scheduler::new(config.frame_interval),
            log: TransitionLog::new(config.log_capacity),
            design,
            config,
            id,
            tree: compiled.tree,
            table: Arc::new(compiled.table),
            data,
            queue: VecDeque::new(),
            pending: Vec::new(),
            subscribers: Vec::new(),
            next_subscription: 0,
            dirty: false,
            steps: 0,
            events: 0,
        };
        designer.start()?;
        Ok(designer)
    }

    /// Activate the initial configuration and run its entry handlers.
    fn start(&mut self) -> Result<(), DesignerError> {
        tracing::debug!(id = %self.id, nodes = self.tree.len(), "starting machine");
        let payload = Value::Null;
        let root = self.tree.root();
        self.activate(root, Entry::Target(HistoryMode::Fresh), &HashSet::new(), &payload, "start")?;

        let mut transitions = Vec::new();
        for id in self.tree.active_nodes() {
            transitions.extend(self.enter(id, &payload, "start")?);
        }
        self.begin_step();
        let started = self.run_transitions(transitions, &payload, "start");
        let drained = self.drain();
        self.flush();
        started.and(drained)
    }

    /// Queue an event and process the queue until it is empty.
    ///
    /// Events queued by handlers while this one runs are processed before
    /// `send` returns. A failing event does not stop the ones queued behind
    /// it; the first error is returned once the queue is empty.
    pub fn send(&mut self, event: impl Into<String>, payload: Value) -> Result<&Update<D>, DesignerError> {
        self.queue.push_back((event.into(), payload));
        self.begin_step();
        self.drain()?;
        Ok(&self.update)
    }

    /// Whether `event` would run at least one handler object right now.
    ///
    /// Guards are evaluated against the current data; nothing is mutated
    /// and no transition happens.
    pub fn can(&self, event: &str, payload: &Value) -> bool {
        let runner = ChainRunner::new(&self.table, payload);
        self.tree
            .active_nodes()
            .into_iter()
            .filter_map(|id| self.tree.node(id).handlers.on.get(event))
            .any(|chain| match runner.would_pass(&self.data, chain) {
                Ok(passes) => passes,
                Err(error) => {
                    tracing::debug!(id = %self.id, event, %error, "handler failed while probing");
                    false
                }
            })
    }

    pub fn is_in<I>(&self, paths: I) -> bool
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.update.is_in(paths)
    }

    pub fn is_in_any<I>(&self, paths: I) -> bool
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.update.is_in_any(paths)
    }

    pub fn when_in<K, T, I>(&self, entries: I) -> Option<T>
    where
        I: IntoIterator<Item = (K, T)>,
        K: AsRef<str>,
    {
        self.update.when_in(entries)
    }

    pub fn when_in_all<K, T, I>(&self, entries: I) -> Vec<T>
    where
        I: IntoIterator<Item = (K, T)>,
        K: AsRef<str>,
    {
        self.update.when_in_all(entries)
    }

    pub fn when_in_fold<K, T, A, I, F>(&self, entries: I, init: A, fold: F) -> A
    where
        I: IntoIterator<Item = (K, T)>,
        K: AsRef<str>,
        F: FnMut(A, T, &str) -> A,
    {
        self.update.when_in_fold(entries, init, fold)
    }

    /// Subscribe to updates. The callback runs once per notifying change.
    pub fn on_update<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&Update<D>) + Send + 'static,
    {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Remove a subscription. When the last subscriber leaves, intervals and
    /// per-frame repeaters stop; later subscribers do not restart them.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(subscription, _)| *subscription != id);
        let removed = self.subscribers.len() != before;
        if removed && self.subscribers.is_empty() {
            tracing::debug!(id = %self.id, "last subscriber left, stopping repeaters");
            self.scheduler.clear_repeating();
        }
        removed
    }

    /// Call `callback` once with the current update.
    pub fn get_update<F>(&self, callback: F)
    where
        F: FnOnce(&Update<D>),
    {
        callback(&self.update)
    }

    pub fn update(&self) -> &Update<D> {
        &self.update
    }

    pub fn design(&self) -> &Design<D> {
        &self.design
    }

    /// Runtime settings this instance was built with. The design itself is
    /// behind [`Designer::design`].
    pub fn config(&self) -> &DesignerConfig {
        &self.config
    }

    /// A fresh instance of the same design, with its initial data.
    pub fn clone_fresh(&self) -> Result<Self, DesignerError> {
        Self::instantiate(Arc::clone(&self.design), self.config.clone())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    pub fn tree(&self) -> &StateTree {
        &self.tree
    }

    /// Recent transitions, oldest first.
    pub fn transitions(&self) -> &TransitionLog {
        &self.log
    }

    /// Time elapsed on the instance's virtual clock.
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    /// Move the virtual clock forward, firing due timers, intervals and
    /// frames in time order, then settle async operations.
    pub fn advance(&mut self, by: Duration) -> Result<&Update<D>, DesignerError> {
        let until = self.scheduler.now().saturating_add(by);
        let mut first = None;

        while let Some(due) = self.scheduler.pop_due(until) {
            self.begin_step();
            let fired = match due {
                Due::Timer {
                    owner,
                    task,
                    period,
                } => self.fire(owner, task, period.unwrap_or(Duration::ZERO)),
                Due::Frame { tasks, interval } => {
                    let mut result = Ok(());
                    for (owner, task) in tasks {
                        let fired = self.fire(owner, task, interval);
                        result = result.and(fired);
                    }
                    result
                }
            };
            self.flush();
            let drained = self.drain();
            if let Err(error) = fired.and(drained) {
                first.get_or_insert(error);
            }
        }
        self.scheduler.settle(until);

        if let Err(error) = self.settle_async() {
            first.get_or_insert(error);
        }
        self.flush();
        match first {
            Some(error) => Err(error),
            None => Ok(&self.update),
        }
    }

    /// Poll pending async operations once and apply the settled ones.
    pub fn poll_async(&mut self) -> Result<&Update<D>, DesignerError> {
        let settled = self.settle_async();
        self.flush();
        settled.map(|()| &self.update)
    }

    /// Number of async operations still pending.
    pub fn pending_async(&self) -> usize {
        self.pending.len()
    }

    /// Reset the loop guards at the start of a send, timer or async step.
    fn begin_step(&mut self) {
        self.steps = 0;
        self.events = 0;
    }

    fn drain(&mut self) -> Result<(), DesignerError> {
        let mut first = None;
        while let Some((event, payload)) = self.queue.pop_front() {
            if self.events >= self.config.max_transitions {
                tracing::debug!(id = %self.id, dropped = self.queue.len() + 1, "dropping queued events");
                self.queue.clear();
                let looped = self.structural(DesignerError::TransitionLoop {
                    limit: self.config.max_transitions,
                    event,
                });
                if let Err(error) = looped {
                    first.get_or_insert(error);
                }
                break;
            }
            self.events += 1;
            if let Err(error) = self.process(&event, &payload) {
                tracing::error!(id = %self.id, event = %event, %error, "event failed");
                first.get_or_insert(error);
            }
            self.flush();
        }
        match first {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Run one event over the active nodes, depth first. A chain that
    /// transitions or breaks ends the traversal.
    fn process(&mut self, event: &str, payload: &Value) -> Result<(), DesignerError> {
        tracing::debug!(id = %self.id, event, "handling event");
        let table = Arc::clone(&self.table);
        let runner = ChainRunner::new(&table, payload);
        let mut draft = Draft::new(Arc::clone(&self.data));
        let mut effects = Effects::default();

        'nodes: for id in self.tree.active_nodes() {
            let handlers = &self.tree.node(id).handlers;
            let chains: Vec<HandlerChain> = handlers
                .on
                .get(event)
                .into_iter()
                .chain(handlers.on_event.as_ref())
                .cloned()
                .collect();
            let lease = self.tree.lease(id);

            for chain in chains {
                let outcome = runner
                    .run(&mut draft, &chain, Value::Null)
                    .map_err(|source| DesignerError::eval(event, source))?;
                let broke = outcome.broke;
                effects.absorb(lease, outcome, payload);
                if broke {
                    break 'nodes;
                }
            }
        }

        let transitions = self.commit(draft, effects);
        self.run_transitions(transitions, payload, event)
    }

    /// Commit a successful run: data, notification, timers and follow-up
    /// events. Returns the transitions still to perform.
    fn commit(&mut self, draft: Draft<D>, effects: Effects) -> Vec<PendingTransition> {
        if draft.is_dirty() {
            self.data = draft.commit();
        }
        self.dirty |= effects.notify;
        for (owner, continuation, payload) in effects.suspended {
            let delay = continuation.delay;
            self.scheduler.set_timeout(
                owner,
                delay,
                Task::Resume {
                    continuation,
                    payload,
                },
            );
        }
        self.queue
            .extend(effects.sends.into_iter().map(|send| (send.event, send.payload)));
        effects.transitions
    }

    fn execute<F>(
        &mut self,
        owner: NodeId,
        payload: &Value,
        event: &str,
        run: F,
    ) -> Result<Vec<PendingTransition>, DesignerError>
    where
        F: FnOnce(&ChainRunner<'_, D>, &mut Draft<D>) -> Result<Outcome, EvalError>,
    {
        let table = Arc::clone(&self.table);
        let runner = ChainRunner::new(&table, payload);
        let mut draft = Draft::new(Arc::clone(&self.data));
        let outcome = run(&runner, &mut draft).map_err(|source| DesignerError::eval(event, source))?;

        let mut effects = Effects::default();
        effects.absorb(self.tree.lease(owner), outcome, payload);
        Ok(self.commit(draft, effects))
    }

    fn run_chain(
        &mut self,
        owner: NodeId,
        chain: &HandlerChain,
        payload: &Value,
        result: Value,
        event: &str,
    ) -> Result<Vec<PendingTransition>, DesignerError> {
        self.execute(owner, payload, event, |runner, draft| runner.run(draft, chain, result))
    }

    fn run_transitions(
        &mut self,
        transitions: Vec<PendingTransition>,
        payload: &Value,
        event: &str,
    ) -> Result<(), DesignerError> {
        for pending in transitions {
            self.transition(&pending.path, payload, event)?;
        }
        Ok(())
    }

    fn activate(
        &mut self,
        id: NodeId,
        entry: Entry<'_>,
        before: &HashSet<NodeId>,
        payload: &Value,
        event: &str,
    ) -> Result<(), DesignerError> {
        let scope = InitialScope::new(&self.table, &self.data, payload);
        self.tree
            .activate(id, entry, before, &scope)
            .map_err(|source| DesignerError::eval(event, source))
    }

    /// Unknown targets and loops fail in development and are logged in
    /// production.
    fn structural(&self, error: DesignerError) -> Result<(), DesignerError> {
        match self.config.mode {
            Mode::Development => Err(error),
            Mode::Production => {
                tracing::warn!(id = %self.id, %error, "ignoring structural error");
                Ok(())
            }
        }
    }

    fn transition(&mut self, raw: &str, payload: &Value, event: &str) -> Result<(), DesignerError> {
        if self.steps >= self.config.max_transitions {
            return self.structural(DesignerError::TransitionLoop {
                limit: self.config.max_transitions,
                event: event.to_string(),
            });
        }
        let target = TargetPath::parse(raw);
        let Some(node) = self.tree.resolve_target(&target.path) else {
            return self.structural(DesignerError::UnknownTarget(raw.to_string()));
        };
        self.steps += 1;

        let before = self.tree.active_nodes();
        let before_set: HashSet<NodeId> = before.iter().copied().collect();
        let trail = self.tree.node(node).trail.clone();
        let root = self.tree.root();
        self.activate(root, Entry::Toward(&trail, target.mode), &before_set, payload, event)?;

        let exited: Vec<NodeId> = before
            .into_iter()
            .filter(|&id| !self.tree.node(id).active)
            .collect();
        let entered: Vec<NodeId> = self
            .tree
            .active_nodes()
            .into_iter()
            .filter(|id| !before_set.contains(id))
            .collect();

        let record = TransitionRecord {
            target: self.tree.node(node).path.clone(),
            mode: target.mode,
            exited: exited.iter().map(|&id| self.tree.node(id).path.clone()).collect(),
            entered: entered.iter().map(|&id| self.tree.node(id).path.clone()).collect(),
            timestamp: Utc::now(),
        };
        tracing::debug!(
            id = %self.id,
            target = %record.target,
            mode = ?record.mode,
            exited = record.exited.len(),
            entered = record.entered.len(),
            "transition"
        );
        self.log.record(record);

        let mut follow_ups = Vec::new();
        for &id in exited.iter().rev() {
            self.scheduler.cancel(id);
            self.pending.retain(|job| job.lease.node != id);
            if let Some(chain) = self.tree.node(id).handlers.on_exit.clone() {
                follow_ups.extend(self.run_chain(id, &chain, payload, Value::Null, event)?);
            }
        }
        for id in entered {
            follow_ups.extend(self.enter(id, payload, event)?);
        }
        self.run_transitions(follow_ups, payload, event)
    }

    /// Start repeaters, run `onEnter` and launch the async operation of a
    /// newly active node.
    fn enter(
        &mut self,
        id: NodeId,
        payload: &Value,
        event: &str,
    ) -> Result<Vec<PendingTransition>, DesignerError> {
        let handlers = &self.tree.node(id).handlers;
        let repeat = handlers.repeat.clone();
        let on_enter = handlers.on_enter.clone();
        let async_handler = handlers.async_handler.clone();
        let lease = self.tree.lease(id);

        if let Some(repeat) = repeat {
            let task = Task::Repeat {
                chain: repeat.on_repeat,
                started: self.scheduler.now(),
            };
            match repeat.delay {
                None => self.scheduler.add_frame(lease, task),
                Some(delay) => {
                    let period =
                        ChainRunner::new(&self.table, payload).delay(&self.data, delay, &Value::Null);
                    self.scheduler.set_interval(lease, period, task);
                }
            }
        }

        let transitions = match on_enter {
            Some(chain) => self.run_chain(id, &chain, payload, Value::Null, event)?,
            None => Vec::new(),
        };

        if let Some(handler) = async_handler {
            let slot = self.table.async_op(handler.op);
            tracing::debug!(id = %self.id, op = %slot.name, "launching async operation");
            let task = (slot.func)(&*self.data, payload, &Value::Null);
            self.pending.push(PendingAsync {
                lease,
                handler,
                payload: payload.clone(),
                task,
            });
        }

        Ok(transitions)
    }

    fn fire(&mut self, owner: Lease, task: Task, interval: Duration) -> Result<(), DesignerError> {
        if !self.tree.is_current(owner) {
            tracing::trace!(id = %self.id, node = owner.node.index(), "dropping stale timer");
            return Ok(());
        }
        match task {
            Task::Resume {
                continuation,
                payload,
            } => {
                let transitions = self.execute(owner.node, &payload, "wait", |runner, draft| {
                    runner.resume(draft, &continuation)
                })?;
                self.run_transitions(transitions, &payload, "wait")
            }
            Task::Repeat { chain, started } => {
                let elapsed = self.scheduler.now().saturating_sub(started);
                let payload = json!({
                    "interval": interval.as_secs_f64(),
                    "elapsed": elapsed.as_secs_f64(),
                });
                let transitions = self.run_chain(owner.node, &chain, &payload, Value::Null, "repeat")?;
                self.run_transitions(transitions, &payload, "repeat")
            }
        }
    }

    fn settle_async(&mut self) -> Result<(), DesignerError> {
        let mut first = None;
        // Settled operations can enter states whose operations are ready
        // at once; bound the rounds like transitions.
        for _ in 0..self.config.max_transitions.max(1) {
            let settled = self.poll_pending();
            if settled.is_empty() {
                break;
            }
            for (job, outcome) in settled {
                if !self.tree.is_current(job.lease) {
                    tracing::trace!(id = %self.id, "dropping async result of inactive state");
                    continue;
                }
                self.begin_step();
                let resolved = self.resolve(job, outcome);
                let drained = self.drain();
                self.flush();
                if let Err(error) = resolved.and(drained) {
                    first.get_or_insert(error);
                }
            }
        }
        match first {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn poll_pending(&mut self) -> Vec<(PendingAsync, Result<Value, Value>)> {
        let mut cx = Context::from_waker(Waker::noop());
        let mut settled = Vec::new();
        let mut waiting = Vec::with_capacity(self.pending.len());
        for mut job in std::mem::take(&mut self.pending) {
            match job.task.as_mut().poll(&mut cx) {
                Poll::Ready(outcome) => settled.push((job, outcome)),
                Poll::Pending => waiting.push(job),
            }
        }
        self.pending = waiting;
        settled
    }

    fn resolve(&mut self, job: PendingAsync, outcome: Result<Value, Value>) -> Result<(), DesignerError> {
        let (chain, result) = match outcome {
            Ok(value) => (job.handler.on_resolve, value),
            Err(reason) => match job.handler.on_reject {
                Some(chain) => (chain, reason),
                None => {
                    tracing::warn!(id = %self.id, %reason, "async operation rejected without onReject");
                    return Ok(());
                }
            },
        };
        let transitions = self.run_chain(job.lease.node, &chain, &job.payload, result, "async")?;
        self.run_transitions(transitions, &job.payload, "async")
    }

    fn refresh(&mut self) {
        self.update.data = Arc::clone(&self.data);
        self.update.active = self.tree.active_paths();
        self.update.values = self
            .table
            .values()
            .map(|(_, slot)| (slot.name.to_string(), (slot.func)(&*self.data)))
            .collect();
    }

    /// Refresh the update and notify subscribers if a change is owed.
    fn flush(&mut self) {
        self.refresh();
        if std::mem::take(&mut self.dirty) {
            tracing::trace!(id = %self.id, subscribers = self.subscribers.len(), "notifying");
            for (_, subscriber) in &mut self.subscribers {
                subscriber(&self.update);
            }
        }
    }
}
