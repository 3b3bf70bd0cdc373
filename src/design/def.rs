//! Declarative state definitions.
//!
//! Definitions mirror the JSON design document. Every function position
//! accepts either the name of an entry in the design's collections or an
//! inline closure; JSON documents can only use names.
//!
//! # Example
//!
//! ```rust
//! use statecraft::design::{HandlerDef, StateDef};
//!
//! let root: StateDef<i32> = StateDef::new()
//!     .initial("idle")
//!     .state("idle", StateDef::new().on("START", HandlerDef::new().to("running")))
//!     .state("running", StateDef::new().on("STOP", HandlerDef::new().to("idle")));
//!
//! assert_eq!(root.states.len(), 2);
//! ```

use crate::core::{ActionFn, AsyncFn, ConditionFn, ResultFn, TargetFn, TimeFn};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A function given by collection name or inline.
pub enum FnRef<F> {
    Named(String),
    Inline(F),
}

impl<F> From<&str> for FnRef<F> {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl<F> From<String> for FnRef<F> {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl<'de, F> Deserialize<'de> for FnRef<F> {
    fn deserialize<De>(deserializer: De) -> Result<Self, De::Error>
    where
        De: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::Named)
    }
}

impl<F> fmt::Debug for FnRef<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Inline(_) => f.write_str("Inline"),
        }
    }
}

/// A transition target: a path, or a function computing one.
pub enum TargetRef<D> {
    Path(String),
    Computed(TargetFn<D>),
}

impl<D> From<&str> for TargetRef<D> {
    fn from(path: &str) -> Self {
        Self::Path(path.to_string())
    }
}

impl<D> From<String> for TargetRef<D> {
    fn from(path: String) -> Self {
        Self::Path(path)
    }
}

impl<'de, D> Deserialize<'de> for TargetRef<D> {
    fn deserialize<De>(deserializer: De) -> Result<Self, De::Error>
    where
        De: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::Path)
    }
}

/// A delay: fixed seconds, or a time function.
pub enum TimeRef<D> {
    Seconds(f64),
    Computed(FnRef<TimeFn<D>>),
}

impl<D> From<f64> for TimeRef<D> {
    fn from(secs: f64) -> Self {
        Self::Seconds(secs)
    }
}

impl<D> From<&str> for TimeRef<D> {
    fn from(name: &str) -> Self {
        Self::Computed(FnRef::from(name))
    }
}

impl<'de, D> Deserialize<'de> for TimeRef<D> {
    fn deserialize<De>(deserializer: De) -> Result<Self, De::Error>
    where
        De: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Seconds(f64),
            Named(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => Self::Seconds(secs),
            Raw::Named(name) => Self::Computed(FnRef::Named(name)),
        })
    }
}

/// Event queued by a handler object: `"NAME"` or `{"event", "payload"}`.
#[derive(Clone, Debug, PartialEq)]
pub struct SendDef {
    pub event: String,
    pub payload: Value,
}

impl<'de> Deserialize<'de> for SendDef {
    fn deserialize<De>(deserializer: De) -> Result<Self, De::Error>
    where
        De: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Event(String),
            Full {
                event: String,
                #[serde(default)]
                payload: Value,
            },
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Event(event) => Self {
                event,
                payload: Value::Null,
            },
            Raw::Full { event, payload } => Self { event, payload },
        })
    }
}

/// One link of a chain: an action shortcut or a full handler object.
#[derive(Deserialize)]
#[serde(untagged, bound = "")]
pub enum LinkDef<D> {
    Action(FnRef<ActionFn<D>>),
    Handler(Box<HandlerDef<D>>),
}

impl<D: 'static> LinkDef<D> {
    /// An inline single-action link.
    pub fn run<F>(f: F) -> Self
    where
        F: Fn(&mut D, &Value, &Value) + Send + Sync + 'static,
    {
        Self::Action(FnRef::Inline(infallible_action(f)))
    }
}

impl<D> From<&str> for LinkDef<D> {
    fn from(name: &str) -> Self {
        Self::Action(FnRef::from(name))
    }
}

impl<D> From<HandlerDef<D>> for LinkDef<D> {
    fn from(handler: HandlerDef<D>) -> Self {
        Self::Handler(Box::new(handler))
    }
}

/// A handler chain: one link or a list of links.
// Lists are tried first; a handler object would otherwise accept a JSON
// array positionally.
#[derive(Deserialize)]
#[serde(untagged, bound = "")]
pub enum ChainDef<D> {
    Many(Vec<LinkDef<D>>),
    One(LinkDef<D>),
}

impl<D> ChainDef<D> {
    pub fn links(&self) -> &[LinkDef<D>] {
        match self {
            Self::One(link) => std::slice::from_ref(link),
            Self::Many(links) => links,
        }
    }
}

impl<D: 'static> ChainDef<D> {
    /// A chain made of one inline action.
    pub fn run<F>(f: F) -> Self
    where
        F: Fn(&mut D, &Value, &Value) + Send + Sync + 'static,
    {
        Self::One(LinkDef::run(f))
    }
}

impl<D> From<&str> for ChainDef<D> {
    fn from(name: &str) -> Self {
        Self::One(LinkDef::from(name))
    }
}

impl<D> From<HandlerDef<D>> for ChainDef<D> {
    fn from(handler: HandlerDef<D>) -> Self {
        Self::One(LinkDef::from(handler))
    }
}

impl<D> From<LinkDef<D>> for ChainDef<D> {
    fn from(link: LinkDef<D>) -> Self {
        Self::One(link)
    }
}

impl<D> From<Vec<LinkDef<D>>> for ChainDef<D> {
    fn from(links: Vec<LinkDef<D>>) -> Self {
        Self::Many(links)
    }
}

/// A handler object definition.
#[derive(Deserialize)]
#[serde(bound = "", rename_all = "camelCase", deny_unknown_fields)]
pub struct HandlerDef<D> {
    #[serde(default, deserialize_with = "one_or_many")]
    pub get: Vec<FnRef<ResultFn<D>>>,
    #[serde(default, rename = "if", deserialize_with = "one_or_many")]
    pub if_all: Vec<FnRef<ConditionFn<D>>>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub if_any: Vec<FnRef<ConditionFn<D>>>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub unless: Vec<FnRef<ConditionFn<D>>>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub unless_any: Vec<FnRef<ConditionFn<D>>>,
    #[serde(default, rename = "do", deserialize_with = "one_or_many")]
    pub actions: Vec<FnRef<ActionFn<D>>>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub secretly_do: Vec<FnRef<ActionFn<D>>>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub to: Vec<TargetRef<D>>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub secretly_to: Vec<TargetRef<D>>,
    #[serde(default)]
    pub send: Option<SendDef>,
    #[serde(default)]
    pub wait: Option<TimeRef<D>>,
    #[serde(default, rename = "break")]
    pub break_if: Option<FnRef<ConditionFn<D>>>,
    #[serde(default)]
    pub then: Option<ChainDef<D>>,
    #[serde(default, rename = "else")]
    pub otherwise: Option<ChainDef<D>>,
}

impl<D> Default for HandlerDef<D> {
    fn default() -> Self {
        Self {
            get: Vec::new(),
            if_all: Vec::new(),
            if_any: Vec::new(),
            unless: Vec::new(),
            unless_any: Vec::new(),
            actions: Vec::new(),
            secretly_do: Vec::new(),
            to: Vec::new(),
            secretly_to: Vec::new(),
            send: None,
            wait: None,
            break_if: None,
            then: None,
            otherwise: None,
        }
    }
}

impl<D: 'static> HandlerDef<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute a result with a named result function.
    pub fn get(mut self, name: &str) -> Self {
        self.get.push(name.into());
        self
    }

    pub fn get_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&D, &Value, &Value) -> Value + Send + Sync + 'static,
    {
        let func: ResultFn<D> = Arc::new(move |data, payload, result| Ok(f(data, payload, result)));
        self.get.push(FnRef::Inline(func));
        self
    }

    /// Require a named condition to pass.
    pub fn if_(mut self, name: &str) -> Self {
        self.if_all.push(name.into());
        self
    }

    pub fn if_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&D, &Value, &Value) -> bool + Send + Sync + 'static,
    {
        let func: ConditionFn<D> = Arc::new(f);
        self.if_all.push(FnRef::Inline(func));
        self
    }

    pub fn if_any(mut self, name: &str) -> Self {
        self.if_any.push(name.into());
        self
    }

    pub fn unless(mut self, name: &str) -> Self {
        self.unless.push(name.into());
        self
    }

    pub fn unless_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&D, &Value, &Value) -> bool + Send + Sync + 'static,
    {
        let func: ConditionFn<D> = Arc::new(f);
        self.unless.push(FnRef::Inline(func));
        self
    }

    pub fn unless_any(mut self, name: &str) -> Self {
        self.unless_any.push(name.into());
        self
    }

    /// Run a named action.
    pub fn do_(mut self, name: &str) -> Self {
        self.actions.push(name.into());
        self
    }

    pub fn do_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut D, &Value, &Value) + Send + Sync + 'static,
    {
        self.actions.push(FnRef::Inline(infallible_action(f)));
        self
    }

    /// Run a named action without obliging a notification.
    pub fn secretly_do(mut self, name: &str) -> Self {
        self.secretly_do.push(name.into());
        self
    }

    pub fn secretly_do_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut D, &Value, &Value) + Send + Sync + 'static,
    {
        self.secretly_do.push(FnRef::Inline(infallible_action(f)));
        self
    }

    pub fn to(mut self, path: &str) -> Self {
        self.to.push(path.into());
        self
    }

    pub fn to_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&D, &Value, &Value) -> String + Send + Sync + 'static,
    {
        let func: TargetFn<D> = Arc::new(move |data, payload, result| Ok(f(data, payload, result)));
        self.to.push(TargetRef::Computed(func));
        self
    }

    pub fn secretly_to(mut self, path: &str) -> Self {
        self.secretly_to.push(path.into());
        self
    }

    /// Queue an event with a null payload.
    pub fn send(self, event: &str) -> Self {
        self.send_with(event, Value::Null)
    }

    pub fn send_with(mut self, event: &str, payload: Value) -> Self {
        self.send = Some(SendDef {
            event: event.to_string(),
            payload,
        });
        self
    }

    /// Wait a fixed number of seconds before running.
    pub fn wait(mut self, secs: f64) -> Self {
        self.wait = Some(TimeRef::Seconds(secs));
        self
    }

    /// Wait for the delay computed by a named time function.
    pub fn wait_for(mut self, name: &str) -> Self {
        self.wait = Some(TimeRef::from(name));
        self
    }

    pub fn wait_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&D, &Value, &Value) -> f64 + Send + Sync + 'static,
    {
        let func: TimeFn<D> = Arc::new(f);
        self.wait = Some(TimeRef::Computed(FnRef::Inline(func)));
        self
    }

    /// Stop the chain after this object when the named condition passes.
    pub fn break_if(mut self, name: &str) -> Self {
        self.break_if = Some(name.into());
        self
    }

    pub fn break_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&D, &Value, &Value) -> bool + Send + Sync + 'static,
    {
        let func: ConditionFn<D> = Arc::new(f);
        self.break_if = Some(FnRef::Inline(func));
        self
    }

    pub fn then(mut self, chain: impl Into<ChainDef<D>>) -> Self {
        self.then = Some(chain.into());
        self
    }

    pub fn else_(mut self, chain: impl Into<ChainDef<D>>) -> Self {
        self.otherwise = Some(chain.into());
        self
    }
}

/// Initial child choice: a child name or a decision.
#[derive(Deserialize)]
#[serde(untagged, bound = "")]
pub enum InitialDef<D> {
    Child(String),
    Decision(Box<InitialDecisionDef<D>>),
}

impl<D> From<&str> for InitialDef<D> {
    fn from(name: &str) -> Self {
        Self::Child(name.to_string())
    }
}

impl<D> From<InitialDecisionDef<D>> for InitialDef<D> {
    fn from(decision: InitialDecisionDef<D>) -> Self {
        Self::Decision(Box::new(decision))
    }
}

/// A guarded initial choice, evaluated every time the branch is entered
/// without history.
#[derive(Deserialize)]
#[serde(bound = "", rename_all = "camelCase", deny_unknown_fields)]
pub struct InitialDecisionDef<D> {
    #[serde(default, deserialize_with = "one_or_many")]
    pub get: Vec<FnRef<ResultFn<D>>>,
    #[serde(default, rename = "if", deserialize_with = "one_or_many")]
    pub if_all: Vec<FnRef<ConditionFn<D>>>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub if_any: Vec<FnRef<ConditionFn<D>>>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub unless: Vec<FnRef<ConditionFn<D>>>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub unless_any: Vec<FnRef<ConditionFn<D>>>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub then: Option<InitialDef<D>>,
    #[serde(default, rename = "else")]
    pub otherwise: Option<InitialDef<D>>,
}

impl<D> Default for InitialDecisionDef<D> {
    fn default() -> Self {
        Self {
            get: Vec::new(),
            if_all: Vec::new(),
            if_any: Vec::new(),
            unless: Vec::new(),
            unless_any: Vec::new(),
            to: None,
            then: None,
            otherwise: None,
        }
    }
}

impl<D: 'static> InitialDecisionDef<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(mut self, name: &str) -> Self {
        self.get.push(name.into());
        self
    }

    pub fn if_(mut self, name: &str) -> Self {
        self.if_all.push(name.into());
        self
    }

    pub fn if_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&D, &Value, &Value) -> bool + Send + Sync + 'static,
    {
        let func: ConditionFn<D> = Arc::new(f);
        self.if_all.push(FnRef::Inline(func));
        self
    }

    pub fn if_any(mut self, name: &str) -> Self {
        self.if_any.push(name.into());
        self
    }

    pub fn unless(mut self, name: &str) -> Self {
        self.unless.push(name.into());
        self
    }

    pub fn unless_any(mut self, name: &str) -> Self {
        self.unless_any.push(name.into());
        self
    }

    pub fn to(mut self, child: &str) -> Self {
        self.to = Some(child.to_string());
        self
    }

    pub fn then(mut self, initial: impl Into<InitialDef<D>>) -> Self {
        self.then = Some(initial.into());
        self
    }

    pub fn else_(mut self, initial: impl Into<InitialDef<D>>) -> Self {
        self.otherwise = Some(initial.into());
        self
    }
}

/// Repeated chain: per frame without a delay, otherwise on a fixed interval.
#[derive(Deserialize)]
#[serde(bound = "", rename_all = "camelCase", deny_unknown_fields)]
pub struct RepeatDef<D> {
    pub on_repeat: ChainDef<D>,
    #[serde(default)]
    pub delay: Option<TimeRef<D>>,
}

/// Async operation launched on entry.
#[derive(Deserialize)]
#[serde(bound = "", rename_all = "camelCase", deny_unknown_fields)]
pub struct AsyncDef<D> {
    #[serde(rename = "await")]
    pub op: FnRef<AsyncFn<D>>,
    pub on_resolve: ChainDef<D>,
    #[serde(default)]
    pub on_reject: Option<ChainDef<D>>,
}

impl<D> AsyncDef<D> {
    pub fn new(op: &str, on_resolve: impl Into<ChainDef<D>>) -> Self {
        Self {
            op: op.into(),
            on_resolve: on_resolve.into(),
            on_reject: None,
        }
    }

    pub fn on_reject(mut self, chain: impl Into<ChainDef<D>>) -> Self {
        self.on_reject = Some(chain.into());
        self
    }
}

/// A state and, recursively, its children.
#[derive(Deserialize)]
#[serde(bound = "", rename_all = "camelCase")]
pub struct StateDef<D> {
    #[serde(default)]
    pub initial: Option<InitialDef<D>>,
    #[serde(default, deserialize_with = "entries")]
    pub on: Vec<(String, ChainDef<D>)>,
    #[serde(default)]
    pub on_enter: Option<ChainDef<D>>,
    #[serde(default)]
    pub on_exit: Option<ChainDef<D>>,
    #[serde(default)]
    pub on_event: Option<ChainDef<D>>,
    #[serde(default)]
    pub repeat: Option<RepeatDef<D>>,
    #[serde(default, rename = "async")]
    pub awaits: Option<AsyncDef<D>>,
    /// Children in declaration order
    #[serde(default, deserialize_with = "entries")]
    pub states: Vec<(String, StateDef<D>)>,
}

impl<D> Default for StateDef<D> {
    fn default() -> Self {
        Self {
            initial: None,
            on: Vec::new(),
            on_enter: None,
            on_exit: None,
            on_event: None,
            repeat: None,
            awaits: None,
            states: Vec::new(),
        }
    }
}

impl<D> StateDef<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start in the named child. A state with children and no initial
    /// child is parallel.
    pub fn initial(mut self, child: &str) -> Self {
        self.initial = Some(child.into());
        self
    }

    pub fn initial_with(mut self, decision: InitialDecisionDef<D>) -> Self {
        self.initial = Some(decision.into());
        self
    }

    pub fn state(mut self, name: &str, state: StateDef<D>) -> Self {
        self.states.push((name.to_string(), state));
        self
    }

    pub fn on(mut self, event: &str, chain: impl Into<ChainDef<D>>) -> Self {
        self.on.push((event.to_string(), chain.into()));
        self
    }

    pub fn on_enter(mut self, chain: impl Into<ChainDef<D>>) -> Self {
        self.on_enter = Some(chain.into());
        self
    }

    pub fn on_exit(mut self, chain: impl Into<ChainDef<D>>) -> Self {
        self.on_exit = Some(chain.into());
        self
    }

    /// Chain run for every event while this state is active.
    pub fn on_event(mut self, chain: impl Into<ChainDef<D>>) -> Self {
        self.on_event = Some(chain.into());
        self
    }

    /// Run `chain` once per frame while active.
    pub fn repeat(mut self, chain: impl Into<ChainDef<D>>) -> Self {
        self.repeat = Some(RepeatDef {
            on_repeat: chain.into(),
            delay: None,
        });
        self
    }

    /// Run `chain` every `delay` while active.
    pub fn repeat_every(mut self, delay: impl Into<TimeRef<D>>, chain: impl Into<ChainDef<D>>) -> Self {
        self.repeat = Some(RepeatDef {
            on_repeat: chain.into(),
            delay: Some(delay.into()),
        });
        self
    }

    pub fn awaits(mut self, op: AsyncDef<D>) -> Self {
        self.awaits = Some(op);
        self
    }
}

fn infallible_action<D, F>(f: F) -> ActionFn<D>
where
    D: 'static,
    F: Fn(&mut D, &Value, &Value) + Send + Sync + 'static,
{
    Arc::new(move |data, payload, result| {
        f(data, payload, result);
        Ok(())
    })
}

fn one_or_many<'de, De, T>(deserializer: De) -> Result<Vec<T>, De::Error>
where
    De: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        One(T),
        Many(Vec<T>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(item) => vec![item],
        OneOrMany::Many(items) => items,
    })
}

/// Deserialize a map into entries, keeping document order.
fn entries<'de, De, T>(deserializer: De) -> Result<Vec<(String, T)>, De::Error>
where
    De: Deserializer<'de>,
    T: Deserialize<'de>,
{
    struct EntriesVisitor<T>(PhantomData<T>);

    impl<'de, T: Deserialize<'de>> Visitor<'de> for EntriesVisitor<T> {
        type Value = Vec<(String, T)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of names to definitions")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry()? {
                out.push(entry);
            }
            Ok(out)
        }
    }

    deserializer.deserialize_map(EntriesVisitor(PhantomData))
}
