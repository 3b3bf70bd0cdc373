//! Compiles a design into a state tree and a closed function table.
//!
//! Compilation never stops at the first problem. Every check produces a
//! `Validation` and all of them are combined at the end, so a caller sees
//! every missing name and malformed state in one pass.

use super::collections::Collection;
use super::def::{ChainDef, FnRef, HandlerDef, InitialDef, LinkDef, StateDef, TargetRef, TimeRef};
use super::document::Design;
use super::error::{CompileError, CompileErrors};
use crate::core::{
    join, ActionFn, ActionId, AsyncFn, AsyncId, ConditionFn, ConditionId, Delay, FnTable,
    FollowUp, Guards, HandlerChain, HandlerObject, ResultFn, ResultId, Slot, Target, TargetId,
    TimeId,
};
use crate::tree::{
    AsyncHandler, Handlers, Initial, InitialDecision, NodeId, NodeKind, Repeat, StateNode,
    StateTree,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Child names that would collide with history suffixes.
const RESERVED_NAMES: [&str; 2] = ["previous", "restore"];

/// A compiled design, ready to be instantiated.
pub struct CompiledDesign<D> {
    pub id: String,
    pub tree: StateTree,
    pub table: FnTable<D>,
}

/// Compile `design` under the machine id `id`.
///
/// # Example
///
/// ```rust
/// use statecraft::design::{compile, Design, HandlerDef, StateDef};
///
/// let design = Design::new(
///     (),
///     StateDef::new()
///         .initial("a")
///         .state("a", StateDef::new().on("GO", HandlerDef::new().do_("missing")))
///         .state("b", StateDef::new().initial("c")),
/// );
///
/// let errors = compile(&design, "m").err().unwrap();
/// assert_eq!(errors.len(), 2);
/// ```
pub fn compile<D>(design: &Design<D>, id: &str) -> Result<CompiledDesign<D>, CompileErrors> {
    let mut compiler = Compiler::new(design);
    let root = compiler.state(id, id.to_string(), Vec::new(), &design.root);
    compiler.values();
    compiler.finish(id, root)
}

type Check = Validation<(), NonEmptyVec<CompileError>>;

struct Compiler<'a, D> {
    design: &'a Design<D>,
    table: FnTable<D>,
    interned: HashMap<(Collection, String), usize>,
    nodes: Vec<StateNode>,
    checks: Vec<Check>,
}

impl<'a, D> Compiler<'a, D> {
    fn new(design: &'a Design<D>) -> Self {
        Self {
            design,
            table: FnTable::default(),
            interned: HashMap::new(),
            nodes: Vec::new(),
            checks: Vec::new(),
        }
    }

    fn fail(&mut self, error: CompileError) {
        self.checks.push(Validation::fail(error));
    }

    fn finish(self, id: &str, root: NodeId) -> Result<CompiledDesign<D>, CompileErrors> {
        match Validation::all_vec(self.checks).map(|_| ()) {
            Validation::Success(()) => Ok(CompiledDesign {
                id: id.to_string(),
                tree: StateTree::new(self.nodes, root),
                table: self.table,
            }),
            Validation::Failure(errors) => Err(CompileErrors::new(errors.iter().cloned().collect())),
        }
    }

    fn state(&mut self, name: &str, path: String, trail: Vec<String>, def: &StateDef<D>) -> NodeId {
        let mut seen = HashSet::new();
        let mut children = Vec::with_capacity(def.states.len());
        for (child, child_def) in &def.states {
            if child.is_empty() || child.contains('.') || RESERVED_NAMES.contains(&child.as_str()) {
                self.fail(CompileError::InvalidStateName {
                    path: path.clone(),
                    name: child.clone(),
                });
                continue;
            }
            if !seen.insert(child.as_str()) {
                self.fail(CompileError::DuplicateState {
                    path: path.clone(),
                    name: child.clone(),
                });
                continue;
            }
            let mut child_trail = trail.clone();
            child_trail.push(child.clone());
            let id = self.state(child, join(&path, child), child_trail, child_def);
            children.push(id);
        }

        let kind = match (&def.initial, children.is_empty()) {
            (Some(_), true) => {
                self.fail(CompileError::InitialWithoutStates { path: path.clone() });
                NodeKind::Leaf
            }
            (None, true) => NodeKind::Leaf,
            (Some(initial), false) => NodeKind::Branch(self.initial(&path, initial, &seen)),
            (None, false) => NodeKind::Parallel,
        };
        let handlers = self.handlers(&path, def);

        let mut node = StateNode::new(name, path, trail);
        node.kind = kind;
        node.children = children;
        node.handlers = handlers;
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn initial(&mut self, at: &str, def: &InitialDef<D>, children: &HashSet<&str>) -> Initial {
        match def {
            InitialDef::Child(name) => {
                self.expect_child(at, name, children);
                Initial::Child(name.clone())
            }
            InitialDef::Decision(decision) => {
                if let Some(to) = &decision.to {
                    self.expect_child(at, to, children);
                }
                let compiled = InitialDecision {
                    get: decision.get.iter().filter_map(|r| self.result(at, r)).collect(),
                    guards: self.guards(
                        at,
                        &decision.if_all,
                        &decision.if_any,
                        &decision.unless,
                        &decision.unless_any,
                    ),
                    to: decision.to.clone(),
                    then: decision.then.as_ref().map(|then| self.initial(at, then, children)),
                    otherwise: decision
                        .otherwise
                        .as_ref()
                        .map(|otherwise| self.initial(at, otherwise, children)),
                };
                Initial::Decision(Arc::new(compiled))
            }
        }
    }

    fn expect_child(&mut self, at: &str, name: &str, children: &HashSet<&str>) {
        if !children.contains(name) {
            self.fail(CompileError::UnknownInitial {
                path: at.to_string(),
                name: name.to_string(),
            });
        }
    }

    fn handlers(&mut self, at: &str, def: &StateDef<D>) -> Handlers {
        let mut on = HashMap::with_capacity(def.on.len());
        for (event, chain) in &def.on {
            let chain = self.chain(at, chain);
            if on.insert(event.clone(), chain).is_some() {
                self.fail(CompileError::DuplicateEvent {
                    path: at.to_string(),
                    event: event.clone(),
                });
            }
        }

        let repeat = def.repeat.as_ref().map(|repeat| Repeat {
            on_repeat: self.chain(at, &repeat.on_repeat),
            delay: repeat.delay.as_ref().and_then(|delay| self.delay(at, delay)),
        });

        let async_handler = def.awaits.as_ref().and_then(|awaits| {
            let on_resolve = self.chain(at, &awaits.on_resolve);
            let on_reject = awaits.on_reject.as_ref().map(|chain| self.chain(at, chain));
            let op = self.async_op(at, &awaits.op)?;
            Some(AsyncHandler {
                op,
                on_resolve,
                on_reject,
            })
        });

        Handlers {
            on,
            on_enter: def.on_enter.as_ref().map(|chain| self.chain(at, chain)),
            on_exit: def.on_exit.as_ref().map(|chain| self.chain(at, chain)),
            on_event: def.on_event.as_ref().map(|chain| self.chain(at, chain)),
            repeat,
            async_handler,
        }
    }

    fn chain(&mut self, at: &str, def: &ChainDef<D>) -> HandlerChain {
        let objects: Vec<HandlerObject> = def
            .links()
            .iter()
            .filter_map(|link| match link {
                LinkDef::Action(action) => self.action(at, action).map(HandlerObject::action),
                LinkDef::Handler(handler) => Some(self.handler(at, handler)),
            })
            .collect();
        HandlerChain::new(objects)
    }

    fn handler(&mut self, at: &str, def: &HandlerDef<D>) -> HandlerObject {
        HandlerObject {
            get: def.get.iter().filter_map(|r| self.result(at, r)).collect(),
            guards: self.guards(at, &def.if_all, &def.if_any, &def.unless, &def.unless_any),
            actions: def.actions.iter().filter_map(|r| self.action(at, r)).collect(),
            secret_actions: def.secretly_do.iter().filter_map(|r| self.action(at, r)).collect(),
            to: def.to.iter().map(|target| self.target(target)).collect(),
            secretly_to: def.secretly_to.iter().map(|target| self.target(target)).collect(),
            send: def.send.as_ref().map(|send| FollowUp {
                event: send.event.clone(),
                payload: send.payload.clone(),
            }),
            wait: def.wait.as_ref().and_then(|wait| self.delay(at, wait)),
            break_when: def.break_if.as_ref().and_then(|r| self.condition(at, r)),
            then: def.then.as_ref().map(|chain| self.chain(at, chain)),
            otherwise: def.otherwise.as_ref().map(|chain| self.chain(at, chain)),
        }
    }

    fn guards(
        &mut self,
        at: &str,
        all: &[FnRef<ConditionFn<D>>],
        any: &[FnRef<ConditionFn<D>>],
        none: &[FnRef<ConditionFn<D>>],
        not_all: &[FnRef<ConditionFn<D>>],
    ) -> Guards {
        Guards {
            all: all.iter().filter_map(|r| self.condition(at, r)).collect(),
            any: any.iter().filter_map(|r| self.condition(at, r)).collect(),
            none: none.iter().filter_map(|r| self.condition(at, r)).collect(),
            not_all: not_all.iter().filter_map(|r| self.condition(at, r)).collect(),
        }
    }

    fn target(&mut self, target: &TargetRef<D>) -> Target {
        match target {
            TargetRef::Path(path) => Target::Path(path.clone()),
            TargetRef::Computed(func) => {
                self.table.targets.push(Slot {
                    name: Arc::from("<inline target>"),
                    func: Arc::clone(func),
                });
                Target::Computed(TargetId(self.table.targets.len() - 1))
            }
        }
    }

    fn delay(&mut self, at: &str, delay: &TimeRef<D>) -> Option<Delay> {
        match delay {
            TimeRef::Seconds(secs) => Some(Delay::Seconds(*secs)),
            TimeRef::Computed(reference) => {
                let found = intern(
                    &mut self.table.times,
                    &mut self.interned,
                    Collection::Times,
                    &self.design.collections.times,
                    reference,
                );
                self.found(at, Collection::Times, found)
                    .map(|index| Delay::Computed(TimeId(index)))
            }
        }
    }

    fn result(&mut self, at: &str, reference: &FnRef<ResultFn<D>>) -> Option<ResultId> {
        let found = intern(
            &mut self.table.results,
            &mut self.interned,
            Collection::Results,
            &self.design.collections.results,
            reference,
        );
        self.found(at, Collection::Results, found).map(ResultId)
    }

    fn condition(
        &mut self,
        at: &str,
        reference: &FnRef<ConditionFn<D>>,
    ) -> Option<ConditionId> {
        let found = intern(
            &mut self.table.conditions,
            &mut self.interned,
            Collection::Conditions,
            &self.design.collections.conditions,
            reference,
        );
        self.found(at, Collection::Conditions, found).map(ConditionId)
    }

    fn action(&mut self, at: &str, reference: &FnRef<ActionFn<D>>) -> Option<ActionId> {
        let found = intern(
            &mut self.table.actions,
            &mut self.interned,
            Collection::Actions,
            &self.design.collections.actions,
            reference,
        );
        self.found(at, Collection::Actions, found).map(ActionId)
    }

    fn async_op(&mut self, at: &str, reference: &FnRef<AsyncFn<D>>) -> Option<AsyncId> {
        let found = intern(
            &mut self.table.asyncs,
            &mut self.interned,
            Collection::Asyncs,
            &self.design.collections.asyncs,
            reference,
        );
        self.found(at, Collection::Asyncs, found).map(AsyncId)
    }

    /// Derived values are not referenced from states; all of them are kept.
    fn values(&mut self) {
        for (name, func) in &self.design.collections.values {
            self.table.values.push(Slot {
                name: Arc::from(name.as_str()),
                func: Arc::clone(func),
            });
        }
    }

    fn found(&mut self, at: &str, collection: Collection, found: Result<usize, String>) -> Option<usize> {
        match found {
            Ok(index) => {
                self.checks.push(Validation::success(()));
                Some(index)
            }
            Err(name) => {
                self.fail(CompileError::MissingEntry {
                    path: at.to_string(),
                    collection,
                    name,
                });
                None
            }
        }
    }
}

/// Place a referenced function into its table slot list. Named functions
/// occupy one slot however often they are referenced; inline functions get
/// a slot each. Returns the missing name on failure.
fn intern<F: Clone>(
    slots: &mut Vec<Slot<F>>,
    interned: &mut HashMap<(Collection, String), usize>,
    collection: Collection,
    entries: &BTreeMap<String, F>,
    reference: &FnRef<F>,
) -> Result<usize, String> {
    match reference {
        FnRef::Inline(func) => {
            slots.push(Slot {
                name: Arc::from(format!("<inline {collection}>")),
                func: func.clone(),
            });
            Ok(slots.len() - 1)
        }
        FnRef::Named(name) => {
            let key = (collection, name.clone());
            if let Some(&index) = interned.get(&key) {
                return Ok(index);
            }
            let func = entries.get(name).ok_or_else(|| name.clone())?;
            slots.push(Slot {
                name: Arc::from(name.as_str()),
                func: func.clone(),
            });
            interned.insert(key, slots.len() - 1);
            Ok(slots.len() - 1)
        }
    }
}
