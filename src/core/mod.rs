//! Handler value model shared by the compiler, tree engine and processor.
//!
//! This module holds plain data and pure helpers:
//! - the closed function table and its typed indices
//! - compiled handler objects and chains
//! - guard algebra
//! - copy-on-write drafts of the machine data
//! - path parsing and suffix matching
//! - the transition log

mod draft;
mod guard;
mod handler;
mod history;
mod path;
mod table;

pub use draft::Draft;
pub use guard::Guards;
pub use handler::{Delay, FollowUp, HandlerChain, HandlerObject, Target};
pub use history::{TransitionLog, TransitionRecord};
pub use path::{join, matches_suffix, normalize, HistoryMode, TargetPath};
pub use table::{
    ActionFn, ActionId, AsyncFn, AsyncId, AsyncTask, ConditionFn, ConditionId, FnError, FnTable,
    ResultFn, ResultId, Slot, TargetFn, TargetId, TimeFn, TimeId, ValueFn, ValueId,
};
