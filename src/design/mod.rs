//! Designs and the design compiler.
//!
//! A [`Design`] is what callers write: initial data, a tree of
//! [`StateDef`]s and named function collections. It can be built in Rust or
//! loaded from JSON. [`compile`] turns it into a [`StateTree`](crate::tree::StateTree)
//! and a closed [`FnTable`](crate::core::FnTable), reporting every problem
//! it finds at once.

mod collections;
mod compiler;
mod def;
mod document;
mod error;

pub use collections::{Collection, Collections};
pub use compiler::{compile, CompiledDesign};
pub use def::{
    AsyncDef, ChainDef, FnRef, HandlerDef, InitialDecisionDef, InitialDef, LinkDef, RepeatDef,
    SendDef, StateDef, TargetRef, TimeRef,
};
pub use document::Design;
pub use error::{CompileError, CompileErrors};
