//! Statecraft: a hierarchical state-machine runtime
//!
//! A machine is described by a [`Design`](design::Design): initial data, a
//! tree of named states and collections of named functions. The designer
//! compiles the tree into a closed function table, activates the initial
//! states and then reacts to events through guarded handler chains.
//!
//! # Core Concepts
//!
//! - **States**: leaves, branches with one active child, and parallel
//!   states whose children are all active
//! - **Handler chains**: ordered handler objects with guards, actions,
//!   transitions, follow-up events and delays
//! - **History**: `.previous` and `.restore` targets re-enter remembered
//!   children
//! - **Updates**: snapshots of data, active paths and derived values, pushed
//!   to subscribers after each notifying change
//!
//! # Example
//!
//! ```rust
//! use serde_json::Value;
//! use statecraft::design::{Design, HandlerDef, StateDef};
//! use statecraft::designer::Designer;
//!
//! let design = Design::new(
//!     0_u32,
//!     StateDef::new()
//!         .initial("inactive")
//!         .state(
//!             "inactive",
//!             StateDef::new().on("TOGGLE", HandlerDef::new().do_("increment").to("active")),
//!         )
//!         .state("active", StateDef::new().on("TOGGLE", HandlerDef::new().to("inactive"))),
//! )
//! .id("toggle")
//! .action("increment", |count, _, _| *count += 1);
//!
//! let mut toggle = Designer::new(design).unwrap();
//! toggle.send("TOGGLE", Value::Null).unwrap();
//! assert!(toggle.is_in(["active"]));
//! assert_eq!(*toggle.data(), 1);
//!
//! toggle.send("TOGGLE", Value::Null).unwrap();
//! assert!(toggle.is_in(["inactive"]));
//! ```

pub mod core;
pub mod design;
pub mod designer;
pub mod effects;
pub mod tree;

pub use design::{Design, HandlerDef, StateDef};
pub use designer::{Designer, DesignerConfig, DesignerError, Mode, Update};
