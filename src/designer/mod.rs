//! Machine instances.
//!
//! A [`Designer`] compiles a [`Design`](crate::design::Design), activates its
//! initial states and then processes events one at a time. Timers run on a
//! per-instance virtual clock moved with [`Designer::advance`]; async
//! operations settle when the designer polls them.

mod config;
mod error;
mod machine;
mod scheduler;
mod update;

pub use config::{DesignerConfig, Mode, DEFAULT_FRAME_INTERVAL};
pub use error::DesignerError;
pub use machine::{Designer, SubscriptionId};
pub use scheduler::{Due, Scheduler};
pub use update::Update;
