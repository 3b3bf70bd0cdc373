//! Virtual-clock scheduler owned by each machine instance.
//!
//! The scheduler never sleeps. Time moves only when the owner calls
//! [`Scheduler::pop_due`] with a horizon, which yields due entries one at a
//! time in time order. This keeps every timer deterministic and lets tests
//! drive time explicitly.
//!
//! Entries come in three shapes:
//! - timeouts fire once after a delay
//! - intervals fire repeatedly with a fixed period
//! - frame tasks fire together on every frame tick
//!
//! Every entry is owned by a node through a [`Lease`], and can be
//! cancelled per node.

use super::config::DEFAULT_FRAME_INTERVAL;
use crate::tree::{Lease, NodeId};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Clone, Debug)]
struct Timer<T> {
    owner: Lease,
    period: Option<Duration>,
    task: T,
}

/// An entry that came due.
#[derive(Clone, Debug, PartialEq)]
pub enum Due<T> {
    Timer {
        owner: Lease,
        task: T,
        /// Set for intervals
        period: Option<Duration>,
    },
    /// Every frame task, run together for one tick.
    Frame {
        tasks: Vec<(Lease, T)>,
        interval: Duration,
    },
}

#[derive(Clone, Debug)]
pub struct Scheduler<T> {
    now: Duration,
    sequence: u64,
    timers: BTreeMap<(Duration, u64), Timer<T>>,
    frames: Vec<(Lease, T)>,
    frame_interval: Duration,
    next_frame: Option<Duration>,
}

impl<T: Clone> Scheduler<T> {
    /// A zero `frame_interval` falls back to the default.
    pub fn new(frame_interval: Duration) -> Self {
        let frame_interval = if frame_interval.is_zero() {
            DEFAULT_FRAME_INTERVAL
        } else {
            frame_interval
        };
        Self {
            now: Duration::ZERO,
            sequence: 0,
            timers: BTreeMap::new(),
            frames: Vec::new(),
            frame_interval,
            next_frame: None,
        }
    }

    /// Time elapsed on the virtual clock.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn set_timeout(&mut self, owner: Lease, delay: Duration, task: T) {
        self.insert(
            self.now.saturating_add(delay),
            Timer {
                owner,
                period: None,
                task,
            },
        );
    }

    /// Fire `task` every `period`, first after one period. A zero period
    /// becomes a frame task.
    pub fn set_interval(&mut self, owner: Lease, period: Duration, task: T) {
        if period.is_zero() {
            self.add_frame(owner, task);
            return;
        }
        self.insert(
            self.now.saturating_add(period),
            Timer {
                owner,
                period: Some(period),
                task,
            },
        );
    }

    pub fn add_frame(&mut self, owner: Lease, task: T) {
        self.frames.push((owner, task));
        if self.next_frame.is_none() {
            self.next_frame = Some(self.now.saturating_add(self.frame_interval));
        }
    }

    /// Drop every entry owned by `node`.
    pub fn cancel(&mut self, node: NodeId) {
        self.timers.retain(|_, timer| timer.owner.node != node);
        self.frames.retain(|(owner, _)| owner.node != node);
        if self.frames.is_empty() {
            self.next_frame = None;
        }
    }

    /// Drop intervals and frame tasks, keeping one-shot timeouts.
    pub fn clear_repeating(&mut self) {
        self.timers.retain(|_, timer| timer.period.is_none());
        self.frames.clear();
        self.next_frame = None;
    }

    pub fn is_idle(&self) -> bool {
        self.timers.is_empty() && self.frames.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.timers.len() + self.frames.len()
    }

    /// Pop the earliest entry due at or before `until` and move the clock
    /// to its time. Timers win ties with frame ticks.
    pub fn pop_due(&mut self, until: Duration) -> Option<Due<T>> {
        let timer_at = self.timers.keys().next().map(|&(at, _)| at);
        let take_timer = match (timer_at, self.next_frame) {
            (Some(timer), Some(frame)) => timer <= frame,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return None,
        };

        if take_timer {
            if timer_at? > until {
                return None;
            }
            let ((at, _), timer) = self.timers.pop_first()?;
            self.now = at;
            // an interval whose next tick overflows the clock never fires again
            if let Some(next) = timer.period.and_then(|period| at.checked_add(period)) {
                self.insert(next, timer.clone());
            }
            Some(Due::Timer {
                owner: timer.owner,
                task: timer.task,
                period: timer.period,
            })
        } else {
            let at = self.next_frame?;
            if at > until {
                return None;
            }
            self.now = at;
            self.next_frame = at.checked_add(self.frame_interval);
            Some(Due::Frame {
                tasks: self.frames.clone(),
                interval: self.frame_interval,
            })
        }
    }

    /// Move the clock forward to `until` once nothing more is due.
    pub fn settle(&mut self, until: Duration) {
        if until > self.now {
            self.now = until;
        }
    }

    fn insert(&mut self, at: Duration, timer: Timer<T>) {
        self.sequence += 1;
        self.timers.insert((at, self.sequence), timer);
    }
}
