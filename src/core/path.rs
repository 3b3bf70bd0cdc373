//! State path parsing and matching.
//!
//! Paths are dot-joined state names prefixed by the machine id, for example
//! `toggle.active.idle`. Queries match by dotted suffix, so `idle` and
//! `active.idle` both select the node above.

use serde::{Deserialize, Serialize};

const PREVIOUS_SUFFIX: &str = ".previous";
const RESTORE_SUFFIX: &str = ".restore";

/// How history is used when entering a transition target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
    /// Enter the target through its initial state.
    #[default]
    Fresh,
    /// Reactivate the target's last active child, one level deep.
    Previous,
    /// Reactivate the last active children through the target's subtree.
    Restore,
}

/// A transition request with its history modifier split off.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetPath {
    pub path: String,
    pub mode: HistoryMode,
}

impl TargetPath {
    /// Split a `.previous` or `.restore` suffix from a target path.
    ///
    /// ```rust
    /// use statecraft::core::{HistoryMode, TargetPath};
    ///
    /// let target = TargetPath::parse("editing.previous");
    /// assert_eq!(target.path, "editing");
    /// assert_eq!(target.mode, HistoryMode::Previous);
    /// ```
    pub fn parse(raw: &str) -> Self {
        let raw = normalize(raw);
        if let Some(path) = raw.strip_suffix(PREVIOUS_SUFFIX) {
            return Self {
                path: path.to_string(),
                mode: HistoryMode::Previous,
            };
        }
        if let Some(path) = raw.strip_suffix(RESTORE_SUFFIX) {
            return Self {
                path: path.to_string(),
                mode: HistoryMode::Restore,
            };
        }
        Self {
            path: raw.to_string(),
            mode: HistoryMode::Fresh,
        }
    }
}

/// Trim surrounding whitespace and stray leading or trailing dots.
pub fn normalize(query: &str) -> &str {
    query.trim().trim_matches('.')
}

/// True when `node_path` equals `query` or ends with `.` + `query`.
pub fn matches_suffix(node_path: &str, query: &str) -> bool {
    let query = normalize(query);
    if query.is_empty() {
        return false;
    }
    match node_path.strip_suffix(query) {
        Some("") => true,
        Some(rest) => rest.ends_with('.'),
        None => false,
    }
}

/// Join a parent path and a child name.
pub fn join(parent: &str, name: &str) -> String {
    format!("{parent}.{name}")
}
