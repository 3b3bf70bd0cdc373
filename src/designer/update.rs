//! Update snapshots handed to subscribers.

use crate::core::matches_suffix;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Keys that `when_in` treats as always active.
const ALWAYS_KEYS: [&str; 2] = ["root", "default"];

/// A snapshot of a machine instance.
///
/// `active` lists the paths of active nodes in pre-order, starting with the
/// machine id. `values` holds every derived value computed from `data`.
pub struct Update<D> {
    pub id: String,
    pub data: Arc<D>,
    pub active: Vec<String>,
    pub values: BTreeMap<String, Value>,
}

impl<D> Clone for Update<D> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            data: Arc::clone(&self.data),
            active: self.active.clone(),
            values: self.values.clone(),
        }
    }
}

impl<D: std::fmt::Debug> std::fmt::Debug for Update<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Update")
            .field("id", &self.id)
            .field("data", &self.data)
            .field("active", &self.active)
            .field("values", &self.values)
            .finish()
    }
}

impl<D> Update<D> {
    fn matches(&self, path: &str) -> bool {
        self.active.iter().any(|active| matches_suffix(active, path))
    }

    /// True when every path matches an active node.
    ///
    /// ```rust
    /// use statecraft::designer::Update;
    /// use std::collections::BTreeMap;
    /// use std::sync::Arc;
    ///
    /// let update = Update {
    ///     id: "m".to_string(),
    ///     data: Arc::new(()),
    ///     active: vec!["m".into(), "m.on".into(), "m.on.idle".into()],
    ///     values: BTreeMap::new(),
    /// };
    /// assert!(update.is_in(["on", "on.idle"]));
    /// assert!(!update.is_in(["on", "off"]));
    /// assert!(update.is_in_any(["on", "off"]));
    /// ```
    pub fn is_in<I>(&self, paths: I) -> bool
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        paths.into_iter().all(|path| self.matches(path.as_ref()))
    }

    /// True when at least one path matches an active node.
    pub fn is_in_any<I>(&self, paths: I) -> bool
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        paths.into_iter().any(|path| self.matches(path.as_ref()))
    }

    fn key_active(&self, key: &str) -> bool {
        ALWAYS_KEYS.contains(&key) || self.matches(key)
    }

    /// Value of the last entry whose key is active.
    pub fn when_in<K, T, I>(&self, entries: I) -> Option<T>
    where
        I: IntoIterator<Item = (K, T)>,
        K: AsRef<str>,
    {
        entries
            .into_iter()
            .filter(|(key, _)| self.key_active(key.as_ref()))
            .last()
            .map(|(_, value)| value)
    }

    /// Values of every entry whose key is active, in order.
    pub fn when_in_all<K, T, I>(&self, entries: I) -> Vec<T>
    where
        I: IntoIterator<Item = (K, T)>,
        K: AsRef<str>,
    {
        entries
            .into_iter()
            .filter(|(key, _)| self.key_active(key.as_ref()))
            .map(|(_, value)| value)
            .collect()
    }

    /// Fold the values of active entries, in order.
    pub fn when_in_fold<K, T, A, I, F>(&self, entries: I, init: A, mut fold: F) -> A
    where
        I: IntoIterator<Item = (K, T)>,
        K: AsRef<str>,
        F: FnMut(A, T, &str) -> A,
    {
        let mut acc = init;
        for (key, value) in entries {
            if self.key_active(key.as_ref()) {
                acc = fold(acc, value, key.as_ref());
            }
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update() -> Update<()> {
        Update {
            id: "light".into(),
            data: Arc::new(()),
            active: vec![
                "light".into(),
                "light.power".into(),
                "light.power.on".into(),
                "light.mode".into(),
                "light.mode.warm".into(),
            ],
            values: BTreeMap::new(),
        }
    }

    #[test]
    fn is_in_requires_every_path() {
        let update = update();
        assert!(update.is_in(["on", "warm"]));
        assert!(update.is_in(["power.on"]));
        assert!(!update.is_in(["on", "cold"]));
        assert!(update.is_in(Vec::<String>::new()));
    }

    #[test]
    fn suffix_match_respects_name_boundaries() {
        let update = update();
        assert!(!update.is_in(["n"]));
        assert!(!update.is_in(["wer.on"]));
    }

    #[test]
    fn is_in_any_needs_one() {
        let update = update();
        assert!(update.is_in_any(["cold", "warm"]));
        assert!(!update.is_in_any(["cold", "off"]));
        assert!(!update.is_in_any(Vec::<&str>::new()));
    }

    #[test]
    fn when_in_last_active_entry_wins() {
        let update = update();
        let label = update.when_in([("default", "unknown"), ("on", "lit"), ("off", "dark")]);
        assert_eq!(label, Some("lit"));

        let none: Option<&str> = update.when_in([("off", "dark")]);
        assert_eq!(none, None);
    }

    #[test]
    fn when_in_all_collects_in_order() {
        let update = update();
        let classes = update.when_in_all([("root", "base"), ("warm", "amber"), ("cold", "blue")]);
        assert_eq!(classes, vec!["base", "amber"]);
    }

    #[test]
    fn when_in_fold_sees_keys() {
        let update = update();
        let joined = update.when_in_fold(
            [("on", 1), ("warm", 10), ("off", 100)],
            String::new(),
            |acc, value, key| format!("{acc}{key}={value};"),
        );
        assert_eq!(joined, "on=1;warm=10;");
    }
}
