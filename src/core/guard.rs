//! Guard clauses for handler objects and initial decisions.
//!
//! Guards are pure boolean combinations of condition functions. They decide
//! whether a handler object runs its actions and transitions or falls
//! through to its `else` chain.

use super::table::ConditionId;

/// The four guard clauses of a handler object.
///
/// - `all` (`if`): every condition must pass
/// - `any` (`ifAny`): at least one condition must pass
/// - `none` (`unless`): every condition must fail
/// - `not_all` (`unlessAny`): at least one condition must fail
///
/// Empty clauses pass, so a handler object with no guards always runs.
/// Clauses are checked in the order above and the first failing clause
/// short-circuits the rest.
///
/// # Example
///
/// ```rust
/// use statecraft::core::Guards;
///
/// let guards = Guards::default();
/// assert!(guards.is_empty());
/// assert!(guards.check(|_| false));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Guards {
    pub all: Vec<ConditionId>,
    pub any: Vec<ConditionId>,
    pub none: Vec<ConditionId>,
    pub not_all: Vec<ConditionId>,
}

impl Guards {
    /// True when no clause carries a condition.
    pub fn is_empty(&self) -> bool {
        self.all.is_empty() && self.any.is_empty() && self.none.is_empty() && self.not_all.is_empty()
    }

    /// Evaluate the guards, calling `eval` for each condition that needs it.
    pub fn check<F>(&self, mut eval: F) -> bool
    where
        F: FnMut(ConditionId) -> bool,
    {
        if !self.all.iter().all(|&id| eval(id)) {
            return false;
        }

        if !self.any.is_empty() && !self.any.iter().any(|&id| eval(id)) {
            return false;
        }

        if self.none.iter().any(|&id| eval(id)) {
            return false;
        }

        if !self.not_all.is_empty() && self.not_all.iter().all(|&id| eval(id)) {
            return false;
        }

        true
    }
}
