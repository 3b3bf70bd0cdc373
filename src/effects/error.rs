//! Evaluation errors raised while running user functions.

use crate::core::FnError;
use std::fmt;
use thiserror::Error;

/// The stage of a handler object a failing function belonged to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Result,
    Action,
    SecretAction,
    Transition,
    Initial,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Result => f.write_str("result"),
            Self::Action => f.write_str("action"),
            Self::SecretAction => f.write_str("secret action"),
            Self::Transition => f.write_str("transition"),
            Self::Initial => f.write_str("initial"),
        }
    }
}

/// A user function failed; carries the function's name and stage.
#[derive(Debug, Error)]
#[error("{stage} function '{name}' failed: {source}")]
pub struct EvalError {
    pub stage: Stage,
    pub name: String,
    #[source]
    pub source: FnError,
}

impl EvalError {
    pub fn new(stage: Stage, name: &str, source: FnError) -> Self {
        Self {
            stage,
            name: name.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn message_names_stage_and_function() {
        let error = EvalError::new(Stage::SecretAction, "saveDraft", "disk full".into());
        assert_eq!(
            error.to_string(),
            "secret action function 'saveDraft' failed: disk full"
        );
    }

    #[test]
    fn source_is_preserved() {
        let error = EvalError::new(Stage::Result, "parse", "bad input".into());
        assert_eq!(error.source().map(|s| s.to_string()), Some("bad input".to_string()));
    }
}
