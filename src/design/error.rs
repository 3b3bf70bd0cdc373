//! Compile errors for designs.

use super::collections::Collection;
use thiserror::Error;

/// A single problem found while compiling a design.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("state '{path}' declares an initial state but has no child states")]
    InitialWithoutStates { path: String },

    #[error("state '{path}' references unknown {collection} '{name}'")]
    MissingEntry {
        path: String,
        collection: Collection,
        name: String,
    },

    #[error("state '{path}' has no child named '{name}' to start in")]
    UnknownInitial { path: String, name: String },

    #[error("state '{path}' has an invalid child name '{name}'")]
    InvalidStateName { path: String, name: String },

    #[error("state '{path}' declares child '{name}' more than once")]
    DuplicateState { path: String, name: String },

    #[error("state '{path}' handles event '{event}' more than once")]
    DuplicateEvent { path: String, event: String },
}

/// Every problem found in one compile pass.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid design: {}", list(.errors))]
pub struct CompileErrors {
    errors: Vec<CompileError>,
}

fn list(errors: &[CompileError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl CompileErrors {
    pub fn new(errors: Vec<CompileError>) -> Self {
        Self { errors }
    }

    pub fn errors(&self) -> &[CompileError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_lists_every_problem() {
        let errors = CompileErrors::new(vec![
            CompileError::InitialWithoutStates {
                path: "m.a".into(),
            },
            CompileError::MissingEntry {
                path: "m".into(),
                collection: Collection::Actions,
                name: "increment".into(),
            },
        ]);

        assert_eq!(
            errors.to_string(),
            "invalid design: state 'm.a' declares an initial state but has no child states; \
             state 'm' references unknown action 'increment'"
        );
        assert_eq!(errors.len(), 2);
    }
}
