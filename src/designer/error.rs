//! Runtime errors.

use crate::design::CompileErrors;
use crate::effects::EvalError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DesignerError {
    #[error(transparent)]
    Compile(#[from] CompileErrors),

    #[error("while handling '{event}': {source}")]
    Eval {
        event: String,
        #[source]
        source: EvalError,
    },

    #[error("no state matches transition target '{0}'")]
    UnknownTarget(String),

    #[error("more than {limit} transitions or events while handling '{event}'")]
    TransitionLoop { limit: usize, event: String },
}

impl DesignerError {
    pub(crate) fn eval(event: &str, source: EvalError) -> Self {
        Self::Eval {
            event: event.to_string(),
            source,
        }
    }

    /// True for unknown targets and transition loops.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::UnknownTarget(_) | Self::TransitionLoop { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::Stage;

    #[test]
    fn eval_error_names_event_and_function() {
        let error = DesignerError::eval(
            "SAVE",
            EvalError::new(Stage::Action, "persist", "disk full".into()),
        );

        assert_eq!(
            error.to_string(),
            "while handling 'SAVE': action function 'persist' failed: disk full"
        );
        assert!(!error.is_structural());
    }

    #[test]
    fn structural_errors() {
        assert!(DesignerError::UnknownTarget("nowhere".into()).is_structural());
        assert!(DesignerError::TransitionLoop {
            limit: 200,
            event: "GO".into()
        }
        .is_structural());
    }
}
