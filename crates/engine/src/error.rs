use std::fmt;

use crate::handles::HandleError;

/// Every failure the interaction engine can surface as a wire `error:
/// String` (spec.md §7's Handle/Selector taxonomy plus the evaluation
/// failures from the CSP injection ladder, spec.md §4.5). Human-pipeline
/// refusals (`ClickOutcome::Refused` and friends) are deliberately not
/// variants here — spec.md §7 treats them as structured results, never
/// errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// No entry was ever stored under this handle id.
    HandleNotFound,
    /// The handle existed but its element has been reclaimed.
    HandleGced,
    /// A selector resolved to nothing within the requested scope.
    ElementNotFound { selector: String },
    /// `dom.evaluate`/`dom.elementEvaluate` did not return within its
    /// configured timeout.
    EvaluateTimedOut,
    /// Every rung of the injection ladder failed (spec.md §4.5: "if all
    /// three fail, the command fails with a descriptive error").
    EvaluateFailedAllWorlds { attempted: Vec<String> },
}

impl From<HandleError> for EngineError {
    fn from(err: HandleError) -> Self {
        match err {
            HandleError::NotFound => Self::HandleNotFound,
            HandleError::Gced => Self::HandleGced,
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HandleNotFound => write!(f, "handle-not-found"),
            Self::HandleGced => write!(f, "handle-gc'd"),
            Self::ElementNotFound { selector } => {
                write!(f, "element-not-found: {selector}")
            }
            Self::EvaluateTimedOut => write!(f, "evaluate-timed-out"),
            Self::EvaluateFailedAllWorlds { attempted } => {
                write!(f, "evaluate-failed-all-worlds: tried {}", attempted.join(", "))
            }
        }
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_error_converts_with_the_right_variant() {
        assert_eq!(EngineError::from(HandleError::NotFound), EngineError::HandleNotFound);
        assert_eq!(EngineError::from(HandleError::Gced), EngineError::HandleGced);
    }

    #[test]
    fn evaluate_failed_all_worlds_lists_every_attempt() {
        let err = EngineError::EvaluateFailedAllWorlds {
            attempted: vec!["inline-script".into(), "scripting-api".into()],
        };
        assert_eq!(
            err.to_string(),
            "evaluate-failed-all-worlds: tried inline-script, scripting-api"
        );
    }
}
