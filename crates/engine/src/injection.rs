//! The code-injection ladder for page-world evaluation (spec.md §4.5):
//! pure strategy selection and fallthrough bookkeeping. Actual script
//! injection and CSP probing are host operations the `page-bridge` crate
//! performs; this module only decides what to try next and records why a
//! rung failed.

use std::fmt;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Inject an inline `<script>` that self-executes and writes its
    /// result to a hidden element's attribute.
    InlineScript,
    /// Execute via the browser's scripting API in the page's main world.
    ScriptingApi,
    /// Execute inside the content script's own isolated world.
    IsolatedWorld,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InlineScript => "inline-script",
            Self::ScriptingApi => "scripting-api",
            Self::IsolatedWorld => "isolated-world",
        };
        write!(f, "{s}")
    }
}

/// Why a rung of the ladder failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RungFailure {
    pub strategy: Strategy,
    pub detail: String,
}

/// Walks the ladder in order, handing back the next strategy to try given
/// the rungs already attempted. `dom.elementEvaluate`/`dom.evaluateHandle`
/// reuse the same ladder with a marked element, so this type carries no
/// evaluation-kind-specific state.
#[derive(Debug, Clone, Default)]
pub struct Ladder {
    attempted: Vec<RungFailure>,
}

impl Ladder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The strategy to attempt next, or `None` once every rung has failed
    /// (`evaluate-failed-all-worlds`, spec.md §7).
    #[must_use]
    pub fn next(&self) -> Option<Strategy> {
        const ORDER: [Strategy; 3] = [
            Strategy::InlineScript,
            Strategy::ScriptingApi,
            Strategy::IsolatedWorld,
        ];
        ORDER.get(self.attempted.len()).copied()
    }

    pub fn record_failure(&mut self, strategy: Strategy, detail: impl Into<String>) {
        self.attempted.push(RungFailure {
            strategy,
            detail: detail.into(),
        });
    }

    #[must_use]
    pub fn exhausted(&self) -> bool {
        self.next().is_none()
    }

    #[must_use]
    pub fn failures(&self) -> &[RungFailure] {
        &self.attempted
    }

    /// Once [`Self::exhausted`], the error to surface for the command
    /// that drove this ladder (spec.md §7: `evaluate-failed-all-worlds`).
    #[must_use]
    pub fn into_engine_error(self) -> EngineError {
        EngineError::EvaluateFailedAllWorlds {
            attempted: self.attempted.into_iter().map(|f| f.strategy.to_string()).collect(),
        }
    }
}

/// Whether a CSP regime (described by its `script-src` allowances) is
/// fatal to a given rung. Only strict CSP without `unsafe-inline` or
/// `unsafe-eval` kills (1) and (2); the isolated world survives any CSP
/// (spec.md §4.5).
#[derive(Debug, Clone, Copy, Default)]
pub struct CspPolicy {
    pub allows_unsafe_inline: bool,
    pub allows_unsafe_eval: bool,
    pub has_script_src_restriction: bool,
}

#[must_use]
pub fn strategy_viable(strategy: Strategy, csp: &CspPolicy) -> bool {
    match strategy {
        Strategy::InlineScript => !csp.has_script_src_restriction || csp.allows_unsafe_inline,
        Strategy::ScriptingApi => csp.allows_unsafe_eval,
        Strategy::IsolatedWorld => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_starts_at_inline_script() {
        let ladder = Ladder::new();
        assert_eq!(ladder.next(), Some(Strategy::InlineScript));
    }

    #[test]
    fn ladder_advances_on_failure_and_exhausts_after_three() {
        let mut ladder = Ladder::new();
        ladder.record_failure(Strategy::InlineScript, "csp blocked inline");
        assert_eq!(ladder.next(), Some(Strategy::ScriptingApi));
        ladder.record_failure(Strategy::ScriptingApi, "csp blocked eval");
        assert_eq!(ladder.next(), Some(Strategy::IsolatedWorld));
        ladder.record_failure(Strategy::IsolatedWorld, "needs page globals");
        assert_eq!(ladder.next(), None);
        assert!(ladder.exhausted());
        assert_eq!(ladder.failures().len(), 3);
    }

    #[test]
    fn exhausted_ladder_converts_to_an_engine_error_naming_every_rung() {
        let mut ladder = Ladder::new();
        ladder.record_failure(Strategy::InlineScript, "csp blocked inline");
        ladder.record_failure(Strategy::ScriptingApi, "csp blocked eval");
        ladder.record_failure(Strategy::IsolatedWorld, "needs page globals");
        assert!(ladder.exhausted());
        let err = ladder.into_engine_error();
        assert_eq!(
            err.to_string(),
            "evaluate-failed-all-worlds: tried inline-script, scripting-api, isolated-world"
        );
    }

    #[test]
    fn strict_csp_only_leaves_isolated_world_viable() {
        let csp = CspPolicy {
            allows_unsafe_inline: false,
            allows_unsafe_eval: false,
            has_script_src_restriction: true,
        };
        assert!(!strategy_viable(Strategy::InlineScript, &csp));
        assert!(!strategy_viable(Strategy::ScriptingApi, &csp));
        assert!(strategy_viable(Strategy::IsolatedWorld, &csp));
    }

    #[test]
    fn no_script_src_restriction_allows_inline() {
        let csp = CspPolicy::default();
        assert!(strategy_viable(Strategy::InlineScript, &csp));
    }
}
