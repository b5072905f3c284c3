//! Command dispatch routing (spec.md §4.2): maps an incoming action name
//! to one of three execution paths, pure string matching with no host
//! calls, so the routing table itself is unit-testable.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPath {
    /// `tabs.*`, `cookies.*`, `frames.*`, screenshot: handled directly via
    /// the extension's own browser APIs.
    BrowserNative,
    /// `dom.*` (except evaluation), `human.*`, `framework.*`: forwarded to
    /// the interaction engine content script in the target tab's main
    /// frame.
    TabScopedDom,
    /// `dom.evaluate`, `dom.elementEvaluate`, `dom.evaluateHandle`:
    /// executed in the page's main world via the CSP fallback ladder.
    PageWorldEvaluation,
}

const PAGE_WORLD_EVALUATION_ACTIONS: &[&str] =
    &["dom.evaluate", "dom.elementEvaluate", "dom.evaluateHandle"];

#[must_use]
pub fn route(action: &str) -> DispatchPath {
    if PAGE_WORLD_EVALUATION_ACTIONS.contains(&action) {
        return DispatchPath::PageWorldEvaluation;
    }
    if action.starts_with("tabs.") || action.starts_with("cookies.") || action.starts_with("frames.")
    {
        return DispatchPath::BrowserNative;
    }
    DispatchPath::TabScopedDom
}

/// Whether a browser-native action needs to wait for a tab's `complete`
/// status before returning (spec.md §4.2: navigation/reload wait up to 30s).
#[must_use]
pub fn waits_for_tab_complete(action: &str) -> bool {
    matches!(action, "tabs.navigate" | "tabs.reload" | "tabs.create")
}

pub const TAB_COMPLETE_TIMEOUT_MS: u64 = 30_000;
