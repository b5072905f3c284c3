use std::fmt;

/// Failures local to the extension process, distinct from
/// `engine::EngineError` (DOM-level) and `broker::BrokerError`
/// (transport-level) — this is the taxonomy for the glue in between: the
/// outbound socket and the per-tab content-script relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Injecting the content script into a tab failed even after the
    /// single retry (spec.md §4.2 point 2).
    InjectionFailed { tab_id: i64, detail: String },
    /// A tab never reached `complete` within the dispatch timeout.
    FrameTimeout { tab_id: i64 },
    /// The command targeted a tab id the extension has no record of.
    UnknownTab { tab_id: i64 },
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InjectionFailed { tab_id, detail } => {
                write!(f, "injection-failed (tab {tab_id}): {detail}")
            }
            Self::FrameTimeout { tab_id } => write!(f, "frame-timeout (tab {tab_id})"),
            Self::UnknownTab { tab_id } => write!(f, "unknown-tab: {tab_id}"),
        }
    }
}

impl std::error::Error for BridgeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_the_tab_id() {
        assert_eq!(
            BridgeError::FrameTimeout { tab_id: 7 }.to_string(),
            "frame-timeout (tab 7)"
        );
        assert_eq!(
            BridgeError::UnknownTab { tab_id: 3 }.to_string(),
            "unknown-tab: 3"
        );
    }
}
