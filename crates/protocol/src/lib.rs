//! Wire envelope, action namespace, and runtime-tuning types.
//!
//! Every incoming WebSocket message is deserialized into [`RawMessage`]
//! first, then classified via [`RawMessage::classify`] — mirroring the
//! union-then-discriminate approach a CDP transport uses for messages that
//! can be either a response or an event.

pub mod envelope;
pub mod tuning;

pub use envelope::{
    Control, Envelope, Event, MessageKind, ProtocolError, RawMessage, Request, Response,
};
pub use tuning::{AvoidRuleset, ClickTuning, HandlesTuning, RuntimeTuning, ScrollTuning, TypeTuning};

/// Default broker listen port (spec.md §4.1, §6).
pub const DEFAULT_PORT: u16 = 7331;

/// Default per-command timeout in milliseconds (spec.md §4.1, §6).
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Lower bound of the per-request timeout clamp (spec.md §4.1).
pub const MIN_TIMEOUT_MS: u64 = 100;

/// Upper bound of the per-request timeout clamp (spec.md §4.1).
pub const MAX_TIMEOUT_MS: u64 = 60_000;

/// Buffer the broker adds on top of the nominal deadline before it gives up
/// on a pending request (spec.md §4.1: "~2s buffer beyond nominal
/// deadline").
pub const TIMEOUT_BUFFER_MS: u64 = 2_000;

/// Clamp a client-supplied `timeout` param into `[MIN_TIMEOUT_MS,
/// MAX_TIMEOUT_MS]`, falling back to [`DEFAULT_TIMEOUT_MS`] when absent.
#[must_use]
pub fn clamp_timeout_ms(requested: Option<u64>) -> u64 {
    match requested {
        Some(ms) => ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS),
        None => DEFAULT_TIMEOUT_MS,
    }
}

/// Action namespaces that receive `__frameworkConfig` tuning injection
/// (spec.md §4.1: "dom.*/human.* actions get `__frameworkConfig`
/// attached").
#[must_use]
pub fn receives_tuning_injection(action: &str) -> bool {
    action.starts_with("dom.") || action.starts_with("human.")
}

/// Actions that additionally receive the merged avoid-ruleset (spec.md
/// §4.1: "human.* actions additionally get avoid-ruleset unioned").
#[must_use]
pub fn receives_avoid_ruleset(action: &str) -> bool {
    action.starts_with("human.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_timeout_default_when_absent() {
        assert_eq!(clamp_timeout_ms(None), DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn clamp_timeout_clamps_low() {
        assert_eq!(clamp_timeout_ms(Some(1)), MIN_TIMEOUT_MS);
    }

    #[test]
    fn clamp_timeout_clamps_high() {
        assert_eq!(clamp_timeout_ms(Some(999_999)), MAX_TIMEOUT_MS);
    }

    #[test]
    fn clamp_timeout_passes_through_in_range() {
        assert_eq!(clamp_timeout_ms(Some(5_000)), 5_000);
    }

    #[test]
    fn tuning_injection_namespaces() {
        assert!(receives_tuning_injection("dom.click"));
        assert!(receives_tuning_injection("human.type"));
        assert!(!receives_tuning_injection("tabs.navigate"));
        assert!(!receives_tuning_injection("cookies.getAll"));
    }

    #[test]
    fn avoid_ruleset_only_for_human_actions() {
        assert!(receives_avoid_ruleset("human.click"));
        assert!(!receives_avoid_ruleset("dom.click"));
    }
}
