use std::fmt;

/// The broker-level error taxonomy (spec.md §7: Transport + Dispatch).
/// Every variant converts to the human-readable `error: String` field of a
/// [`protocol::Response`] — the wire format carries no error code, only a
/// message (spec.md §3).
#[derive(Debug, Clone)]
pub enum BrokerError {
    /// A request arrived before any extension session ever connected.
    ExtensionNotConnected,
    /// The extension session disconnected while this request was pending.
    ExtensionDisconnected,
    /// The broker's own deadline fired before a response arrived.
    CommandTimeout,
    /// `action` matched no known namespace.
    UnknownAction(String),
    /// `params` failed validation for the given action.
    InvalidParams(String),
    /// The action requires a tab and none was available.
    NoTabs,
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExtensionNotConnected => write!(f, "extension-not-connected"),
            Self::ExtensionDisconnected => write!(f, "Extension disconnected"),
            Self::CommandTimeout => write!(f, "command-timeout"),
            Self::UnknownAction(action) => write!(f, "unknown-action: {action}"),
            Self::InvalidParams(detail) => write!(f, "invalid-params: {detail}"),
            Self::NoTabs => write!(f, "no-tabs"),
        }
    }
}

impl std::error::Error for BrokerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_spec_wording() {
        assert_eq!(
            BrokerError::ExtensionDisconnected.to_string(),
            "Extension disconnected"
        );
        assert_eq!(
            BrokerError::ExtensionNotConnected.to_string(),
            "extension-not-connected"
        );
        assert_eq!(BrokerError::CommandTimeout.to_string(), "command-timeout");
    }

    #[test]
    fn unknown_action_carries_the_action_name() {
        let err = BrokerError::UnknownAction("foo.bar".into());
        assert!(err.to_string().contains("foo.bar"));
    }
}
