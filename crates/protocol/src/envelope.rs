use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request from a client to the broker (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    #[serde(rename = "tabId", skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<i64>,
    pub action: String,
    #[serde(default)]
    pub params: Value,
}

/// A response from the broker back to the client that sent the matching
/// `id` (spec.md §3: `{ id, result }` or `{ id, error }`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    #[must_use]
    pub fn ok(id: impl Into<String>, result: Value) -> Self {
        Self {
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    #[must_use]
    pub fn err(id: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            id: id.into(),
            result: None,
            error: Some(error.to_string()),
        }
    }
}

/// An unsolicited, uncorrelated event fanned out to every client session
/// except the extension session (spec.md §3, §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename = "event")]
pub struct Event {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// Control-plane messages: handshake and keepalive (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Control {
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "handshake")]
    Handshake {
        #[serde(rename = "extensionId")]
        extension_id: String,
        version: String,
    },
}

/// Union of every field that can appear on an incoming text frame. Every
/// frame is deserialized into this first, then classified by
/// [`RawMessage::classify`] — a frame is never committed to a concrete
/// shape before its discriminating fields (`type`, presence of `action`,
/// presence of `result`/`error`) have been inspected.
#[derive(Debug, Deserialize)]
pub struct RawMessage {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub id: Option<String>,
    #[serde(rename = "tabId")]
    pub tab_id: Option<i64>,
    pub action: Option<String>,
    pub params: Option<Value>,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub event: Option<String>,
    pub data: Option<Value>,
    #[serde(rename = "extensionId")]
    pub extension_id: Option<String>,
    pub version: Option<String>,
}

/// A classified incoming frame.
#[derive(Debug)]
pub enum MessageKind {
    Request(Request),
    Response(Response),
    Event(Event),
    Control(Control),
}

/// A frame that could not be classified (spec.md §4.1: "malformed JSON
/// ignored without closing socket" — classification failure is the
/// caller's cue to drop the frame silently, not to error out).
#[derive(Debug)]
pub struct ProtocolError(pub String);

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unclassifiable message: {}", self.0)
    }
}

impl std::error::Error for ProtocolError {}

impl RawMessage {
    /// Classify this raw frame. `type: "ping"|"pong"|"handshake"` wins
    /// first; otherwise presence of `action` means a request, presence of
    /// `result`/`error` (with an `id` but no `action`) means a response,
    /// and `type: "event"` (or bare `event`/`data` with no `id`) means an
    /// event.
    pub fn classify(self) -> Result<MessageKind, ProtocolError> {
        if let Some(kind) = self.kind.as_deref() {
            match kind {
                "ping" => return Ok(MessageKind::Control(Control::Ping)),
                "pong" => return Ok(MessageKind::Control(Control::Pong)),
                "handshake" => {
                    let extension_id = self
                        .extension_id
                        .ok_or_else(|| ProtocolError("handshake missing extensionId".into()))?;
                    let version = self
                        .version
                        .ok_or_else(|| ProtocolError("handshake missing version".into()))?;
                    return Ok(MessageKind::Control(Control::Handshake {
                        extension_id,
                        version,
                    }));
                }
                "event" => {
                    return Ok(MessageKind::Event(Event {
                        event: self.event.unwrap_or_default(),
                        data: self.data.unwrap_or(Value::Null),
                    }));
                }
                other => return Err(ProtocolError(format!("unknown type: {other}"))),
            }
        }

        if let Some(action) = self.action {
            let id = self
                .id
                .ok_or_else(|| ProtocolError("request missing id".into()))?;
            return Ok(MessageKind::Request(Request {
                id,
                tab_id: self.tab_id,
                action,
                params: self.params.unwrap_or(Value::Null),
            }));
        }

        if let Some(id) = self.id {
            return Ok(MessageKind::Response(Response {
                id,
                result: self.result,
                error: self.error,
            }));
        }

        Err(ProtocolError("no discriminating field present".into()))
    }
}

impl Envelope {
    #[must_use]
    pub fn to_json(&self) -> String {
        match self {
            Envelope::Request(r) => serde_json::to_string(r),
            Envelope::Response(r) => serde_json::to_string(r),
            Envelope::Event(e) => serde_json::to_string(e),
            Envelope::Control(c) => serde_json::to_string(c),
        }
        .unwrap_or_else(|_| "{}".to_string())
    }
}

/// A typed wrapper used when producing outbound frames (classification via
/// [`RawMessage`] is only needed for *incoming* frames, whose shape isn't
/// known ahead of time).
#[derive(Debug, Clone)]
pub enum Envelope {
    Request(Request),
    Response(Response),
    Event(Event),
    Control(Control),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_request() {
        let raw: RawMessage = serde_json::from_str(
            r#"{"id":"1","action":"tabs.navigate","params":{"url":"https://example.com"}}"#,
        )
        .unwrap();
        match raw.classify().unwrap() {
            MessageKind::Request(req) => {
                assert_eq!(req.id, "1");
                assert_eq!(req.action, "tabs.navigate");
                assert_eq!(req.params["url"], "https://example.com");
            }
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn classify_response_result() {
        let raw: RawMessage = serde_json::from_str(r#"{"id":"42","result":{"ok":true}}"#).unwrap();
        match raw.classify().unwrap() {
            MessageKind::Response(resp) => {
                assert_eq!(resp.id, "42");
                assert_eq!(resp.result.unwrap()["ok"], true);
                assert!(resp.error.is_none());
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn classify_response_error() {
        let raw: RawMessage =
            serde_json::from_str(r#"{"id":"7","error":"element-not-found"}"#).unwrap();
        match raw.classify().unwrap() {
            MessageKind::Response(resp) => {
                assert_eq!(resp.error.as_deref(), Some("element-not-found"));
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn classify_event() {
        let raw: RawMessage = serde_json::from_str(
            r#"{"type":"event","event":"urlChanged","data":{"tabId":1,"url":"https://x"}}"#,
        )
        .unwrap();
        match raw.classify().unwrap() {
            MessageKind::Event(ev) => {
                assert_eq!(ev.event, "urlChanged");
                assert_eq!(ev.data["tabId"], 1);
            }
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn classify_ping_pong() {
        let ping: RawMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(
            ping.classify().unwrap(),
            MessageKind::Control(Control::Ping)
        ));
        let pong: RawMessage = serde_json::from_str(r#"{"type":"pong"}"#).unwrap();
        assert!(matches!(
            pong.classify().unwrap(),
            MessageKind::Control(Control::Pong)
        ));
    }

    #[test]
    fn classify_handshake() {
        let raw: RawMessage = serde_json::from_str(
            r#"{"type":"handshake","extensionId":"abc123","version":"1.0.0"}"#,
        )
        .unwrap();
        match raw.classify().unwrap() {
            MessageKind::Control(Control::Handshake {
                extension_id,
                version,
            }) => {
                assert_eq!(extension_id, "abc123");
                assert_eq!(version, "1.0.0");
            }
            other => panic!("expected handshake, got {other:?}"),
        }
    }

    #[test]
    fn classify_unclassifiable_errors() {
        let raw: RawMessage = serde_json::from_str(r"{}").unwrap();
        assert!(raw.classify().is_err());
    }

    #[test]
    fn response_ok_and_err_helpers() {
        let ok = Response::ok("1", json!({"a": 1}));
        assert_eq!(ok.result.unwrap()["a"], 1);
        let err = Response::err("1", "boom");
        assert_eq!(err.error.as_deref(), Some("boom"));
    }

    #[test]
    fn envelope_to_json_roundtrips_response() {
        let env = Envelope::Response(Response::ok("9", json!(null)));
        let json = env.to_json();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["id"], "9");
    }
}
