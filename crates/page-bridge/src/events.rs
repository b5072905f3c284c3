//! Constructors for the three event kinds the page-bridge emits (spec.md
//! §4.1, §4.2): `response`, `urlChanged`, `cookiesChanged`.

use protocol::Event;
use serde_json::json;

#[must_use]
pub fn response_observed(url: &str, status: u16, tab_id: i64, method: &str) -> Event {
    Event {
        event: "response".into(),
        data: json!({"url": url, "status": status, "tabId": tab_id, "method": method}),
    }
}

#[must_use]
pub fn url_changed(tab_id: i64, url: &str) -> Event {
    Event {
        event: "urlChanged".into(),
        data: json!({"tabId": tab_id, "url": url}),
    }
}

/// `cookiesChanged` never carries the cookie payload itself (spec.md
/// §4.1: "large cookie payloads are not broadcast; persistence is an
/// external collaborator") — only a count.
#[must_use]
pub fn cookies_changed(count: usize) -> Event {
    Event {
        event: "cookiesChanged".into(),
        data: json!({"count": count}),
    }
}

/// The fixed interval `cookiesChanged` is polled on (spec.md §4.1:
/// "periodic, approximately every 2s").
pub const COOKIES_CHANGED_INTERVAL_MS: u64 = 2_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_event_shape() {
        let ev = response_observed("https://x.test/a", 200, 7, "GET");
        assert_eq!(ev.event, "response");
        assert_eq!(ev.data["status"], 200);
        assert_eq!(ev.data["tabId"], 7);
        assert_eq!(ev.data["method"], "GET");
    }

    #[test]
    fn url_changed_event_shape() {
        let ev = url_changed(3, "https://x.test/b");
        assert_eq!(ev.event, "urlChanged");
        assert_eq!(ev.data["tabId"], 3);
        assert_eq!(ev.data["url"], "https://x.test/b");
    }

    #[test]
    fn cookies_changed_carries_only_a_count() {
        let ev = cookies_changed(12);
        assert_eq!(ev.event, "cookiesChanged");
        assert_eq!(ev.data["count"], 12);
        assert!(ev.data.get("cookies").is_none());
    }
}
