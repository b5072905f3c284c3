//! The extension's one outbound socket to the broker (spec.md §4.2): opens
//! `ws://127.0.0.1:{protocol::DEFAULT_PORT}`, sends the handshake control
//! frame, classifies every incoming frame via [`protocol::RawMessage`], and
//! feeds classified requests to a [`Dispatcher`]. Reconnects with
//! [`Backoff`] for the life of the process — unlike the teacher's
//! `TransportTask`, which gives up after `max_retries` and parks in a
//! `ReconnectFailed` state, there is nowhere else for an extension to go.
//!
//! `web_sys::WebSocket` is callback-based (`onopen`/`onmessage`/`onclose`/
//! `onerror`), not a `Stream` like the teacher's `tokio_tungstenite`
//! socket, so the callbacks push frames onto an `UnboundedSender` read back
//! by a single `spawn_local` task — the same funnel-everything-through-one-
//! task shape as `TransportTask::run`, just fed by callbacks instead of
//! `StreamExt::next`.
#![cfg(target_arch = "wasm32")]

use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::StreamExt;
use protocol::{Control, Envelope, MessageKind, RawMessage};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, ErrorEvent, MessageEvent, WebSocket};

use crate::backoff::{Backoff, BackoffConfig};
use crate::execute::Dispatcher;

const EXTENSION_VERSION: &str = env!("CARGO_PKG_VERSION");

enum SocketEvent {
    Open,
    Text(String),
    Closed,
}

/// Drives the reconnect-forever loop for the life of the content script.
/// Exposed as a free function rather than a struct so `#[wasm_bindgen(start)]`
/// can hand it straight to `spawn_local`.
pub async fn run(extension_id: String) {
    let mut backoff = Backoff::new(BackoffConfig::default());
    let mut dispatcher = Dispatcher::new();

    loop {
        match connect_once(&extension_id, &mut dispatcher).await {
            Ok(()) => backoff.reset(),
            Err(detail) => web_sys::console::warn_1(&format!("page-bridge: {detail}").into()),
        }
        let delay_ms = backoff.next_delay().as_millis() as i32;
        sleep_ms(delay_ms).await;
    }
}

/// Open one connection, run it to completion (close, drop, or error), and
/// return. The caller decides whether/when to retry.
async fn connect_once(extension_id: &str, dispatcher: &mut Dispatcher) -> Result<(), String> {
    let url = format!("ws://127.0.0.1:{}", protocol::DEFAULT_PORT);
    let socket = WebSocket::new(&url).map_err(|e| format!("connect failed: {e:?}"))?;

    let (tx, mut rx): (UnboundedSender<SocketEvent>, UnboundedReceiver<SocketEvent>) =
        unbounded();

    let onopen_tx = tx.clone();
    let onopen = Closure::<dyn FnMut()>::new(move || {
        let _ = onopen_tx.unbounded_send(SocketEvent::Open);
    });
    socket.set_onopen(Some(onopen.as_ref().unchecked_ref()));

    let onmessage_tx = tx.clone();
    let onmessage = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
        if let Some(text) = event.data().as_string() {
            let _ = onmessage_tx.unbounded_send(SocketEvent::Text(text));
        }
    });
    socket.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));

    let onclose_tx = tx.clone();
    let onclose = Closure::<dyn FnMut(CloseEvent)>::new(move |_event: CloseEvent| {
        let _ = onclose_tx.unbounded_send(SocketEvent::Closed);
    });
    socket.set_onclose(Some(onclose.as_ref().unchecked_ref()));

    let onerror_tx = tx.clone();
    let onerror = Closure::<dyn FnMut(ErrorEvent)>::new(move |_event: ErrorEvent| {
        let _ = onerror_tx.unbounded_send(SocketEvent::Closed);
    });
    socket.set_onerror(Some(onerror.as_ref().unchecked_ref()));

    // Keep the closures alive for the connection's lifetime; dropping them
    // early would null out the JS-side callback slots mid-flight.
    let _guards = (onopen, onmessage, onclose, onerror);

    let handshake = Envelope::Control(Control::Handshake {
        extension_id: extension_id.to_string(),
        version: EXTENSION_VERSION.to_string(),
    });

    while let Some(event) = rx.next().await {
        match event {
            SocketEvent::Open => {
                socket
                    .send_with_str(&handshake.to_json())
                    .map_err(|e| format!("handshake send failed: {e:?}"))?;
            }
            SocketEvent::Text(text) => {
                handle_frame(&socket, dispatcher, &text).await;
            }
            SocketEvent::Closed => return Ok(()),
        }
    }
    Ok(())
}

async fn handle_frame(socket: &WebSocket, dispatcher: &mut Dispatcher, text: &str) {
    let raw: RawMessage = match serde_json::from_str(text) {
        Ok(raw) => raw,
        Err(_) => return,
    };
    let Ok(kind) = raw.classify() else { return };

    match kind {
        MessageKind::Request(request) => {
            let response = dispatcher.handle(request).await;
            let frame = Envelope::Response(response).to_json();
            let _ = socket.send_with_str(&frame);
        }
        MessageKind::Control(Control::Ping) => {
            let frame = Envelope::Control(Control::Pong).to_json();
            let _ = socket.send_with_str(&frame);
        }
        MessageKind::Control(_) | MessageKind::Response(_) | MessageKind::Event(_) => {
            // The broker never sends these to an extension session.
        }
    }
}

async fn sleep_ms(ms: i32) {
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        if let Some(window) = web_sys::window() {
            let _ = window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms);
        } else {
            resolve.call0(&JsValue::NULL).ok();
        }
    });
    let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
}

/// Resolves the extension id once at startup from `chrome.runtime.id`,
/// falling back to a placeholder when run outside an extension context
/// (e.g. a bare content-script test page).
fn extension_id() -> String {
    runtime_id().unwrap_or_else(|| "unknown-extension".to_string())
}

fn runtime_id() -> Option<String> {
    let chrome = js_sys::Reflect::get(&js_sys::global(), &JsValue::from_str("chrome")).ok()?;
    let runtime = js_sys::Reflect::get(&chrome, &JsValue::from_str("runtime")).ok()?;
    let id = js_sys::Reflect::get(&runtime, &JsValue::from_str("id")).ok()?;
    id.as_string()
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    wasm_bindgen_futures::spawn_local(run(extension_id()));
}
