use std::net::SocketAddr;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use protocol::{Control, Envelope, MessageKind, RawMessage, RuntimeTuning};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::core::{BrokerActor, BrokerCommand};

type WsStream = WebSocketStream<TcpStream>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

/// Bind the broker's single WebSocket listener and run until `shutdown`
/// resolves (spec.md §4.1, §6: "single WS listener default port 7331").
/// On shutdown, drains every pending request with an
/// `extension-disconnected`-shaped error before returning (SPEC_FULL.md
/// §15).
///
/// # Errors
/// Returns an error if `addr` cannot be bound.
pub async fn run(
    addr: SocketAddr,
    tuning: RuntimeTuning,
    shutdown: impl std::future::Future<Output = ()>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    eprintln!("[broker] listening on ws://{addr}");

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let actor = BrokerActor::new(cmd_rx, tuning);
    tokio::spawn(actor.run());

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                let cmd_tx = cmd_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(stream, cmd_tx).await {
                        eprintln!("[broker] connection {peer} ended: {err}");
                    }
                });
            }
            () = &mut shutdown => break,
        }
    }

    eprintln!("[broker] shutting down, draining pending requests");
    let (ack_tx, ack_rx) = tokio::sync::oneshot::channel();
    let _ = cmd_tx.send(BrokerCommand::Shutdown { ack: ack_tx });
    let _ = ack_rx.await;
    // Give each client's write_loop task a moment to actually flush the
    // error response onto its socket before the process exits.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::UnboundedSender<BrokerCommand>,
) -> anyhow::Result<()> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut write, mut read) = ws.split();

    // Classify by the first message that successfully parses; a handshake
    // makes this the extension session, anything else classifiable makes
    // it a client session (spec.md §4.1: "any other connection is a client
    // session" — a stray ping or an out-of-band event ahead of its first
    // command still counts). Only malformed JSON is dropped without
    // resolving a session.
    let (session_id, outbound_rx, is_extension, first_request) = loop {
        let Some(msg) = read.next().await else {
            return Ok(());
        };
        let Ok(Message::Text(text)) = msg else {
            continue;
        };
        let Ok(raw) = serde_json::from_str::<RawMessage>(&text) else {
            continue;
        };
        let Ok(kind) = raw.classify() else {
            continue;
        };
        match kind {
            MessageKind::Control(Control::Handshake { extension_id, version }) => {
                eprintln!("[broker] extension handshake: {extension_id} v{version}");
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                let _ = cmd_tx.send(BrokerCommand::ExtensionConnected {
                    session_id: extension_id.clone(),
                    outbound: outbound_tx,
                });
                break (extension_id, outbound_rx, true, None);
            }
            other => {
                let session_id = uuid::Uuid::new_v4().to_string();
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                let _ = cmd_tx.send(BrokerCommand::ClientConnected {
                    session_id: session_id.clone(),
                    outbound: outbound_tx,
                });
                let first_request = match other {
                    MessageKind::Request(req) => Some(req),
                    _ => None,
                };
                break (session_id, outbound_rx, false, first_request);
            }
        }
    };

    if let Some(req) = first_request {
        let _ = cmd_tx.send(BrokerCommand::ClientRequest {
            session_id: session_id.clone(),
            request: req,
        });
    }

    let writer = tokio::spawn(write_loop(write, outbound_rx));
    let reader_result = read_loop(read, &cmd_tx, &session_id, is_extension).await;

    if is_extension {
        let _ = cmd_tx.send(BrokerCommand::ExtensionDisconnected {
            session_id: session_id.clone(),
        });
    } else {
        let _ = cmd_tx.send(BrokerCommand::ClientDisconnected { session_id: session_id.clone() });
    }

    writer.abort();
    reader_result
}

async fn write_loop(mut write: WsWrite, mut outbound_rx: mpsc::UnboundedReceiver<Envelope>) {
    while let Some(envelope) = outbound_rx.recv().await {
        if write.send(Message::Text(envelope.to_json().into())).await.is_err() {
            break;
        }
    }
}

async fn read_loop(
    mut read: WsRead,
    cmd_tx: &mpsc::UnboundedSender<BrokerCommand>,
    session_id: &str,
    is_extension: bool,
) -> anyhow::Result<()> {
    while let Some(msg) = read.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(_) => break,
        };
        let Message::Text(text) = msg else {
            if matches!(msg, Message::Close(_)) {
                break;
            }
            continue;
        };
        let Ok(raw) = serde_json::from_str::<RawMessage>(&text) else {
            // Malformed JSON: ignored without closing the socket.
            continue;
        };
        match raw.classify() {
            Ok(MessageKind::Response(resp)) if is_extension => {
                let _ = cmd_tx.send(BrokerCommand::ExtensionResponse(resp));
            }
            Ok(MessageKind::Event(event)) if is_extension => {
                let _ = cmd_tx.send(BrokerCommand::ExtensionEvent(event));
            }
            Ok(MessageKind::Control(Control::Pong)) if is_extension => {
                let _ = cmd_tx.send(BrokerCommand::ExtensionPong);
            }
            Ok(MessageKind::Request(req)) if !is_extension => {
                let _ = cmd_tx.send(BrokerCommand::ClientRequest {
                    session_id: session_id.to_string(),
                    request: req,
                });
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::SinkExt as _;
    use protocol::{Request, Response};
    use tokio_tungstenite::connect_async;

    /// Mirrors `connection.rs`'s in-process mock-server integration test
    /// idiom: bind to an ephemeral port, connect a real client and a real
    /// "extension" over actual WebSocket handshakes, and assert on the
    /// observed message flow.
    #[tokio::test]
    async fn client_request_is_forwarded_and_response_routed_back() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let actor = BrokerActor::new(cmd_rx, RuntimeTuning::default());
        tokio::spawn(actor.run());
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let cmd_tx = cmd_tx.clone();
                tokio::spawn(handle_connection(stream, cmd_tx));
            }
        });

        let (mut ext_ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        ext_ws
            .send(Message::Text(
                serde_json::to_string(&serde_json::json!({
                    "type": "handshake",
                    "extensionId": "ext-under-test",
                    "version": "1.0.0"
                }))
                .unwrap()
                .into(),
            ))
            .await
            .unwrap();

        let (mut client_ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        let request = Request {
            id: "req-1".into(),
            tab_id: None,
            action: "tabs.getAll".into(),
            params: serde_json::json!({}),
        };
        client_ws
            .send(Message::Text(serde_json::to_string(&request).unwrap().into()))
            .await
            .unwrap();

        // The extension should see the forwarded request (broker-minted id).
        let forwarded = ext_ws.next().await.unwrap().unwrap();
        let Message::Text(text) = forwarded else {
            panic!("expected text frame");
        };
        let forwarded_req: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(forwarded_req["action"], "tabs.getAll");
        let broker_id = forwarded_req["id"].as_str().unwrap().to_string();

        let response = Response::ok(broker_id, serde_json::json!([{"id": 1}]));
        ext_ws
            .send(Message::Text(serde_json::to_string(&response).unwrap().into()))
            .await
            .unwrap();

        let back = client_ws.next().await.unwrap().unwrap();
        let Message::Text(text) = back else {
            panic!("expected text frame");
        };
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["id"], "req-1");
        assert_eq!(parsed["result"][0]["id"], 1);
    }

    /// A client that sends a stray keepalive ping before its first real
    /// command must still be registered as a client session (spec.md §4.1),
    /// not left permanently unclassified.
    #[tokio::test]
    async fn client_sending_a_ping_before_its_first_request_is_still_registered() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let actor = BrokerActor::new(cmd_rx, RuntimeTuning::default());
        tokio::spawn(actor.run());
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let cmd_tx = cmd_tx.clone();
                tokio::spawn(handle_connection(stream, cmd_tx));
            }
        });

        let (mut ext_ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        ext_ws
            .send(Message::Text(
                serde_json::to_string(&serde_json::json!({
                    "type": "handshake",
                    "extensionId": "ext-under-test",
                    "version": "1.0.0"
                }))
                .unwrap()
                .into(),
            ))
            .await
            .unwrap();

        let (mut client_ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        client_ws
            .send(Message::Text(
                serde_json::to_string(&serde_json::json!({"type": "ping"})).unwrap().into(),
            ))
            .await
            .unwrap();
        let request = Request {
            id: "req-after-ping".into(),
            tab_id: None,
            action: "tabs.list".into(),
            params: serde_json::json!({}),
        };
        client_ws
            .send(Message::Text(serde_json::to_string(&request).unwrap().into()))
            .await
            .unwrap();

        let forwarded = ext_ws.next().await.unwrap().unwrap();
        let Message::Text(text) = forwarded else {
            panic!("expected text frame");
        };
        let forwarded_req: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(forwarded_req["action"], "tabs.list");
    }

    /// SPEC_FULL.md §15: shutdown drains pending requests with an
    /// `extension-disconnected`-shaped error before the listener stops.
    #[tokio::test]
    async fn shutdown_drains_pending_requests_with_extension_disconnected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(run(addr, RuntimeTuning::default(), async {
            let _ = shutdown_rx.await;
        }));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let (mut ext_ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        ext_ws
            .send(Message::Text(
                serde_json::to_string(&serde_json::json!({
                    "type": "handshake",
                    "extensionId": "ext-under-test",
                    "version": "1.0.0"
                }))
                .unwrap()
                .into(),
            ))
            .await
            .unwrap();

        let (mut client_ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        let request = Request {
            id: "req-pending".into(),
            tab_id: None,
            action: "tabs.list".into(),
            params: serde_json::json!({}),
        };
        client_ws
            .send(Message::Text(serde_json::to_string(&request).unwrap().into()))
            .await
            .unwrap();
        // Let the broker forward it to the extension before we shut down,
        // so it's genuinely pending rather than never having been accepted.
        ext_ws.next().await.unwrap().unwrap();

        shutdown_tx.send(()).unwrap();

        let back = client_ws.next().await.unwrap().unwrap();
        let Message::Text(text) = back else {
            panic!("expected text frame");
        };
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["id"], "req-pending");
        assert_eq!(parsed["error"], "Extension disconnected");

        server.await.unwrap().unwrap();
    }
}
