//! A minimal WebSocket client used by integration tests to sit on either
//! side of the wire protocol: as an ordinary client session, or as the
//! extension session (by sending the handshake control frame first).
//!
//! Grounded on `cdp/client.rs`'s `CdpClient`: a background reader task owns
//! the socket's read half and routes incoming frames by correlation id,
//! while callers await a `oneshot` per outstanding request. Unlike
//! `CdpClient` there is no reconnect or session-attach machinery — a test
//! fixture either has a socket or it doesn't.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use protocol::{Control, Envelope, Event, MessageKind, RawMessage, Request, Response};

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<Response>>>>;

/// A connected test session. Dropping it aborts the background reader.
pub struct TestClient {
    write: mpsc::Sender<Message>,
    pending: PendingMap,
    events: AsyncMutex<mpsc::Receiver<Event>>,
    requests: AsyncMutex<mpsc::Receiver<Request>>,
    reader: JoinHandle<()>,
    next_id: Mutex<u64>,
}

impl TestClient {
    /// Open a WebSocket connection to a broker listening at `url`
    /// (`ws://host:port`).
    ///
    /// # Errors
    /// Returns an error if the TCP/WS handshake fails.
    pub async fn connect(url: &str) -> Result<Self> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .with_context(|| format!("connecting to {url}"))?;
        let (mut sink, mut source) = stream.split();

        let (write_tx, mut write_rx) = mpsc::channel::<Message>(64);
        tokio::spawn(async move {
            while let Some(msg) = write_rx.recv().await {
                if sink.send(msg).await.is_err() {
                    break;
                }
            }
        });

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (event_tx, event_rx) = mpsc::channel::<Event>(64);
        let (request_tx, request_rx) = mpsc::channel::<Request>(64);
        let reader_pending = pending.clone();
        let reader_write = write_tx.clone();

        let reader = tokio::spawn(async move {
            while let Some(Ok(msg)) = source.next().await {
                let Message::Text(text) = msg else { continue };
                let Ok(raw) = serde_json::from_str::<RawMessage>(&text) else {
                    continue;
                };
                let Ok(classified) = raw.classify() else {
                    continue;
                };
                match classified {
                    MessageKind::Response(resp) => {
                        if let Some(tx) = reader_pending.lock().unwrap().remove(&resp.id) {
                            let _ = tx.send(resp);
                        }
                    }
                    MessageKind::Event(event) => {
                        let _ = event_tx.send(event).await;
                    }
                    MessageKind::Control(Control::Ping) => {
                        let pong = Envelope::Control(Control::Pong).to_json();
                        let _ = reader_write.send(Message::Text(pong.into())).await;
                    }
                    MessageKind::Request(req) => {
                        let _ = request_tx.send(req).await;
                    }
                    MessageKind::Control(Control::Pong | Control::Handshake { .. }) => {}
                }
            }
        });

        Ok(Self {
            write: write_tx,
            pending,
            events: AsyncMutex::new(event_rx),
            requests: AsyncMutex::new(request_rx),
            reader,
            next_id: Mutex::new(0),
        })
    }

    fn mint_id(&self) -> String {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        format!("test-{next}")
    }

    /// Send the extension handshake control frame, identifying this
    /// connection as the single extension session.
    ///
    /// # Errors
    /// Returns an error if the socket has already closed.
    pub async fn handshake(&self, extension_id: &str, version: &str) -> Result<()> {
        let control = Control::Handshake {
            extension_id: extension_id.to_string(),
            version: version.to_string(),
        };
        let frame = Envelope::Control(control).to_json();
        self.write
            .send(Message::Text(frame.into()))
            .await
            .map_err(|_| anyhow!("socket closed"))
    }

    /// Send a request and await its correlated response.
    ///
    /// # Errors
    /// Returns an error if the socket closes before a response arrives.
    pub async fn request(
        &self,
        action: &str,
        tab_id: Option<i64>,
        params: serde_json::Value,
    ) -> Result<Response> {
        let id = self.mint_id();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id.clone(), tx);

        let req = Request {
            id,
            tab_id,
            action: action.to_string(),
            params,
        };
        let frame = Envelope::Request(req).to_json();
        self.write
            .send(Message::Text(frame.into()))
            .await
            .map_err(|_| anyhow!("socket closed"))?;

        rx.await.map_err(|_| anyhow!("reader task exited before responding"))
    }

    /// Send a raw response frame (used when this client simulates the
    /// extension side, replying to a forwarded request).
    ///
    /// # Errors
    /// Returns an error if the socket has already closed.
    pub async fn reply(&self, response: Response) -> Result<()> {
        let frame = Envelope::Response(response).to_json();
        self.write
            .send(Message::Text(frame.into()))
            .await
            .map_err(|_| anyhow!("socket closed"))
    }

    /// Await the next fanned-out event. Returns `None` once the reader
    /// task has exited (socket closed).
    pub async fn next_event(&self) -> Option<Event> {
        self.events.lock().await.recv().await
    }

    /// Await the next request forwarded to this session (used by a
    /// `TestClient` acting as the extension, to learn what to `reply` to).
    /// Returns `None` once the reader task has exited (socket closed).
    pub async fn next_request(&self) -> Option<Request> {
        self.requests.lock().await.recv().await
    }
}

impl Drop for TestClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
