use std::collections::HashMap;

use protocol::{Envelope, Event, Request, Response, RuntimeTuning};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Duration, Instant};

use crate::error::BrokerError;
use crate::pending::{PendingRequest, PendingTable};
use crate::tuning_inject;

/// How often the broker pings the extension socket (spec.md §4.1: "every
/// 20s").
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(20);

/// A frame the broker actor hands to a connection task for writing to its
/// socket. Kept as the typed [`Envelope`] rather than a raw string so
/// connection tasks own the only JSON-encoding step for their direction.
pub type Outbound = mpsc::UnboundedSender<Envelope>;

/// Everything a connection task reports up to the single broker actor.
/// One command enum shared by both client and extension connection tasks
/// keeps the actor itself the only place session state is mutated (spec.md
/// §5: "all shared state via single loop").
#[derive(Debug)]
pub enum BrokerCommand {
    ExtensionConnected {
        session_id: String,
        outbound: Outbound,
    },
    ExtensionDisconnected {
        session_id: String,
    },
    ExtensionResponse(Response),
    ExtensionEvent(Event),
    ExtensionPong,
    ClientConnected {
        session_id: String,
        outbound: Outbound,
    },
    ClientDisconnected {
        session_id: String,
    },
    ClientRequest {
        session_id: String,
        request: Request,
    },
    /// Drain every pending request with an `extension-disconnected`-shaped
    /// error before the process exits (SPEC_FULL.md §15: graceful
    /// shutdown), then acknowledge so the caller knows it's safe to stop.
    Shutdown {
        ack: tokio::sync::oneshot::Sender<()>,
    },
}

struct ExtensionState {
    session_id: String,
    outbound: Outbound,
}

/// The single-task broker actor. Owns every piece of mutable broker state:
/// the extension session, the client session table, the pending-request
/// correlation table, and the runtime-tuning record. Mirrors
/// `cdp/transport.rs`'s `TransportTask` structure, generalized from one
/// upstream connection to N downstream client connections.
pub struct BrokerActor {
    rx: mpsc::UnboundedReceiver<BrokerCommand>,
    extension: Option<ExtensionState>,
    clients: HashMap<String, Outbound>,
    pending: PendingTable,
    tuning: RuntimeTuning,
    next_keepalive: Instant,
}

impl BrokerActor {
    #[must_use]
    pub fn new(rx: mpsc::UnboundedReceiver<BrokerCommand>, tuning: RuntimeTuning) -> Self {
        Self {
            rx,
            extension: None,
            clients: HashMap::new(),
            pending: PendingTable::new(),
            tuning,
            next_keepalive: Instant::now() + KEEPALIVE_INTERVAL,
        }
    }

    /// Run the actor to completion. Returns when the command channel
    /// closes (every connection task and the listener have been dropped).
    pub async fn run(mut self) {
        loop {
            let wake = self.next_wake();
            tokio::select! {
                cmd = self.rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle(cmd),
                        None => break,
                    }
                }
                () = sleep_until(wake) => {
                    self.on_tick();
                }
            }
        }
    }

    fn next_wake(&self) -> Instant {
        match self.pending.earliest_deadline() {
            Some(deadline) => deadline.min(self.next_keepalive),
            None => self.next_keepalive,
        }
    }

    fn on_tick(&mut self) {
        let now = Instant::now();
        for (_, entry) in self.pending.sweep_expired(now) {
            self.reply_error(&entry.client_session, &entry.client_id, BrokerError::CommandTimeout);
        }
        if now >= self.next_keepalive {
            if let Some(ext) = &self.extension {
                // Connection task turns a Control::Ping envelope into a WS
                // ping frame; see server.rs.
                let _ = ext.outbound.send(Envelope::Control(protocol::Control::Ping));
            }
            self.next_keepalive = now + KEEPALIVE_INTERVAL;
        }
    }

    fn handle(&mut self, cmd: BrokerCommand) {
        match cmd {
            BrokerCommand::ExtensionConnected { session_id, outbound } => {
                self.supersede_extension(session_id, outbound);
            }
            BrokerCommand::ExtensionDisconnected { session_id } => {
                if self.extension.as_ref().is_some_and(|e| e.session_id == session_id) {
                    self.fail_all_pending(BrokerError::ExtensionDisconnected);
                    self.extension = None;
                }
            }
            BrokerCommand::ExtensionResponse(response) => self.route_response(response),
            BrokerCommand::ExtensionEvent(event) => self.fan_out(event),
            BrokerCommand::ExtensionPong => {}
            BrokerCommand::ClientConnected { session_id, outbound } => {
                self.clients.insert(session_id, outbound);
            }
            BrokerCommand::ClientDisconnected { session_id } => {
                self.clients.remove(&session_id);
            }
            BrokerCommand::ClientRequest { session_id, request } => {
                self.dispatch(session_id, request);
            }
            BrokerCommand::Shutdown { ack } => {
                self.fail_all_pending(BrokerError::ExtensionDisconnected);
                let _ = ack.send(());
            }
        }
    }

    /// A new handshake always wins (spec.md §4.1: "at most one current
    /// extension session; new handshake supersedes old, failing old
    /// pending reqs with extension-disconnected").
    fn supersede_extension(&mut self, session_id: String, outbound: Outbound) {
        if self.extension.is_some() {
            self.fail_all_pending(BrokerError::ExtensionDisconnected);
        }
        self.extension = Some(ExtensionState { session_id, outbound });
    }

    fn fail_all_pending(&mut self, err: BrokerError) {
        for (_, entry) in self.pending.drain() {
            self.reply_error(&entry.client_session, &entry.client_id, err.clone());
        }
    }

    fn dispatch(&mut self, session_id: String, request: Request) {
        match request.action.as_str() {
            "framework.setConfig" => return self.handle_set_config(&session_id, request),
            "framework.getConfig" => return self.handle_get_config(&session_id, request),
            _ => {}
        }

        let Some(extension) = &self.extension else {
            self.reply_error(&session_id, &request.id, BrokerError::ExtensionNotConnected);
            return;
        };

        let timeout_ms = request
            .params
            .get("timeout")
            .and_then(serde_json::Value::as_f64)
            .map(|ms| ms.round() as u64);
        let clamped = protocol::clamp_timeout_ms(timeout_ms);
        let deadline =
            Instant::now() + Duration::from_millis(clamped) + Duration::from_millis(protocol::TIMEOUT_BUFFER_MS);

        let injected_params = tuning_inject::inject(&request.action, request.params, &self.tuning);
        let broker_id = self.pending.insert(PendingRequest {
            client_session: session_id,
            client_id: request.id,
            action: request.action.clone(),
            deadline,
        });

        let outbound_request = Request {
            id: broker_id.to_string(),
            tab_id: request.tab_id,
            action: request.action,
            params: injected_params,
        };
        let _ = extension.outbound.send(Envelope::Request(outbound_request));
    }

    /// `framework.setConfig` never reaches the extension: tuning is
    /// broker-owned global state (spec.md §9), and the engine only ever
    /// sees a copy injected at dispatch time, never a live reference.
    fn handle_set_config(&mut self, session_id: &str, request: Request) {
        self.tuning = self.tuning.merge(&request.params);
        let result = serde_json::to_value(&self.tuning).unwrap_or(serde_json::Value::Null);
        self.send_to_client(session_id, Envelope::Response(Response::ok(request.id, result)));
    }

    /// Answered straight from actor state, same as `setConfig` (spec.md §8's
    /// round-trip property: `setConfig(X)` then `getConfig()` returns `X`
    /// merged into the current tuning).
    fn handle_get_config(&mut self, session_id: &str, request: Request) {
        let result = serde_json::to_value(&self.tuning).unwrap_or(serde_json::Value::Null);
        self.send_to_client(session_id, Envelope::Response(Response::ok(request.id, result)));
    }

    fn route_response(&mut self, response: Response) {
        let Ok(broker_id) = response.id.parse::<u64>() else {
            return;
        };
        let Some(entry) = self.pending.remove(broker_id) else {
            // Already timed out and swept; spec.md §4.1: drop silently.
            return;
        };
        let out = Response {
            id: entry.client_id,
            result: response.result,
            error: response.error,
        };
        self.send_to_client(&entry.client_session, Envelope::Response(out));
    }

    fn fan_out(&mut self, event: Event) {
        let envelope = Envelope::Event(event);
        for (session_id, outbound) in &self.clients {
            let _ = session_id;
            let _ = outbound.send(envelope.clone());
        }
    }

    fn reply_error(&mut self, session_id: &str, client_id: &str, err: BrokerError) {
        self.send_to_client(
            session_id,
            Envelope::Response(Response::err(client_id, err)),
        );
    }

    fn send_to_client(&mut self, session_id: &str, envelope: Envelope) {
        if let Some(outbound) = self.clients.get(session_id) {
            let _ = outbound.send(envelope);
        }
    }

}
