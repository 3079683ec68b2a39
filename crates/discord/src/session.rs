//! Gateway session: socket lifecycle, handshake, heartbeat liveness and
//! reconnection. This component exclusively owns the session state; nothing
//! else transitions it.

use std::{
    sync::{Arc, Mutex, RwLock},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use {
    futures::{SinkExt, StreamExt},
    serde::{Deserialize, Serialize},
    tokio::{sync::Notify, task::JoinHandle, time::MissedTickBehavior},
    tokio_tungstenite::{
        connect_async,
        tungstenite::{Error as WsError, Message},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use {recap_buffer::BufferHandle, secrecy::ExposeSecret};

use crate::{
    Error, Result,
    config::{GatewayConfig, ReconnectPolicy},
    wire::{self, GatewayFrame, Hello, MessageCreate, Ready, opcode},
};

/// Handshake must complete within this long or the attempt is abandoned.
const HANDSHAKE_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Disconnected,
    Connecting,
    AwaitingIdentifyAck,
    Connected,
}

/// Diagnostic snapshot for operator reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub state: SessionState,
    pub session_id: Option<String>,
    pub last_sequence: Option<u64>,
    pub reconnect_attempts: u32,
}

struct Inner {
    state: SessionState,
    session_id: Option<String>,
    last_sequence: Option<u64>,
    reconnect_attempts: u32,
}

/// One logical gateway session: at most one live transport, one heartbeat
/// timer and one pending reconnect at any time.
pub struct GatewaySession {
    config: GatewayConfig,
    buffer: BufferHandle,
    inner: RwLock<Inner>,
    cancel: Mutex<Option<CancellationToken>>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    reconnect_notify: Arc<Notify>,
}

/// Exponential backoff: `base * 2^(attempt-1)`, capped at `max`.
#[must_use]
pub fn backoff_delay_ms(attempt: u32, base_ms: u64, max_ms: u64) -> u64 {
    let exp = attempt.saturating_sub(1).min(16);
    base_ms.saturating_mul(1u64 << exp).min(max_ms)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl GatewaySession {
    pub fn new(config: GatewayConfig, buffer: BufferHandle) -> Arc<Self> {
        Arc::new(Self {
            config,
            buffer,
            inner: RwLock::new(Inner {
                state: SessionState::Disconnected,
                session_id: None,
                last_sequence: None,
                reconnect_attempts: 0,
            }),
            cancel: Mutex::new(None),
            task: tokio::sync::Mutex::new(None),
            reconnect_notify: Arc::new(Notify::new()),
        })
    }

    /// Start the supervisor task. A no-op while one is already running, so
    /// the session never holds two live transports.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        self.config.validate()?;

        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!("gateway session already running");
            return Ok(());
        }

        let cancel = CancellationToken::new();
        *self.cancel.lock().unwrap_or_else(|e| e.into_inner()) = Some(cancel.clone());

        let session = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            session.supervisor(cancel).await;
        }));
        Ok(())
    }

    /// Stop the session: closes the transport and cancels the heartbeat and
    /// any pending reconnect timer.
    pub async fn stop(&self) {
        if let Some(cancel) = self.cancel.lock().unwrap_or_else(|e| e.into_inner()).take() {
            cancel.cancel();
        }
        let mut task = self.task.lock().await;
        if let Some(handle) = task.take() {
            handle.abort();
        }
        self.set_state(SessionState::Disconnected);
        info!("gateway session stopped");
    }

    /// Keep-alive entrypoint for the deferred reconnect policy. A no-op
    /// unless the session is disconnected.
    pub fn ensure_connected(&self) {
        let disconnected = {
            let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
            inner.state == SessionState::Disconnected
        };
        if disconnected {
            self.reconnect_notify.notify_one();
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).state == SessionState::Connected
    }

    pub fn status(&self) -> SessionStatus {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        SessionStatus {
            state: inner.state,
            session_id: inner.session_id.clone(),
            last_sequence: inner.last_sequence,
            reconnect_attempts: inner.reconnect_attempts,
        }
    }

    // ── Internal ────────────────────────────────────────────────────────

    async fn supervisor(self: &Arc<Self>, cancel: CancellationToken) {
        loop {
            let result = tokio::select! {
                () = cancel.cancelled() => break,
                r = self.run_connection() => r,
            };
            self.set_state(SessionState::Disconnected);

            match result {
                Ok(()) => info!("gateway connection closed"),
                Err(e) => warn!(error = %e, "gateway connection error"),
            }

            let attempt = {
                let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
                inner.reconnect_attempts += 1;
                inner.reconnect_attempts
            };

            match self.config.reconnect {
                ReconnectPolicy::Backoff => {
                    let delay = backoff_delay_ms(
                        attempt,
                        self.config.backoff_base_ms,
                        self.config.backoff_max_ms,
                    );
                    info!(attempt, delay_ms = delay, "reconnecting after backoff");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(Duration::from_millis(delay)) => {},
                    }
                },
                ReconnectPolicy::Deferred => {
                    debug!(attempt, "parked until next keep-alive tick");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = self.reconnect_notify.notified() => {},
                    }
                },
            }
        }
        self.set_state(SessionState::Disconnected);
    }

    /// One connection attempt: open, handshake, then pump frames until the
    /// transport drops. The heartbeat timer lives inside this function's
    /// select loop, so leaving it cancels the timer.
    async fn run_connection(self: &Arc<Self>) -> Result<()> {
        {
            let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
            if inner.state != SessionState::Disconnected {
                debug!(state = ?inner.state, "connect skipped, attempt already in flight");
                return Ok(());
            }
            inner.state = SessionState::Connecting;
        }

        info!(url = %self.config.gateway_url, "connecting to gateway");
        let (ws_stream, _response) = connect_async(&self.config.gateway_url).await?;
        let (mut ws_sink, mut ws_reader) = ws_stream.split();
        self.set_state(SessionState::AwaitingIdentifyAck);

        // The remote speaks first: hello carries the heartbeat interval, and
        // heartbeating must be running before identify goes out.
        let hello = wait_for_hello(&mut ws_reader).await?;
        debug!(interval_ms = hello.heartbeat_interval, "gateway hello received");

        let mut heartbeat =
            tokio::time::interval(Duration::from_millis(hello.heartbeat_interval.max(1)));
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the next one lands a full
        // interval after hello.
        heartbeat.tick().await;

        let identify = wire::identify_frame(self.config.token.expose_secret(), self.config.intents);
        send_frame(&mut ws_sink, &identify).await?;

        let mut acked = true;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if self.config.ack_timeout && !acked {
                        return Err(Error::protocol(
                            "heartbeat unacknowledged for a full interval",
                        ));
                    }
                    let frame = wire::heartbeat_frame(self.last_sequence());
                    send_frame(&mut ws_sink, &frame).await?;
                    acked = false;
                },
                msg = ws_reader.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        self.handle_frame(&mut ws_sink, &text, &mut acked).await?;
                    },
                    Some(Ok(Message::Ping(data))) => {
                        ws_sink.send(Message::Pong(data)).await?;
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("gateway closed the transport");
                        return Ok(());
                    },
                    Some(Ok(_)) => {},
                    Some(Err(e)) => return Err(Error::WebSocket(e)),
                },
            }
        }
    }

    /// Dispatch one inbound text frame. Unknown opcodes and malformed frames
    /// are logged and ignored; nothing here is fatal.
    async fn handle_frame(
        self: &Arc<Self>,
        ws_sink: &mut (impl SinkExt<Message, Error = WsError> + Unpin),
        text: &str,
        acked: &mut bool,
    ) -> Result<()> {
        let frame: GatewayFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "ignoring malformed gateway frame");
                return Ok(());
            },
        };

        if let Some(sequence) = frame.s {
            let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
            inner.last_sequence = Some(sequence);
        }

        match frame.op {
            opcode::DISPATCH => self.handle_dispatch(frame).await,
            opcode::HEARTBEAT => {
                // Remote asked for an immediate heartbeat, independent of
                // the timer.
                let heartbeat = wire::heartbeat_frame(self.last_sequence());
                send_frame(ws_sink, &heartbeat).await?;
            },
            opcode::HEARTBEAT_ACK => {
                *acked = true;
            },
            opcode::HELLO => debug!("ignoring duplicate hello"),
            other => debug!(op = other, "ignoring unknown gateway opcode"),
        }
        Ok(())
    }

    async fn handle_dispatch(self: &Arc<Self>, frame: GatewayFrame) {
        match frame.t.as_deref() {
            Some("READY") => match serde_json::from_value::<Ready>(frame.d) {
                Ok(ready) => {
                    {
                        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
                        inner.state = SessionState::Connected;
                        inner.session_id = Some(ready.session_id.clone());
                        inner.reconnect_attempts = 0;
                    }
                    info!(session_id = %ready.session_id, "gateway session ready");
                },
                Err(e) => warn!(error = %e, "ignoring malformed ready payload"),
            },
            Some("MESSAGE_CREATE") => match serde_json::from_value::<MessageCreate>(frame.d) {
                Ok(message) => self.record_message(message).await,
                Err(e) => warn!(error = %e, "ignoring malformed message payload"),
            },
            Some(other) => debug!(event = other, "ignoring dispatch event"),
            None => debug!("ignoring dispatch frame without event type"),
        }
    }

    async fn record_message(self: &Arc<Self>, message: MessageCreate) {
        let received_at_ms = message.created_at_ms().unwrap_or_else(now_ms);
        let author_is_bot = message.author.bot;
        let event = recap_buffer::Event {
            id: message.id,
            author_id: message.author.id.clone(),
            author_name: message.author.display_name(),
            content: message.content,
            channel_id: message.channel_id,
            received_at_ms,
        };
        let outcome = self.buffer.record(event, author_is_bot).await;
        debug!(outcome = ?outcome, "inbound message dispatched to buffer");
    }

    fn last_sequence(&self) -> Option<u64> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .last_sequence
    }

    fn set_state(&self, state: SessionState) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.state = state;
    }
}

async fn send_frame(
    ws_sink: &mut (impl SinkExt<Message, Error = WsError> + Unpin),
    frame: &GatewayFrame,
) -> Result<()> {
    let json = serde_json::to_string(frame)?;
    ws_sink.send(Message::Text(json.into())).await?;
    Ok(())
}

/// Read frames until the hello arrives. Anything else before it is skipped;
/// a close or timeout fails the attempt.
async fn wait_for_hello(
    ws_reader: &mut (impl StreamExt<Item = std::result::Result<Message, WsError>> + Unpin),
) -> Result<Hello> {
    let timeout = Duration::from_millis(HANDSHAKE_TIMEOUT_MS);

    let result = tokio::time::timeout(timeout, async {
        while let Some(msg) = ws_reader.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let Ok(frame) = serde_json::from_str::<GatewayFrame>(&text) else {
                        continue;
                    };
                    if frame.op == opcode::HELLO {
                        let hello: Hello = serde_json::from_value(frame.d)?;
                        return Ok(hello);
                    }
                    debug!(op = frame.op, "skipping pre-hello frame");
                },
                Ok(Message::Close(_)) => {
                    return Err(Error::protocol("transport closed during handshake"));
                },
                Ok(_) => {},
                Err(e) => return Err(Error::WebSocket(e)),
            }
        }
        Err(Error::protocol("transport ended before hello"))
    })
    .await;

    match result {
        Ok(inner) => inner,
        Err(_) => Err(Error::protocol("handshake timed out")),
    }
}
