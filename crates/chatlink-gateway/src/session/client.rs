//! Gateway client
//!
//! Owns one gateway session: resolves the URL, opens the socket, answers
//! Hello with Identify or Resume, keeps the heartbeat going, and hands
//! dispatches to the event registry. Connection loss is handled by
//! reconnecting; only a fatal close code or an unauthorized token ends
//! [`GatewayClient::run`] with an error.

use super::heartbeat::{beat, run_heartbeat, HeartbeatExit};
use super::sender::{run_writer, GatewaySender, OUTBOUND_BUFFER_SIZE};
use super::state::{ConnectionPhase, SessionState};
use crate::decoder::FrameDecoder;
use crate::dispatch::{Context, EventRegistry, Predicate, WaitError};
use crate::error::{GatewayError, GatewayResult, SendError};
use crate::protocol::{
    close_action, CloseAction, CloseCode, GatewayMessage, IdentifyPayload, IdentifyProperties,
    OpCode, PresenceUpdatePayload, ReadyPayload, ResumePayload,
};
use chatlink_common::ClientConfig;
use chatlink_http::{HttpClient, HttpError};
use futures_util::{Stream, StreamExt};
use parking_lot::RwLock;
use rand::Rng;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep, timeout, Instant};
use tokio_tungstenite::tungstenite::{self, Message};

/// Close code sent on a clean shutdown; the session is not resumable after it
const NORMAL_CLOSE: u16 = 1000;

/// Close code sent when dropping a connection we intend to resume
const RESUMABLE_CLOSE: u16 = 4000;

/// How long the writer gets to flush a close frame
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// What ends one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionEnd {
    Shutdown,
    Reconnect { delay: Option<Duration> },
}

/// A gateway URL with the connection query appended
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedUrl {
    url: String,
    /// Taken from READY rather than configuration or REST
    from_resume: bool,
}

/// Stops a running [`GatewayClient`]
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Ask the client to close the socket and return from `run`
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }
}

impl fmt::Debug for ShutdownHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownHandle")
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

/// Tasks owned by one connection, aborted when it ends
#[derive(Default)]
struct ConnectionGuard {
    writer: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
}

impl ConnectionGuard {
    fn replace_heartbeat(&mut self, task: JoinHandle<()>) {
        if let Some(old) = self.heartbeat.replace(task) {
            old.abort();
        }
    }

    fn abort_heartbeat(&mut self) {
        if let Some(task) = self.heartbeat.take() {
            task.abort();
        }
    }

    /// Let the writer send what is queued (usually a close frame) and stop
    async fn drain_writer(&mut self) {
        if let Some(mut task) = self.writer.take() {
            if timeout(WRITER_DRAIN_TIMEOUT, &mut task).await.is_err() {
                tracing::debug!("Writer did not drain in time");
                task.abort();
            }
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.abort_heartbeat();
        if let Some(task) = self.writer.take() {
            task.abort();
        }
    }
}

/// A gateway connection with its event registry
pub struct GatewayClient {
    config: ClientConfig,
    http: HttpClient,
    registry: Arc<EventRegistry>,
    state: Arc<RwLock<SessionState>>,
    sender: GatewaySender,
    shutdown: ShutdownHandle,
    running: AtomicBool,
    gateway_url: Option<String>,
    presence: Option<PresenceUpdatePayload>,
}

impl GatewayClient {
    /// Build a client; the registry is frozen from here on
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(config: ClientConfig, registry: EventRegistry) -> GatewayResult<Self> {
        let http = HttpClient::new(&config)?;
        Ok(Self::with_http_client(config, registry, http))
    }

    /// Build a client around an existing HTTP client
    #[must_use]
    pub fn with_http_client(config: ClientConfig, registry: EventRegistry, http: HttpClient) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            config,
            http,
            registry: Arc::new(registry),
            state: Arc::new(RwLock::new(SessionState::default())),
            sender: GatewaySender::new(),
            shutdown: ShutdownHandle { tx: Arc::new(tx) },
            running: AtomicBool::new(false),
            gateway_url: None,
            presence: None,
        }
    }

    /// Connect here instead of asking REST for the gateway URL
    #[must_use]
    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = Some(url.into());
        self
    }

    /// Presence sent with Identify
    #[must_use]
    pub fn with_presence(mut self, presence: PresenceUpdatePayload) -> Self {
        self.presence = Some(presence);
        self
    }

    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Snapshot of the session state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.read().clone()
    }

    #[must_use]
    pub fn phase(&self) -> ConnectionPhase {
        self.state.read().phase
    }

    #[must_use]
    pub fn sender(&self) -> &GatewaySender {
        &self.sender
    }

    #[must_use]
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    #[must_use]
    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    /// Wait for the next `event` whose payload satisfies `predicate`
    pub async fn wait_for(
        &self,
        event: impl AsRef<str>,
        predicate: Predicate,
        timeout: Duration,
    ) -> Result<Arc<Value>, WaitError> {
        self.registry.wait_for(event, predicate, timeout).await
    }

    /// Connect and process events until shutdown or a fatal close
    ///
    /// # Errors
    /// Returns [`GatewayError::FatalClose`] when the server rejects the
    /// session for good, [`GatewayError::Http`] when the token is refused
    /// while resolving the gateway URL, and [`GatewayError::AlreadyRunning`]
    /// when called twice concurrently.
    pub async fn run(&self) -> GatewayResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(GatewayError::AlreadyRunning);
        }

        let mut tasks = JoinSet::new();
        let result = self.run_connections(&mut tasks).await;
        self.teardown(&mut tasks);

        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn run_connections(&self, tasks: &mut JoinSet<()>) -> GatewayResult<()> {
        let mut shutdown = self.shutdown.tx.subscribe();
        let mut delay: Option<Duration> = None;

        loop {
            if *shutdown.borrow_and_update() {
                return Ok(());
            }

            if let Some(delay) = delay.take() {
                self.set_phase(ConnectionPhase::Reconnecting);
                tracing::info!(delay_ms = delay.as_millis() as u64, "Reconnecting after delay");
                tokio::select! {
                    () = sleep(delay) => {}
                    _ = shutdown.changed() => return Ok(()),
                }
            }

            match self.connect(&mut shutdown, tasks).await? {
                ConnectionEnd::Shutdown => return Ok(()),
                ConnectionEnd::Reconnect { delay: next } => {
                    self.set_phase(ConnectionPhase::Reconnecting);
                    delay = next;
                }
            }
        }
    }

    /// One connection from URL resolution to socket close
    async fn connect(
        &self,
        shutdown: &mut watch::Receiver<bool>,
        tasks: &mut JoinSet<()>,
    ) -> GatewayResult<ConnectionEnd> {
        self.set_phase(ConnectionPhase::Connecting);

        // REST retries 5xx without end, so shutdown has to be able to cut in
        let resolved = tokio::select! {
            resolved = self.resolve_url() => resolved,
            _ = shutdown.changed() => return Ok(ConnectionEnd::Shutdown),
        };
        let resolved = match resolved {
            Ok(resolved) => resolved,
            Err(e @ HttpError::Unauthorized(_)) => return Err(e.into()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to resolve gateway URL");
                return Ok(self.retry_later());
            }
        };

        tracing::info!(url = %resolved.url, "Connecting to gateway");
        let opened = tokio::select! {
            opened = tokio_tungstenite::connect_async(resolved.url.as_str()) => opened,
            _ = shutdown.changed() => return Ok(ConnectionEnd::Shutdown),
        };
        let socket = match opened {
            Ok((socket, _response)) => socket,
            Err(e @ (tungstenite::Error::Url(_) | tungstenite::Error::HttpFormat(_))) if resolved.from_resume => {
                tracing::warn!(error = %e, url = %resolved.url, "Unusable resume URL, starting a new session");
                self.state.write().clear_session();
                return Ok(ConnectionEnd::Reconnect { delay: None });
            }
            Err(e @ (tungstenite::Error::Url(_) | tungstenite::Error::HttpFormat(_))) => {
                return Err(GatewayError::InvalidUrl(e.to_string()));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to open gateway socket");
                return Ok(self.retry_later());
            }
        };
        self.set_phase(ConnectionPhase::AwaitingHello);

        let (sink, stream) = socket.split();
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER_SIZE);
        self.sender.attach(tx);

        let mut guard = ConnectionGuard {
            writer: Some(tokio::spawn(run_writer(sink, rx))),
            heartbeat: None,
        };
        let end = self.drive(stream, &mut guard, shutdown, tasks).await;
        self.sender.detach();
        end
    }

    /// Read loop for one connection
    async fn drive<S>(
        &self,
        mut stream: S,
        guard: &mut ConnectionGuard,
        shutdown: &mut watch::Receiver<bool>,
        tasks: &mut JoinSet<()>,
    ) -> GatewayResult<ConnectionEnd>
    where
        S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        let mut decoder = FrameDecoder::new();
        let (exit_tx, mut exit_rx) = mpsc::channel(1);

        loop {
            tokio::select! {
                _ = shutdown.changed() => return Ok(self.close_for_shutdown(guard).await),

                Some(exit) = exit_rx.recv() => {
                    guard.abort_heartbeat();
                    return Ok(match exit {
                        HeartbeatExit::Zombied => {
                            self.sender.close(RESUMABLE_CLOSE).await;
                            guard.drain_writer().await;
                            ConnectionEnd::Reconnect { delay: None }
                        }
                        HeartbeatExit::Disconnected => self.retry_later(),
                    });
                }

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        tracing::debug!(error = %e, "Dispatch task did not complete");
                    }
                }

                frame = stream.next() => {
                    let message = match frame {
                        Some(Ok(Message::Binary(bytes))) => decoder.push(&bytes),
                        Some(Ok(Message::Text(text))) => decoder.decode_text(&text).map(Some),
                        Some(Ok(Message::Close(frame))) => {
                            let code = frame.map(|f| u16::from(f.code));
                            return self.on_close(code);
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "Gateway socket error");
                            return Ok(self.retry_later());
                        }
                        None => {
                            tracing::warn!("Gateway socket ended without a close frame");
                            return Ok(self.retry_later());
                        }
                    };

                    match message {
                        Ok(Some(message)) => {
                            if let Some(end) = self.handle(message, guard, &exit_tx, shutdown, tasks).await {
                                return Ok(end);
                            }
                        }
                        Ok(None) => {}
                        Err(e) => tracing::warn!(error = %e, "Dropping undecodable gateway frame"),
                    }
                }
            }
        }
    }

    /// Stop the heartbeat and let the writer send a normal close
    async fn close_for_shutdown(&self, guard: &mut ConnectionGuard) -> ConnectionEnd {
        tracing::info!("Shutting down gateway connection");
        guard.abort_heartbeat();
        self.sender.close(NORMAL_CLOSE).await;
        guard.drain_writer().await;
        ConnectionEnd::Shutdown
    }

    /// Route one inbound message; `Some` ends the connection
    async fn handle(
        &self,
        message: GatewayMessage,
        guard: &mut ConnectionGuard,
        exit_tx: &mpsc::Sender<HeartbeatExit>,
        shutdown: &mut watch::Receiver<bool>,
        tasks: &mut JoinSet<()>,
    ) -> Option<ConnectionEnd> {
        tracing::trace!(op = %message.op, "Gateway message received");

        match message.op {
            OpCode::Hello => {
                let Some(hello) = message.as_hello() else {
                    tracing::warn!("Hello without a heartbeat interval");
                    return None;
                };
                if hello.heartbeat_interval == 0 {
                    tracing::warn!("Hello with a zero heartbeat interval, reconnecting");
                    guard.abort_heartbeat();
                    self.sender.close(RESUMABLE_CLOSE).await;
                    guard.drain_writer().await;
                    return Some(self.retry_later());
                }
                let interval = Duration::from_millis(hello.heartbeat_interval);
                self.state.write().begin_heartbeat(interval);
                guard.replace_heartbeat(tokio::spawn(run_heartbeat(
                    interval,
                    rand::random::<f64>(),
                    self.config.zombie_detection,
                    Arc::clone(&self.state),
                    self.sender.clone(),
                    exit_tx.clone(),
                )));
                tracing::debug!(interval_ms = hello.heartbeat_interval, "Hello received");
                self.handshake().await;
            }

            OpCode::HeartbeatAck => {
                let mut state = self.state.write();
                state.heartbeat_ack(Instant::now());
                tracing::trace!(latency = ?state.latency, "Heartbeat acknowledged");
            }

            OpCode::Heartbeat => {
                beat(&self.state, &self.sender).await;
            }

            OpCode::Reconnect => {
                tracing::info!("Server requested reconnect");
                guard.abort_heartbeat();
                self.sender.close(RESUMABLE_CLOSE).await;
                guard.drain_writer().await;
                return Some(ConnectionEnd::Reconnect { delay: None });
            }

            OpCode::InvalidSession => {
                let resumable = message.is_resumable();
                let wait = self.invalid_session_delay();
                tracing::info!(resumable, wait_ms = wait.as_millis() as u64, "Session invalidated");
                tokio::select! {
                    () = sleep(wait) => {}
                    _ = shutdown.changed() => return Some(self.close_for_shutdown(guard).await),
                }

                if !resumable {
                    self.state.write().clear_session();
                }
                self.handshake().await;
            }

            OpCode::Dispatch => self.on_dispatch(message, tasks),

            other => tracing::debug!(op = %other, "Ignoring unexpected opcode"),
        }
        None
    }

    fn on_dispatch(&self, message: GatewayMessage, tasks: &mut JoinSet<()>) {
        if let Some(sequence) = message.s {
            self.state.write().observe_sequence(sequence);
        }
        let Some(event) = message.t else {
            tracing::warn!(seq = ?message.s, "Dispatch without an event name");
            return;
        };
        let data = message.d.unwrap_or(Value::Null);

        match event.as_str() {
            "READY" => match serde_json::from_value::<ReadyPayload>(data.clone()) {
                Ok(ready) => {
                    tracing::info!(session_id = %ready.session_id, "Session ready");
                    self.state
                        .write()
                        .start_session(ready.session_id, ready.resume_gateway_url);
                }
                Err(e) => tracing::warn!(error = %e, "Malformed READY payload"),
            },
            "RESUMED" => {
                let mut state = self.state.write();
                state.phase = ConnectionPhase::Connected;
                tracing::info!(session_id = ?state.session_id, seq = ?state.last_sequence, "Session resumed");
            }
            _ => {}
        }

        let registry = Arc::clone(&self.registry);
        let ctx = self.context();
        tasks.spawn(async move {
            registry.dispatch(ctx, &event, data).await;
        });
    }

    fn on_close(&self, code: Option<u16>) -> GatewayResult<ConnectionEnd> {
        if let Some(close) = code.and_then(CloseCode::from_u16) {
            if close.is_fatal() {
                tracing::error!(code = %close, "Gateway closed the connection for good");
                return Err(GatewayError::FatalClose(close));
            }
        }

        if close_action(code) == CloseAction::Reidentify {
            self.state.write().clear_session();
        }
        tracing::info!(code = ?code, "Gateway closed the connection");
        Ok(self.retry_later())
    }

    /// Send Resume when a session is cached, Identify otherwise
    async fn handshake(&self) {
        let result = match self.resume_payload() {
            Some(payload) => {
                self.set_phase(ConnectionPhase::Resuming);
                tracing::debug!(session_id = %payload.session_id, seq = ?payload.seq, "Resuming session");
                self.send_command(GatewayMessage::resume(&payload)).await
            }
            None => {
                self.set_phase(ConnectionPhase::Identifying);
                let payload = self.identify_payload();
                tracing::debug!(intents = ?payload.intents, shard = ?payload.shard, "Identifying");
                self.send_command(GatewayMessage::identify(&payload)).await
            }
        };

        if let Err(e) = result {
            tracing::warn!(error = %e, "Handshake not sent");
        }
    }

    async fn send_command(
        &self,
        message: Result<GatewayMessage, serde_json::Error>,
    ) -> Result<(), SendError> {
        self.sender.send(message?).await
    }

    fn resume_payload(&self) -> Option<ResumePayload> {
        let state = self.state.read();
        if !state.can_resume() {
            return None;
        }
        Some(ResumePayload {
            token: self.config.token.clone(),
            session_id: state.session_id.clone()?,
            seq: state.last_sequence,
        })
    }

    fn identify_payload(&self) -> IdentifyPayload {
        IdentifyPayload {
            token: self.config.token.clone(),
            properties: IdentifyProperties::default(),
            compress: true,
            large_threshold: self.config.large_threshold,
            shard: self.config.shard.as_pair(),
            presence: self.presence.clone(),
            intents: self.registry.intents() | self.config.intents,
        }
    }

    /// Cached resume URL, configured URL, or whatever REST hands out
    async fn resolve_url(&self) -> Result<ResolvedUrl, HttpError> {
        let cached = self.state.read().resume_url.clone();
        let (base, from_resume) = match (cached, &self.gateway_url) {
            (Some(url), _) => (url, true),
            (None, Some(url)) => (url.clone(), false),
            (None, None) => (self.http.get_gateway_bot().await?.url, false),
        };
        Ok(ResolvedUrl {
            url: gateway_query(&base, self.config.api_version),
            from_resume,
        })
    }

    fn retry_later(&self) -> ConnectionEnd {
        ConnectionEnd::Reconnect {
            delay: Some(Duration::from_millis(self.config.reconnect_delay_ms)),
        }
    }

    fn invalid_session_delay(&self) -> Duration {
        let min = self.config.invalid_session_delay_min_ms;
        let max = self.config.invalid_session_delay_max_ms.max(min);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    fn context(&self) -> Context {
        Context::new(
            self.http.clone(),
            self.sender.clone(),
            self.registry.waiters(),
            Arc::clone(&self.state),
        )
    }

    fn set_phase(&self, phase: ConnectionPhase) {
        self.state.write().phase = phase;
    }

    fn teardown(&self, tasks: &mut JoinSet<()>) {
        tasks.abort_all();
        self.registry.cancel_waiters();
        self.sender.detach();
        self.http.close();
        self.set_phase(ConnectionPhase::Disconnected);
        tracing::info!("Gateway client stopped");
    }
}

impl fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayClient")
            .field("shard", &self.config.shard)
            .field("phase", &self.phase())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Append the connection query to a gateway host
fn gateway_query(base: &str, api_version: u8) -> String {
    let base = base.split('?').next().unwrap_or(base).trim_end_matches('/');
    format!("{base}/?v={api_version}&encoding=json&compress=zlib-stream")
}
