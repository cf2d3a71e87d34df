//! Connection manager
//!
//! Drives one logical gateway session across as many WebSocket connections as
//! it takes: bootstrap, hello, identify or resume, steady state, reconnect.

use super::writer::NORMAL_CLOSE;
use super::{
    GatewayError, GatewayResult, HeartbeatExit, HeartbeatHandle, HeartbeatState, Heartbeater,
    OutboundWriter, ReconnectBackoff, SessionState, WriterConfig, WriterHandle,
};
use crate::events::{GatewayEventType, InteractionCreateEvent, ReadyEvent};
use crate::handlers::{CommandContext, CommandDispatcher, DispatchQueue, DispatchWorker};
use crate::protocol::{
    Activity, CloseAction, CloseCode, HelloPayload, IdentifyPayload, IdentifyProperties,
    InboundFrame, Intents, OpCode, OutboundFrame, PresenceUpdatePayload, ResumePayload,
};
use crate::rest::{InteractionResponder, RestClient};
use beacon_common::BotConfig;
use futures::future::OptionFuture;
use futures::{Stream, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

/// Close code for connections we intend to resume (1000 and 1001 end the session)
const RESUME_CLOSE_CODE: u16 = 4900;

/// How long teardown waits for the writer to flush
const WRITER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Library name reported in identify properties
const LIBRARY_NAME: &str = "beacon";

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Resolving the gateway URL
    Bootstrapping,
    /// Opening the WebSocket
    Connecting,
    /// Connected, waiting for op 10
    AwaitingHello,
    /// Identify sent, waiting for READY
    Identifying,
    /// Resume sent, waiting for RESUMED
    Resuming,
    /// Session established
    Connected,
    /// Waiting to open the next connection
    Reconnecting,
    /// Terminal
    Closed,
}

impl ConnectionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bootstrapping => "bootstrapping",
            Self::Connecting => "connecting",
            Self::AwaitingHello => "awaiting_hello",
            Self::Identifying => "identifying",
            Self::Resuming => "resuming",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a single connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionExit {
    Shutdown,
    Reconnect,
}

/// What woke the read loop
enum Event {
    Shutdown,
    HeartbeatStopped(Result<HeartbeatExit, JoinError>),
    Inbound(Option<Result<Message, tungstenite::Error>>),
}

/// Tasks and shared state of one WebSocket connection
struct LiveConnection {
    writer: WriterHandle,
    writer_task: JoinHandle<()>,
    heartbeat: Option<HeartbeatHandle>,
    heartbeat_state: Arc<HeartbeatState>,
    token: CancellationToken,
}

impl LiveConnection {
    /// Stop the heartbeat, close the socket and cancel what is left
    async fn close(mut self, code: u16) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.stop().await;
        }

        let reason = if code == NORMAL_CLOSE {
            "shutdown"
        } else {
            "reconnecting"
        };
        if let Err(e) = self.writer.close(code, reason).await {
            tracing::trace!(error = %e, "Close frame not queued");
        }

        if tokio::time::timeout(WRITER_SHUTDOWN_TIMEOUT, &mut self.writer_task)
            .await
            .is_err()
        {
            tracing::debug!("Writer did not finish in time, aborting");
            self.writer_task.abort();
        }

        self.token.cancel();
    }
}

/// Runs the gateway session state machine
pub struct ConnectionManager {
    config: BotConfig,
    rest: RestClient,
    responder: Arc<dyn InteractionResponder>,
    dispatcher: CommandDispatcher,
    commands: DispatchQueue,
    worker: Option<DispatchWorker>,
    backoff: ReconnectBackoff,
    state: watch::Sender<ConnectionState>,
}

impl ConnectionManager {
    /// Create a manager; nothing happens until [`run`](Self::run)
    pub fn new(config: BotConfig, rest: RestClient, dispatcher: CommandDispatcher) -> Self {
        let backoff = ReconnectBackoff::new(
            config.gateway.reconnect_base(),
            config.gateway.reconnect_max(),
            config.gateway.max_reconnect_attempts,
        );
        let (state, _) = watch::channel(ConnectionState::Bootstrapping);
        let responder: Arc<dyn InteractionResponder> = Arc::new(rest.clone());
        let (commands, worker) = dispatcher.queue();

        Self {
            config,
            rest,
            responder,
            dispatcher,
            commands,
            worker: Some(worker),
            backoff,
            state,
        }
    }

    /// Answer interactions through something other than the REST client
    #[must_use]
    pub fn with_responder(mut self, responder: Arc<dyn InteractionResponder>) -> Self {
        self.responder = responder;
        self
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch state transitions
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::debug!(from = %previous, to = %next, "Connection state changed");
        }
    }

    /// Run until `shutdown` is cancelled or the session ends for good
    ///
    /// Returns `Ok` on shutdown. Bootstrap failures, terminal close codes and an
    /// exhausted reconnect budget are returned as errors.
    pub async fn run(mut self, shutdown: CancellationToken) -> GatewayResult<()> {
        let intents = Intents::from(self.config.discord.intents);
        if intents.is_privileged() {
            tracing::info!(%intents, "Requesting privileged intents");
        }

        // Handlers outlive reconnects; the worker drains once the queue is dropped with `self`
        if let Some(worker) = self.worker.take() {
            tokio::spawn(worker.run());
        }

        let result = self.run_session(&shutdown).await;
        self.set_state(ConnectionState::Closed);

        if result.is_ok() {
            tracing::info!("Gateway session closed");
        }
        result
    }

    async fn run_session(&mut self, shutdown: &CancellationToken) -> GatewayResult<()> {
        self.set_state(ConnectionState::Bootstrapping);
        let gateway = tokio::select! {
            biased;
            () = shutdown.cancelled() => return Ok(()),
            gateway = self.rest.get_gateway_bot() => gateway.map_err(GatewayError::Bootstrap)?,
        };
        tracing::info!(url = %gateway.url, "Gateway URL resolved");

        let mut session = SessionState::new(gateway.url);

        loop {
            let exit = match self.run_connection(&mut session, shutdown).await {
                Ok(exit) => exit,
                Err(GatewayError::Protocol(e)) if !session.can_resume() => {
                    return Err(GatewayError::Protocol(e));
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(error = %e, "Connection failed");
                    ConnectionExit::Reconnect
                }
                Err(e) => return Err(e),
            };

            if exit == ConnectionExit::Shutdown || shutdown.is_cancelled() {
                return Ok(());
            }

            self.set_state(ConnectionState::Reconnecting);
            let Some(delay) = self.backoff.next_delay() else {
                return Err(GatewayError::ReconnectExhausted(self.backoff.attempts()));
            };
            tracing::info!(
                attempt = self.backoff.attempts(),
                delay_ms = delay.as_millis() as u64,
                resume = session.can_resume(),
                "Reconnecting"
            );

            tokio::select! {
                biased;
                () = shutdown.cancelled() => return Ok(()),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn run_connection(
        &mut self,
        session: &mut SessionState,
        shutdown: &CancellationToken,
    ) -> GatewayResult<ConnectionExit> {
        let url = session.connect_url(self.config.gateway.version)?;
        self.set_state(ConnectionState::Connecting);
        tracing::info!(%url, resume = session.can_resume(), "Connecting to gateway");

        let timeout = self.config.gateway.connect_timeout();
        let (socket, _response) = tokio::select! {
            biased;
            () = shutdown.cancelled() => return Ok(ConnectionExit::Shutdown),
            connected = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url.as_str())) => {
                connected.map_err(|_| GatewayError::ConnectTimeout(timeout))??
            }
        };

        let (sink, mut stream) = socket.split();
        let token = shutdown.child_token();
        let (writer, writer_task) =
            OutboundWriter::spawn(sink, WriterConfig::from(&self.config.gateway), token.clone());

        let mut conn = LiveConnection {
            writer,
            writer_task,
            heartbeat: None,
            heartbeat_state: Arc::new(HeartbeatState::new()),
            token,
        };
        self.set_state(ConnectionState::AwaitingHello);

        let result = self.read_loop(&mut conn, &mut stream, session, shutdown).await;

        let code = match result {
            Ok(ConnectionExit::Shutdown) => NORMAL_CLOSE,
            _ => RESUME_CLOSE_CODE,
        };
        conn.close(code).await;

        result
    }

    async fn read_loop<S>(
        &mut self,
        conn: &mut LiveConnection,
        stream: &mut S,
        session: &mut SessionState,
        shutdown: &CancellationToken,
    ) -> GatewayResult<ConnectionExit>
    where
        S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        loop {
            let event = {
                let heartbeat: OptionFuture<_> =
                    conn.heartbeat.as_mut().map(HeartbeatHandle::task_mut).into();

                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => Event::Shutdown,
                    Some(exit) = heartbeat => Event::HeartbeatStopped(exit),
                    message = stream.next() => Event::Inbound(message),
                }
            };

            match event {
                Event::Shutdown => return Ok(ConnectionExit::Shutdown),
                Event::HeartbeatStopped(exit) => {
                    conn.heartbeat = None;
                    match exit {
                        Ok(HeartbeatExit::Zombied) => {
                            tracing::warn!("No heartbeat ack, reconnecting");
                            return Ok(ConnectionExit::Reconnect);
                        }
                        Ok(HeartbeatExit::WriterClosed) => return Err(GatewayError::WriterClosed),
                        Ok(HeartbeatExit::Cancelled) => {}
                        Err(e) => {
                            tracing::error!(error = %e, "Heartbeat task failed");
                            return Ok(ConnectionExit::Reconnect);
                        }
                    }
                }
                Event::Inbound(None) => return Err(GatewayError::ConnectionLost),
                Event::Inbound(Some(Err(e))) => return Err(e.into()),
                Event::Inbound(Some(Ok(message))) => {
                    if let Some(exit) = self.handle_message(conn, session, message).await? {
                        return Ok(exit);
                    }
                }
            }
        }
    }

    async fn handle_message(
        &mut self,
        conn: &mut LiveConnection,
        session: &mut SessionState,
        message: Message,
    ) -> GatewayResult<Option<ConnectionExit>> {
        let frame = match message {
            Message::Text(text) => InboundFrame::from_json(&text)?,
            Message::Binary(bytes) => InboundFrame::from_slice(&bytes)?,
            Message::Close(frame) => return self.handle_close(session, frame).map(Some),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => return Ok(None),
        };

        tracing::debug!(op = frame.op, t = frame.event_name(), s = frame.s, "Frame received");
        self.handle_frame(conn, session, frame).await
    }

    async fn handle_frame(
        &mut self,
        conn: &mut LiveConnection,
        session: &mut SessionState,
        frame: InboundFrame,
    ) -> GatewayResult<Option<ConnectionExit>> {
        if let Some(seq) = frame.s {
            session.sequence().observe(seq);
        }

        let Some(op) = frame.opcode() else {
            tracing::warn!(op = frame.op, "Unknown op code, ignoring");
            return Ok(None);
        };

        match op {
            OpCode::Dispatch => self.handle_dispatch(session, &frame),
            OpCode::Heartbeat => {
                tracing::debug!("Heartbeat requested by gateway");
                conn.writer
                    .enqueue(OutboundFrame::Heartbeat(session.sequence().get()))
                    .await?;
            }
            OpCode::Reconnect => {
                tracing::info!("Gateway requested reconnect");
                return Ok(Some(ConnectionExit::Reconnect));
            }
            OpCode::InvalidSession => {
                let resumable = frame.decode::<bool>().unwrap_or(false);
                tracing::warn!(resumable, "Session invalidated");
                if !resumable {
                    session.invalidate();
                }
                return Ok(Some(ConnectionExit::Reconnect));
            }
            OpCode::Hello => self.handle_hello(conn, session, &frame).await?,
            OpCode::HeartbeatAck => {
                if let Some(rtt) = conn.heartbeat_state.acknowledge() {
                    tracing::debug!(latency_ms = rtt.as_millis() as u64, "Heartbeat acknowledged");
                }
            }
            other => tracing::debug!(op = %other, "Ignoring client op code from gateway"),
        }

        Ok(None)
    }

    /// Send identify or resume, then start beating
    async fn handle_hello(
        &mut self,
        conn: &mut LiveConnection,
        session: &mut SessionState,
        frame: &InboundFrame,
    ) -> GatewayResult<()> {
        let hello: HelloPayload = match frame.decode() {
            Ok(hello) => hello,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed hello payload, ignoring");
                return Ok(());
            }
        };
        if hello.heartbeat_interval == 0 {
            tracing::warn!("Hello with zero heartbeat interval, ignoring");
            return Ok(());
        }
        if conn.heartbeat.is_some() {
            tracing::warn!("Duplicate hello, ignoring");
            return Ok(());
        }
        tracing::info!(interval_ms = hello.heartbeat_interval, "Received hello");

        let handshake = match session.session_id() {
            Some(session_id) => {
                let resume = ResumePayload {
                    token: self.config.discord.token.clone(),
                    session_id: session_id.to_string(),
                    seq: session.sequence().get().unwrap_or(0),
                };
                session.mark_resumed();
                self.set_state(ConnectionState::Resuming);
                tracing::info!(session_id = %resume.session_id, seq = resume.seq, "Resuming session");
                OutboundFrame::Resume(resume)
            }
            None => {
                self.set_state(ConnectionState::Identifying);
                tracing::info!("Identifying");
                OutboundFrame::Identify(self.identify_payload())
            }
        };

        // Handshake goes out before the first heartbeat can be queued
        conn.writer.enqueue(handshake).await?;

        conn.heartbeat = Some(Heartbeater::spawn(
            Duration::from_millis(hello.heartbeat_interval),
            session.sequence().clone(),
            conn.writer.clone(),
            conn.heartbeat_state.clone(),
            conn.token.child_token(),
        ));
        Ok(())
    }

    fn handle_dispatch(&mut self, session: &mut SessionState, frame: &InboundFrame) {
        let Some(name) = frame.event_name() else {
            tracing::warn!(s = frame.s, "Dispatch without event name");
            return;
        };

        match GatewayEventType::from_str(name) {
            Some(GatewayEventType::Ready) => match frame.decode::<ReadyEvent>() {
                Ok(ready) => {
                    tracing::info!(
                        session_id = %ready.session_id,
                        resume_url = ready.resume_gateway_url.as_deref(),
                        user = ready.user.as_ref().map(|user| user.username.as_str()),
                        "Session ready"
                    );
                    session.on_ready(ready.session_id, ready.resume_gateway_url);
                    self.backoff.reset();
                    self.set_state(ConnectionState::Connected);
                }
                Err(e) => tracing::warn!(error = %e, "Malformed READY payload"),
            },
            Some(GatewayEventType::Resumed) => {
                tracing::info!(session_id = session.session_id(), "Session resumed");
                self.backoff.reset();
                self.set_state(ConnectionState::Connected);
            }
            Some(GatewayEventType::InteractionCreate) => self.handle_interaction(frame),
            _ => tracing::trace!(t = name, "Unhandled dispatch event"),
        }
    }

    fn handle_interaction(&self, frame: &InboundFrame) {
        let event: InteractionCreateEvent = match frame.decode() {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed INTERACTION_CREATE payload");
                return;
            }
        };

        match CommandContext::from_interaction(event, self.responder.clone()) {
            Some(ctx) => {
                if !self.commands.submit(ctx) {
                    tracing::warn!("Dispatch worker stopped, dropping command");
                }
            }
            None => tracing::debug!("Ignoring non-command interaction"),
        }
    }

    fn handle_close(
        &self,
        session: &mut SessionState,
        frame: Option<CloseFrame<'static>>,
    ) -> GatewayResult<ConnectionExit> {
        let code = frame.as_ref().map(|frame| u16::from(frame.code));
        let reason = frame
            .map(|frame| frame.reason.into_owned())
            .unwrap_or_default();

        match CloseCode::action_for(code) {
            CloseAction::Resume => {
                tracing::warn!(code, %reason, "Gateway closed the connection, resuming");
                Ok(ConnectionExit::Reconnect)
            }
            CloseAction::Reidentify => {
                tracing::warn!(code, %reason, "Gateway closed the connection, session lost");
                session.invalidate();
                Ok(ConnectionExit::Reconnect)
            }
            CloseAction::Terminate => {
                tracing::error!(code, %reason, "Gateway closed the connection");
                Err(GatewayError::Closed { code, reason })
            }
        }
    }

    fn identify_payload(&self) -> IdentifyPayload {
        let presence = &self.config.presence;
        IdentifyPayload {
            token: self.config.discord.token.clone(),
            intents: Intents::from(self.config.discord.intents),
            properties: IdentifyProperties::new(LIBRARY_NAME),
            presence: Some(PresenceUpdatePayload::new(
                Activity {
                    name: presence.activity_name.clone(),
                    kind: presence.activity_type,
                },
                presence.status.clone(),
            )),
        }
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .field("commands", &self.dispatcher.registry().len())
            .finish_non_exhaustive()
    }
}
