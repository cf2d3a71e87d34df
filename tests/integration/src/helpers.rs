//! Test helpers for integration tests
//!
//! Provides a mock gateway that serves `GET /gateway/bot`, accepts WebSocket
//! connections and records interaction callbacks, plus a handle for running a
//! bot against it.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use beacon_common::{BotConfig, GatewayConfig};
use beacon_gateway::{Bot, GatewayResult};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::fixtures::TEST_TOKEN;

/// How long a test waits for anything before failing
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Interaction callback received by the mock REST API
#[derive(Debug, Clone)]
pub struct RecordedCallback {
    pub interaction_id: String,
    pub token: String,
    pub body: Value,
}

#[derive(Clone)]
struct MockState {
    addr: SocketAddr,
    connections: mpsc::UnboundedSender<MockConnection>,
    callbacks: mpsc::UnboundedSender<RecordedCallback>,
}

/// In-process gateway and REST API
pub struct MockGateway {
    pub addr: SocketAddr,
    connections: mpsc::UnboundedReceiver<MockConnection>,
    callbacks: mpsc::UnboundedReceiver<RecordedCallback>,
    _handle: JoinHandle<()>,
}

impl MockGateway {
    /// Start a mock gateway on a random local port
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let (conn_tx, connections) = mpsc::unbounded_channel();
        let (callback_tx, callbacks) = mpsc::unbounded_channel();
        let state = MockState {
            addr,
            connections: conn_tx,
            callbacks: callback_tx,
        };

        let app = Router::new()
            .route("/api/v10/gateway/bot", get(gateway_bot))
            .route(
                "/api/v10/interactions/:id/:token/callback",
                post(interaction_callback),
            )
            .route("/gateway", get(gateway_socket))
            .route("/resume", get(resume_socket))
            .with_state(state);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            connections,
            callbacks,
            _handle: handle,
        })
    }

    /// REST base URL
    pub fn api_base_url(&self) -> String {
        format!("http://{}/api/v10", self.addr)
    }

    /// URL handed out by `GET /gateway/bot`
    pub fn gateway_url(&self) -> String {
        format!("ws://{}/gateway", self.addr)
    }

    /// URL to put in READY as `resume_gateway_url`
    pub fn resume_url(&self) -> String {
        format!("ws://{}/resume", self.addr)
    }

    /// Bot configuration pointing at this gateway with fast reconnects
    pub fn config(&self) -> BotConfig {
        BotConfig::new(TEST_TOKEN)
            .with_api_base_url(self.api_base_url())
            .with_intents(513)
            .with_gateway(GatewayConfig {
                reconnect_base_ms: 10,
                reconnect_max_ms: 50,
                ..GatewayConfig::default()
            })
    }

    /// Wait for the bot to open a WebSocket
    pub async fn accept(&mut self) -> Result<MockConnection> {
        tokio::time::timeout(RECV_TIMEOUT, self.connections.recv())
            .await
            .map_err(|_| anyhow!("no connection within {RECV_TIMEOUT:?}"))?
            .ok_or_else(|| anyhow!("mock gateway stopped"))
    }

    /// Wait for the next interaction callback
    pub async fn next_callback(&mut self) -> Result<RecordedCallback> {
        tokio::time::timeout(RECV_TIMEOUT, self.callbacks.recv())
            .await
            .map_err(|_| anyhow!("no callback within {RECV_TIMEOUT:?}"))?
            .ok_or_else(|| anyhow!("mock gateway stopped"))
    }
}

/// One WebSocket connection opened by the bot
pub struct MockConnection {
    socket: WebSocket,
    /// `/gateway` or `/resume`
    pub path: &'static str,
    pub query: HashMap<String, String>,
}

impl MockConnection {
    /// Send a JSON frame
    pub async fn send_json(&mut self, frame: Value) -> Result<()> {
        self.socket.send(Message::Text(frame.to_string())).await?;
        Ok(())
    }

    /// Send a raw text frame, valid JSON or not
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.socket.send(Message::Text(text.to_string())).await?;
        Ok(())
    }

    /// Receive the next JSON frame
    pub async fn recv_json(&mut self) -> Result<Value> {
        loop {
            match self.next_message().await? {
                Message::Text(text) => return Ok(serde_json::from_str(&text)?),
                Message::Close(frame) => bail!("connection closed: {frame:?}"),
                _ => {}
            }
        }
    }

    /// Receive frames until one with the given op code arrives
    pub async fn recv_op(&mut self, op: u64) -> Result<Value> {
        loop {
            let frame = self.recv_json().await?;
            if frame["op"] == op {
                return Ok(frame);
            }
        }
    }

    /// Skip frames until the bot closes the connection; returns the close code
    pub async fn recv_close(&mut self) -> Result<Option<u16>> {
        loop {
            match tokio::time::timeout(RECV_TIMEOUT, self.socket.recv()).await {
                Err(_) => bail!("no close frame within {RECV_TIMEOUT:?}"),
                Ok(None | Some(Err(_))) => return Ok(None),
                Ok(Some(Ok(Message::Close(frame)))) => return Ok(frame.map(|f| f.code)),
                Ok(Some(Ok(_))) => {}
            }
        }
    }

    /// Close from the server side
    pub async fn close(&mut self, code: u16, reason: &'static str) -> Result<()> {
        let frame = CloseFrame {
            code,
            reason: reason.into(),
        };
        self.socket.send(Message::Close(Some(frame))).await?;
        Ok(())
    }

    /// Send hello and return the bot's identify or resume
    pub async fn handshake(&mut self, heartbeat_interval: u64) -> Result<Value> {
        self.send_json(crate::fixtures::hello(heartbeat_interval)).await?;
        loop {
            let frame = self.recv_json().await?;
            if frame["op"] != 1 {
                return Ok(frame);
            }
        }
    }

    async fn next_message(&mut self) -> Result<Message> {
        match tokio::time::timeout(RECV_TIMEOUT, self.socket.recv()).await {
            Err(_) => bail!("no frame within {RECV_TIMEOUT:?}"),
            Ok(None) => bail!("connection ended"),
            Ok(Some(message)) => Ok(message?),
        }
    }
}

/// A bot running in the background
pub struct RunningBot {
    pub shutdown: CancellationToken,
    handle: JoinHandle<GatewayResult<()>>,
}

impl RunningBot {
    pub fn spawn(bot: Bot) -> Self {
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(bot.start(shutdown.clone()));
        Self { shutdown, handle }
    }

    /// Wait for the bot to stop on its own
    pub async fn join(self) -> Result<GatewayResult<()>> {
        Ok(tokio::time::timeout(RECV_TIMEOUT, self.handle).await??)
    }

    /// Cancel and wait for the bot
    pub async fn stop(self) -> Result<GatewayResult<()>> {
        self.shutdown.cancel();
        self.join().await
    }
}

async fn gateway_bot(State(state): State<MockState>, headers: HeaderMap) -> Response {
    let expected = format!("Bot {TEST_TOKEN}");
    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == expected);

    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "401: Unauthorized", "code": 0})),
        )
            .into_response();
    }

    Json(json!({
        "url": format!("ws://{}/gateway", state.addr),
        "shards": 1,
        "session_start_limit": {
            "total": 1000,
            "remaining": 999,
            "reset_after": 14_400_000,
            "max_concurrency": 1
        }
    }))
    .into_response()
}

async fn interaction_callback(
    State(state): State<MockState>,
    Path((interaction_id, token)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> StatusCode {
    let _ = state.callbacks.send(RecordedCallback {
        interaction_id,
        token,
        body,
    });
    StatusCode::NO_CONTENT
}

async fn gateway_socket(
    State(state): State<MockState>,
    Query(query): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    upgrade(state, ws, "/gateway", query)
}

async fn resume_socket(
    State(state): State<MockState>,
    Query(query): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    upgrade(state, ws, "/resume", query)
}

fn upgrade(
    state: MockState,
    ws: WebSocketUpgrade,
    path: &'static str,
    query: HashMap<String, String>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        let _ = state.connections.send(MockConnection {
            socket,
            path,
            query,
        });
    })
}
