//! Outbound writer
//!
//! The only task that writes to the WebSocket. Producers enqueue frames on a
//! bounded queue and the writer sends them one at a time, in order.

use super::{GatewayError, GatewayResult};
use crate::protocol::OutboundFrame;
use beacon_common::GatewayConfig;
use futures::{Sink, SinkExt};
use std::fmt::Display;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

/// Close code sent when the writer is cancelled
pub const NORMAL_CLOSE: u16 = 1000;

/// Upper bound on writing the close frame after cancellation
const CANCEL_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Queue sizing for the writer
#[derive(Debug, Clone, Copy)]
pub struct WriterConfig {
    /// Frames that may wait in the queue
    pub capacity: usize,
    /// How long `enqueue` waits for room in the queue
    pub enqueue_timeout: Duration,
}

impl From<&GatewayConfig> for WriterConfig {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            capacity: config.writer_capacity.max(1),
            enqueue_timeout: config.enqueue_timeout(),
        }
    }
}

enum WriterCommand {
    Frame(OutboundFrame),
    Close { code: u16, reason: String },
}

/// Cloneable handle for queueing outbound frames
#[derive(Debug, Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<WriterCommand>,
    enqueue_timeout: Duration,
    cancel: CancellationToken,
}

impl WriterHandle {
    /// Queue a frame behind everything already queued
    pub async fn enqueue(&self, frame: OutboundFrame) -> GatewayResult<()> {
        self.send(WriterCommand::Frame(frame)).await
    }

    /// Queue a close frame; the writer stops after sending it
    pub async fn close(&self, code: u16, reason: impl Into<String>) -> GatewayResult<()> {
        self.send(WriterCommand::Close {
            code,
            reason: reason.into(),
        })
        .await
    }

    /// Check if the writer is still accepting frames
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    async fn send(&self, command: WriterCommand) -> GatewayResult<()> {
        if self.cancel.is_cancelled() {
            return Err(GatewayError::WriterClosed);
        }

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(GatewayError::WriterClosed),
            sent = tokio::time::timeout(self.enqueue_timeout, self.tx.send(command)) => match sent {
                Ok(Ok(())) => Ok(()),
                Ok(Err(_)) => Err(GatewayError::WriterClosed),
                Err(_) => Err(GatewayError::EnqueueTimeout(self.enqueue_timeout)),
            },
        }
    }
}

impl std::fmt::Debug for WriterCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Frame(frame) => write!(f, "Frame({frame})"),
            Self::Close { code, .. } => write!(f, "Close({code})"),
        }
    }
}

/// Spawns the writer task
pub struct OutboundWriter;

impl OutboundWriter {
    /// Start writing queued frames to `sink` until closed or cancelled
    ///
    /// On cancellation a normal close frame is written on a best-effort basis.
    pub fn spawn<S>(
        sink: S,
        config: WriterConfig,
        cancel: CancellationToken,
    ) -> (WriterHandle, JoinHandle<()>)
    where
        S: Sink<Message> + Unpin + Send + 'static,
        S::Error: Display + Send,
    {
        let (tx, rx) = mpsc::channel(config.capacity);
        let handle = WriterHandle {
            tx,
            enqueue_timeout: config.enqueue_timeout,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(write_loop(sink, rx, cancel));
        (handle, task)
    }
}

async fn write_loop<S>(mut sink: S, mut rx: mpsc::Receiver<WriterCommand>, cancel: CancellationToken)
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display + Send,
{
    loop {
        let command = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::trace!("Writer cancelled");
                let frame = CloseFrame {
                    code: NORMAL_CLOSE.into(),
                    reason: "shutdown".into(),
                };
                let close = sink.send(Message::Close(Some(frame)));
                if tokio::time::timeout(CANCEL_CLOSE_TIMEOUT, close).await.is_err() {
                    tracing::debug!("Close frame not written before timeout");
                }
                return;
            }
            command = rx.recv() => match command {
                Some(command) => command,
                None => return,
            },
        };

        match command {
            WriterCommand::Frame(frame) => {
                let json = match frame.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(op = frame.opcode().as_u8(), error = %e, "Failed to encode frame");
                        continue;
                    }
                };

                tracing::trace!(op = frame.opcode().as_u8(), "Sending frame");
                if let Err(e) = sink.send(Message::Text(json)).await {
                    tracing::warn!(error = %e, "Failed to write frame");
                    return;
                }
            }
            WriterCommand::Close { code, reason } => {
                tracing::debug!(code, "Sending close frame");
                let frame = CloseFrame {
                    code: code.into(),
                    reason: reason.into(),
                };
                if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                    tracing::debug!(error = %e, "Failed to write close frame");
                }
                return;
            }
        }
    }
}
