//! Heartbeat manager
//!
//! Sends op 1 at the interval announced in hello and notices when the server
//! stops acknowledging.

use super::{Sequence, WriterHandle};
use crate::protocol::OutboundFrame;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Acknowledgement tracking shared between the heartbeat task and the read loop
#[derive(Debug, Default)]
pub struct HeartbeatState {
    awaiting_ack: AtomicBool,
    sent_at: Mutex<Option<Instant>>,
    latency: Mutex<Option<Duration>>,
}

impl HeartbeatState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outgoing beat
    ///
    /// Returns `false` if the previous beat was never acknowledged.
    fn record_sent(&self) -> bool {
        if self.awaiting_ack.swap(true, Ordering::AcqRel) {
            return false;
        }
        *self.sent_at.lock() = Some(Instant::now());
        true
    }

    /// Handle op 11, returning the round trip time
    pub fn acknowledge(&self) -> Option<Duration> {
        self.awaiting_ack.store(false, Ordering::Release);
        let rtt = self.sent_at.lock().take().map(|sent| sent.elapsed());
        if rtt.is_some() {
            *self.latency.lock() = rtt;
        }
        rtt
    }

    /// Round trip time of the last acknowledged beat
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        *self.latency.lock()
    }

    #[must_use]
    pub fn is_awaiting_ack(&self) -> bool {
        self.awaiting_ack.load(Ordering::Acquire)
    }
}

/// Why the heartbeat task stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatExit {
    /// Stopped by its token
    Cancelled,
    /// A beat went unacknowledged for a full interval
    Zombied,
    /// The writer stopped accepting frames
    WriterClosed,
}

/// Running heartbeat task
#[derive(Debug)]
pub struct HeartbeatHandle {
    cancel: CancellationToken,
    task: JoinHandle<HeartbeatExit>,
}

impl HeartbeatHandle {
    /// Stop beating and wait for the task to finish
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Heartbeat task failed");
        }
    }

    /// The task, for awaiting its exit
    pub fn task_mut(&mut self) -> &mut JoinHandle<HeartbeatExit> {
        &mut self.task
    }
}

/// Spawns heartbeat tasks
pub struct Heartbeater;

impl Heartbeater {
    /// Start beating every `interval` after a random initial delay in `[0, interval]`
    pub fn spawn(
        interval: Duration,
        sequence: Sequence,
        writer: WriterHandle,
        state: Arc<HeartbeatState>,
        cancel: CancellationToken,
    ) -> HeartbeatHandle {
        let jitter = interval.mul_f64(rand::thread_rng().gen_range(0.0..=1.0));
        tracing::debug!(
            interval_ms = interval.as_millis() as u64,
            jitter_ms = jitter.as_millis() as u64,
            "Starting heartbeat"
        );

        let task = tokio::spawn(beat_loop(
            interval,
            jitter,
            sequence,
            writer,
            state,
            cancel.clone(),
        ));
        HeartbeatHandle { cancel, task }
    }
}

async fn beat_loop(
    interval: Duration,
    jitter: Duration,
    sequence: Sequence,
    writer: WriterHandle,
    state: Arc<HeartbeatState>,
    cancel: CancellationToken,
) -> HeartbeatExit {
    tokio::select! {
        biased;
        () = cancel.cancelled() => return HeartbeatExit::Cancelled,
        () = tokio::time::sleep(jitter) => {}
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return HeartbeatExit::Cancelled,
            _ = ticker.tick() => {}
        }

        if !state.record_sent() {
            tracing::warn!("Heartbeat not acknowledged, connection zombied");
            return HeartbeatExit::Zombied;
        }

        let seq = sequence.get();
        tokio::select! {
            biased;
            () = cancel.cancelled() => return HeartbeatExit::Cancelled,
            sent = writer.enqueue(OutboundFrame::Heartbeat(seq)) => {
                if let Err(e) = sent {
                    tracing::debug!(error = %e, "Heartbeat could not be queued");
                    return HeartbeatExit::WriterClosed;
                }
            }
        }
        tracing::trace!(?seq, "Heartbeat sent");
    }
}
