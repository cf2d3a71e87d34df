//! Command dispatch
//!
//! Routes INTERACTION_CREATE commands to the handlers registered by the bot.

mod context;
mod error;
mod registry;

pub use context::CommandContext;
pub use error::{HandlerError, HandlerResult};
pub use registry::{CommandHandler, CommandRegistry};

use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Result of a single dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handler ran and returned `Ok`
    Completed,
    /// Handler returned an error
    Failed,
    /// Handler panicked
    Panicked,
    /// No handler registered under this name
    Unknown,
}

/// Invokes registered handlers
///
/// The registry is frozen once the dispatcher is built.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    registry: Arc<CommandRegistry>,
}

impl CommandDispatcher {
    #[must_use]
    pub fn new(registry: CommandRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Run the handler for this command on the current task
    pub async fn dispatch(&self, ctx: CommandContext) -> DispatchOutcome {
        let Some(handler) = self.registry.get(ctx.name()) else {
            tracing::debug!(command = %ctx.name(), "No handler for command");
            return DispatchOutcome::Unknown;
        };

        let command = ctx.name().to_string();
        let interaction_id = ctx.interaction_id().to_string();
        tracing::debug!(%command, %interaction_id, "Dispatching command");

        match handler.handle(ctx).await {
            Ok(()) => DispatchOutcome::Completed,
            Err(e) => {
                tracing::error!(%command, %interaction_id, error = %e, "Command handler failed");
                DispatchOutcome::Failed
            }
        }
    }

    /// Like [`dispatch`](Self::dispatch), but a panicking handler is logged
    /// instead of unwinding into the caller
    pub async fn dispatch_isolated(&self, ctx: CommandContext) -> DispatchOutcome {
        let command = ctx.name().to_string();

        match AssertUnwindSafe(self.dispatch(ctx)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!(%command, "Command handler panicked");
                DispatchOutcome::Panicked
            }
        }
    }

    /// Create an ordered queue and the worker that drains it
    ///
    /// Nothing runs until [`DispatchWorker::run`] is polled.
    #[must_use]
    pub fn queue(&self) -> (DispatchQueue, DispatchWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = DispatchWorker {
            dispatcher: self.clone(),
            rx,
        };
        (DispatchQueue { tx }, worker)
    }
}

/// Submitting side of the dispatch queue
///
/// Submission never waits, so the read loop is never held up by a handler.
#[derive(Debug, Clone)]
pub struct DispatchQueue {
    tx: mpsc::UnboundedSender<CommandContext>,
}

impl DispatchQueue {
    /// Queue a command; returns `false` once the worker has stopped
    pub fn submit(&self, ctx: CommandContext) -> bool {
        self.tx.send(ctx).is_ok()
    }
}

/// Runs queued commands
///
/// Handlers start in submission order and then run concurrently with each
/// other on the worker's task.
#[derive(Debug)]
pub struct DispatchWorker {
    dispatcher: CommandDispatcher,
    rx: mpsc::UnboundedReceiver<CommandContext>,
}

impl DispatchWorker {
    /// Run until every [`DispatchQueue`] is dropped and the last handler returns
    pub async fn run(self) {
        let Self { dispatcher, mut rx } = self;
        let mut running = FuturesUnordered::new();

        loop {
            tokio::select! {
                biased;
                received = rx.recv() => match received {
                    Some(ctx) => {
                        let dispatcher = dispatcher.clone();
                        running.push(async move { dispatcher.dispatch_isolated(ctx).await });
                    }
                    None => break,
                },
                Some(_outcome) = running.next() => {}
            }
        }

        tracing::debug!(in_flight = running.len(), "Dispatch queue closed");
        while running.next().await.is_some() {}
    }
}
