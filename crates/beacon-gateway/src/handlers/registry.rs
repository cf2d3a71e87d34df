//! Command name to handler registry

use super::{CommandContext, HandlerResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// A command handler
///
/// Implemented for any `Fn(CommandContext) -> impl Future<Output = HandlerResult<()>>`.
#[async_trait]
pub trait CommandHandler: Send + Sync + 'static {
    async fn handle(&self, ctx: CommandContext) -> HandlerResult<()>;
}

#[async_trait]
impl<F, Fut> CommandHandler for F
where
    F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<()>> + Send + 'static,
{
    async fn handle(&self, ctx: CommandContext) -> HandlerResult<()> {
        (self)(ctx).await
    }
}

/// Registered command handlers
#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler
    ///
    /// A second registration under the same name replaces the first.
    /// Returns `true` if a handler was replaced.
    pub fn register<H>(&mut self, name: impl Into<String>, handler: H) -> bool
    where
        H: CommandHandler,
    {
        let name = name.into();
        let replaced = self.handlers.insert(name.clone(), Arc::new(handler)).is_some();
        if replaced {
            tracing::warn!(command = %name, "Command registered twice, replacing handler");
        } else {
            tracing::debug!(command = %name, "Command registered");
        }
        replaced
    }

    /// Look up a handler
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered command names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish()
    }
}
