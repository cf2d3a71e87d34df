//! Per-invocation command context

use super::{HandlerError, HandlerResult};
use crate::events::{CommandOption, InteractionCreateEvent};
use crate::rest::{InteractionResponder, InteractionResponse, InteractionResponseData};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Everything a handler needs to answer one interaction
#[derive(Clone)]
pub struct CommandContext {
    interaction_id: String,
    token: String,
    name: String,
    options: Vec<CommandOption>,
    guild_id: Option<String>,
    channel_id: Option<String>,
    responder: Arc<dyn InteractionResponder>,
}

impl CommandContext {
    /// Create a context for a command invocation
    pub fn new(
        interaction_id: impl Into<String>,
        token: impl Into<String>,
        name: impl Into<String>,
        responder: Arc<dyn InteractionResponder>,
    ) -> Self {
        Self {
            interaction_id: interaction_id.into(),
            token: token.into(),
            name: name.into(),
            options: Vec::new(),
            guild_id: None,
            channel_id: None,
            responder,
        }
    }

    /// Build a context from an INTERACTION_CREATE event
    ///
    /// Returns `None` for interactions that are not application commands.
    pub fn from_interaction(
        event: InteractionCreateEvent,
        responder: Arc<dyn InteractionResponder>,
    ) -> Option<Self> {
        event.command_name()?;
        let data = event.data?;

        Some(Self {
            interaction_id: event.id,
            token: event.token,
            name: data.name,
            options: data.options,
            guild_id: event.guild_id,
            channel_id: event.channel_id,
            responder,
        })
    }

    /// Attach command options
    #[must_use]
    pub fn with_options(mut self, options: Vec<CommandOption>) -> Self {
        self.options = options;
        self
    }

    /// Command name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Interaction ID
    #[must_use]
    pub fn interaction_id(&self) -> &str {
        &self.interaction_id
    }

    #[must_use]
    pub fn guild_id(&self) -> Option<&str> {
        self.guild_id.as_deref()
    }

    #[must_use]
    pub fn channel_id(&self) -> Option<&str> {
        self.channel_id.as_deref()
    }

    /// All supplied options
    #[must_use]
    pub fn options(&self) -> &[CommandOption] {
        &self.options
    }

    /// Value of the named option
    #[must_use]
    pub fn option(&self, name: &str) -> Option<&Value> {
        self.options
            .iter()
            .find(|option| option.name == name)
            .map(|option| &option.value)
    }

    /// String value of a required option
    pub fn option_str(&self, name: &str) -> HandlerResult<&str> {
        self.option(name)
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::InvalidOption(format!("expected string option `{name}`")))
    }

    /// Send a raw interaction response
    pub async fn respond(&self, response: &InteractionResponse) -> HandlerResult<()> {
        self.responder
            .create_interaction_response(&self.interaction_id, &self.token, response)
            .await?;
        Ok(())
    }

    /// Reply with a message
    pub async fn send(&self, data: InteractionResponseData) -> HandlerResult<()> {
        self.respond(&InteractionResponse::message(data)).await
    }

    /// Reply with plain text
    pub async fn send_content(&self, content: impl Into<String>) -> HandlerResult<()> {
        self.respond(&InteractionResponse::content(content)).await
    }

    /// Acknowledge now and answer later
    pub async fn defer(&self) -> HandlerResult<()> {
        self.respond(&InteractionResponse::deferred()).await
    }
}

impl fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContext")
            .field("interaction_id", &self.interaction_id)
            .field("name", &self.name)
            .field("options", &self.options)
            .field("guild_id", &self.guild_id)
            .field("channel_id", &self.channel_id)
            .finish_non_exhaustive()
    }
}
