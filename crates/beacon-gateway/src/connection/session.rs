//! Session state
//!
//! Facts that outlive a single WebSocket connection.

use super::{GatewayError, GatewayResult};
use reqwest::Url;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Last sequence number seen in this session
///
/// Written by the read loop, read by the heartbeat task.
#[derive(Debug, Clone, Default)]
pub struct Sequence(Arc<AtomicU64>);

// Stored as `s + 1` so that zero means "none yet"
impl Sequence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sequence number, keeping the maximum
    pub fn observe(&self, seq: u64) {
        self.0.fetch_max(seq.saturating_add(1), Ordering::AcqRel);
    }

    #[must_use]
    pub fn get(&self) -> Option<u64> {
        self.0.load(Ordering::Acquire).checked_sub(1)
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Release);
    }
}

/// Session state kept across reconnects
#[derive(Debug, Clone)]
pub struct SessionState {
    gateway_url: String,
    resume_gateway_url: Option<String>,
    session_id: Option<String>,
    sequence: Sequence,
    resumed: bool,
}

impl SessionState {
    #[must_use]
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            resume_gateway_url: None,
            session_id: None,
            sequence: Sequence::new(),
            resumed: false,
        }
    }

    /// URL resolved at bootstrap
    #[must_use]
    pub fn gateway_url(&self) -> &str {
        &self.gateway_url
    }

    #[must_use]
    pub fn resume_gateway_url(&self) -> Option<&str> {
        self.resume_gateway_url.as_deref()
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Shared handle to the sequence number
    #[must_use]
    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    /// Whether a resume was attempted in this process
    #[must_use]
    pub fn resumed(&self) -> bool {
        self.resumed
    }

    /// A session id is known, so the next handshake is a resume
    #[must_use]
    pub fn can_resume(&self) -> bool {
        self.session_id.is_some()
    }

    /// Store the outcome of a successful identify
    pub fn on_ready(&mut self, session_id: String, resume_gateway_url: Option<String>) {
        self.session_id = Some(session_id);
        if let Some(url) = resume_gateway_url {
            self.resume_gateway_url = Some(url);
        }
    }

    /// Record that a resume was sent
    pub fn mark_resumed(&mut self) {
        self.resumed = true;
    }

    /// Drop the session so the next handshake is a fresh identify
    pub fn invalidate(&mut self) {
        self.session_id = None;
        self.resume_gateway_url = None;
        self.sequence.reset();
    }

    /// URL for the next connection with version and encoding parameters
    ///
    /// Resumes go to the resume URL when one is known.
    pub fn connect_url(&self, version: u8) -> GatewayResult<Url> {
        let base = match (&self.resume_gateway_url, self.can_resume()) {
            (Some(url), true) => url.as_str(),
            _ => self.gateway_url.as_str(),
        };
        with_query(base, version)
    }
}

fn with_query(base: &str, version: u8) -> GatewayResult<Url> {
    let mut url = Url::parse(base).map_err(|e| GatewayError::InvalidUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })?;

    url.query_pairs_mut()
        .clear()
        .append_pair("v", &version.to_string())
        .append_pair("encoding", "json");

    Ok(url)
}
