//! Connection management
//!
//! The session state machine and the tasks that share one WebSocket.

mod backoff;
mod error;
mod heartbeat;
mod manager;
mod session;
mod writer;

pub use backoff::ReconnectBackoff;
pub use error::{GatewayError, GatewayResult};
pub use heartbeat::{HeartbeatExit, HeartbeatHandle, HeartbeatState, Heartbeater};
pub use manager::{ConnectionManager, ConnectionState};
pub use session::{Sequence, SessionState};
pub use writer::{OutboundWriter, WriterConfig, WriterHandle};
